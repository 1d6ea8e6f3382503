//! Static registry of alert units, built once at startup.

use std::collections::HashMap;

use tracing::info;

use crate::alert::Alert;
use crate::scheduler::{parse_cadence, Cadence, DailyDefaults};
use crate::state::file_stem;

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("duplicate alert unit '{0}'")]
    Duplicate(String),

    #[error("alert unit name must not be empty")]
    EmptyName,

    #[error("alert unit '{name}' would share its state file with '{existing}'")]
    StateCollision { name: String, existing: String },
}

/// An alert together with its cadence, parsed once at registration.
pub struct AlertUnit {
    name: String,
    cadence: Cadence,
    alert: Box<dyn Alert>,
}

impl AlertUnit {
    /// The registered name: the alert's name with surrounding whitespace
    /// removed. Every state bucket is keyed by it.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cadence(&self) -> &Cadence {
        &self.cadence
    }

    pub fn query(&self) -> &str {
        self.alert.query()
    }

    pub fn is_chaos(&self) -> bool {
        self.cadence.is_chaos()
    }

    pub fn alert(&self) -> &dyn Alert {
        self.alert.as_ref()
    }

    pub fn alert_mut(&mut self) -> &mut dyn Alert {
        self.alert.as_mut()
    }
}

impl std::fmt::Debug for AlertUnit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlertUnit")
            .field("name", &self.name())
            .field("cadence", &self.cadence)
            .finish()
    }
}

/// Units in registration order. Names are unique, and so are the state
/// file stems derived from them.
#[derive(Debug)]
pub struct AlertRegistry {
    defaults: DailyDefaults,
    units: Vec<AlertUnit>,
    /// File stem → registered name.
    stems: HashMap<String, String>,
}

impl AlertRegistry {
    pub fn new(defaults: DailyDefaults) -> Self {
        Self {
            defaults,
            units: Vec::new(),
            stems: HashMap::new(),
        }
    }

    /// Parse the alert's cadence and add it under its trimmed name.
    ///
    /// Rejects empty names, duplicates, and names that map to the same
    /// milestone file as an existing unit (`a.b` and `a_b`).
    pub fn register(&mut self, alert: Box<dyn Alert>) -> Result<&mut Self, RegistryError> {
        let name = alert.name().trim().to_string();
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        if let Some(existing) = self.stems.get(&file_stem(&name)) {
            return Err(if *existing == name {
                RegistryError::Duplicate(name)
            } else {
                RegistryError::StateCollision {
                    name,
                    existing: existing.clone(),
                }
            });
        }
        self.stems.insert(file_stem(&name), name.clone());

        let cadence = parse_cadence(alert.cadence(), &self.defaults);
        info!(unit = %name, cadence = %cadence, "registered alert unit");
        self.units.push(AlertUnit {
            name,
            cadence,
            alert,
        });
        Ok(self)
    }

    pub fn units(&self) -> &[AlertUnit] {
        &self.units
    }

    pub fn units_mut(&mut self) -> &mut [AlertUnit] {
        &mut self.units
    }

    pub fn get(&self, name: &str) -> Option<&AlertUnit> {
        self.units.iter().find(|u| u.name() == name)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }
}
