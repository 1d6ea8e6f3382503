//! The tick loop that evaluates alert units.
//!
//! Units run one after another inside a tick. Every failure is contained to
//! the unit it happened in: it is logged, reported to the system channel on a
//! best-effort basis, and the unit's run-state is advanced anyway so a
//! permanently broken unit does not retry on every tick.

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use speedwatch_influx::QueryExecutor;
use speedwatch_notify::{Delivery, Dispatcher, Route, REPORTED_TARGET};
use speedwatch_rules::{AlertError, AlertRegistry, ChaosScheduler, EvalContext, RunScheduler};

/// Counters for one tick.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TickReport {
    /// Units that were due and evaluated.
    pub ran: usize,
    /// Units whose notification went out.
    pub notified: usize,
    /// Units that hit an error in condition, message or delivery.
    pub failed: usize,
}

/// What happened to a single due unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Outcome {
    Quiet,
    ChaosHeld,
    Notified,
    DeliveryFailed,
}

pub struct Runner {
    registry: AlertRegistry,
    scheduler: RunScheduler,
    chaos: ChaosScheduler,
    executor: Arc<dyn QueryExecutor>,
    dispatcher: Arc<Dispatcher>,
}

impl Runner {
    pub fn new(
        registry: AlertRegistry,
        scheduler: RunScheduler,
        chaos: ChaosScheduler,
        executor: Arc<dyn QueryExecutor>,
        dispatcher: Arc<Dispatcher>,
    ) -> Self {
        Self {
            registry,
            scheduler,
            chaos,
            executor,
            dispatcher,
        }
    }

    pub fn registry(&self) -> &AlertRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &RunScheduler {
        &self.scheduler
    }

    pub fn chaos(&self) -> &ChaosScheduler {
        &self.chaos
    }

    /// Evaluate every due unit once, then persist run-state if anything ran.
    pub async fn tick(&mut self, now: DateTime<Utc>) -> TickReport {
        let mut report = TickReport::default();

        for idx in 0..self.registry.len() {
            let (name, cadence) = {
                let unit = &self.registry.units()[idx];
                (unit.name().to_string(), *unit.cadence())
            };
            if !self.scheduler.is_due(&name, &cadence, now) {
                continue;
            }
            report.ran += 1;

            let start = Instant::now();
            match self.run_unit(idx, now).await {
                Ok(Outcome::Notified) => report.notified += 1,
                Ok(Outcome::DeliveryFailed) => report.failed += 1,
                Ok(Outcome::Quiet) | Ok(Outcome::ChaosHeld) => {}
                Err(e) => {
                    report.failed += 1;
                    error!(
                        target: REPORTED_TARGET,
                        unit = %name,
                        error = %e,
                        "alert unit failed"
                    );
                    report_failure(&self.dispatcher, &name, "evaluation", &e.to_string()).await;
                }
            }
            debug!(unit = %name, elapsed_ms = start.elapsed().as_millis() as u64, "unit pass finished");

            self.scheduler.record_run(&name, &cadence, now);
        }

        if report.ran > 0 {
            self.scheduler.persist();
            info!(
                ran = report.ran,
                notified = report.notified,
                failed = report.failed,
                "tick complete"
            );
        } else {
            debug!("tick: nothing due");
        }
        report
    }

    async fn run_unit(&mut self, idx: usize, now: DateTime<Utc>) -> Result<Outcome, AlertError> {
        let unit = &mut self.registry.units_mut()[idx];
        let name = unit.name().to_string();

        let rows = match self.executor.execute(unit.query()).await {
            Ok(rows) => {
                debug!(unit = %name, rows = rows.len(), "query ok");
                Some(rows)
            }
            Err(e) => {
                warn!(
                    target: REPORTED_TARGET,
                    unit = %name,
                    error = %e,
                    "query failed, evaluating without data"
                );
                report_failure(&self.dispatcher, &name, "query", &e.to_string()).await;
                None
            }
        };

        if unit.is_chaos() && !self.chaos.should_fire(&name, now) {
            debug!(unit = %name, "chaos held");
            return Ok(Outcome::ChaosHeld);
        }

        let ctx = EvalContext { unit: &name, now };
        let rows = rows.as_deref();
        let alert = unit.alert_mut();

        if !guarded(|| alert.condition(rows, &ctx))? {
            return Ok(Outcome::Quiet);
        }
        let text = guarded(|| alert.message(rows, &ctx))?;

        match self.dispatcher.deliver(Route::Primary, &text).await {
            Ok(delivery) => {
                if delivery == Delivery::Skipped {
                    info!(unit = %name, "alert fired but no primary channel is configured");
                }
                if unit.is_chaos() {
                    self.chaos.record_fire(&name, now);
                }
                Ok(Outcome::Notified)
            }
            Err(e) => {
                error!(
                    target: REPORTED_TARGET,
                    unit = %name,
                    error = %e,
                    "notification failed"
                );
                report_failure(&self.dispatcher, &name, "notification", &e.to_string()).await;
                Ok(Outcome::DeliveryFailed)
            }
        }
    }

    /// Tick every `period` until `shutdown` resolves. An in-flight tick is
    /// finished before returning.
    pub async fn run(mut self, period: Duration, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        tokio::pin!(shutdown);

        info!(
            units = self.registry.len(),
            period_secs = period.as_secs(),
            "alert loop started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick(Utc::now()).await;
                }
                _ = &mut shutdown => {
                    info!("shutdown requested, stopping alert loop");
                    break;
                }
            }
        }

        self.scheduler.persist();
    }

    /// One status line per unit, for `speedwatch list`.
    pub fn status_lines(&self, now: DateTime<Utc>) -> Vec<String> {
        self.registry
            .units()
            .iter()
            .map(|unit| {
                let line = self.scheduler.describe(unit.name(), unit.cadence(), now);
                if unit.is_chaos() {
                    let chance = self.chaos.chance_for(unit.name(), now);
                    format!("{line}; fire chance {:.1}%", chance * 100.0)
                } else {
                    line
                }
            })
            .collect()
    }
}

/// Run alert code, turning a panic into an [`AlertError`].
fn guarded<T>(f: impl FnOnce() -> Result<T, AlertError>) -> Result<T, AlertError> {
    match catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(payload) => {
            let msg = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "unknown panic".to_string());
            Err(AlertError::Panicked(msg))
        }
    }
}

/// Best-effort report to the system channel. Its own failure is only logged.
/// Callers log the failure under [`REPORTED_TARGET`] so the log forwarder
/// does not post it a second time.
async fn report_failure(dispatcher: &Dispatcher, unit: &str, stage: &str, cause: &str) {
    let text = format!("⚠️ `{unit}`: {stage} failed: {cause}");
    if let Err(e) = dispatcher.deliver(Route::System, &text).await {
        debug!(unit, error = %e, "system report failed");
    }
}
