//! Periodic calculation scheduler.
//!
//! Drives [`CostCalculator::run`] on a fixed interval until a shutdown
//! signal arrives. The first run starts immediately; if a run overruns the
//! interval, the next tick is delayed rather than fired in a burst.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

use crate::calculator::CostCalculator;

/// Runs the calculation job on a timer.
pub struct CalculationScheduler {
    calculator: Arc<CostCalculator>,
    interval: Duration,
}

impl CalculationScheduler {
    /// Schedule `calculator` every `interval`.
    pub fn new(calculator: Arc<CostCalculator>, interval: Duration) -> Self {
        Self {
            calculator,
            interval,
        }
    }

    /// Run until `shutdown` turns `true` or its sender is dropped.
    ///
    /// Returns the number of runs started. A failed run is logged and the
    /// loop carries on with the next tick.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> u64 {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut runs: u64 = 0;

        info!(interval_secs = self.interval.as_secs(), "Calculation scheduler started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            tokio::select! {
                _ = ticker.tick() => {
                    runs = runs.saturating_add(1);
                    match self.calculator.run().await {
                        Ok(report) => debug!(
                            run = runs,
                            outcome = ?report.outcome,
                            mutated = report.outcome.mutated(),
                            costed = report.packages_costed,
                            "Scheduled calculation finished"
                        ),
                        Err(e) => error!(run = runs, error = %e, "Scheduled calculation failed"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(runs, "Calculation scheduler stopped");
        runs
    }
}
