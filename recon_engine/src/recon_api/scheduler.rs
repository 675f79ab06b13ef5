//! Cancellable periodic jobs.
//!
//! Every background loop in the system is a [`ScheduledJob`] driven by [`run_scheduled`]. The loop ticks on a tokio
//! interval and stops as soon as the shared [`Shutdown`] signal fires. A job that is mid-run when shutdown is triggered
//! finishes its current run first, so no batch is ever abandoned half-way.
use std::{fmt::Display, time::Duration};

use log::*;
use tokio::{sync::watch, time::MissedTickBehavior};

/// Create a linked trigger/signal pair. Clone the [`Shutdown`] half for every loop that must stop together.
pub fn shutdown_channel() -> (ShutdownTrigger, Shutdown) {
    let (tx, rx) = watch::channel(false);
    (ShutdownTrigger { tx }, Shutdown { rx })
}

#[derive(Debug)]
pub struct ShutdownTrigger {
    tx: watch::Sender<bool>,
}

impl ShutdownTrigger {
    pub fn trigger(&self) {
        // No receivers left means nobody is listening, which is fine
        let _ = self.tx.send(true);
    }
}

#[derive(Debug, Clone)]
pub struct Shutdown {
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once shutdown has been triggered, or the trigger has been dropped.
    pub async fn wait(&mut self) {
        while !*self.rx.borrow_and_update() {
            if self.rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[allow(async_fn_in_trait)]
pub trait ScheduledJob {
    type Error: Display;

    fn name(&self) -> &str;

    async fn run_once(&mut self) -> Result<(), Self::Error>;
}

/// Runs `job` every `period` until `shutdown` fires. The first run happens immediately.
///
/// Errors are logged and the loop carries on; a job never takes its loop down. Returns the number of runs.
pub async fn run_scheduled<J: ScheduledJob>(mut job: J, period: Duration, mut shutdown: Shutdown) -> u64 {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut runs = 0u64;
    info!("🕰️ {} started. Running every {period:?}", job.name());
    loop {
        tokio::select! {
            biased;
            _ = shutdown.wait() => break,
            _ = ticker.tick() => {
                runs += 1;
                if let Err(e) = job.run_once().await {
                    error!("🕰️ {} failed. Will try again in {period:?}. {e}", job.name());
                }
            }
        }
    }
    info!("🕰️ {} stopped after {runs} runs", job.name());
    runs
}
