//! Periodic liveness sweep.
//!
//! # Responsibilities
//! - Re-enumerate live tabs on a fixed interval
//! - Reap registry entries for tabs that disappeared
//!
//! # Design Decisions
//! - Continue-on-error: a failed enumeration is logged and retried next tick
//! - The first sweep runs one interval after start, not immediately

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::interception::point::InterceptionPoint;

pub struct LivenessSweeper {
    point: Arc<InterceptionPoint>,
    interval: Duration,
}

impl LivenessSweeper {
    pub fn new(point: Arc<InterceptionPoint>, interval: Duration) -> Self {
        Self { point, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        if self.interval.is_zero() {
            tracing::info!("Liveness sweep disabled");
            return;
        }

        tracing::info!(interval_secs = self.interval.as_secs_f64(), "Liveness sweeper starting");

        let mut ticker = time::interval_at(Instant::now() + self.interval, self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(error) = self.point.sweep().await {
                        tracing::warn!(error = %error, "Liveness sweep failed, retrying next interval");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Liveness sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
