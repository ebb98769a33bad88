//! Main loop coordinator with a statum lifecycle.
//!
//! ```text
//! Idle ──start()──► Running ──run_until_cancelled()──► Stopped ──shutdown()
//!   (outputs to rest)        (tick every period)          (outputs to rest)
//! ```
//!
//! Each tick runs the same fixed sequence:
//!
//! ```text
//! local.ensure_connected ─► local.service ─► dispatch ─► sensor timer
//!   ─► cloud.ensure_connected ─► cloud.service ─► feeds ─► mirror timer
//! ```

pub mod coordinator;

pub use coordinator::{AppContext, TickReport, Topics};

use crate::actuator::DispatchError;
use statum::{machine, state};
use std::time::Duration;
use thiserror::Error;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Failed to bring actuators to rest: {0}")]
    Actuators(#[from] DispatchError),
}

#[state]
#[derive(Debug, Clone)]
pub enum BridgeState {
    Idle,
    Running,
    Stopped,
}

#[machine]
pub struct Bridge<S: BridgeState> {
    context: AppContext,
    ticks: u64,
}

impl<S: BridgeState> Bridge<S> {
    pub fn context(&self) -> &AppContext {
        &self.context
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }
}

impl Bridge<Idle> {
    pub fn create(context: AppContext) -> Self {
        Self::new(context, 0)
    }

    /// Drives every actuator to rest before the first tick.
    pub fn start(mut self) -> Result<Bridge<Running>, BridgeError> {
        self.context.bank.reset_all()?;
        info!("Bridge running");
        Ok(self.transition())
    }
}

impl Bridge<Running> {
    pub fn tick(&mut self, now: Instant) -> TickReport {
        self.ticks += 1;
        let report = self.context.tick(now);
        if !report.is_idle() {
            debug!("Tick {}: {}", self.ticks, report);
        }
        report
    }

    /// Ticks every `period` until `cancel` fires. Late ticks are delayed,
    /// never bunched up.
    pub async fn run_until_cancelled(
        mut self,
        period: Duration,
        cancel: CancellationToken,
    ) -> Bridge<Stopped> {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                now = interval.tick() => {
                    self.tick(now);
                }
            }
        }

        self.stop()
    }

    pub fn stop(self) -> Bridge<Stopped> {
        info!("Bridge stopping after {} ticks", self.ticks);
        self.transition()
    }
}

impl Bridge<Stopped> {
    /// Leaves every actuator at rest.
    pub fn shutdown(mut self) -> Result<AppContext, BridgeError> {
        self.context.bank.reset_all()?;
        info!("Bridge stopped");
        Ok(self.context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actuator::{ActuatorId, ActuatorState};
    use crate::bridge::coordinator::tests::harness;
    use crate::mqtt::transport::mock::ConnectBehaviour;

    #[test]
    fn test_lifecycle_leaves_outputs_at_rest() {
        let h = harness(ConnectBehaviour::Accept, ConnectBehaviour::Accept);
        let (local, start) = (h.local.clone(), h.start);

        let mut bridge = Bridge::create(h.context).start().unwrap();
        bridge.tick(start);
        bridge.tick(start + Duration::from_millis(1));
        local.inject("esp/cmd", "air,7");
        local.inject("esp/cmd", "fan,1");
        bridge.tick(start + Duration::from_millis(2));
        assert_eq!(
            bridge.context().bank.state(ActuatorId::Air),
            ActuatorState::Angle(180)
        );
        assert_eq!(bridge.ticks(), 3);

        let context = bridge.stop().shutdown().unwrap();
        for id in ActuatorId::ALL {
            assert!(!context.bank.is_on(id), "{id} left active");
        }
    }

    #[tokio::test]
    async fn test_run_stops_on_cancel() {
        let h = harness(ConnectBehaviour::Accept, ConnectBehaviour::Accept);
        let local = h.local.clone();
        let bridge = Bridge::create(h.context).start().unwrap();

        let cancel = CancellationToken::new();
        let stopper = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            stopper.cancel();
        });

        let stopped = bridge
            .run_until_cancelled(Duration::from_millis(10), cancel)
            .await;

        assert!(stopped.ticks() >= 2);
        assert!(stopped.context().local.is_connected());
        assert_eq!(local.connect_attempts(), 1);
        stopped.shutdown().unwrap();
    }
}
