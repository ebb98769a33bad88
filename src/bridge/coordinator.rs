use crate::actuator::{ActuatorBank, DispatchError};
use crate::command::{self, parse_int_lenient};
use crate::config::BridgeConfig;
use crate::mqtt::{BrokerSession, CloudFeed, ConnectionState, InboundMessage};
use crate::telemetry::{SensorSource, TelemetryScheduler};
use std::fmt;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

/// Topic names the coordinator routes on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topics {
    pub command: String,
    pub telemetry: String,
    /// Cloud account owning the feed topics
    pub account: String,
}

impl Topics {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            command: config.local.command_topic.clone(),
            telemetry: config.local.telemetry_topic.clone(),
            account: config.cloud.account.clone(),
        }
    }
}

/// Everything one tick needs, owned in one place.
pub struct AppContext {
    pub bank: ActuatorBank,
    pub local: BrokerSession,
    pub cloud: BrokerSession,
    pub scheduler: TelemetryScheduler,
    pub sensors: Box<dyn SensorSource>,
    pub topics: Topics,
}

/// What happened during one tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub local: ConnectionState,
    pub cloud: ConnectionState,
    pub commands_applied: usize,
    pub commands_rejected: usize,
    pub feed_updates: usize,
    pub telemetry_published: bool,
    pub mirror_published: usize,
}

impl TickReport {
    fn new() -> Self {
        Self {
            local: ConnectionState::Disconnected,
            cloud: ConnectionState::Disconnected,
            commands_applied: 0,
            commands_rejected: 0,
            feed_updates: 0,
            telemetry_published: false,
            mirror_published: 0,
        }
    }

    /// Nothing besides connection upkeep happened.
    pub fn is_idle(&self) -> bool {
        self.commands_applied == 0
            && self.commands_rejected == 0
            && self.feed_updates == 0
            && !self.telemetry_published
            && self.mirror_published == 0
    }
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "local {:?}, cloud {:?}, commands {}/{} rejected, feeds {}, telemetry {}, mirrored {}",
            self.local,
            self.cloud,
            self.commands_applied,
            self.commands_rejected,
            self.feed_updates,
            self.telemetry_published,
            self.mirror_published
        )
    }
}

impl AppContext {
    /// One pass of the main loop. Never blocks and never fails; every problem
    /// is logged and the tick moves on to the next step.
    pub fn tick(&mut self, now: Instant) -> TickReport {
        let mut report = TickReport::new();

        // 1. local upkeep
        report.local = self.local.ensure_connected(now);

        // 2. commands
        for message in self.local.service(now) {
            self.handle_command(&message, &mut report);
        }

        // 3. telemetry
        if self.scheduler.sensor_due(now) {
            let readings = self.sensors.read();
            debug!("Sensor readings: {}", readings);
            report.telemetry_published =
                self.local
                    .publish(now, &self.topics.telemetry, &readings.to_payload());
        }

        // 4. cloud upkeep
        report.cloud = self.cloud.ensure_connected(now);

        // 5. feed commands
        for message in self.cloud.service(now) {
            self.handle_feed(&message, &mut report);
        }

        // 6. state mirror
        if self.scheduler.mirror_due(now) {
            for feed in CloudFeed::ALL {
                let payload = if self.bank.is_on(feed.actuator()) { "1" } else { "0" };
                let topic = feed.topic(&self.topics.account);
                if self.cloud.publish(now, &topic, payload) {
                    report.mirror_published += 1;
                }
            }
        }

        report
    }

    fn handle_command(&mut self, message: &InboundMessage, report: &mut TickReport) {
        if message.topic != self.topics.command {
            debug!("Ignoring local message on {}", message.topic);
            return;
        }

        let command = match command::parse(&message.payload) {
            Ok(command) => command,
            Err(e) => {
                warn!("{}", e);
                report.commands_rejected += 1;
                return;
            }
        };

        match self.bank.dispatch(&command.target, command.value) {
            Ok(state) => {
                debug!("Command {:?} applied: {}", message.payload, state);
                report.commands_applied += 1;
            }
            Err(e @ DispatchError::UnknownActuator(_)) => {
                warn!("{}", e);
                report.commands_rejected += 1;
            }
            Err(e @ DispatchError::Hardware { .. }) => {
                error!("{}", e);
                report.commands_rejected += 1;
            }
        }
    }

    fn handle_feed(&mut self, message: &InboundMessage, report: &mut TickReport) {
        let Some(feed) = CloudFeed::from_topic(&message.topic, &self.topics.account) else {
            info!("Ignoring cloud message on {}", message.topic);
            return;
        };

        let on = parse_int_lenient(&message.payload) != 0;
        match self.bank.set_switch(feed.actuator(), on) {
            Ok(()) => report.feed_updates += 1,
            Err(e) => error!("Feed {} not applied: {}", feed.key(), e),
        }
    }
}
