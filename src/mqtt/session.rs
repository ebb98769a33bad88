use super::config::BrokerConfig;
use super::message_manager::InboundMessage;
use super::transport::{MqttTransport, TransportEvent};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

#[derive(Clone, Copy, Default, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

#[derive(Clone, Debug, Default)]
pub struct SessionStats {
    pub connect_attempts: usize,
    pub messages_received: usize,
    pub messages_sent: usize,
    pub publishes_dropped: usize,
    pub last_activity: Option<chrono::DateTime<chrono::Local>>,
}

/// One broker connection, polled once per tick and never blocking.
///
/// A connection attempt is started only when the session is `Disconnected`
/// and its retry timer has expired. The very first attempt is immediate;
/// after a failed attempt or a lost connection the next one waits
/// `reconnect_delay`.
pub struct BrokerSession {
    config: BrokerConfig,
    transport: Box<dyn MqttTransport>,
    state: ConnectionState,
    retry_at: Option<Instant>,
    inbox: Vec<InboundMessage>,
    stats: SessionStats,
}

impl BrokerSession {
    pub fn new(config: BrokerConfig, transport: Box<dyn MqttTransport>) -> Self {
        info!("[{}] broker {}", config.name, config);
        BrokerSession {
            config,
            transport,
            state: ConnectionState::Disconnected,
            retry_at: None,
            inbox: Vec::new(),
            stats: SessionStats::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn topics(&self) -> &[String] {
        &self.config.topics
    }

    /// Earliest instant the next connection attempt may start.
    pub fn retry_at(&self) -> Option<Instant> {
        self.retry_at
    }

    /// Absorbs pending transport events and starts a connection attempt if
    /// one is due. Returns the state after the call.
    pub fn ensure_connected(&mut self, now: Instant) -> ConnectionState {
        self.pump(now);

        if self.state == ConnectionState::Disconnected && self.retry_due(now) {
            self.stats.connect_attempts += 1;
            debug!(
                "[{}] connection attempt #{} to {}:{}",
                self.config.name, self.stats.connect_attempts, self.config.host, self.config.port
            );

            match self.transport.begin_connect() {
                Ok(()) => self.state = ConnectionState::Connecting,
                Err(e) => {
                    warn!("[{}] connection attempt failed: {}", self.config.name, e);
                    self.schedule_retry(now);
                }
            }
        }

        self.state
    }

    /// Hands out the inbound messages received since the last call, at most
    /// `inbound_capacity` of them.
    pub fn service(&mut self, now: Instant) -> Vec<InboundMessage> {
        self.pump(now);
        std::mem::take(&mut self.inbox)
    }

    /// Fire-and-forget publish. Never fails towards the caller.
    pub fn publish(&mut self, now: Instant, topic: &str, payload: &str) -> bool {
        if self.state != ConnectionState::Connected {
            self.stats.publishes_dropped += 1;
            debug!(
                "[{}] not connected, dropping publish to {}",
                self.config.name, topic
            );
            return false;
        }

        match self.transport.publish(topic, payload.as_bytes()) {
            Ok(()) => {
                self.stats.messages_sent += 1;
                self.stats.last_activity = Some(chrono::Local::now());
                debug!("[{}] -> {} {:?}", self.config.name, topic, payload);
                true
            }
            Err(e) => {
                self.stats.publishes_dropped += 1;
                if e.is_connection_loss() {
                    error!("[{}] publish to {} failed: {}", self.config.name, topic, e);
                    self.mark_lost(now);
                } else {
                    warn!("[{}] publish to {} dropped: {}", self.config.name, topic, e);
                }
                false
            }
        }
    }

    fn pump(&mut self, now: Instant) {
        let capacity = self.config.inbound_capacity.max(1);

        while self.inbox.len() < capacity {
            let Some(event) = self.transport.next_event() else {
                break;
            };

            match event {
                TransportEvent::Connected => self.on_connected(now),
                TransportEvent::Lost(reason) => {
                    if self.state != ConnectionState::Disconnected {
                        warn!("[{}] connection lost: {}", self.config.name, reason);
                        self.mark_lost(now);
                    } else {
                        debug!("[{}] stale loss report: {}", self.config.name, reason);
                    }
                }
                TransportEvent::Message(message) => {
                    self.stats.messages_received += 1;
                    self.stats.last_activity = Some(chrono::Local::now());
                    debug!("[{}] <- {}", self.config.name, message);
                    self.inbox.push(message);
                }
            }
        }
    }

    fn on_connected(&mut self, now: Instant) {
        // subscriptions do not survive a clean session, renew them every time
        let mut failed = None;
        for topic in &self.config.topics {
            if let Err(e) = self.transport.subscribe(topic) {
                failed = Some((topic.clone(), e));
                break;
            }
        }

        // a connection missing any of its topics counts as a failed attempt
        if let Some((topic, e)) = failed {
            error!("[{}] subscribe to {} failed: {}", self.config.name, topic, e);
            self.mark_lost(now);
            return;
        }

        self.state = ConnectionState::Connected;
        self.retry_at = None;
        self.stats.last_activity = Some(chrono::Local::now());
        info!(
            "[{}] connected, subscribed to {:?}",
            self.config.name, self.config.topics
        );
    }

    fn mark_lost(&mut self, now: Instant) {
        self.transport.reset();
        self.schedule_retry(now);
    }

    fn schedule_retry(&mut self, now: Instant) {
        self.state = ConnectionState::Disconnected;
        self.retry_at = Some(now + self.config.reconnect_delay);
        debug!(
            "[{}] next attempt in {:?}",
            self.config.name, self.config.reconnect_delay
        );
    }

    fn retry_due(&self, now: Instant) -> bool {
        self.retry_at.map_or(true, |at| now >= at)
    }
}
