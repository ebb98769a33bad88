//! Seam between a [`BrokerSession`](super::session::BrokerSession) and the MQTT
//! client library.
//!
//! Every method is non-blocking. The production transport wraps a
//! `rumqttc::AsyncClient`; its `EventLoop` lives in a dedicated task that
//! only polls after the session asked for a connection attempt, and reports
//! back over a bounded channel:
//!
//! ```text
//! BrokerSession ──begin_connect──► attempts ──► [driver task: EventLoop::poll]
//!       ▲                                                │
//!       └────────────── next_event ◄── events ◄──────────┘
//! ```

use super::config::BrokerConfig;
use super::message_manager::InboundMessage;
use rumqttc::{AsyncClient, ClientError, Event, EventLoop, MqttOptions, Packet, QoS};
use thiserror::Error;
use tokio::sync::mpsc::{self, error::TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Outstanding connection attempts the driver will accept.
const ATTEMPT_QUEUE: usize = 1;
/// Outbound requests per tick on top of the subscriptions (telemetry plus
/// one publish per mirrored feed), with headroom for a slow driver.
const OUTBOUND_BURST: usize = 16;
/// Events buffered between the driver and the session.
const EVENT_QUEUE: usize = 64;

/// Something the transport observed since the last call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// Broker accepted the connection
    Connected,
    /// Message on a subscribed topic
    Message(InboundMessage),
    /// Attempt failed or established connection dropped
    Lost(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("Connection failure: {0}")]
    ConnectionFailure(String),

    #[error("Request queue full")]
    QueueFull,

    #[error("Transport closed")]
    Closed,
}

impl TransportError {
    /// Whether the error means the connection is gone.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            TransportError::ConnectionFailure(_) | TransportError::Closed
        )
    }
}

pub trait MqttTransport: Send {
    /// Starts a connection attempt. The outcome arrives later as
    /// [`TransportEvent::Connected`] or [`TransportEvent::Lost`].
    fn begin_connect(&mut self) -> Result<(), TransportError>;

    /// Next pending event, if any.
    fn next_event(&mut self) -> Option<TransportEvent>;

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError>;

    /// QoS 0, not retained.
    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError>;

    /// Abandons the current connection. The next `begin_connect` starts over.
    fn reset(&mut self);
}

struct DriverLink {
    client: AsyncClient,
    attempts: mpsc::Sender<()>,
    events: mpsc::Receiver<TransportEvent>,
    task: JoinHandle<()>,
}

pub struct RumqttcTransport {
    name: String,
    options: MqttOptions,
    /// rumqttc request channel size
    request_capacity: usize,
    link: Option<DriverLink>,
}

impl RumqttcTransport {
    pub fn new(config: &BrokerConfig) -> Self {
        let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
        options
            .set_keep_alive(config.keep_alive)
            .set_clean_session(true);
        if let Some(credentials) = &config.credentials {
            options.set_credentials(&credentials.username, &credentials.password);
        }

        RumqttcTransport {
            name: config.name.clone(),
            options,
            request_capacity: config.topics.len() + OUTBOUND_BURST,
            link: None,
        }
    }

    /// Live link to the driver task, spawning a new one if there is none.
    fn ensure_link(&mut self) -> Result<&mut DriverLink, TransportError> {
        let stale = self
            .link
            .as_ref()
            .map_or(true, |link| link.task.is_finished());

        if stale {
            let runtime = tokio::runtime::Handle::try_current()
                .map_err(|e| TransportError::ConnectionFailure(e.to_string()))?;

            let (client, eventloop) = AsyncClient::new(self.options.clone(), self.request_capacity);
            let (attempts_tx, attempts_rx) = mpsc::channel(ATTEMPT_QUEUE);
            let (events_tx, events_rx) = mpsc::channel(EVENT_QUEUE);

            let name = self.name.clone();
            let task = runtime.spawn(async move {
                drive_event_loop(name, eventloop, attempts_rx, events_tx).await;
            });
            debug!("[{}] event loop driver spawned", self.name);

            self.link = Some(DriverLink {
                client,
                attempts: attempts_tx,
                events: events_rx,
                task,
            });
        }

        self.link.as_mut().ok_or(TransportError::Closed)
    }

    fn request_error(&self, error: ClientError) -> TransportError {
        match &self.link {
            Some(link) if !link.task.is_finished() => {
                debug!("[{}] request rejected: {}", self.name, error);
                TransportError::QueueFull
            }
            _ => TransportError::Closed,
        }
    }
}

impl MqttTransport for RumqttcTransport {
    fn begin_connect(&mut self) -> Result<(), TransportError> {
        let link = self.ensure_link()?;
        match link.attempts.try_send(()) {
            // a full queue means an attempt is already on its way
            Ok(()) | Err(mpsc::error::TrySendError::Full(())) => Ok(()),
            Err(mpsc::error::TrySendError::Closed(())) => Err(TransportError::Closed),
        }
    }

    fn next_event(&mut self) -> Option<TransportEvent> {
        let link = self.link.as_mut()?;
        match link.events.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                self.link = None;
                Some(TransportEvent::Lost("event loop driver stopped".into()))
            }
        }
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let link = self.link.as_ref().ok_or(TransportError::Closed)?;
        link.client
            .try_subscribe(topic, QoS::AtMostOnce)
            .map_err(|e| self.request_error(e))
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let link = self.link.as_ref().ok_or(TransportError::Closed)?;
        link.client
            .try_publish(topic, QoS::AtMostOnce, false, payload.to_vec())
            .map_err(|e| self.request_error(e))
    }

    fn reset(&mut self) {
        if let Some(link) = self.link.take() {
            debug!("[{}] dropping event loop driver", self.name);
            link.task.abort();
        }
    }
}

impl Drop for RumqttcTransport {
    fn drop(&mut self) {
        self.reset();
    }
}

/// Owns the `EventLoop`. Each attempt token polls until the connection fails,
/// then waits for the next token; the event loop reconnects on the first poll
/// after an error.
async fn drive_event_loop(
    name: String,
    mut eventloop: EventLoop,
    mut attempts: mpsc::Receiver<()>,
    events: mpsc::Sender<TransportEvent>,
) {
    while attempts.recv().await.is_some() {
        debug!("[{}] connection attempt started", name);

        loop {
            let event = match eventloop.poll().await {
                Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                    info!("[{}] broker accepted connection ({:?})", name, ack.code);
                    TransportEvent::Connected
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    TransportEvent::Message(InboundMessage::from_topic(
                        publish.topic,
                        &publish.payload,
                    ))
                }
                Ok(Event::Incoming(Packet::Disconnect)) => {
                    // the socket error that follows ends this attempt
                    warn!("[{}] broker sent DISCONNECT", name);
                    continue;
                }
                Ok(_) => continue,
                Err(e) => {
                    if events.send(TransportEvent::Lost(e.to_string())).await.is_err() {
                        return;
                    }
                    break;
                }
            };

            if events.send(event).await.is_err() {
                return;
            }
        }
    }

    debug!("[{}] event loop driver stopped", name);
}

#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
pub(crate) mod test_broker;
