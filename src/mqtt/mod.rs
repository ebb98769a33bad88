//! # MQTT
//!
//! Two independent broker sessions share this module: the local broker
//! (commands in, sensor telemetry out) and the cloud feed broker (actuator
//! state mirrored out, feed commands in).
//!
//! ```text
//! mqtt/
//! ├── config.rs           - Broker identity and tuning
//! ├── feeds.rs            - Cloud feed topic naming
//! ├── message_manager.rs  - Inbound message representation
//! ├── session.rs          - Non-blocking connection state machine
//! └── transport/
//!     ├── mod.rs          - rumqttc seam and its event loop driver
//!     ├── mock.rs         - scripted transport (tests)
//!     └── test_broker.rs  - loopback MQTT broker (tests)
//! ```
//!
//! A session never blocks. It is polled once per coordinator tick, starts
//! connection attempts on its own retry timer and drops publishes while it is
//! not connected. A stalled broker therefore never holds up the other session
//! or the actuator path.

pub mod config;
pub mod feeds;
pub mod message_manager;
pub mod session;
pub mod transport;

pub use config::BrokerConfig;
pub use feeds::CloudFeed;
pub use message_manager::InboundMessage;
pub use session::{BrokerSession, ConnectionState, SessionStats};
pub use transport::{MqttTransport, RumqttcTransport, TransportError, TransportEvent};
