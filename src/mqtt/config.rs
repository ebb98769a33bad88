use std::fmt;
use std::time::Duration;

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// Identity and tuning of one broker connection.
#[derive(Debug, Clone, PartialEq)]
pub struct BrokerConfig {
    /// Short label used in logs ("local", "cloud")
    pub name: String,
    pub host: String,
    pub port: u16,
    pub client_id: String,
    pub credentials: Option<Credentials>,
    pub keep_alive: Duration,
    /// Minimum spacing between connection attempts
    pub reconnect_delay: Duration,
    /// Upper bound of inbound messages handed out per service call
    pub inbound_capacity: usize,
    /// Subscribed again after every successful connect
    pub topics: Vec<String>,
}

impl fmt::Display for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match &self.credentials {
            Some(credentials) => write!(
                f,
                "{}@{}:{} ({})",
                credentials.username, self.host, self.port, self.client_id
            ),
            None => write!(f, "{}:{} ({})", self.host, self.port, self.client_id),
        }
    }
}
