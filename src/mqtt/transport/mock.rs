//! Scripted in-memory transport.

use super::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

/// How the scripted broker answers a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectBehaviour {
    /// `Connected` is queued right away
    Accept,
    /// `begin_connect` itself fails
    Refuse,
    /// Attempt starts, then `Lost` is queued
    FailLater,
    /// Attempt starts and nothing ever answers
    Hang,
}

#[derive(Debug)]
struct MockState {
    behaviour: ConnectBehaviour,
    connect_attempts: usize,
    resets: usize,
    subscriptions: Vec<String>,
    published: Vec<(String, String)>,
    pending: VecDeque<TransportEvent>,
    subscribe_error: Option<TransportError>,
    publish_error: Option<TransportError>,
}

/// Clones share state, so a test keeps one handle and moves the other into a
/// session.
#[derive(Debug, Clone)]
pub struct MockTransport {
    state: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new(behaviour: ConnectBehaviour) -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                behaviour,
                connect_attempts: 0,
                resets: 0,
                subscriptions: Vec::new(),
                published: Vec::new(),
                pending: VecDeque::new(),
                subscribe_error: None,
                publish_error: None,
            })),
        }
    }

    pub fn accepting() -> Self {
        Self::new(ConnectBehaviour::Accept)
    }

    pub fn set_behaviour(&self, behaviour: ConnectBehaviour) {
        self.state.lock().unwrap().behaviour = behaviour;
    }

    pub fn inject(&self, topic: &str, payload: &str) {
        self.push(TransportEvent::Message(InboundMessage::from_topic(
            topic,
            payload.as_bytes(),
        )));
    }

    pub fn push(&self, event: TransportEvent) {
        self.state.lock().unwrap().pending.push_back(event);
    }

    pub fn fail_next_subscribe(&self, error: TransportError) {
        self.state.lock().unwrap().subscribe_error = Some(error);
    }

    pub fn fail_next_publish(&self, error: TransportError) {
        self.state.lock().unwrap().publish_error = Some(error);
    }

    pub fn connect_attempts(&self) -> usize {
        self.state.lock().unwrap().connect_attempts
    }

    pub fn resets(&self) -> usize {
        self.state.lock().unwrap().resets
    }

    pub fn subscriptions(&self) -> Vec<String> {
        self.state.lock().unwrap().subscriptions.clone()
    }

    pub fn published(&self) -> Vec<(String, String)> {
        self.state.lock().unwrap().published.clone()
    }

    pub fn published_to(&self, topic: &str) -> Vec<String> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, payload)| payload)
            .collect()
    }
}

impl MqttTransport for MockTransport {
    fn begin_connect(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        state.connect_attempts += 1;
        match state.behaviour {
            ConnectBehaviour::Accept => state.pending.push_back(TransportEvent::Connected),
            ConnectBehaviour::Refuse => {
                return Err(TransportError::ConnectionFailure("connection refused".into()))
            }
            ConnectBehaviour::FailLater => state
                .pending
                .push_back(TransportEvent::Lost("connection timed out".into())),
            ConnectBehaviour::Hang => {}
        }
        Ok(())
    }

    fn next_event(&mut self) -> Option<TransportEvent> {
        self.state.lock().unwrap().pending.pop_front()
    }

    fn subscribe(&mut self, topic: &str) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.subscribe_error.take() {
            return Err(error);
        }
        state.subscriptions.push(topic.to_string());
        Ok(())
    }

    fn publish(&mut self, topic: &str, payload: &[u8]) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(error) = state.publish_error.take() {
            return Err(error);
        }
        state.published.push((
            topic.to_string(),
            String::from_utf8_lossy(payload).into_owned(),
        ));
        Ok(())
    }

    fn reset(&mut self) {
        self.state.lock().unwrap().resets += 1;
    }
}
