//! Message: the bus envelope (spec §3 "Message", §4.1).

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Request,
    Response,
    Alert,
    Update,
    Heartbeat,
}

/// Opaque payload carried across the bus. Kept as an untyped JSON map at
/// the transport edge (spec §9 "Dynamic typing"); typed request/response
/// records are defined per-recipient and deserialized by the subscriber.
pub type Payload = HashMap<String, Value>;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub sender: String,
    pub recipient: String,
    pub kind: MessageKind,
    pub payload: Payload,
    /// Priority in [0, 1]. Higher is dequeued first (spec §4.1 "priority
    /// inversion": higher priority extracted first).
    pub priority: f64,
    pub timestamp: DateTime<Utc>,
    pub correlation_id: Uuid,
    pub response_expected: bool,
    pub timeout: Duration,
}

impl Message {
    pub fn new(sender: impl Into<String>, recipient: impl Into<String>, kind: MessageKind) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender: sender.into(),
            recipient: recipient.into(),
            kind,
            payload: Payload::new(),
            priority: 0.5,
            timestamp: Utc::now(),
            correlation_id: Uuid::now_v7(),
            response_expected: false,
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = payload;
        self
    }

    pub fn with_priority(mut self, priority: f64) -> Self {
        self.priority = priority.clamp(0.0, 1.0);
        self
    }

    pub fn expecting_response(mut self, timeout: Duration) -> Self {
        self.response_expected = true;
        self.timeout = timeout;
        self
    }

    pub fn response_to(&self, sender: impl Into<String>, payload: Payload) -> Self {
        Self {
            id: Uuid::now_v7(),
            sender: sender.into(),
            recipient: self.sender.clone(),
            kind: MessageKind::Response,
            payload,
            priority: self.priority,
            timestamp: Utc::now(),
            correlation_id: self.correlation_id,
            response_expected: false,
            timeout: self.timeout,
        }
    }
}
