//! Topic fan-out to connected websocket clients.
//!
//! Delivery is best-effort and at-most-once: each connection owns a bounded
//! queue, publishing never waits on it, and a full queue drops the message
//! for that connection only. Order is preserved per connection.

use std::collections::{HashMap, HashSet};
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::IntoEnumIterator;
use strum_macros::{AsRefStr, Display, EnumIter, EnumString};
use tokio::sync::{RwLock, mpsc};
use tracing::{debug, warn};

use crate::model::{attendance::Attendance, exception::Exception};

pub const DEFAULT_BUFFER: usize = 64;

pub type ConnectionId = u64;

#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[derive(EnumString, EnumIter, Display, AsRefStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Topic {
    Attendance,
    Exceptions,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Connected { timestamp: DateTime<Utc> },
    Subscribed { channel: Topic },
    Unsubscribed { channel: Topic },
    AttendanceUpdate { data: Value, timestamp: DateTime<Utc> },
    ExceptionAlert { data: Value, timestamp: DateTime<Utc> },
    Error { message: String },
}

struct Subscriber {
    topics: HashSet<Topic>,
    tx: mpsc::Sender<String>,
}

pub struct Notifier {
    subscribers: RwLock<HashMap<ConnectionId, Subscriber>>,
    next_id: AtomicU64,
    buffer: usize,
}

impl Default for Notifier {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER)
    }
}

fn encode(message: &ServerMessage) -> Option<String> {
    match serde_json::to_string(message) {
        Ok(text) => Some(text),
        Err(e) => {
            warn!(error = %e, "Failed to encode notifier message");
            None
        }
    }
}

impl Notifier {
    pub fn new(buffer: usize) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            buffer: buffer.max(1),
        }
    }

    /// Registers a connection and queues its `connected` greeting.
    pub async fn connect(&self, now: DateTime<Utc>) -> (ConnectionId, mpsc::Receiver<String>) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = mpsc::channel(self.buffer);
        if let Some(text) = encode(&ServerMessage::Connected { timestamp: now }) {
            let _ = tx.try_send(text);
        }
        self.subscribers.write().await.insert(
            id,
            Subscriber {
                topics: HashSet::new(),
                tx,
            },
        );
        debug!(connection_id = id, "Notifier connection registered");
        (id, rx)
    }

    pub async fn disconnect(&self, id: ConnectionId) {
        if self.subscribers.write().await.remove(&id).is_some() {
            debug!(connection_id = id, "Notifier connection removed");
        }
    }

    /// Adds `topic` for the connection and acknowledges it.
    pub async fn subscribe(&self, id: ConnectionId, topic: Topic) -> bool {
        let tx = {
            let mut subs = self.subscribers.write().await;
            let Some(sub) = subs.get_mut(&id) else {
                return false;
            };
            sub.topics.insert(topic);
            sub.tx.clone()
        };
        Self::deliver(id, &tx, &ServerMessage::Subscribed { channel: topic });
        true
    }

    pub async fn unsubscribe(&self, id: ConnectionId, topic: Topic) -> bool {
        let tx = {
            let mut subs = self.subscribers.write().await;
            let Some(sub) = subs.get_mut(&id) else {
                return false;
            };
            sub.topics.remove(&topic);
            sub.tx.clone()
        };
        Self::deliver(id, &tx, &ServerMessage::Unsubscribed { channel: topic });
        true
    }

    /// Sends `message` to every current subscriber of `topic`; returns how many accepted it.
    pub async fn publish(&self, topic: Topic, message: &ServerMessage) -> usize {
        let Some(text) = encode(message) else {
            return 0;
        };
        let targets: Vec<(ConnectionId, mpsc::Sender<String>)> = {
            let subs = self.subscribers.read().await;
            subs.iter()
                .filter(|(_, s)| s.topics.contains(&topic))
                .map(|(id, s)| (*id, s.tx.clone()))
                .collect()
        };

        let mut delivered = 0;
        for (id, tx) in targets {
            match tx.try_send(text.clone()) {
                Ok(()) => delivered += 1,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(
                        connection_id = id,
                        topic = %topic,
                        "Subscriber queue full, message dropped"
                    );
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(connection_id = id, "Subscriber already gone");
                }
            }
        }
        delivered
    }

    pub async fn publish_attendance(&self, attendance: &Attendance, now: DateTime<Utc>) -> usize {
        match serde_json::to_value(attendance) {
            Ok(data) => {
                self.publish(
                    Topic::Attendance,
                    &ServerMessage::AttendanceUpdate { data, timestamp: now },
                )
                .await
            }
            Err(e) => {
                warn!(error = %e, "Failed to encode attendance update");
                0
            }
        }
    }

    pub async fn publish_exception(&self, exception: &Exception, now: DateTime<Utc>) -> usize {
        match serde_json::to_value(exception) {
            Ok(data) => {
                self.publish(
                    Topic::Exceptions,
                    &ServerMessage::ExceptionAlert { data, timestamp: now },
                )
                .await
            }
            Err(e) => {
                warn!(error = %e, "Failed to encode exception alert");
                0
            }
        }
    }

    /// Handles one text frame from a client.
    ///
    /// Accepts `{"type":"subscribe","data":{"channel":"attendance"}}` and the
    /// flat `{"type":"subscribe","channel":"attendance"}`; same for `unsubscribe`.
    pub async fn handle_client_message(&self, id: ConnectionId, text: &str) {
        let parsed: Value = match serde_json::from_str(text) {
            Ok(v) => v,
            Err(e) => {
                debug!(connection_id = id, error = %e, "Ignoring malformed client message");
                self.reply(id, ServerMessage::Error {
                    message: "Malformed message".into(),
                })
                .await;
                return;
            }
        };

        let kind = parsed.get("type").and_then(Value::as_str).unwrap_or_default();
        let channel = parsed
            .pointer("/data/channel")
            .or_else(|| parsed.get("channel"))
            .and_then(Value::as_str);

        match kind {
            "subscribe" | "unsubscribe" => {
                let Some(topic) = channel.and_then(|c| Topic::from_str(c).ok()) else {
                    let allowed: Vec<String> = Topic::iter().map(|t| t.to_string()).collect();
                    let message =
                        format!("Unknown channel, expected one of: {}", allowed.join(", "));
                    self.reply(id, ServerMessage::Error { message }).await;
                    return;
                };
                if kind == "subscribe" {
                    self.subscribe(id, topic).await;
                } else {
                    self.unsubscribe(id, topic).await;
                }
            }
            other => {
                debug!(connection_id = id, message_type = other, "Unknown client message type");
            }
        }
    }

    #[cfg(test)]
    pub async fn subscriber_count(&self, topic: Topic) -> usize {
        self.subscribers
            .read()
            .await
            .values()
            .filter(|s| s.topics.contains(&topic))
            .count()
    }

    async fn reply(&self, id: ConnectionId, message: ServerMessage) {
        let tx = self.subscribers.read().await.get(&id).map(|s| s.tx.clone());
        if let Some(tx) = tx {
            Self::deliver(id, &tx, &message);
        }
    }

    fn deliver(id: ConnectionId, tx: &mpsc::Sender<String>, message: &ServerMessage) {
        if let Some(text) = encode(message) {
            if tx.try_send(text).is_err() {
                warn!(connection_id = id, "Could not queue reply");
            }
        }
    }
}
