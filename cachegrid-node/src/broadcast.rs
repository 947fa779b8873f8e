//! Cluster-wide admin broadcast channel.
//!
//! Listener removal and shutdown are coordinated by broadcasting control
//! messages on a dedicated topic that every cache facade subscribes to,
//! including the sender. Publishing then sleeps for a fixed grace interval
//! so the message has usually propagated by the time the caller proceeds.
//! The interval bounds most races in practice but is not an acknowledgement
//! protocol; callers must not assume immediate cluster-wide consistency.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use cachegrid_core::{ObjectId, Result};

use crate::grid::topic::{GridTopic, TopicMessage, TopicSubscription};

/// A control message coordinating listener state across members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdminMessage {
    /// A listener id was attached to an object somewhere in the cluster.
    ///
    /// Informational: the replicated registry already carries the id by the
    /// time this is published, so subscribers take no local action.
    Attach {
        /// The target object.
        object: ObjectId,
        /// The attached listener id.
        listener_id: String,
    },
    /// A listener id must be detached from an object on every member.
    Detach {
        /// The target object.
        object: ObjectId,
        /// The listener id to detach.
        listener_id: String,
    },
    /// Every member receiving this stops its own grid instance.
    Shutdown,
}

/// The admin topic plus the propagation grace interval.
#[derive(Debug, Clone)]
pub struct AdminChannel {
    topic: GridTopic,
    propagation_grace: Duration,
}

impl AdminChannel {
    /// Creates a channel over the given topic.
    pub fn new(topic: GridTopic, propagation_grace: Duration) -> Self {
        Self {
            topic,
            propagation_grace,
        }
    }

    /// Returns the configured grace interval.
    pub fn propagation_grace(&self) -> Duration {
        self.propagation_grace
    }

    /// Publishes a message to every member, then sleeps the grace interval.
    pub async fn publish(&self, message: &AdminMessage) -> Result<()> {
        let encoded = serde_json::to_value(message)?;
        tracing::debug!(topic = %self.topic.name(), ?message, "publishing admin message");
        self.topic.publish(encoded);
        tokio::time::sleep(self.propagation_grace).await;
        Ok(())
    }

    /// Opens a FIFO subscription to the admin topic.
    pub fn subscribe(&self) -> TopicSubscription {
        self.topic.subscribe()
    }

    /// Decodes an admin message from a raw topic message.
    pub fn decode(message: &TopicMessage) -> Result<AdminMessage> {
        Ok(serde_json::from_value(message.message.clone())?)
    }
}
