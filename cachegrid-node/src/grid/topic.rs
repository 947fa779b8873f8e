//! Distributed topic handle for pub/sub messaging.
//!
//! Delivery is FIFO per subscriber: each subscription owns a channel the
//! publisher pushes into, so publishing never blocks on subscriber work.

use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::mpsc;
use uuid::Uuid;

use cachegrid_core::{GridValue, ObjectCategory, ObjectId};

use super::{read_lock, write_lock, GridCluster, Member};

/// A message received from a distributed topic.
#[derive(Debug, Clone)]
pub struct TopicMessage {
    /// The message payload.
    pub message: GridValue,
    /// Unix timestamp in milliseconds when the message was published.
    pub publish_time: u64,
    /// Id of the member that published the message, if known.
    pub publishing_member: Option<Uuid>,
}

impl TopicMessage {
    /// Creates a topic message stamped with the current time.
    pub fn new(message: GridValue, publishing_member: Option<Uuid>) -> Self {
        let publish_time = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self {
            message,
            publish_time,
            publishing_member,
        }
    }

    /// Returns the message payload.
    pub fn payload(&self) -> &GridValue {
        &self.message
    }

    /// Consumes the message and returns the payload.
    pub fn into_payload(self) -> GridValue {
        self.message
    }
}

struct SubscriberReg {
    id: Uuid,
    tx: mpsc::UnboundedSender<TopicMessage>,
}

pub(crate) struct TopicCore {
    name: String,
    subscribers: RwLock<Vec<SubscriberReg>>,
}

impl TopicCore {
    pub(crate) fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            subscribers: RwLock::new(Vec::new()),
        }
    }

    fn remove_subscriber(&self, id: Uuid) -> bool {
        let mut subscribers = write_lock(&self.subscribers);
        let before = subscribers.len();
        subscribers.retain(|reg| reg.id != id);
        subscribers.len() != before
    }
}

/// A member's handle onto a distributed pub/sub topic.
#[derive(Clone)]
pub struct GridTopic {
    cluster: GridCluster,
    core: Arc<TopicCore>,
    member: Member,
}

impl GridTopic {
    pub(crate) fn new(cluster: GridCluster, core: Arc<TopicCore>, member: Member) -> Self {
        Self {
            cluster,
            core,
            member,
        }
    }

    /// Returns the topic's name.
    pub fn name(&self) -> &str {
        &self.core.name
    }

    /// Returns the topic's cluster-wide identity.
    pub fn id(&self) -> ObjectId {
        ObjectId::new(ObjectCategory::Topic, self.name())
    }

    /// Publishes a message to every current subscriber.
    ///
    /// Messages reach each subscriber in publish order. The call enqueues
    /// and returns; it never waits for subscribers to process the message.
    pub fn publish(&self, message: GridValue) {
        let topic_message = TopicMessage::new(message, Some(self.member.id()));

        let subscribers: Vec<(Uuid, mpsc::UnboundedSender<TopicMessage>)> =
            read_lock(&self.core.subscribers)
                .iter()
                .map(|reg| (reg.id, reg.tx.clone()))
                .collect();

        let mut closed = Vec::new();
        for (id, tx) in subscribers {
            if tx.send(topic_message.clone()).is_err() {
                closed.push(id);
            }
        }
        if !closed.is_empty() {
            write_lock(&self.core.subscribers).retain(|reg| !closed.contains(&reg.id));
        }
    }

    /// Opens a raw FIFO subscription to this topic.
    ///
    /// The subscription deregisters itself when dropped.
    pub fn subscribe(&self) -> TopicSubscription {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = Uuid::new_v4();
        write_lock(&self.core.subscribers).push(SubscriberReg { id, tx });
        TopicSubscription {
            id,
            core: Arc::clone(&self.core),
            receiver: rx,
        }
    }

    /// Registers a handler invoked for each published message.
    ///
    /// Returns a registration id accepted by
    /// [`remove_message_listener`](Self::remove_message_listener).
    pub fn add_message_listener<F>(&self, handler: F) -> Uuid
    where
        F: Fn(TopicMessage) + Send + Sync + 'static,
    {
        let mut subscription = self.subscribe();
        let id = subscription.id();
        let topic_name = self.core.name.clone();
        tokio::spawn(async move {
            while let Some(message) = subscription.recv().await {
                handler(message);
            }
            tracing::debug!(topic = %topic_name, "message listener stopped");
        });
        id
    }

    /// Removes a previously registered message listener or subscription.
    pub fn remove_message_listener(&self, id: Uuid) -> bool {
        self.core.remove_subscriber(id)
    }

    /// Returns the number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        read_lock(&self.core.subscribers).len()
    }

    /// Destroys the topic cluster-wide, firing an object `Destroyed` event.
    pub fn destroy(&self) -> bool {
        self.cluster.destroy_object(&self.id(), self.member.id())
    }
}

impl fmt::Debug for GridTopic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GridTopic")
            .field("name", &self.core.name)
            .field("member", &self.member)
            .finish()
    }
}

/// A raw FIFO subscription to a topic.
pub struct TopicSubscription {
    id: Uuid,
    core: Arc<TopicCore>,
    receiver: mpsc::UnboundedReceiver<TopicMessage>,
}

impl TopicSubscription {
    /// Returns the subscription's registration id.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Receives the next message, or `None` once the subscription is removed.
    pub async fn recv(&mut self) -> Option<TopicMessage> {
        self.receiver.recv().await
    }
}

impl Drop for TopicSubscription {
    fn drop(&mut self) {
        self.core.remove_subscriber(self.id);
    }
}

impl fmt::Debug for TopicSubscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TopicSubscription")
            .field("id", &self.id)
            .field("topic", &self.core.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::GridCluster;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn test_topic(name: &str) -> GridTopic {
        GridCluster::new("test").join("node").get_topic(name)
    }

    #[tokio::test]
    async fn test_subscription_receives_in_publish_order() {
        let topic = test_topic("t");
        let mut subscription = topic.subscribe();

        topic.publish("first".into());
        topic.publish("second".into());
        topic.publish("third".into());

        assert_eq!(subscription.recv().await.unwrap().message, GridValue::from("first"));
        assert_eq!(subscription.recv().await.unwrap().message, GridValue::from("second"));
        assert_eq!(subscription.recv().await.unwrap().message, GridValue::from("third"));
    }

    #[tokio::test]
    async fn test_all_subscribers_receive_each_message() {
        let topic = test_topic("t");
        let mut first = topic.subscribe();
        let mut second = topic.subscribe();

        topic.publish("m".into());

        assert_eq!(first.recv().await.unwrap().message, GridValue::from("m"));
        assert_eq!(second.recv().await.unwrap().message, GridValue::from("m"));
    }

    #[tokio::test]
    async fn test_message_listener_handler_runs() {
        let topic = test_topic("t");
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = Arc::clone(&count);
        topic.add_message_listener(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        topic.publish(1.into());
        topic.publish(2.into());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_remove_message_listener_stops_delivery() {
        let topic = test_topic("t");
        let count = Arc::new(AtomicU32::new(0));
        let count_clone = Arc::clone(&count);
        let id = topic.add_message_listener(move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        assert!(topic.remove_message_listener(id));
        topic.publish(1.into());

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(count.load(Ordering::SeqCst), 0);
        assert_eq!(topic.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_dropped_subscription_deregisters() {
        let topic = test_topic("t");
        {
            let _subscription = topic.subscribe();
            assert_eq!(topic.subscriber_count(), 1);
        }
        assert_eq!(topic.subscriber_count(), 0);
    }

    #[test]
    fn test_topic_message_payload() {
        let message = TopicMessage::new("hello".into(), None);
        assert_eq!(message.payload(), &GridValue::from("hello"));
        assert!(message.publish_time > 0);
        assert_eq!(message.into_payload(), GridValue::from("hello"));
    }

    #[test]
    fn test_grid_topic_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<GridTopic>();
        assert_send_sync::<TopicMessage>();
    }
}
