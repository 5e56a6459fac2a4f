//! Process-local fan-out of freshly created notifications to the user's open
//! event streams. State lives in this process only; running several backend
//! instances needs a shared pub/sub channel instead.

use std::{
    collections::HashMap,
    sync::{
        Arc, RwLock,
        atomic::{AtomicU64, Ordering},
    },
};

use crates::domain::entities::notifications::NotificationEntity;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

const CLIENT_BUFFER: usize = 32;

type Clients = HashMap<Uuid, HashMap<u64, mpsc::Sender<NotificationEntity>>>;

#[derive(Default)]
pub struct NotificationRegistry {
    clients: RwLock<Clients>,
    next_client_id: AtomicU64,
}

impl NotificationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a stream for `user_id`. The client is removed when the
    /// returned subscription is dropped.
    pub fn subscribe(self: &Arc<Self>, user_id: Uuid) -> NotificationSubscription {
        let client_id = self.next_client_id.fetch_add(1, Ordering::Relaxed);
        let (sender, receiver) = mpsc::channel(CLIENT_BUFFER);

        self.clients
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .entry(user_id)
            .or_default()
            .insert(client_id, sender);

        debug!(%user_id, client_id, "realtime: client connected");

        NotificationSubscription {
            registry: Arc::clone(self),
            user_id,
            client_id,
            receiver,
        }
    }

    /// Pushes to every live stream of `user_id`; returns how many accepted it.
    /// A full client buffer drops the notification for that client only.
    pub fn publish(&self, user_id: Uuid, notification: &NotificationEntity) -> usize {
        let clients = self
            .clients
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let Some(senders) = clients.get(&user_id) else {
            return 0;
        };

        senders
            .values()
            .filter(|sender| sender.try_send(notification.clone()).is_ok())
            .count()
    }

    pub fn connection_count(&self, user_id: Uuid) -> usize {
        self.clients
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(&user_id)
            .map_or(0, HashMap::len)
    }

    fn remove(&self, user_id: Uuid, client_id: u64) {
        let mut clients = self
            .clients
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(senders) = clients.get_mut(&user_id) {
            senders.remove(&client_id);
            if senders.is_empty() {
                clients.remove(&user_id);
            }
        }

        debug!(%user_id, client_id, "realtime: client disconnected");
    }
}

pub struct NotificationSubscription {
    registry: Arc<NotificationRegistry>,
    user_id: Uuid,
    client_id: u64,
    receiver: mpsc::Receiver<NotificationEntity>,
}

impl NotificationSubscription {
    pub async fn recv(&mut self) -> Option<NotificationEntity> {
        self.receiver.recv().await
    }
}

impl Drop for NotificationSubscription {
    fn drop(&mut self) {
        self.registry.remove(self.user_id, self.client_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn notification(user_id: Uuid) -> NotificationEntity {
        NotificationEntity {
            id: Uuid::new_v4(),
            user_id,
            type_: "superlike".to_string(),
            actor_id: Some(Uuid::new_v4()),
            payload: json!({ "super": true }),
            read_at: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn publishes_to_every_stream_of_the_target_only() {
        let registry = Arc::new(NotificationRegistry::new());
        let target = Uuid::new_v4();
        let other = Uuid::new_v4();

        let mut first = registry.subscribe(target);
        let mut second = registry.subscribe(target);
        let _unrelated = registry.subscribe(other);

        let sent = notification(target);
        assert_eq!(registry.publish(target, &sent), 2);
        assert_eq!(first.recv().await, Some(sent.clone()));
        assert_eq!(second.recv().await, Some(sent));
    }

    #[tokio::test]
    async fn dropping_a_subscription_unregisters_it() {
        let registry = Arc::new(NotificationRegistry::new());
        let user_id = Uuid::new_v4();

        let subscription = registry.subscribe(user_id);
        assert_eq!(registry.connection_count(user_id), 1);

        drop(subscription);
        assert_eq!(registry.connection_count(user_id), 0);
        assert_eq!(registry.publish(user_id, &notification(user_id)), 0);
    }
}
