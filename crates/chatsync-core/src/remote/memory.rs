//! Process-local realtime store.
//!
//! Holds a path-addressed JSON tree and pushes child-added and value events to
//! subscribers the way the hosted store does. Also plays the auth service.

use std::collections::{HashMap, HashSet};

use futures::channel::mpsc::{self, UnboundedSender};
use futures::StreamExt;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{AuthProvider, ChildEvent, ChildStream, RemoteStore, StorePath, ValueStream};
use crate::error::{AuthError, SubscriptionError};
use crate::models::{MessagePayload, UserProfile};

type ChildSender = UnboundedSender<Result<ChildEvent, SubscriptionError>>;
type ValueSender = UnboundedSender<Result<Value, SubscriptionError>>;

#[derive(Default)]
struct StoreState {
    values: HashMap<StorePath, Value>,
    /// Child keys in insertion order
    children: HashMap<StorePath, Vec<String>>,
    child_watchers: HashMap<StorePath, Vec<ChildSender>>,
    value_watchers: HashMap<StorePath, Vec<ValueSender>>,
    denied: HashSet<StorePath>,
    current_user: Option<String>,
    sign_out_failure: Option<String>,
}

impl StoreState {
    /// Leaf value, or an object assembled from the node's children.
    fn snapshot(&self, path: &StorePath) -> Value {
        if let Some(value) = self.values.get(path) {
            return value.clone();
        }
        let mut object = Map::new();
        for key in self.children.get(path).into_iter().flatten() {
            object.insert(key.clone(), self.snapshot(&path.child(key)));
        }
        Value::Object(object)
    }

    /// Register `path` and any missing ancestors, firing child-added on each
    /// parent that gained a key. Stops at the first ancestor already known.
    fn register_ancestors(&mut self, path: &StorePath) {
        let mut current = path.clone();
        while let Some((parent, key)) = current.split_parent() {
            let key = key.to_string();
            let siblings = self.children.entry(parent.clone()).or_default();
            if siblings.contains(&key) {
                break;
            }
            siblings.push(key.clone());

            let value = self.snapshot(&current);
            self.notify_child(&parent, ChildEvent { key, value });
            current = parent;
        }
    }

    fn notify_child(&mut self, path: &StorePath, event: ChildEvent) {
        if let Some(watchers) = self.child_watchers.get_mut(path) {
            watchers.retain(|tx| tx.unbounded_send(Ok(event.clone())).is_ok());
        }
    }

    fn notify_value(&mut self, path: &StorePath, value: &Value) {
        if let Some(watchers) = self.value_watchers.get_mut(path) {
            watchers.retain(|tx| tx.unbounded_send(Ok(value.clone())).is_ok());
        }
    }

    /// Forget subscribers whose stream has been dropped. Writes only prune
    /// the path they touch, so paths that are never written would otherwise
    /// keep dead senders forever.
    fn prune_closed(&mut self) {
        self.child_watchers.retain(|_, watchers| {
            watchers.retain(|tx| !tx.is_closed());
            !watchers.is_empty()
        });
        self.value_watchers.retain(|_, watchers| {
            watchers.retain(|tx| !tx.is_closed());
            !watchers.is_empty()
        });
    }

    fn check_allowed(&self, path: &StorePath) -> Result<(), SubscriptionError> {
        if self.denied.contains(path) {
            return Err(SubscriptionError::PermissionDenied { path: path.clone() });
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write `value` at `path`, creating ancestors as needed.
    pub fn set_value(&self, path: &StorePath, value: Value) {
        let mut state = self.state.lock();
        state.values.insert(path.clone(), value.clone());
        state.register_ancestors(path);
        state.notify_value(path, &value);
    }

    pub fn value(&self, path: &StorePath) -> Option<Value> {
        let state = self.state.lock();
        let known = state.values.contains_key(path) || state.children.contains_key(path);
        known.then(|| state.snapshot(path))
    }

    /// Write a message record plus both users' fan-out entries, in that order.
    /// Returns the generated message id.
    pub fn send_message(
        &self,
        from_id: &str,
        to_id: &str,
        payload: &MessagePayload,
        timestamp: i64,
    ) -> String {
        let message_id = Uuid::new_v4().simple().to_string();
        self.set_value(
            &StorePath::message(&message_id),
            message_record(from_id, to_id, payload, timestamp),
        );
        self.set_value(
            &StorePath::thread_messages(from_id, to_id).child(&message_id),
            json!(1),
        );
        self.set_value(
            &StorePath::thread_messages(to_id, from_id).child(&message_id),
            json!(1),
        );
        message_id
    }

    pub fn put_user(&self, profile: &UserProfile) {
        let mut record = Map::new();
        record.insert("name".to_string(), json!(profile.name));
        if let Some(email) = &profile.email {
            record.insert("email".to_string(), json!(email));
        }
        if let Some(url) = &profile.profile_image_url {
            record.insert("profileImageUrl".to_string(), json!(url));
        }
        self.set_value(&StorePath::user(&profile.id), Value::Object(record));
    }

    /// Fail every live subscription on `path` with `error`. The streams end.
    pub fn interrupt(&self, path: &StorePath, error: SubscriptionError) {
        let mut state = self.state.lock();
        for tx in state.child_watchers.remove(path).into_iter().flatten() {
            let _ = tx.unbounded_send(Err(error.clone()));
        }
        for tx in state.value_watchers.remove(path).into_iter().flatten() {
            let _ = tx.unbounded_send(Err(error.clone()));
        }
    }

    /// Refuse new subscriptions on `path` until `allow` is called.
    pub fn deny(&self, path: &StorePath) {
        self.state.lock().denied.insert(path.clone());
    }

    pub fn allow(&self, path: &StorePath) {
        self.state.lock().denied.remove(path);
    }

    /// Subscriptions on `path` whose consumer is still alive
    pub fn watcher_count(&self, path: &StorePath) -> usize {
        let state = self.state.lock();
        let children = state
            .child_watchers
            .get(path)
            .map_or(0, |w| w.iter().filter(|tx| !tx.is_closed()).count());
        let values = state
            .value_watchers
            .get(path)
            .map_or(0, |w| w.iter().filter(|tx| !tx.is_closed()).count());
        children + values
    }

    pub fn sign_in(&self, user_id: &str) {
        self.state.lock().current_user = Some(user_id.to_string());
    }

    /// Make the next sign-out attempts fail with `reason`.
    pub fn fail_sign_out(&self, reason: &str) {
        self.state.lock().sign_out_failure = Some(reason.to_string());
    }
}

impl RemoteStore for MemoryStore {
    fn subscribe_child_added(&self, path: &StorePath) -> Result<ChildStream, SubscriptionError> {
        let mut state = self.state.lock();
        state.check_allowed(path)?;
        state.prune_closed();

        let (tx, rx) = mpsc::unbounded();
        for key in state.children.get(path).cloned().unwrap_or_default() {
            let value = state.snapshot(&path.child(&key));
            let _ = tx.unbounded_send(Ok(ChildEvent { key, value }));
        }
        state
            .child_watchers
            .entry(path.clone())
            .or_default()
            .push(tx);
        Ok(rx.boxed())
    }

    fn subscribe_value(&self, path: &StorePath) -> Result<ValueStream, SubscriptionError> {
        let mut state = self.state.lock();
        state.check_allowed(path)?;
        state.prune_closed();

        let (tx, rx) = mpsc::unbounded();
        if let Some(value) = state.values.get(path) {
            let _ = tx.unbounded_send(Ok(value.clone()));
        }
        state
            .value_watchers
            .entry(path.clone())
            .or_default()
            .push(tx);
        Ok(rx.boxed())
    }
}

impl AuthProvider for MemoryStore {
    fn current_user_id(&self) -> Option<String> {
        self.state.lock().current_user.clone()
    }

    fn sign_out(&self) -> Result<(), AuthError> {
        let mut state = self.state.lock();
        if let Some(reason) = &state.sign_out_failure {
            return Err(AuthError::SignOutFailed(reason.clone()));
        }
        state.current_user = None;
        Ok(())
    }
}

fn message_record(from_id: &str, to_id: &str, payload: &MessagePayload, timestamp: i64) -> Value {
    let mut record = Map::new();
    record.insert("fromId".to_string(), json!(from_id));
    record.insert("toId".to_string(), json!(to_id));
    record.insert("timestamp".to_string(), json!(timestamp));

    match payload {
        MessagePayload::Text(text) => {
            record.insert("text".to_string(), json!(text));
        }
        MessagePayload::Image { url, width, height } => {
            record.insert("imageUrl".to_string(), json!(url));
            put_dimensions(&mut record, width, height);
        }
        MessagePayload::Video {
            url,
            thumbnail_url,
            width,
            height,
        } => {
            record.insert("videoUrl".to_string(), json!(url));
            if let Some(thumbnail_url) = thumbnail_url {
                record.insert("imageUrl".to_string(), json!(thumbnail_url));
            }
            put_dimensions(&mut record, width, height);
        }
    }
    Value::Object(record)
}

fn put_dimensions(record: &mut Map<String, Value>, width: &Option<f64>, height: &Option<f64>) {
    if let Some(width) = width {
        record.insert("imageWidth".to_string(), json!(width));
    }
    if let Some(height) = height {
        record.insert("imageHeight".to_string(), json!(height));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Message;

    fn text(body: &str) -> MessagePayload {
        MessagePayload::Text(body.to_string())
    }

    #[tokio::test]
    async fn test_child_added_replays_existing_then_streams_new() {
        let store = MemoryStore::new();
        store.send_message("alice", "bob", &text("hi"), 1);

        let mut threads = store
            .subscribe_child_added(&StorePath::user_threads("alice"))
            .unwrap();
        let first = threads.next().await.unwrap().unwrap();
        assert_eq!(first.key, "bob");
        assert!(first.value.is_object());

        store.send_message("carol", "alice", &text("yo"), 2);
        let second = threads.next().await.unwrap().unwrap();
        assert_eq!(second.key, "carol");
    }

    #[tokio::test]
    async fn test_existing_child_is_not_announced_twice() {
        let store = MemoryStore::new();
        store.send_message("alice", "bob", &text("one"), 1);
        let mut threads = store
            .subscribe_child_added(&StorePath::user_threads("alice"))
            .unwrap();
        assert_eq!(threads.next().await.unwrap().unwrap().key, "bob");

        store.send_message("alice", "bob", &text("two"), 2);
        store.send_message("dave", "alice", &text("three"), 3);
        assert_eq!(threads.next().await.unwrap().unwrap().key, "dave");
    }

    #[tokio::test]
    async fn test_value_subscription_sees_current_and_edits() {
        let store = MemoryStore::new();
        let id = store.send_message("alice", "bob", &text("draft"), 1);
        let path = StorePath::message(&id);

        let mut values = store.subscribe_value(&path).unwrap();
        let current = values.next().await.unwrap().unwrap();
        assert_eq!(Message::from_value(&id, &current).unwrap().preview_text(), "draft");

        store.set_value(
            &path,
            json!({"fromId": "alice", "toId": "bob", "timestamp": 1, "text": "final"}),
        );
        let edited = values.next().await.unwrap().unwrap();
        assert_eq!(Message::from_value(&id, &edited).unwrap().preview_text(), "final");
    }

    #[tokio::test]
    async fn test_send_message_fans_out_to_both_users() {
        let store = MemoryStore::new();
        let id = store.send_message("alice", "bob", &text("hi"), 7);

        let record = store.value(&StorePath::message(&id)).unwrap();
        let message = Message::from_value(&id, &record).unwrap();
        assert_eq!(message.timestamp, 7);

        let alice_side = store.value(&StorePath::thread_messages("alice", "bob")).unwrap();
        let bob_side = store.value(&StorePath::thread_messages("bob", "alice")).unwrap();
        assert!(alice_side.get(&id).is_some());
        assert!(bob_side.get(&id).is_some());
    }

    #[tokio::test]
    async fn test_interrupt_ends_stream_with_error() {
        let store = MemoryStore::new();
        let path = StorePath::user_threads("alice");
        let mut threads = store.subscribe_child_added(&path).unwrap();

        let error = SubscriptionError::Disconnected {
            path: path.clone(),
            reason: "socket closed".to_string(),
        };
        store.interrupt(&path, error.clone());

        assert_eq!(threads.next().await.unwrap().unwrap_err(), error);
        assert!(threads.next().await.is_none());
        assert_eq!(store.watcher_count(&path), 0);
    }

    #[tokio::test]
    async fn test_denied_path_refuses_subscriptions() {
        let store = MemoryStore::new();
        let path = StorePath::message("secret");
        store.deny(&path);
        assert!(matches!(
            store.subscribe_value(&path),
            Err(SubscriptionError::PermissionDenied { .. })
        ));
        store.allow(&path);
        let _values = store.subscribe_value(&path).unwrap();
        assert_eq!(store.watcher_count(&path), 1);
    }

    #[test]
    fn test_sign_out() {
        let store = MemoryStore::new();
        store.sign_in("alice");
        assert_eq!(store.current_user_id().as_deref(), Some("alice"));

        store.fail_sign_out("network unreachable");
        assert_eq!(
            store.sign_out(),
            Err(AuthError::SignOutFailed("network unreachable".to_string()))
        );
        assert_eq!(store.current_user_id().as_deref(), Some("alice"));

        let store = MemoryStore::new();
        store.sign_in("alice");
        store.sign_out().unwrap();
        assert_eq!(store.current_user_id(), None);
    }

    #[test]
    fn test_put_user_round_trips_through_profile_decoder() {
        let store = MemoryStore::new();
        let profile = UserProfile {
            id: "bob".to_string(),
            name: "Bob".to_string(),
            email: None,
            profile_image_url: Some("https://cdn/bob.jpg".to_string()),
        };
        store.put_user(&profile);
        let raw = store.value(&StorePath::user("bob")).unwrap();
        assert_eq!(UserProfile::from_value("bob", &raw).unwrap(), profile);
    }

    #[test]
    fn test_dropped_subscriptions_on_unwritten_paths_are_pruned() {
        let store = MemoryStore::new();
        for n in 0..50 {
            let missing = StorePath::user(&format!("ghost-{}", n));
            drop(store.subscribe_value(&missing).unwrap());
        }
        let live = store.subscribe_value(&StorePath::user("bob")).unwrap();

        let state = store.state.lock();
        assert_eq!(state.value_watchers.len(), 1);
        assert!(state.value_watchers.contains_key(&StorePath::user("bob")));
        drop(state);
        drop(live);
    }
}
