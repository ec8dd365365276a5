use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chatsync_core::{MemoryStore, MessagePayload, UserProfile};
use serde::Deserialize;
use tokio::task::JoinHandle;
use tracing::debug;

/// Seed data for `chatsync watch`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Fixture {
    #[serde(default)]
    pub users: Vec<FixtureUser>,
    #[serde(default)]
    pub messages: Vec<FixtureMessage>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureUser {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FixtureMessage {
    pub from: String,
    pub to: String,
    pub timestamp: i64,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub video_url: Option<String>,
    /// Sent this long after watching starts instead of up front
    #[serde(default)]
    pub delay_ms: Option<u64>,
}

impl FixtureUser {
    pub fn to_profile(&self) -> UserProfile {
        UserProfile {
            id: self.id.clone(),
            name: self.name.clone(),
            email: self.email.clone(),
            profile_image_url: self.profile_image_url.clone(),
        }
    }
}

impl FixtureMessage {
    pub fn payload(&self) -> Result<MessagePayload> {
        let payload = match (&self.video_url, &self.image_url, &self.text) {
            (Some(url), thumbnail, _) => MessagePayload::Video {
                url: url.clone(),
                thumbnail_url: thumbnail.clone(),
                width: None,
                height: None,
            },
            (None, Some(url), _) => MessagePayload::Image {
                url: url.clone(),
                width: None,
                height: None,
            },
            (None, None, Some(text)) => MessagePayload::Text(text.clone()),
            (None, None, None) => bail!(
                "message from {} to {} has no text, imageUrl or videoUrl",
                self.from,
                self.to
            ),
        };
        Ok(payload)
    }
}

impl Fixture {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read fixture file: {}", path.display()))?;
        let fixture = Self::from_json(&content)
            .with_context(|| format!("Failed to parse fixture file: {}", path.display()))?;
        Ok(fixture)
    }

    /// Parse and check that every message carries a payload.
    pub fn from_json(json: &str) -> Result<Self> {
        let fixture: Fixture = serde_json::from_str(json)?;
        for message in &fixture.messages {
            message.payload()?;
        }
        Ok(fixture)
    }

    /// Write users and undelayed messages into `store`. Delayed messages are
    /// sent from the returned task.
    pub fn seed(&self, store: &Arc<MemoryStore>) -> Result<JoinHandle<()>> {
        for user in &self.users {
            store.put_user(&user.to_profile());
        }

        let mut delayed = Vec::new();
        for message in &self.messages {
            let payload = message.payload()?;
            match message.delay_ms {
                Some(delay_ms) => delayed.push((delay_ms, message.clone(), payload)),
                None => {
                    store.send_message(&message.from, &message.to, &payload, message.timestamp);
                }
            }
        }
        delayed.sort_by_key(|(delay_ms, _, _)| *delay_ms);
        debug!(
            users = self.users.len(),
            delayed = delayed.len(),
            "seeded fixture"
        );

        let store = store.clone();
        Ok(tokio::spawn(async move {
            let start = tokio::time::Instant::now();
            for (delay_ms, message, payload) in delayed {
                tokio::time::sleep_until(start + Duration::from_millis(delay_ms)).await;
                store.send_message(&message.from, &message.to, &payload, message.timestamp);
            }
        }))
    }
}
