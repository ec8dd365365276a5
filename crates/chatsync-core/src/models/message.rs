use serde::Deserialize;
use serde_json::Value;

use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq)]
pub enum MessagePayload {
    Text(String),
    Image {
        url: String,
        width: Option<f64>,
        height: Option<f64>,
    },
    Video {
        url: String,
        /// Poster frame, stored in the record's `imageUrl`
        thumbnail_url: Option<String>,
        width: Option<f64>,
        height: Option<f64>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    /// Seconds on the sender's clock
    pub timestamp: i64,
    pub payload: MessagePayload,
}

/// Wire shape of `messages/<id>`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MessageRecord {
    from_id: String,
    to_id: String,
    timestamp: i64,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
    #[serde(default)]
    image_width: Option<f64>,
    #[serde(default)]
    image_height: Option<f64>,
    #[serde(default)]
    video_url: Option<String>,
}

impl Message {
    /// Decode a `messages/<id>` record.
    ///
    /// Missing or mistyped `fromId`, `toId` or `timestamp` is a `DecodeError`,
    /// as is a record carrying none of `text`, `imageUrl` and `videoUrl`.
    /// A `videoUrl` wins over `imageUrl`, which wins over `text`.
    pub fn from_value(id: &str, raw: &Value) -> Result<Self, DecodeError> {
        if !raw.is_object() {
            return Err(DecodeError::NotAnObject {
                entity: "message",
                id: id.to_string(),
            });
        }

        let record: MessageRecord =
            serde_json::from_value(raw.clone()).map_err(|source| DecodeError::Schema {
                entity: "message",
                id: id.to_string(),
                source,
            })?;

        for (field, value) in [("fromId", &record.from_id), ("toId", &record.to_id)] {
            if value.is_empty() {
                return Err(DecodeError::EmptyField {
                    entity: "message",
                    id: id.to_string(),
                    field,
                });
            }
        }

        let payload = match (record.video_url, record.image_url, record.text) {
            (Some(url), thumbnail_url, _) => MessagePayload::Video {
                url,
                thumbnail_url,
                width: record.image_width,
                height: record.image_height,
            },
            (None, Some(url), _) => MessagePayload::Image {
                url,
                width: record.image_width,
                height: record.image_height,
            },
            (None, None, Some(text)) => MessagePayload::Text(text),
            (None, None, None) => {
                return Err(DecodeError::MissingPayload { id: id.to_string() })
            }
        };

        Ok(Message {
            id: id.to_string(),
            from_id: record.from_id,
            to_id: record.to_id,
            timestamp: record.timestamp,
            payload,
        })
    }

    /// The other participant from `current_user_id`'s point of view.
    pub fn chat_partner_id(&self, current_user_id: &str) -> &str {
        if self.from_id == current_user_id {
            &self.to_id
        } else {
            &self.from_id
        }
    }

    /// One-line summary for a conversation row.
    pub fn preview_text(&self) -> &str {
        match &self.payload {
            MessagePayload::Text(text) => text,
            MessagePayload::Image { .. } => "[Image]",
            MessagePayload::Video { .. } => "[Video]",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_text_message() {
        let raw = json!({"fromId": "alice", "toId": "bob", "timestamp": 1496000000, "text": "hi"});
        let message = Message::from_value("m1", &raw).unwrap();
        assert_eq!(message.id, "m1");
        assert_eq!(message.from_id, "alice");
        assert_eq!(message.to_id, "bob");
        assert_eq!(message.timestamp, 1496000000);
        assert_eq!(message.payload, MessagePayload::Text("hi".to_string()));
        assert_eq!(message.preview_text(), "hi");
    }

    #[test]
    fn test_video_takes_precedence_and_keeps_thumbnail() {
        let raw = json!({
            "fromId": "alice",
            "toId": "bob",
            "timestamp": 5,
            "imageUrl": "https://cdn/thumb.jpg",
            "imageWidth": 320.0,
            "imageHeight": 240.0,
            "videoUrl": "https://cdn/clip.mov"
        });
        let message = Message::from_value("m2", &raw).unwrap();
        assert_eq!(
            message.payload,
            MessagePayload::Video {
                url: "https://cdn/clip.mov".to_string(),
                thumbnail_url: Some("https://cdn/thumb.jpg".to_string()),
                width: Some(320.0),
                height: Some(240.0),
            }
        );
        assert_eq!(message.preview_text(), "[Video]");
    }

    #[test]
    fn test_image_message() {
        let raw = json!({"fromId": "a", "toId": "b", "timestamp": 1, "imageUrl": "https://cdn/x.png"});
        let message = Message::from_value("m3", &raw).unwrap();
        assert!(matches!(message.payload, MessagePayload::Image { ref url, width: None, height: None } if url == "https://cdn/x.png"));
    }

    #[test]
    fn test_missing_timestamp_is_rejected() {
        let raw = json!({"fromId": "alice", "toId": "bob", "text": "hi"});
        let err = Message::from_value("m4", &raw).unwrap_err();
        assert!(matches!(err, DecodeError::Schema { .. }));
        assert!(err.to_string().contains("timestamp"));
    }

    #[test]
    fn test_mistyped_timestamp_is_rejected() {
        let raw = json!({"fromId": "alice", "toId": "bob", "timestamp": "yesterday", "text": "hi"});
        assert!(matches!(
            Message::from_value("m5", &raw),
            Err(DecodeError::Schema { .. })
        ));
    }

    #[test]
    fn test_non_object_and_empty_ids_are_rejected() {
        assert!(matches!(
            Message::from_value("m6", &Value::Null),
            Err(DecodeError::NotAnObject { .. })
        ));
        let raw = json!({"fromId": "", "toId": "bob", "timestamp": 1, "text": "hi"});
        assert!(matches!(
            Message::from_value("m7", &raw),
            Err(DecodeError::EmptyField { field: "fromId", .. })
        ));
    }

    #[test]
    fn test_record_without_payload_is_rejected() {
        let raw = json!({"fromId": "alice", "toId": "bob", "timestamp": 1});
        assert!(matches!(
            Message::from_value("m8", &raw),
            Err(DecodeError::MissingPayload { .. })
        ));
    }

    #[test]
    fn test_chat_partner_id() {
        let raw = json!({"fromId": "alice", "toId": "bob", "timestamp": 1, "text": "hi"});
        let message = Message::from_value("m9", &raw).unwrap();
        assert_eq!(message.chat_partner_id("alice"), "bob");
        assert_eq!(message.chat_partner_id("bob"), "alice");
    }
}
