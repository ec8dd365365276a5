use serde::Deserialize;
use serde_json::Value;

use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserProfile {
    pub id: String,
    pub name: String,
    pub email: Option<String>,
    pub profile_image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UserRecord {
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    profile_image_url: Option<String>,
}

impl UserProfile {
    /// Decode a `users/<id>` record. The id comes from the record's key.
    pub fn from_value(id: &str, raw: &Value) -> Result<Self, DecodeError> {
        if !raw.is_object() {
            return Err(DecodeError::NotAnObject {
                entity: "user",
                id: id.to_string(),
            });
        }
        let record: UserRecord =
            serde_json::from_value(raw.clone()).map_err(|source| DecodeError::Schema {
                entity: "user",
                id: id.to_string(),
                source,
            })?;

        Ok(UserProfile {
            id: id.to_string(),
            name: record.name,
            email: record.email,
            profile_image_url: record.profile_image_url,
        })
    }

    /// Name to show in a conversation row, falling back to the id
    pub fn display_name(&self) -> &str {
        if self.name.trim().is_empty() {
            &self.id
        } else {
            &self.name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_profile() {
        let raw = json!({
            "name": "Bob",
            "email": "bob@example.com",
            "profileImageUrl": "https://cdn/bob.jpg"
        });
        let profile = UserProfile::from_value("bob", &raw).unwrap();
        assert_eq!(profile.id, "bob");
        assert_eq!(profile.display_name(), "Bob");
        assert_eq!(profile.email.as_deref(), Some("bob@example.com"));
        assert_eq!(
            profile.profile_image_url.as_deref(),
            Some("https://cdn/bob.jpg")
        );
    }

    #[test]
    fn test_missing_name_is_rejected() {
        let raw = json!({"email": "ghost@example.com"});
        assert!(matches!(
            UserProfile::from_value("ghost", &raw),
            Err(DecodeError::Schema { entity: "user", .. })
        ));
    }

    #[test]
    fn test_blank_name_falls_back_to_id() {
        let profile = UserProfile::from_value("carol", &json!({"name": "  "})).unwrap();
        assert_eq!(profile.display_name(), "carol");
    }
}
