pub mod message;
pub mod user;

pub use message::{Message, MessagePayload};
pub use user::UserProfile;
