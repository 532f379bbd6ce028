//! Room and learner registration.
//!
//! Joining a room with a code creates the room on first use. A display name
//! is unique within its room, compared case-insensitively, so joining again
//! under the same name resumes the same learner. Room codes are only ever
//! stored as SHA-256 digests.

use async_trait::async_trait;
use gramtrain_core::model::Learner;
use gramtrain_core::StoreError;
use sha2::{Digest, Sha256};

use crate::error::RosterError;

/// Registration boundary implemented by every store.
#[async_trait]
pub trait Roster: Send + Sync {
    /// Join `room_code` as `display_name`, creating the room or learner as needed.
    async fn register_learner(
        &self,
        room_code: &str,
        display_name: &str,
    ) -> Result<Learner, RosterError>;

    async fn find_learner(&self, user_id: &str) -> Result<Option<Learner>, StoreError>;
}

/// Trim and uppercase a room code, enforcing 4-32 characters.
pub fn normalize_room_code(raw: &str) -> Result<String, RosterError> {
    let code = raw.trim().to_uppercase();
    match code.chars().count() {
        4..=32 => Ok(code),
        _ => Err(RosterError::InvalidRoomCode),
    }
}

/// Trim a display name, enforcing 2-32 characters.
pub fn normalize_display_name(raw: &str) -> Result<String, RosterError> {
    let name = raw.trim().to_string();
    match name.chars().count() {
        2..=32 => Ok(name),
        _ => Err(RosterError::InvalidDisplayName),
    }
}

/// Case-folded form used for uniqueness within a room.
pub fn display_name_key(name: &str) -> String {
    name.to_lowercase()
}

/// SHA-256 hex digest of a normalized room code.
pub fn room_code_hash(code: &str) -> String {
    hex::encode(Sha256::digest(code.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn room_codes_normalize() {
        assert_eq!(normalize_room_code("  abcd ").unwrap(), "ABCD");
        assert!(matches!(
            normalize_room_code("abc"),
            Err(RosterError::InvalidRoomCode)
        ));
        assert!(normalize_room_code(&"x".repeat(33)).is_err());
        assert!(normalize_room_code(&"x".repeat(32)).is_ok());
    }

    #[test]
    fn display_names_normalize() {
        assert_eq!(normalize_display_name(" Ana ").unwrap(), "Ana");
        assert!(matches!(
            normalize_display_name(" a "),
            Err(RosterError::InvalidDisplayName)
        ));
        assert_eq!(display_name_key("ÉMILE"), "émile");
    }

    #[test]
    fn hash_is_stable_hex() {
        let hash = room_code_hash("ABCD");
        assert_eq!(hash.len(), 64);
        assert_eq!(hash, room_code_hash("ABCD"));
        assert_ne!(hash, room_code_hash("ABCE"));
    }
}
