//! Registration store.
//!
//! Holds the known client identities. The admission path only ever asks
//! whether a `user_id` exists; registration inserts a new identity if and only
//! if it is absent. Clients are immutable once stored and never deleted.
//!
//! Two implementations are provided:
//! - [`SqliteClientRegistry`]: shared by every worker and every process that
//!   opens the same database file
//! - [`MemoryClientRegistry`]: process-local, for tests and single-process runs

mod memory;
mod sqlite;

use async_trait::async_trait;

use crate::error_handling::{DatabaseError, RegistrationError};

pub use memory::MemoryClientRegistry;
pub use sqlite::SqliteClientRegistry;

/// A registered client identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Client {
    pub user_id: String,
    pub username: String,
}

impl Client {
    /// Validates raw registration fields.
    ///
    /// Absent and empty fields are both treated as missing.
    pub fn new(
        user_id: Option<&str>,
        username: Option<&str>,
    ) -> Result<Self, RegistrationError> {
        match (user_id, username) {
            (Some(user_id), Some(username)) if !user_id.is_empty() && !username.is_empty() => {
                Ok(Client {
                    user_id: user_id.to_string(),
                    username: username.to_string(),
                })
            }
            _ => Err(RegistrationError::BadRequest),
        }
    }
}

/// Existence-check store of client identities.
///
/// `insert` must be atomic with respect to concurrent inserts of the same
/// `user_id`: exactly one caller observes `true`.
#[async_trait]
pub trait ClientRegistry: Send + Sync {
    /// Returns whether `user_id` is registered.
    async fn exists(&self, user_id: &str) -> Result<bool, DatabaseError>;

    /// Stores `client` if its `user_id` is absent.
    ///
    /// Returns `false` (and leaves the stored client untouched) when the
    /// `user_id` is already present.
    async fn insert(&self, client: &Client) -> Result<bool, DatabaseError>;

    /// Returns the username stored for `user_id`.
    async fn username(&self, user_id: &str) -> Result<Option<String>, DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_new_valid() {
        let client = Client::new(Some("u1"), Some("alice")).unwrap();
        assert_eq!(client.user_id, "u1");
        assert_eq!(client.username, "alice");
    }

    #[test]
    fn test_client_new_missing_fields() {
        assert!(matches!(
            Client::new(None, Some("alice")),
            Err(RegistrationError::BadRequest)
        ));
        assert!(matches!(
            Client::new(Some("u1"), None),
            Err(RegistrationError::BadRequest)
        ));
        assert!(matches!(
            Client::new(Some(""), Some("alice")),
            Err(RegistrationError::BadRequest)
        ));
        assert!(matches!(
            Client::new(Some("u1"), Some("")),
            Err(RegistrationError::BadRequest)
        ));
    }
}
