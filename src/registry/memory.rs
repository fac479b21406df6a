//! Process-local registration store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{Client, ClientRegistry};
use crate::error_handling::DatabaseError;

/// In-memory registry keyed by `user_id`.
///
/// Not shared across processes: a client registered here is invisible to
/// any other process.
#[derive(Default)]
pub struct MemoryClientRegistry {
    clients: RwLock<HashMap<String, String>>,
}

impl MemoryClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClientRegistry for MemoryClientRegistry {
    async fn exists(&self, user_id: &str) -> Result<bool, DatabaseError> {
        Ok(self.clients.read().await.contains_key(user_id))
    }

    async fn insert(&self, client: &Client) -> Result<bool, DatabaseError> {
        let mut clients = self.clients.write().await;
        if clients.contains_key(&client.user_id) {
            return Ok(false);
        }
        clients.insert(client.user_id.clone(), client.username.clone());
        Ok(true)
    }

    async fn username(&self, user_id: &str) -> Result<Option<String>, DatabaseError> {
        Ok(self.clients.read().await.get(user_id).cloned())
    }
}
