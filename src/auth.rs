//! Accounts and sessions
//!
//! In-memory user registry and session-token table. Passwords are stored
//! as SHA-256 digests; session tokens are random UUIDs handed back at
//! login and revoked at logout.

use crate::error::AgroError;
use crate::Result;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug, Clone)]
struct UserRecord {
    password_hash: String,
    farm_name: String,
}

pub struct AuthStore {
    users: Arc<RwLock<HashMap<String, UserRecord>>>,
    sessions: Arc<RwLock<HashMap<String, String>>>, // token → username
}

fn hash_password(password: &str) -> String {
    use sha2::{Digest, Sha256};

    hex::encode(Sha256::digest(password.as_bytes()))
}

/// Usernames are compared case-insensitively and without surrounding
/// whitespace
fn canonical_username(username: &str) -> String {
    username.trim().to_lowercase()
}

impl AuthStore {
    pub fn new() -> Self {
        Self {
            users: Arc::new(RwLock::new(HashMap::new())),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create an account. Rejects blank credentials and duplicate usernames.
    pub async fn register(&self, username: &str, password: &str, farm_name: &str) -> Result<()> {
        let username = canonical_username(username);
        let password = password.trim();

        if username.is_empty() || password.is_empty() {
            return Err(AgroError::InvalidRequest(
                "Username & password are required.".to_string(),
            ));
        }

        let mut users = self.users.write().await;
        if users.contains_key(&username) {
            return Err(AgroError::AuthError(
                "That username already exists.".to_string(),
            ));
        }

        users.insert(
            username,
            UserRecord {
                password_hash: hash_password(password),
                farm_name: farm_name.trim().to_string(),
            },
        );

        Ok(())
    }

    /// Verify credentials and issue a session token
    pub async fn login(&self, username: &str, password: &str) -> Result<String> {
        let username = canonical_username(username);

        let users = self.users.read().await;
        let valid = users
            .get(&username)
            .map(|record| record.password_hash == hash_password(password.trim()))
            .unwrap_or(false);

        if !valid {
            return Err(AgroError::AuthError(
                "Invalid credentials, try again.".to_string(),
            ));
        }
        drop(users);

        let token = Uuid::new_v4().to_string();
        self.sessions
            .write()
            .await
            .insert(token.clone(), username);

        Ok(token)
    }

    /// Revoke a session token; unknown tokens are a no-op
    pub async fn logout(&self, token: &str) {
        self.sessions.write().await.remove(token);
    }

    /// Resolve a session token to its username
    pub async fn resolve(&self, token: &str) -> Option<String> {
        self.sessions.read().await.get(token).cloned()
    }

    /// Farm name recorded at registration
    pub async fn farm_name(&self, username: &str) -> Option<String> {
        self.users
            .read()
            .await
            .get(&canonical_username(username))
            .map(|record| record.farm_name.clone())
    }
}

impl Default for AuthStore {
    fn default() -> Self {
        Self::new()
    }
}
