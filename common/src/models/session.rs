// common/src/models/session.rs
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use chrono::{DateTime, Utc};

use super::identity::StoredIdentity;

/// Browser session tracked by the portal, anonymous until an identity is attached
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSession {
    /// Unique client identifier
    pub client_id: Uuid,
    /// Secure session token used for cookie-based tracking
    pub session_token: String,
    /// Timestamp when the session was created
    pub created_at: DateTime<Utc>,
    /// Timestamp of last client activity
    pub last_active: DateTime<Utc>,
    /// Identity resolved through the identity provider
    pub identity: Option<StoredIdentity>,
}

impl ClientSession {
    /// Create a new anonymous client session
    pub fn new_anonymous(client_id: Uuid, session_token: String) -> Self {
        let now = Utc::now();
        Self {
            client_id,
            session_token,
            created_at: now,
            last_active: now,
            identity: None,
        }
    }

    /// Update session activity timestamp
    pub fn update_activity(&mut self) {
        self.last_active = Utc::now();
    }

    /// Check if the session has expired based on TTL
    pub fn is_expired(&self, ttl_seconds: i64) -> bool {
        let now = Utc::now();
        let age = now.signed_duration_since(self.last_active);
        age.num_seconds() > ttl_seconds
    }

    /// Attach the identity resolved by the login callback
    pub fn attach_identity(&mut self, identity: StoredIdentity) {
        self.identity = Some(identity);
        self.update_activity();
    }

    /// Whether the session carries an identity that is still valid
    pub fn is_authenticated(&self) -> bool {
        self.identity.as_ref().map(StoredIdentity::is_valid).unwrap_or(false)
    }
}

/// Result of session operations
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum SessionResult {
    Success(ClientSession),
    NotFound,
    Expired,
}

/// Public view of a session; never exposes the token or the session key
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSessionResponse {
    pub client_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub is_authenticated: bool,
    pub principal: Option<String>,
}

impl From<&ClientSession> for ClientSessionResponse {
    fn from(session: &ClientSession) -> Self {
        Self {
            client_id: session.client_id,
            created_at: session.created_at,
            is_authenticated: session.is_authenticated(),
            principal: session.identity.as_ref().map(|i| i.principal.clone()),
        }
    }
}
