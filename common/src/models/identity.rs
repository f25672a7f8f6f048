// common/src/models/identity.rs
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// One link of a delegation chain. Keys and signature are hex encoded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationLink {
    /// DER public key this link delegates to
    pub pubkey: String,
    /// Nanoseconds since the epoch after which the link is void
    pub expiration: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub targets: Option<Vec<String>>,
    /// Signature of the previous key in the chain over this link
    pub signature: String,
}

/// What the identity provider hands back after a login: `user_public_key`
/// signs the first link and every link signs the next. The last link names
/// the session key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DelegationChain {
    pub user_public_key: String,
    pub delegations: Vec<DelegationLink>,
}

/// Session identity issued through the identity provider and kept in client-side storage
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredIdentity {
    /// Textual principal the provider vouched for
    pub principal: String,
    /// Hex-encoded secp256k1 session key
    pub secret_key: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Chain from the user's key to the session key; absent for a bare session key
    #[serde(default)]
    pub delegation: Option<DelegationChain>,
}

impl StoredIdentity {
    pub fn new(principal: String, secret_key: String, ttl_seconds: i64) -> Self {
        let now = Utc::now();
        Self {
            principal,
            secret_key,
            created_at: now,
            expires_at: now + Duration::seconds(ttl_seconds),
            delegation: None,
        }
    }

    /// Local validity check, never touches the network
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }
}
