// vts-client/src/auth.rs
//! Session bootstrap against a redirect-based identity provider.
//!
//! A login generates a fresh secp256k1 session key and sends the user agent
//! to the identity provider with the key's public half and a signed state
//! token. The provider calls back with that state and a delegation chain from
//! the user's key to the session key. Once a [`DelegationVerifier`] accepts
//! the chain, the resulting [`StoredIdentity`] is persisted in an
//! [`IdentityStore`] and reused until it expires.
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use candid::Principal;
use chrono::{DateTime, TimeZone, Utc};
use common::models::identity::{DelegationChain, DelegationLink, StoredIdentity};
use common::Config;
use dashmap::DashMap;
use ic_agent::identity::{DelegatedIdentity, Delegation, Secp256k1Identity, SignedDelegation};
use ic_agent::Identity;
use k256::ecdsa::signature::Verifier;
use k256::ecdsa::{Signature as EcdsaSignature, VerifyingKey};
use k256::pkcs8::DecodePublicKey;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use url::Url;
use uuid::Uuid;

use crate::error::AuthError;

/// Client-side storage for session identities, keyed by an opaque session key
#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn load(&self, key: &str) -> Result<Option<StoredIdentity>, AuthError>;
    async fn save(&self, key: &str, identity: &StoredIdentity) -> Result<(), AuthError>;
}

#[derive(Default)]
pub struct MemoryIdentityStore {
    identities: DashMap<String, StoredIdentity>,
}

impl MemoryIdentityStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdentityStore for MemoryIdentityStore {
    async fn load(&self, key: &str) -> Result<Option<StoredIdentity>, AuthError> {
        Ok(self.identities.get(key).map(|entry| entry.value().clone()))
    }

    async fn save(&self, key: &str, identity: &StoredIdentity) -> Result<(), AuthError> {
        self.identities.insert(key.to_string(), identity.clone());
        Ok(())
    }
}

/// One JSON file per session key under `dir`
pub struct FileIdentityStore {
    dir: PathBuf,
}

impl FileIdentityStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        // Keys are caller supplied; hex keeps them path safe
        self.dir.join(format!("{}.json", hex::encode(key.as_bytes())))
    }
}

#[async_trait]
impl IdentityStore for FileIdentityStore {
    async fn load(&self, key: &str) -> Result<Option<StoredIdentity>, AuthError> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, key: &str, identity: &StoredIdentity) -> Result<(), AuthError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(identity)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// Hands the authorization URL to the user agent
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn redirect(&self, authorize_url: &Url) -> Result<(), AuthError>;
}

/// Principal a provider vouched for and when its delegation lapses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedDelegation {
    pub principal: Principal,
    pub expires_at: DateTime<Utc>,
}

/// Checks the delegation chain returned for a login before it is trusted
pub trait DelegationVerifier: Send + Sync {
    fn verify(
        &self,
        chain: &DelegationChain,
        session_public_key: &[u8],
        now: DateTime<Utc>,
    ) -> Result<VerifiedDelegation, AuthError>;
}

/// Verifies the signature of every link with the key before it.
///
/// Signers must be secp256k1 keys. Chains rooted in canister signatures need
/// a verifier that checks them against the replica's certified state.
#[derive(Debug, Default, Clone, Copy)]
pub struct Secp256k1ChainVerifier;

impl DelegationVerifier for Secp256k1ChainVerifier {
    fn verify(
        &self,
        chain: &DelegationChain,
        session_public_key: &[u8],
        now: DateTime<Utc>,
    ) -> Result<VerifiedDelegation, AuthError> {
        let user_key = hex_field("user_public_key", &chain.user_public_key)?;
        let mut signer = user_key.clone();
        let mut expires_at: Option<DateTime<Utc>> = None;

        for (i, link) in chain.delegations.iter().enumerate() {
            let delegation = to_delegation(link)?;
            let signature = hex_field("signature", &link.signature)?;
            verify_secp256k1(&signer, &delegation.signable(), &signature)
                .map_err(|e| AuthError::Delegation(format!("link {}: {}", i, e)))?;

            let lapses = Utc.timestamp_nanos(i64::try_from(delegation.expiration).unwrap_or(i64::MAX));
            if lapses <= now {
                return Err(AuthError::Delegation(format!("link {} expired at {}", i, lapses)));
            }
            expires_at = Some(expires_at.map_or(lapses, |t| t.min(lapses)));
            signer = delegation.pubkey;
        }

        let expires_at = expires_at.ok_or_else(|| AuthError::Delegation("empty delegation chain".to_string()))?;
        if signer != session_public_key {
            return Err(AuthError::Delegation("chain does not end at the session key".to_string()));
        }

        Ok(VerifiedDelegation {
            principal: Principal::self_authenticating(&user_key),
            expires_at,
        })
    }
}

fn hex_field(name: &str, value: &str) -> Result<Vec<u8>, AuthError> {
    hex::decode(value).map_err(|e| AuthError::Delegation(format!("{} is not hex: {}", name, e)))
}

fn verify_secp256k1(public_key_der: &[u8], message: &[u8], signature: &[u8]) -> Result<(), String> {
    let key = VerifyingKey::from_public_key_der(public_key_der)
        .map_err(|e| format!("signer is not a secp256k1 key: {}", e))?;
    let signature = EcdsaSignature::from_slice(signature).map_err(|e| e.to_string())?;
    key.verify(message, &signature).map_err(|e| e.to_string())
}

fn to_delegation(link: &DelegationLink) -> Result<Delegation, AuthError> {
    let targets = link
        .targets
        .as_ref()
        .map(|targets| {
            targets
                .iter()
                .map(|t| Principal::from_text(t).map_err(|e| AuthError::Delegation(format!("target {}: {}", t, e))))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()?;

    Ok(Delegation {
        pubkey: hex_field("pubkey", &link.pubkey)?,
        expiration: link.expiration,
        targets,
    })
}

/// Sign a one-link chain that lets `session_public_key` act for `from` until
/// `expiration` (nanoseconds since the epoch)
pub fn delegate(from: &dyn Identity, session_public_key: &[u8], expiration: u64) -> Result<DelegationChain, AuthError> {
    let delegation = Delegation {
        pubkey: session_public_key.to_vec(),
        expiration,
        targets: None,
    };
    let signature = from
        .sign_delegation(&delegation)
        .map_err(AuthError::InvalidKey)?
        .signature
        .ok_or_else(|| AuthError::InvalidKey("identity produced no signature".to_string()))?;
    let user_public_key = from
        .public_key()
        .ok_or_else(|| AuthError::InvalidKey("identity has no public key".to_string()))?;

    Ok(DelegationChain {
        user_public_key: hex::encode(user_public_key),
        delegations: vec![DelegationLink {
            pubkey: hex::encode(session_public_key),
            expiration,
            targets: None,
            signature: hex::encode(signature),
        }],
    })
}

// Claims of the signed `state` parameter round-tripped through the provider
#[derive(Debug, Serialize, Deserialize)]
struct LoginStateClaims {
    sub: String,
    nonce: String,
    exp: usize,
    iat: usize,
}

struct PendingEntry {
    key: String,
    return_to: String,
    state: String,
    redirect_url: Url,
    public_key: Vec<u8>,
    secret_key: String,
    created_at: DateTime<Utc>,
    waiter: Option<oneshot::Sender<StoredIdentity>>,
}

/// A login waiting for the provider callback
#[derive(Debug, Clone)]
pub struct PendingLogin {
    pub state: String,
    pub redirect_url: Url,
    nonce: String,
}

#[derive(Debug, Clone)]
pub struct CompletedLogin {
    pub key: String,
    pub return_to: String,
    pub identity: StoredIdentity,
}

#[derive(Debug, Clone)]
pub struct BootstrapSettings {
    pub identity_provider: Url,
    pub callback_url: String,
    pub state_secret: String,
    pub login_timeout: Duration,
    pub identity_ttl_secs: i64,
    pub max_pending_logins: usize,
}

impl BootstrapSettings {
    pub fn from_config(config: &Config) -> Result<Self, AuthError> {
        let identity_provider = Url::parse(&config.identity_provider_endpoint)
            .map_err(|e| AuthError::Provider(format!("invalid identity provider endpoint: {}", e)))?;

        Ok(Self {
            identity_provider,
            callback_url: config.callback_url(),
            state_secret: config.auth.state_secret.clone(),
            login_timeout: Duration::from_secs(config.auth.login_timeout_secs),
            identity_ttl_secs: config.auth.identity_ttl_secs,
            max_pending_logins: config.auth.max_pending_logins,
        })
    }
}

pub struct SessionBootstrap<S> {
    store: S,
    settings: BootstrapSettings,
    verifier: Box<dyn DelegationVerifier>,
    // Pending logins by nonce, and the nonce of each session key's login
    pending: DashMap<String, PendingEntry>,
    by_key: DashMap<String, String>,
}

impl<S: IdentityStore> SessionBootstrap<S> {
    pub fn new(store: S, settings: BootstrapSettings) -> Self {
        Self {
            store,
            settings,
            verifier: Box::new(Secp256k1ChainVerifier),
            pending: DashMap::new(),
            by_key: DashMap::new(),
        }
    }

    pub fn with_verifier(mut self, verifier: impl DelegationVerifier + 'static) -> Self {
        self.verifier = Box::new(verifier);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn login_timeout(&self) -> Duration {
        self.settings.login_timeout
    }

    /// Number of logins still waiting for a callback
    pub fn pending_logins(&self) -> usize {
        self.pending.len()
    }

    /// Stored identity for `key` if it is still valid
    pub async fn current(&self, key: &str) -> Result<Option<StoredIdentity>, AuthError> {
        match self.store.load(key).await? {
            Some(identity) if identity.is_valid() => Ok(Some(identity)),
            Some(identity) => {
                tracing::debug!("Stored identity {} expired at {}", identity.principal, identity.expires_at);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    /// Start a login for `key`; the caller sends the user agent to `redirect_url`.
    ///
    /// A key with a login already in flight gets that login back, so repeated
    /// requests from one session never stack up logins.
    pub fn begin_login(&self, key: &str, return_to: &str) -> Result<PendingLogin, AuthError> {
        self.purge_expired();

        if let Some(login) = self.pending_for(key) {
            tracing::debug!("Reusing login {} already in flight", login.nonce);
            return Ok(login);
        }
        if self.pending.len() >= self.settings.max_pending_logins {
            tracing::warn!("Refusing new login: {} logins pending", self.pending.len());
            return Err(AuthError::Busy);
        }

        let secret_key = k256::SecretKey::random(&mut rand::thread_rng());
        let session = Secp256k1Identity::from_private_key(secret_key.clone());
        let public_key = session
            .public_key()
            .ok_or_else(|| AuthError::InvalidKey("session key has no public key".to_string()))?;

        let nonce = Uuid::new_v4().to_string();
        let now = Utc::now().timestamp() as usize;
        let claims = LoginStateClaims {
            sub: key.to_string(),
            nonce: nonce.clone(),
            iat: now,
            exp: now + self.settings.login_timeout.as_secs() as usize,
        };
        let state = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.settings.state_secret.as_bytes()),
        )?;

        // Delegation lifetime is expressed in nanoseconds
        let max_time_to_live = self.settings.identity_ttl_secs.max(0) as u128 * 1_000_000_000;
        let mut redirect_url = self.settings.identity_provider.clone();
        redirect_url
            .query_pairs_mut()
            .append_pair("session_public_key", &hex::encode(&public_key))
            .append_pair("max_time_to_live", &max_time_to_live.to_string())
            .append_pair("redirect_uri", &self.settings.callback_url)
            .append_pair("state", &state);

        self.pending.insert(
            nonce.clone(),
            PendingEntry {
                key: key.to_string(),
                return_to: return_to.to_string(),
                state: state.clone(),
                redirect_url: redirect_url.clone(),
                public_key,
                secret_key: hex::encode(secret_key.to_bytes()),
                created_at: Utc::now(),
                waiter: None,
            },
        );
        self.by_key.insert(key.to_string(), nonce.clone());

        tracing::info!("Started login {}", nonce);

        Ok(PendingLogin {
            state,
            redirect_url,
            nonce,
        })
    }

    /// Provider callback for the session `key`: check `state`, verify the
    /// provider's `chain` against the login's session key, then claim the
    /// login and persist its identity
    pub async fn complete_login(
        &self,
        key: &str,
        state: &str,
        chain: &DelegationChain,
    ) -> Result<CompletedLogin, AuthError> {
        let token = decode::<LoginStateClaims>(
            state,
            &DecodingKey::from_secret(self.settings.state_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;
        let nonce = token.claims.nonce;
        if token.claims.sub != key {
            tracing::warn!("Login {} presented by a different session", nonce);
            return Err(AuthError::UnknownLogin);
        }

        // A rejected callback leaves the login in place for the genuine one
        let verified = {
            let entry = self.pending.get(&nonce).ok_or(AuthError::UnknownLogin)?;
            if entry.key != key {
                return Err(AuthError::UnknownLogin);
            }
            self.verifier.verify(chain, &entry.public_key, Utc::now())?
        };

        // Removing the entry makes every state single use
        let (_, entry) = self.pending.remove(&nonce).ok_or(AuthError::UnknownLogin)?;
        self.by_key.remove_if(&entry.key, |_, n| *n == nonce);

        let now = Utc::now();
        let identity = StoredIdentity {
            principal: verified.principal.to_text(),
            secret_key: entry.secret_key,
            created_at: now,
            expires_at: std::cmp::min(
                now + chrono::Duration::seconds(self.settings.identity_ttl_secs),
                verified.expires_at,
            ),
            delegation: Some(chain.clone()),
        };
        self.store.save(&entry.key, &identity).await?;

        if let Some(waiter) = entry.waiter {
            let _ = waiter.send(identity.clone());
        }

        tracing::info!("Login completed for {}", identity.principal);

        Ok(CompletedLogin {
            key: entry.key,
            return_to: entry.return_to,
            identity,
        })
    }

    /// Return the stored identity for `key`, or log in through `provider`.
    ///
    /// Suspends until the provider callback reaches [`Self::complete_login`],
    /// the login timeout elapses, or `cancel` changes. A valid stored identity
    /// is returned without contacting the provider.
    pub async fn ensure_session<P>(
        &self,
        key: &str,
        provider: &P,
        mut cancel: watch::Receiver<()>,
    ) -> Result<StoredIdentity, AuthError>
    where
        P: IdentityProvider + ?Sized,
    {
        if let Some(identity) = self.current(key).await? {
            tracing::debug!("Reusing stored identity {}", identity.principal);
            return Ok(identity);
        }

        let login = self.begin_login(key, "/")?;
        let (tx, rx) = oneshot::channel();
        if let Some(mut entry) = self.pending.get_mut(&login.nonce) {
            entry.waiter = Some(tx);
        }

        if let Err(e) = provider.redirect(&login.redirect_url).await {
            self.forget(&login.nonce);
            return Err(e);
        }

        let timeout = self.settings.login_timeout;
        let outcome = tokio::select! {
            identity = rx => identity.map_err(|_| AuthError::UnknownLogin),
            _ = tokio::time::sleep(timeout) => Err(AuthError::Timeout(timeout)),
            Ok(()) = cancel.changed() => Err(AuthError::Cancelled),
        };

        if let Err(e) = &outcome {
            self.forget(&login.nonce);
            tracing::warn!("Login {} did not complete: {}", login.nonce, e);
        }
        outcome
    }

    fn pending_for(&self, key: &str) -> Option<PendingLogin> {
        let nonce = self.by_key.get(key)?.value().clone();
        let entry = self.pending.get(&nonce)?;
        Some(PendingLogin {
            state: entry.state.clone(),
            redirect_url: entry.redirect_url.clone(),
            nonce,
        })
    }

    fn forget(&self, nonce: &str) {
        if let Some((_, entry)) = self.pending.remove(nonce) {
            self.by_key.remove_if(&entry.key, |_, n| n == nonce);
        }
    }

    // Drop logins whose state token can no longer validate
    fn purge_expired(&self) {
        let timeout = chrono::Duration::from_std(self.settings.login_timeout)
            .unwrap_or_else(|_| chrono::Duration::days(1));
        let cutoff = Utc::now() - timeout;
        self.pending.retain(|_, entry| entry.created_at > cutoff);
        self.by_key.retain(|_, nonce| self.pending.contains_key(nonce.as_str()));
    }
}

/// Signing identity for a stored session: the session key acting for the
/// delegating user, or the bare session key when there is no delegation
pub fn session_identity(identity: &StoredIdentity) -> Result<Box<dyn Identity>, AuthError> {
    let bytes = hex::decode(&identity.secret_key).map_err(|e| AuthError::InvalidKey(e.to_string()))?;
    let secret_key = k256::SecretKey::from_slice(&bytes).map_err(|e| AuthError::InvalidKey(e.to_string()))?;
    let session = Secp256k1Identity::from_private_key(secret_key);

    let Some(chain) = &identity.delegation else {
        return Ok(Box::new(session));
    };

    let user_key = hex_field("user_public_key", &chain.user_public_key)?;
    let links = chain
        .delegations
        .iter()
        .map(|link| {
            Ok(SignedDelegation {
                delegation: to_delegation(link)?,
                signature: hex_field("signature", &link.signature)?,
            })
        })
        .collect::<Result<Vec<_>, AuthError>>()?;

    Ok(Box::new(DelegatedIdentity::new(user_key, Box::new(session), links)))
}
