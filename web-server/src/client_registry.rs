// web-server/src/client_registry.rs
use actix::{Actor, Addr, AsyncContext, Context, Handler, Message, MessageResult};
use async_trait::async_trait;
use chrono::Utc;
use common::models::identity::StoredIdentity;
use common::models::session::{ClientSession, SessionResult};
use dashmap::DashMap;
use serde::Serialize;
use std::time::Duration;
use uuid::Uuid;
use vts_client::{AuthError, IdentityStore};

use crate::utils::token::create_session_token;

// Default session TTL in seconds (24 hours)
const DEFAULT_SESSION_TTL: i64 = 86400;
// Sessions that never resolved an identity go idle much sooner
const ANONYMOUS_SESSION_TTL: i64 = 900;

/// Actor message: Register a new anonymous client
#[derive(Message)]
#[rtype(result = "(Uuid, String)")]
pub struct RegisterAnonymousClient;

/// Actor message: Get a client session by session token
#[derive(Message)]
#[rtype(result = "SessionResult")]
pub struct GetClientSession {
    pub session_token: String,
}

/// Actor message: Bind the identity from a completed login to a session
#[derive(Message)]
#[rtype(result = "SessionResult")]
pub struct AttachIdentity {
    pub session_token: String,
    pub identity: StoredIdentity,
}

/// Actor message: Get session metrics
#[derive(Message)]
#[rtype(result = "SessionMetrics")]
pub struct GetSessionMetrics;

#[derive(Debug, Clone, Default, Serialize)]
pub struct SessionMetrics {
    pub total_sessions: usize,
    pub anonymous_sessions: usize,
    pub authenticated_sessions: usize,
    pub expired_count: usize,
    pub avg_session_age_seconds: f64,
}

/// Browser sessions of the portal, keyed by session token
pub struct ClientRegistryActor {
    sessions: DashMap<String, ClientSession>,
    session_ttl: i64,
    anonymous_ttl: i64,
    // Cleanup interval in seconds
    cleanup_interval: u64,
    metrics: SessionMetrics,
}

impl Default for ClientRegistryActor {
    fn default() -> Self {
        Self::new()
    }
}

impl ClientRegistryActor {
    pub fn new() -> Self {
        Self {
            sessions: DashMap::new(),
            session_ttl: DEFAULT_SESSION_TTL,
            anonymous_ttl: ANONYMOUS_SESSION_TTL,
            cleanup_interval: 300,
            metrics: SessionMetrics::default(),
        }
    }

    pub fn with_ttl(mut self, ttl_seconds: i64) -> Self {
        self.session_ttl = ttl_seconds;
        self.anonymous_ttl = self.anonymous_ttl.min(ttl_seconds);
        self
    }

    fn ttl_of(&self, session: &ClientSession) -> i64 {
        if session.identity.is_some() {
            self.session_ttl
        } else {
            self.anonymous_ttl
        }
    }

    fn update_metrics(&mut self) {
        let now = Utc::now();
        let mut authenticated = 0;
        let mut age_sum = 0.0;

        for entry in self.sessions.iter() {
            let session = entry.value();
            if session.is_authenticated() {
                authenticated += 1;
            }
            age_sum += now.signed_duration_since(session.created_at).num_seconds() as f64;
        }

        let total = self.sessions.len();
        self.metrics = SessionMetrics {
            total_sessions: total,
            anonymous_sessions: total - authenticated,
            authenticated_sessions: authenticated,
            expired_count: self.metrics.expired_count,
            avg_session_age_seconds: if total > 0 { age_sum / total as f64 } else { 0.0 },
        };
    }

    fn cleanup_sessions(&mut self) -> usize {
        let (ttl, anonymous_ttl) = (self.session_ttl, self.anonymous_ttl);
        let before = self.sessions.len();
        self.sessions.retain(|_, session| {
            let ttl = if session.identity.is_some() { ttl } else { anonymous_ttl };
            !session.is_expired(ttl)
        });
        let expired = before - self.sessions.len();

        self.metrics.expired_count += expired;
        self.update_metrics();
        expired
    }
}

impl Actor for ClientRegistryActor {
    type Context = Context<Self>;

    fn started(&mut self, ctx: &mut Self::Context) {
        tracing::info!(
            "ClientRegistryActor started with TTL: {}s ({}s for anonymous sessions)",
            self.session_ttl,
            self.anonymous_ttl
        );

        ctx.run_interval(Duration::from_secs(self.cleanup_interval), |act, _ctx| {
            let expired_count = act.cleanup_sessions();
            if expired_count > 0 {
                tracing::info!("Cleaned up {} expired sessions", expired_count);
            }
        });
    }

    fn stopped(&mut self, _ctx: &mut Self::Context) {
        tracing::info!(
            "ClientRegistryActor stopped. Final metrics: {} total sessions, {} expired during lifetime",
            self.metrics.total_sessions,
            self.metrics.expired_count
        );
    }
}

impl Handler<RegisterAnonymousClient> for ClientRegistryActor {
    type Result = MessageResult<RegisterAnonymousClient>;

    fn handle(&mut self, _msg: RegisterAnonymousClient, _ctx: &mut Self::Context) -> Self::Result {
        let client_id = Uuid::new_v4();
        let session_token = create_session_token();

        self.sessions
            .insert(session_token.clone(), ClientSession::new_anonymous(client_id, session_token.clone()));

        tracing::info!("Registered new anonymous client: {}", client_id);
        MessageResult((client_id, session_token))
    }
}

impl Handler<GetClientSession> for ClientRegistryActor {
    type Result = MessageResult<GetClientSession>;

    fn handle(&mut self, msg: GetClientSession, _ctx: &mut Self::Context) -> Self::Result {
        let expired = match self.sessions.get_mut(&msg.session_token) {
            Some(mut entry) => {
                let session = entry.value_mut();
                if !session.is_expired(self.ttl_of(session)) {
                    session.update_activity();
                    return MessageResult(SessionResult::Success(session.clone()));
                }
                true
            }
            None => false,
        };

        if expired {
            // Entry guard is released above; removing while holding it would deadlock
            self.sessions.remove(&msg.session_token);
            self.metrics.expired_count += 1;
            tracing::debug!("Session expired");
            MessageResult(SessionResult::Expired)
        } else {
            MessageResult(SessionResult::NotFound)
        }
    }
}

impl Handler<AttachIdentity> for ClientRegistryActor {
    type Result = MessageResult<AttachIdentity>;

    fn handle(&mut self, msg: AttachIdentity, _ctx: &mut Self::Context) -> Self::Result {
        let result = match self.sessions.get_mut(&msg.session_token) {
            Some(mut entry) => {
                let session = entry.value_mut();
                if session.is_expired(self.ttl_of(session)) {
                    SessionResult::Expired
                } else {
                    tracing::info!(
                        "Client {} authenticated as {}",
                        session.client_id,
                        msg.identity.principal
                    );
                    session.attach_identity(msg.identity);
                    SessionResult::Success(session.clone())
                }
            }
            None => SessionResult::NotFound,
        };

        MessageResult(result)
    }
}

impl Handler<GetSessionMetrics> for ClientRegistryActor {
    type Result = MessageResult<GetSessionMetrics>;

    fn handle(&mut self, _msg: GetSessionMetrics, _ctx: &mut Self::Context) -> Self::Result {
        self.update_metrics();
        MessageResult(self.metrics.clone())
    }
}

/// Keeps resolved identities on the browser session they were resolved for
#[derive(Clone)]
pub struct RegistryIdentityStore {
    registry: Addr<ClientRegistryActor>,
}

impl RegistryIdentityStore {
    pub fn new(registry: Addr<ClientRegistryActor>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl IdentityStore for RegistryIdentityStore {
    async fn load(&self, key: &str) -> Result<Option<StoredIdentity>, AuthError> {
        let result = self
            .registry
            .send(GetClientSession {
                session_token: key.to_string(),
            })
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        match result {
            SessionResult::Success(session) => Ok(session.identity),
            SessionResult::NotFound | SessionResult::Expired => Ok(None),
        }
    }

    async fn save(&self, key: &str, identity: &StoredIdentity) -> Result<(), AuthError> {
        let result = self
            .registry
            .send(AttachIdentity {
                session_token: key.to_string(),
                identity: identity.clone(),
            })
            .await
            .map_err(|e| AuthError::Store(e.to_string()))?;

        match result {
            SessionResult::Success(_) => Ok(()),
            SessionResult::NotFound => Err(AuthError::Store("no browser session for this login".to_string())),
            SessionResult::Expired => Err(AuthError::Store("browser session expired during login".to_string())),
        }
    }
}
