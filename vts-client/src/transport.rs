// vts-client/src/transport.rs
use async_trait::async_trait;
use candid::Principal;
use ic_agent::{Agent, Identity};

use crate::error::TransportError;

/// Call class of a remote method.
///
/// Queries are read-only and may be answered by a single replica, so they are
/// safe to repeat. Updates go through consensus and may have effects the
/// backend does not deduplicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Query,
    Update,
}

impl CallKind {
    pub fn is_retry_safe(&self) -> bool {
        matches!(self, CallKind::Query)
    }
}

impl std::fmt::Display for CallKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CallKind::Query => f.write_str("query"),
            CallKind::Update => f.write_str("update"),
        }
    }
}

/// Carries encoded calls to a canister on behalf of one identity
#[async_trait]
pub trait Transport: Send + Sync {
    async fn call(
        &self,
        kind: CallKind,
        canister_id: Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError>;
}

/// Transport backed by an `ic_agent::Agent`
pub struct AgentTransport {
    agent: Agent,
}

impl AgentTransport {
    pub fn new(agent: Agent) -> Self {
        Self { agent }
    }

    pub fn agent(&self) -> &Agent {
        &self.agent
    }
}

#[async_trait]
impl Transport for AgentTransport {
    async fn call(
        &self,
        kind: CallKind,
        canister_id: Principal,
        method: &str,
        arg: Vec<u8>,
    ) -> Result<Vec<u8>, TransportError> {
        let reply = match kind {
            CallKind::Query => {
                self.agent
                    .query(&canister_id, method)
                    .with_effective_canister_id(canister_id)
                    .with_arg(arg)
                    .call()
                    .await?
            }
            CallKind::Update => {
                self.agent
                    .update(&canister_id, method)
                    .with_effective_canister_id(canister_id)
                    .with_arg(arg)
                    .call_and_wait()
                    .await?
            }
        };
        Ok(reply)
    }
}

/// Build an agent for `identity` against `endpoint`.
///
/// `root_key` is only needed for local replicas, whose root key is not the
/// IC mainnet key baked into the agent.
pub fn build_agent(
    endpoint: &str,
    identity: Box<dyn Identity>,
    root_key: Option<Vec<u8>>,
) -> Result<Agent, TransportError> {
    let agent = Agent::builder()
        .with_url(endpoint)
        .with_boxed_identity(identity)
        .build()?;
    if let Some(root_key) = root_key {
        agent.set_root_key(root_key);
    }
    Ok(agent)
}

/// Fetch the replica root key once so per-identity agents can reuse it
pub async fn fetch_root_key(endpoint: &str) -> Result<Vec<u8>, TransportError> {
    let agent = Agent::builder().with_url(endpoint).build()?;
    agent.fetch_root_key().await?;
    tracing::info!("Fetched root key from {}", endpoint);
    Ok(agent.read_root_key())
}
