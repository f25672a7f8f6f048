// vts-client/src/service.rs
//! Typed proxy for the VTS canister.
//!
//! The service is declared once in the `vts_service!` table below. The table
//! produces the `METHODS` descriptor list and one async method per entry on
//! [`VtsClient`]. Each method returns `Result<R, ClientError>` where `R` is the
//! reply type from `vts.did`, usually a `VtsResult<T>`: the outer error is a
//! client or transport failure, the inner one is the backend's own symbol.
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use candid::{CandidType, Principal};
use common::models::identity::StoredIdentity;
use common::{ClientConfig, Config};
use ic_agent::Agent;
use serde::de::DeserializeOwned;

use crate::auth::session_identity;
use crate::error::ClientError;
use crate::interface::*;
use crate::transport::{build_agent, fetch_root_key, AgentTransport, CallKind, Transport};

// Upper bound for the query retry backoff
const MAX_BACKOFF_SECS: u64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodDescriptor {
    pub name: &'static str,
    pub kind: CallKind,
}

/// Look up a method of the service by name
pub fn describe(name: &str) -> Option<&'static MethodDescriptor> {
    METHODS.iter().find(|m| m.name == name)
}

/// Retry budget for read-only calls. Updates are never retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub query_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            query_retries: 0,
            backoff: Duration::ZERO,
        }
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self {
            query_retries: config.query_retries,
            backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    fn delay(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        std::cmp::min(
            self.backoff.saturating_mul(factor),
            Duration::from_secs(MAX_BACKOFF_SECS),
        )
    }
}

/// Proxy bound to one canister and one caller identity
#[derive(Clone)]
pub struct VtsClient {
    canister_id: Principal,
    transport: Arc<dyn Transport>,
    retry: RetryPolicy,
}

impl VtsClient {
    pub fn new(canister_id: Principal, transport: Arc<dyn Transport>) -> Self {
        Self {
            canister_id,
            transport,
            retry: RetryPolicy::none(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn canister_id(&self) -> Principal {
        self.canister_id
    }

    async fn call<R>(
        &self,
        kind: CallKind,
        method: &'static str,
        arg: Result<Vec<u8>, candid::Error>,
    ) -> Result<R, ClientError>
    where
        R: CandidType + DeserializeOwned,
    {
        let arg = arg.map_err(|source| ClientError::Encode {
            method: method.to_string(),
            source,
        })?;

        let reply = self.send(kind, method, arg).await?;

        candid::decode_one::<R>(&reply).map_err(|source| {
            tracing::error!("Reply from {} does not match the service interface: {}", method, source);
            ClientError::Decode {
                method: method.to_string(),
                source,
            }
        })
    }

    async fn send(&self, kind: CallKind, method: &'static str, arg: Vec<u8>) -> Result<Vec<u8>, ClientError> {
        let mut attempt = 0;
        loop {
            tracing::debug!("Calling {} ({}) on {}, attempt {}", method, kind, self.canister_id, attempt + 1);

            match self.transport.call(kind, self.canister_id, method, arg.clone()).await {
                Ok(reply) => return Ok(reply),
                Err(e) if kind.is_retry_safe() && attempt < self.retry.query_retries => {
                    let delay = self.retry.delay(attempt);
                    tracing::warn!("Query {} failed: {}; retrying in {:?}", method, e, delay);
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(source) => {
                    tracing::warn!("Call {} ({}) failed: {}", method, kind, source);
                    return Err(ClientError::Transport {
                        method: method.to_string(),
                        source,
                    });
                }
            }
        }
    }
}

macro_rules! call_kind {
    (query) => {
        CallKind::Query
    };
    (update) => {
        CallKind::Update
    };
}

macro_rules! vts_service {
    ($(
        $(#[$meta:meta])*
        $kind:ident $name:ident($($arg:ident: $ty:ty),*) -> $ret:ty;
    )*) => {
        /// Every method of the VTS service with its call class
        pub const METHODS: &[MethodDescriptor] = &[
            $(MethodDescriptor { name: stringify!($name), kind: call_kind!($kind) },)*
        ];

        impl VtsClient {
            $(
                $(#[$meta])*
                pub async fn $name(&self, $($arg: $ty),*) -> Result<$ret, ClientError> {
                    self.call(
                        call_kind!($kind),
                        stringify!($name),
                        candid::encode_args(($($arg,)*)),
                    )
                    .await
                }
            )*
        }
    };
}

vts_service! {
    /// Roll stored telemetry up into daily, monthly and yearly totals
    update accumulate_telemetry_data() -> VtsResult<()>;
    update add_admin(admin: Principal) -> VtsResult<()>;
    /// Wipes canister state; local development only
    update clean_state() -> ();
    /// Returns the id of the new, unsigned agreement
    update create_agreement(name: String, vh_customer: Principal, gas_price: String) -> VtsResult<AgreementId>;
    update delete_admin(admin: Principal) -> VtsResult<()>;
    update delete_pending_invoices(ids: Vec<InvoiceId>) -> ();
    update delete_user(user: Principal) -> VtsResult<()>;
    update fill_predefined_telemetry() -> ();
    query get_aggregated_data(vehicle: Principal) -> VtsResult<BTreeMap<TelemetryType, AccumulatedTelemetry>>;
    /// Claims the oldest open firmware request; the firmware builder calls this
    update get_firmware_requests() -> VtsResult<Principal>;
    /// `Ok` when the caller has a firmware request in flight
    query get_firmware_requests_by_user() -> VtsResult<()>;
    query get_pending_invoices() -> VtsResult<Vec<PendingInvoice>>;
    query get_user() -> VtsResult<User>;
    query get_user_agreements() -> VtsResult<Vec<Agreement>>;
    query get_vehicle(vehicle: Principal) -> VtsResult<Vehicle>;
    query get_vehicles_by_agreement(agreement_id: AgreementId) -> VtsResult<PrincipalSet>;
    update link_vehicle(agreement_id: AgreementId, vehicle: Principal) -> VtsResult<()>;
    update register_user(user: Principal, email: Option<String>) -> VtsResult<()>;
    update request_firmware() -> VtsResult<()>;
    update sign_agreement(agreement_id: AgreementId) -> VtsResult<()>;
    /// `signature` is the vehicle's secp256k1 signature over `data`
    update store_telemetry(vehicle: Principal, data: Vec<u8>, signature: Vec<u8>) -> VtsResult<StoreTelemetryResponse>;
    update turn_on_off_vehicle(vehicle: Principal, on: bool) -> VtsResult<()>;
    update upload_firmware(vh_customer: Principal, public_key: Vec<u8>, arch: String, firmware: Vec<u8>) -> VtsResult<()>;
}

/// Bind an agent to the VTS canister `service_id`
pub fn create_client(service_id: Principal, agent: Agent) -> VtsClient {
    VtsClient::new(service_id, Arc::new(AgentTransport::new(agent)))
}

/// Builds clients bound to an explicitly passed session identity
pub trait ClientFactory: Send + Sync {
    fn client_for(&self, identity: &StoredIdentity) -> Result<VtsClient, ClientError>;
}

/// Production factory: one `ic_agent::Agent` per identity against the configured replica
pub struct AgentClientFactory {
    endpoint: String,
    canister_id: Principal,
    root_key: Option<Vec<u8>>,
    retry: RetryPolicy,
}

impl AgentClientFactory {
    pub async fn from_config(config: &Config) -> Result<Self, ClientError> {
        let canister_id = Principal::from_text(&config.vts_canister_id)
            .map_err(|e| ClientError::Configuration(format!("vts_canister_id: {}", e)))?;

        // Root key is fetched once; it never changes for the lifetime of a replica
        let root_key = if config.fetch_root_key {
            let key = fetch_root_key(&config.icp_node_endpoint)
                .await
                .map_err(|source| ClientError::Transport {
                    method: "read_state".to_string(),
                    source,
                })?;
            Some(key)
        } else {
            None
        };

        Ok(Self {
            endpoint: config.icp_node_endpoint.clone(),
            canister_id,
            root_key,
            retry: RetryPolicy::from_config(&config.client),
        })
    }
}

impl ClientFactory for AgentClientFactory {
    fn client_for(&self, identity: &StoredIdentity) -> Result<VtsClient, ClientError> {
        let identity = session_identity(identity).map_err(|e| ClientError::Identity(e.to_string()))?;
        let agent = build_agent(&self.endpoint, identity, self.root_key.clone())
            .map_err(|e| ClientError::Configuration(e.to_string()))?;
        Ok(create_client(self.canister_id, agent).with_retry_policy(self.retry))
    }
}
