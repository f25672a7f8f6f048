//! Typed client for the VTS canister.
//!
//! `service` holds the declarative interface and the proxy built from it,
//! `transport` the agent that carries calls, `auth` the session bootstrap and
//! `guard` the navigation guard built on top of it.
pub mod auth;
pub mod error;
pub mod guard;
pub mod interface;
pub mod service;
pub mod transport;

pub use auth::{
    delegate, session_identity, BootstrapSettings, CompletedLogin, DelegationVerifier, FileIdentityStore,
    IdentityProvider, IdentityStore, MemoryIdentityStore, PendingLogin, Secp256k1ChainVerifier, SessionBootstrap,
    VerifiedDelegation,
};
pub use error::{AuthError, ClientError, TransportError};
pub use guard::{GuardOutcome, GuardState, RouteGuard};
pub use interface::*;
pub use service::{create_client, AgentClientFactory, ClientFactory, MethodDescriptor, RetryPolicy, VtsClient, METHODS};
pub use transport::{AgentTransport, CallKind, Transport};
