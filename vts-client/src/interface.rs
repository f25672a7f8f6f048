// vts-client/src/interface.rs
//! Request and response shapes of the VTS canister.
//!
//! These types mirror `vts.did` field for field. Candid decoding is strict, so
//! a backend that drifts from this shape fails the call instead of being
//! silently coerced.
use std::collections::BTreeMap;

use candid::{CandidType, Deserialize, Principal};
use serde::Serialize;

/// Error symbols the canister can return. Closed set owned by the backend.
#[derive(CandidType, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VtsError {
    InvalidSigner,
    Internal,
    InvalidSignatureFormat,
    InvalidSignature,
    NotFound,
    Unauthorized,
    AlreadyExists,
    DecodeTelemetry,
    InvalidData,
}

/// Coarse grouping of backend errors; the symbol itself is never replaced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    Authorization,
    Existence,
    Data,
    Internal,
}

impl VtsError {
    pub fn class(&self) -> ErrorClass {
        match self {
            VtsError::Unauthorized
            | VtsError::InvalidSigner
            | VtsError::InvalidSignature
            | VtsError::InvalidSignatureFormat => ErrorClass::Authorization,
            VtsError::NotFound | VtsError::AlreadyExists => ErrorClass::Existence,
            VtsError::InvalidData | VtsError::DecodeTelemetry => ErrorClass::Data,
            VtsError::Internal => ErrorClass::Internal,
        }
    }

    /// Symbol exactly as the backend spells it
    pub fn symbol(&self) -> &'static str {
        match self {
            VtsError::InvalidSigner => "InvalidSigner",
            VtsError::Internal => "Internal",
            VtsError::InvalidSignatureFormat => "InvalidSignatureFormat",
            VtsError::InvalidSignature => "InvalidSignature",
            VtsError::NotFound => "NotFound",
            VtsError::Unauthorized => "Unauthorized",
            VtsError::AlreadyExists => "AlreadyExists",
            VtsError::DecodeTelemetry => "DecodeTelemetry",
            VtsError::InvalidData => "InvalidData",
        }
    }
}

impl std::fmt::Display for VtsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.symbol())
    }
}

pub type VtsResult<T> = Result<T, VtsError>;

pub type AgreementId = u128;
pub type InvoiceId = u128;

/// Principal keyed set, encoded by the backend as `vec record { principal; null }`
pub type PrincipalSet = BTreeMap<Principal, ()>;

#[derive(CandidType, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TelemetryType {
    Gas,
}

#[derive(CandidType, Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct AccumulatedTelemetry {
    pub daily: BTreeMap<u32, u128>,
    pub monthly: BTreeMap<u32, u128>,
    pub yearly: BTreeMap<u32, u128>,
}

#[derive(CandidType, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgreementState {
    Unsigned,
    Signed,
}

#[derive(CandidType, Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AgreementConditions {
    pub gas_price: String,
}

#[derive(CandidType, Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct Agreement {
    pub name: String,
    pub vh_provider: Principal,
    pub vh_customer: Principal,
    pub state: AgreementState,
    pub conditions: AgreementConditions,
    pub vehicles: PrincipalSet,
}

/// Raw telemetry: year -> month -> day -> samples
pub type TelemetryTree = BTreeMap<u32, BTreeMap<u32, BTreeMap<u32, Vec<u128>>>>;

#[derive(CandidType, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Vehicle {
    pub owner: Principal,
    pub public_key: Vec<u8>,
    pub arch: String,
    pub firmware: Vec<u8>,
    pub agreement: Option<AgreementId>,
    pub on_off: bool,
    pub telemetry: BTreeMap<TelemetryType, TelemetryTree>,
    pub accumulated_telemetry: BTreeMap<TelemetryType, AccumulatedTelemetry>,
}

#[derive(CandidType, Deserialize, Serialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct User {
    pub email: Option<String>,
    pub vehicles: PrincipalSet,
    pub agreements: BTreeMap<AgreementId, ()>,
}

#[derive(CandidType, Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
pub struct PendingInvoice {
    pub id: InvoiceId,
    pub vehicle: Principal,
    pub customer_email: Option<String>,
}

/// Power command the backend hands back to a vehicle after it stores telemetry
#[derive(CandidType, Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreTelemetryResponse {
    On,
    Off,
}
