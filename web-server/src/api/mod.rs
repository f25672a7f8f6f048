// web-server/src/api/mod.rs
//! JSON endpoints behind the SPA views. Each endpoint issues exactly one
//! canister call with the identity the session guard resolved.
pub mod admin;
pub mod agreements;
pub mod firmware;
pub mod invoices;
pub mod sessions;
pub mod vehicles;

use actix_web::web;
use candid::Principal;
use common::models::identity::StoredIdentity;
use vts_client::{ClientFactory, VtsClient};

use crate::error::ApiError;

/// Client bound to the caller's identity; never shared between sessions
pub fn client(clients: &web::Data<dyn ClientFactory>, identity: &StoredIdentity) -> Result<VtsClient, ApiError> {
    Ok(clients.client_for(identity)?)
}

pub fn parse_principal(text: &str) -> Result<Principal, ApiError> {
    Principal::from_text(text).map_err(|e| ApiError::BadRequest(format!("invalid principal {}: {}", text, e)))
}

/// Agreement and invoice ids are `nat` on the wire and strings in JSON
pub fn parse_id(text: &str) -> Result<u128, ApiError> {
    text.parse()
        .map_err(|_| ApiError::BadRequest(format!("invalid id {}", text)))
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(sessions::current_session)
            .service(sessions::session_metrics)
            .service(admin::profile)
            .service(admin::add_admin)
            .service(admin::delete_admin)
            .service(admin::register_user)
            .service(admin::delete_user)
            .service(vehicles::list_vehicles)
            .service(vehicles::vehicle_details)
            .service(vehicles::vehicle_telemetry)
            .service(vehicles::toggle_power)
            .service(vehicles::download_firmware)
            .service(firmware::firmware_requests)
            .service(firmware::request_firmware)
            .service(agreements::list_agreements)
            .service(agreements::create_agreement)
            .service(agreements::sign_agreement)
            .service(agreements::agreement_vehicles)
            .service(agreements::link_vehicle)
            .service(invoices::list_invoices)
            .service(invoices::invoice_details)
            .service(invoices::delete_invoices),
    );
}
