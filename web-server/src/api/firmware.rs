// web-server/src/api/firmware.rs
use actix_web::{get, post, web, HttpResponse};
use common::models::identity::StoredIdentity;
use serde_json::json;
use vts_client::ClientFactory;

use super::client;
use crate::error::{backend, ApiError};

/// Whether the caller has a firmware build in flight
#[get("/firmwares")]
pub async fn firmware_requests(
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    backend(client(&clients, &identity)?.get_firmware_requests_by_user().await?)?;
    Ok(HttpResponse::Ok().json(json!({ "requested": true })))
}

/// Ask the firmware builder for a new vehicle image
#[post("/firmwares")]
pub async fn request_firmware(
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    backend(client(&clients, &identity)?.request_firmware().await?)?;
    tracing::info!("Firmware requested by {}", identity.principal);
    Ok(HttpResponse::Accepted().finish())
}
