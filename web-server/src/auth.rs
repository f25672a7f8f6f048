// web-server/src/auth.rs
use actix_web::http::header;
use actix_web::{get, web, HttpRequest, HttpResponse};
use common::models::identity::DelegationChain;
use serde::Deserialize;
use vts_client::RouteGuard;

use crate::client_registry::RegistryIdentityStore;
use crate::error::ApiError;
use crate::middleware::session_guard::SESSION_COOKIE_NAME;

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub state: String,
    /// base64url (unpadded) JSON of the provider's delegation chain
    pub delegation: Option<String>,
}

/// Encode a delegation chain the way the callback expects it
pub fn encode_delegation(chain: &DelegationChain) -> Result<String, serde_json::Error> {
    Ok(base64::encode_config(serde_json::to_vec(chain)?, base64::URL_SAFE_NO_PAD))
}

fn decode_delegation(encoded: &str) -> Result<DelegationChain, ApiError> {
    let bytes = base64::decode_config(encoded, base64::URL_SAFE_NO_PAD)
        .map_err(|e| ApiError::BadRequest(format!("delegation is not base64url: {}", e)))?;
    serde_json::from_slice(&bytes).map_err(|e| ApiError::BadRequest(format!("malformed delegation: {}", e)))
}

/// Only same-origin paths are accepted as a post-login destination
fn return_path(return_to: &str) -> &str {
    if return_to.starts_with('/') && !return_to.starts_with("//") {
        return_to
    } else {
        "/"
    }
}

/// Identity provider callback.
///
/// Completes the pending login named by `state` once the provider's delegation
/// verifies, binds the identity to the browser session that started the login
/// and resumes the held navigation.
#[get("/auth/callback")]
pub async fn callback(
    req: HttpRequest,
    query: web::Query<CallbackQuery>,
    guard: web::Data<RouteGuard<RegistryIdentityStore>>,
) -> Result<HttpResponse, ApiError> {
    let session = req
        .cookie(SESSION_COOKIE_NAME)
        .ok_or_else(|| ApiError::BadRequest("login callback without a session".to_string()))?;
    let delegation = query
        .delegation
        .as_deref()
        .ok_or_else(|| ApiError::BadRequest("login callback without a delegation".to_string()))?;
    let chain = decode_delegation(delegation)?;

    let completed = guard
        .bootstrap()
        .complete_login(session.value(), &query.state, &chain)
        .await?;

    tracing::info!(
        "Resuming navigation to {} as {}",
        completed.return_to,
        completed.identity.principal
    );

    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, return_path(&completed.return_to)))
        .finish())
}
