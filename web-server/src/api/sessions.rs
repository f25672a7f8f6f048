// web-server/src/api/sessions.rs
use actix::Addr;
use actix_web::{get, web, HttpRequest, HttpResponse};
use common::models::session::{ClientSessionResponse, SessionResult};

use crate::client_registry::{ClientRegistryActor, GetClientSession, GetSessionMetrics};
use crate::error::ApiError;
use crate::middleware::session_guard::SESSION_COOKIE_NAME;

/// Browser session of the caller. Never exposes the token or the session key.
#[get("/session")]
pub async fn current_session(
    req: HttpRequest,
    registry: web::Data<Addr<ClientRegistryActor>>,
) -> Result<HttpResponse, ApiError> {
    let session_token = req
        .cookie(SESSION_COOKIE_NAME)
        .map(|c| c.value().to_string())
        .ok_or_else(|| ApiError::BadRequest("no session cookie".to_string()))?;

    match registry.send(GetClientSession { session_token }).await? {
        SessionResult::Success(session) => Ok(HttpResponse::Ok().json(ClientSessionResponse::from(&session))),
        SessionResult::Expired | SessionResult::NotFound => Err(ApiError::NotFound("session not found".to_string())),
    }
}

#[get("/session/metrics")]
pub async fn session_metrics(registry: web::Data<Addr<ClientRegistryActor>>) -> Result<HttpResponse, ApiError> {
    let metrics = registry.send(GetSessionMetrics).await?;
    Ok(HttpResponse::Ok().json(metrics))
}
