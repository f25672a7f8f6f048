// web-server/src/api/admin.rs
use actix_web::{delete, get, post, web, HttpResponse};
use common::models::identity::StoredIdentity;
use serde::{Deserialize, Serialize};
use vts_client::{ClientFactory, User};

use super::{client, parse_principal};
use crate::error::{backend, ApiError};

#[derive(Debug, Serialize)]
pub struct UserView {
    pub principal: String,
    pub email: Option<String>,
    pub vehicles: Vec<String>,
    pub agreements: Vec<String>,
}

impl UserView {
    fn new(principal: String, user: User) -> Self {
        Self {
            principal,
            email: user.email,
            vehicles: user.vehicles.keys().map(|p| p.to_text()).collect(),
            agreements: user.agreements.keys().map(|id| id.to_string()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AdminRequest {
    pub admin: String,
}

#[derive(Debug, Deserialize)]
pub struct RegisterUserRequest {
    pub user: String,
    pub email: Option<String>,
}

/// The caller's own user record
#[get("/user")]
pub async fn profile(
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let user = backend(client(&clients, &identity)?.get_user().await?)?;
    Ok(HttpResponse::Ok().json(UserView::new(identity.principal.clone(), user)))
}

#[post("/admins")]
pub async fn add_admin(
    body: web::Json<AdminRequest>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let admin = parse_principal(&body.admin)?;
    backend(client(&clients, &identity)?.add_admin(admin).await?)?;
    tracing::info!("{} granted admin rights to {}", identity.principal, admin);
    Ok(HttpResponse::NoContent().finish())
}

#[delete("/admins/{admin}")]
pub async fn delete_admin(
    path: web::Path<String>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let admin = parse_principal(&path)?;
    backend(client(&clients, &identity)?.delete_admin(admin).await?)?;
    tracing::info!("{} revoked admin rights of {}", identity.principal, admin);
    Ok(HttpResponse::NoContent().finish())
}

#[post("/users")]
pub async fn register_user(
    body: web::Json<RegisterUserRequest>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let RegisterUserRequest { user, email } = body.into_inner();
    let user = parse_principal(&user)?;
    backend(client(&clients, &identity)?.register_user(user, email).await?)?;
    tracing::info!("Registered user {}", user);
    Ok(HttpResponse::Created().finish())
}

#[delete("/users/{user}")]
pub async fn delete_user(
    path: web::Path<String>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let user = parse_principal(&path)?;
    backend(client(&clients, &identity)?.delete_user(user).await?)?;
    tracing::info!("Deleted user {}", user);
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use serde_json::json;
    use std::collections::BTreeMap;
    use vts_client::VtsError;

    use crate::test_support::{CannedTransport, TestPortal};

    #[actix_web::test]
    async fn test_profile_lists_agreement_ids_as_text() {
        let user = User {
            email: None,
            vehicles: BTreeMap::new(),
            agreements: BTreeMap::from([(3u128, ())]),
        };
        let portal = TestPortal::new(CannedTransport::new().reply_ok("get_user", user));
        let app = init_portal!(portal);
        let cookie = login!(app, "/vehicles");

        let req = test::TestRequest::get().uri("/api/user").cookie(cookie).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;
        assert_eq!(body["agreements"], json!(["3"]));
        assert!(body["principal"].as_str().is_some());
    }

    #[actix_web::test]
    async fn test_register_existing_user_is_conflict() {
        let transport = CannedTransport::new().reply_err::<()>("register_user", VtsError::AlreadyExists);
        let portal = TestPortal::new(transport);
        let app = init_portal!(portal);
        let cookie = login!(app, "/vehicles");

        let req = test::TestRequest::post()
            .uri("/api/users")
            .cookie(cookie)
            .set_json(json!({ "user": "2vxsx-fae", "email": "a@example.com" }))
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::CONFLICT);

        let (user, email): (candid::Principal, Option<String>) = portal.transport.last_args("register_user");
        assert_eq!(user, candid::Principal::anonymous());
        assert_eq!(email.as_deref(), Some("a@example.com"));
    }

    #[actix_web::test]
    async fn test_non_admin_cannot_delete_admin() {
        let transport = CannedTransport::new().reply_err::<()>("delete_admin", VtsError::Unauthorized);
        let portal = TestPortal::new(transport);
        let app = init_portal!(portal);
        let cookie = login!(app, "/vehicles");

        let req = test::TestRequest::delete()
            .uri("/api/admins/2vxsx-fae")
            .cookie(cookie)
            .to_request();
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::FORBIDDEN);
    }
}
