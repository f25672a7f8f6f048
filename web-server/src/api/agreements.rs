// web-server/src/api/agreements.rs
use actix_web::{get, post, web, HttpResponse};
use common::models::identity::StoredIdentity;
use serde::{Deserialize, Serialize};
use serde_json::json;
use vts_client::{Agreement, AgreementState, ClientFactory};

use super::{client, parse_id, parse_principal};
use crate::error::{backend, ApiError};

#[derive(Debug, Serialize)]
pub struct AgreementView {
    pub name: String,
    pub vh_provider: String,
    pub vh_customer: String,
    pub state: AgreementState,
    pub gas_price: String,
    pub vehicles: Vec<String>,
}

impl From<Agreement> for AgreementView {
    fn from(agreement: Agreement) -> Self {
        Self {
            name: agreement.name,
            vh_provider: agreement.vh_provider.to_text(),
            vh_customer: agreement.vh_customer.to_text(),
            state: agreement.state,
            gas_price: agreement.conditions.gas_price,
            vehicles: agreement.vehicles.keys().map(|p| p.to_text()).collect(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateAgreementRequest {
    pub name: String,
    pub vh_customer: String,
    /// Kept as text, the backend owns its interpretation
    pub gas_price: String,
}

#[derive(Debug, Deserialize)]
pub struct LinkVehicleRequest {
    pub vehicle: String,
}

#[get("/agreements")]
pub async fn list_agreements(
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let agreements = backend(client(&clients, &identity)?.get_user_agreements().await?)?;
    let view: Vec<AgreementView> = agreements.into_iter().map(AgreementView::from).collect();
    Ok(HttpResponse::Ok().json(view))
}

#[post("/agreements")]
pub async fn create_agreement(
    body: web::Json<CreateAgreementRequest>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let CreateAgreementRequest {
        name,
        vh_customer,
        gas_price,
    } = body.into_inner();
    let vh_customer = parse_principal(&vh_customer)?;

    let id = backend(
        client(&clients, &identity)?
            .create_agreement(name, vh_customer, gas_price)
            .await?,
    )?;
    tracing::info!("Created agreement {} for {}", id, vh_customer);
    Ok(HttpResponse::Created().json(json!({ "agreement_id": id.to_string() })))
}

#[post("/agreements/{agreement_id}/sign")]
pub async fn sign_agreement(
    path: web::Path<String>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    backend(client(&clients, &identity)?.sign_agreement(id).await?)?;
    tracing::info!("Signed agreement {}", id);
    Ok(HttpResponse::NoContent().finish())
}

#[get("/agreements/{agreement_id}/vehicles")]
pub async fn agreement_vehicles(
    path: web::Path<String>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    let vehicles = backend(client(&clients, &identity)?.get_vehicles_by_agreement(id).await?)?;
    let view: Vec<String> = vehicles.keys().map(|p| p.to_text()).collect();
    Ok(HttpResponse::Ok().json(view))
}

#[post("/agreements/{agreement_id}/vehicles")]
pub async fn link_vehicle(
    path: web::Path<String>,
    body: web::Json<LinkVehicleRequest>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    let vehicle = parse_principal(&body.vehicle)?;
    backend(client(&clients, &identity)?.link_vehicle(id, vehicle).await?)?;
    tracing::info!("Linked vehicle {} to agreement {}", vehicle, id);
    Ok(HttpResponse::NoContent().finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::http::StatusCode;
    use actix_web::test;
    use candid::Principal;
    use vts_client::{AgreementConditions, PrincipalSet, VtsError};

    use crate::test_support::{CannedTransport, TestPortal};

    fn agreement() -> Agreement {
        Agreement {
            name: "Fleet".to_string(),
            vh_provider: Principal::anonymous(),
            vh_customer: Principal::from_slice(&[4; 29]),
            state: AgreementState::Signed,
            conditions: AgreementConditions {
                gas_price: "1.5".to_string(),
            },
            vehicles: PrincipalSet::from([(Principal::from_slice(&[5; 29]), ())]),
        }
    }

    #[actix_web::test]
    async fn test_agreements_list() {
        let transport = CannedTransport::new().reply_ok("get_user_agreements", vec![agreement()]);
        let portal = TestPortal::new(transport);
        let app = init_portal!(portal);
        let cookie = login!(app, "/agreements");

        let req = test::TestRequest::get().uri("/api/agreements").cookie(cookie).to_request();
        let body: serde_json::Value = test::call_and_read_body_json(&app, req).await;

        assert_eq!(body[0]["name"], "Fleet");
        assert_eq!(body[0]["state"], "Signed");
        assert_eq!(body[0]["gas_price"], "1.5");
        assert_eq!(body[0]["vehicles"][0], Principal::from_slice(&[5; 29]).to_text());
    }

    #[actix_web::test]
    async fn test_create_agreement_returns_id_as_text() {
        let transport = CannedTransport::new().reply_ok("create_agreement", u128::MAX);
        let portal = TestPortal::new(transport);
        let app = init_portal!(portal);
        let cookie = login!(app, "/agreements/create");

        let req = test::TestRequest::post()
            .uri("/api/agreements")
            .cookie(cookie)
            .set_json(json!({
                "name": "Fleet",
                "vh_customer": "2vxsx-fae",
                "gas_price": "1.5",
            }))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::CREATED);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["agreement_id"], u128::MAX.to_string());

        let (name, customer, gas_price): (String, candid::Principal, String) =
            portal.transport.last_args("create_agreement");
        assert_eq!(name, "Fleet");
        assert_eq!(customer, candid::Principal::anonymous());
        assert_eq!(gas_price, "1.5");
    }

    #[actix_web::test]
    async fn test_invalid_customer_is_rejected_before_any_call() {
        let portal = TestPortal::new(CannedTransport::new());
        let app = init_portal!(portal);
        let cookie = login!(app, "/agreements/create");

        let req = test::TestRequest::post()
            .uri("/api/agreements")
            .cookie(cookie)
            .set_json(json!({ "name": "Fleet", "vh_customer": "nope", "gas_price": "1" }))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(portal.transport.calls("create_agreement"), 0);
    }

    #[actix_web::test]
    async fn test_sign_unauthorized_is_forbidden() {
        let transport = CannedTransport::new().reply_err::<()>("sign_agreement", VtsError::Unauthorized);
        let portal = TestPortal::new(transport);
        let app = init_portal!(portal);
        let cookie = login!(app, "/agreements/sign");

        let req = test::TestRequest::post()
            .uri("/api/agreements/7/sign")
            .cookie(cookie)
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::FORBIDDEN);
        let body: serde_json::Value = test::read_body_json(res).await;
        assert_eq!(body["error"], "Unauthorized");
        assert_eq!(portal.transport.calls("sign_agreement"), 1);
    }

    #[actix_web::test]
    async fn test_link_vehicle() {
        let transport = CannedTransport::new().reply_ok("link_vehicle", ());
        let portal = TestPortal::new(transport);
        let app = init_portal!(portal);
        let cookie = login!(app, "/agreements/7/link");

        let req = test::TestRequest::post()
            .uri("/api/agreements/7/vehicles")
            .cookie(cookie)
            .set_json(json!({ "vehicle": "2vxsx-fae" }))
            .to_request();
        let res = test::call_service(&app, req).await;

        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(portal.transport.calls("link_vehicle"), 1);
        let (agreement_id, vehicle): (u128, candid::Principal) = portal.transport.last_args("link_vehicle");
        assert_eq!(agreement_id, 7);
        assert_eq!(vehicle, candid::Principal::anonymous());
    }
}
