// web-server/src/routing.rs
//! Route table of the portal. Page routes are named after the SPA views and
//! all answer with the SPA shell; data comes from the `/api` scope.
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse, Resource};
use common::StaticFilesConfig;

use crate::error::ApiError;
use crate::{api, auth, static_files};

pub const HOME: &str = "home";
pub const VEHICLES: &str = "vehicles";
pub const VEHICLE: &str = "vehicle";
pub const CREATE_AGREEMENT: &str = "createAgreement";
pub const SIGN_AGREEMENT: &str = "signAgreement";
pub const GET_AGREEMENT: &str = "getAgreement";
pub const AGREEMENTS: &str = "agreements";
pub const VEHICLE_LINK: &str = "vehicleLink";
pub const FIRMWARES: &str = "firmwares";
pub const AGREEMENT_FIRMWARES: &str = "agreementFirmwares";
pub const INVOICES: &str = "invoices";
pub const INVOICE: &str = "invoice";

fn page(path: &str, name: &str) -> Resource {
    web::resource(path)
        .name(name)
        .route(web::get().to(static_files::spa_index))
}

async fn home(req: HttpRequest) -> Result<HttpResponse, ApiError> {
    let target = req
        .url_for_static(VEHICLES)
        .map_err(|e| ApiError::Internal(format!("route {} is not registered: {}", VEHICLES, e)))?;
    Ok(HttpResponse::Found()
        .insert_header((header::LOCATION, target.path()))
        .finish())
}

pub fn configure(cfg: &mut web::ServiceConfig, static_config: &StaticFilesConfig) {
    cfg.service(auth::callback).configure(api::configure);

    // Literal segments before the `{agreement_id}` catch-alls
    cfg.service(web::resource("/").name(HOME).route(web::get().to(home)))
        .service(page("/vehicles", VEHICLES))
        .service(page("/vehicles/{vehicle}", VEHICLE))
        .service(page("/agreements", AGREEMENTS))
        .service(page("/agreements/create", CREATE_AGREEMENT))
        .service(page("/agreements/sign", SIGN_AGREEMENT))
        .service(page("/agreements/{agreement_id}", GET_AGREEMENT))
        .service(page("/agreements/{agreement_id}/link", VEHICLE_LINK))
        .service(page("/agreements/{agreement_id}/firmwares", AGREEMENT_FIRMWARES))
        .service(page("/firmwares", FIRMWARES))
        .service(page("/invoices", INVOICES))
        .service(page("/invoices/{invoice_id}", INVOICE));

    static_files::configure(cfg, static_config);
}
