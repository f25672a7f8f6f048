// web-server/src/api/vehicles.rs
use std::collections::BTreeMap;

use actix_web::http::header;
use actix_web::{get, post, web, HttpResponse};
use common::models::identity::StoredIdentity;
use common::{firmware_download, month_index_to_name};
use serde::{Deserialize, Serialize};
use vts_client::{AccumulatedTelemetry, ClientFactory, Vehicle};

use super::{client, parse_principal};
use crate::error::{backend, ApiError};

#[derive(Debug, Serialize)]
pub struct VehicleView {
    pub id: String,
    pub owner: String,
    pub arch: String,
    pub agreement: Option<String>,
    pub on_off: bool,
    pub public_key: String,
    pub firmware_size: usize,
}

impl VehicleView {
    fn new(id: String, vehicle: &Vehicle) -> Self {
        Self {
            id,
            owner: vehicle.owner.to_text(),
            arch: vehicle.arch.clone(),
            agreement: vehicle.agreement.map(|id| id.to_string()),
            on_off: vehicle.on_off,
            public_key: hex::encode(&vehicle.public_key),
            firmware_size: vehicle.firmware.len(),
        }
    }
}

#[derive(Debug, Serialize, PartialEq)]
pub struct MonthTotal {
    pub month: u32,
    pub name: Option<&'static str>,
    pub amount: String,
}

/// Accumulated telemetry of one type with amounts as decimal strings
#[derive(Debug, Serialize)]
pub struct AggregateView {
    pub daily: BTreeMap<u32, String>,
    pub monthly: Vec<MonthTotal>,
    pub yearly: BTreeMap<u32, String>,
}

impl From<&AccumulatedTelemetry> for AggregateView {
    fn from(telemetry: &AccumulatedTelemetry) -> Self {
        let totals = |m: &BTreeMap<u32, u128>| -> BTreeMap<u32, String> { m.iter().map(|(k, v)| (*k, v.to_string())).collect() };
        Self {
            daily: totals(&telemetry.daily),
            monthly: telemetry
                .monthly
                .iter()
                .map(|(month, amount)| MonthTotal {
                    month: *month,
                    name: month_index_to_name(*month),
                    amount: amount.to_string(),
                })
                .collect(),
            yearly: totals(&telemetry.yearly),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct PowerRequest {
    pub on: bool,
}

/// Vehicles owned by the caller
#[get("/vehicles")]
pub async fn list_vehicles(
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let user = backend(client(&clients, &identity)?.get_user().await?)?;
    let vehicles: Vec<String> = user.vehicles.keys().map(|p| p.to_text()).collect();
    Ok(HttpResponse::Ok().json(vehicles))
}

#[get("/vehicles/{vehicle}")]
pub async fn vehicle_details(
    path: web::Path<String>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_principal(&path)?;
    let vehicle = backend(client(&clients, &identity)?.get_vehicle(id).await?)?;
    Ok(HttpResponse::Ok().json(VehicleView::new(id.to_text(), &vehicle)))
}

#[get("/vehicles/{vehicle}/telemetry")]
pub async fn vehicle_telemetry(
    path: web::Path<String>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_principal(&path)?;
    let aggregated = backend(client(&clients, &identity)?.get_aggregated_data(id).await?)?;

    let view: BTreeMap<String, AggregateView> = aggregated
        .iter()
        .map(|(kind, telemetry)| (format!("{:?}", kind), AggregateView::from(telemetry)))
        .collect();
    Ok(HttpResponse::Ok().json(view))
}

#[post("/vehicles/{vehicle}/power")]
pub async fn toggle_power(
    path: web::Path<String>,
    body: web::Json<PowerRequest>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_principal(&path)?;
    backend(client(&clients, &identity)?.turn_on_off_vehicle(id, body.on).await?)?;
    tracing::info!("Vehicle {} switched {}", id, if body.on { "on" } else { "off" });
    Ok(HttpResponse::NoContent().finish())
}

/// Firmware archive of a vehicle as a file download
#[get("/vehicles/{vehicle}/firmware")]
pub async fn download_firmware(
    path: web::Path<String>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_principal(&path)?;
    let vehicle = backend(client(&clients, &identity)?.get_vehicle(id).await?)?;

    let download = firmware_download(&id.to_text(), &vehicle.arch, vehicle.firmware);
    Ok(HttpResponse::Ok()
        .content_type(download.content_type)
        .insert_header((header::CONTENT_DISPOSITION, download.content_disposition()))
        .body(download.bytes))
}
