// web-server/src/api/invoices.rs
use actix_web::{delete, get, web, HttpResponse};
use common::models::identity::StoredIdentity;
use serde::{Deserialize, Serialize};
use vts_client::{ClientFactory, PendingInvoice};

use super::{client, parse_id};
use crate::error::{backend, ApiError};

#[derive(Debug, Serialize)]
pub struct InvoiceView {
    pub id: String,
    pub vehicle: String,
    pub customer_email: Option<String>,
}

impl From<PendingInvoice> for InvoiceView {
    fn from(invoice: PendingInvoice) -> Self {
        Self {
            id: invoice.id.to_string(),
            vehicle: invoice.vehicle.to_text(),
            customer_email: invoice.customer_email,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DeleteInvoicesRequest {
    pub ids: Vec<String>,
}

#[get("/invoices")]
pub async fn list_invoices(
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let invoices = backend(client(&clients, &identity)?.get_pending_invoices().await?)?;
    let view: Vec<InvoiceView> = invoices.into_iter().map(InvoiceView::from).collect();
    Ok(HttpResponse::Ok().json(view))
}

/// The backend has no single-invoice query; the pending list is filtered here
#[get("/invoices/{invoice_id}")]
pub async fn invoice_details(
    path: web::Path<String>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let id = parse_id(&path)?;
    let invoices = backend(client(&clients, &identity)?.get_pending_invoices().await?)?;

    let invoice = invoices
        .into_iter()
        .find(|invoice| invoice.id == id)
        .ok_or_else(|| ApiError::NotFound(format!("no pending invoice {}", id)))?;
    Ok(HttpResponse::Ok().json(InvoiceView::from(invoice)))
}

#[delete("/invoices")]
pub async fn delete_invoices(
    body: web::Json<DeleteInvoicesRequest>,
    identity: web::ReqData<StoredIdentity>,
    clients: web::Data<dyn ClientFactory>,
) -> Result<HttpResponse, ApiError> {
    let ids = body.ids.iter().map(|id| parse_id(id)).collect::<Result<Vec<_>, _>>()?;
    let count = ids.len();

    client(&clients, &identity)?.delete_pending_invoices(ids).await?;
    tracing::info!("Deleted {} pending invoices", count);
    Ok(HttpResponse::NoContent().finish())
}
