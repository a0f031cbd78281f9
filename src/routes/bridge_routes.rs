use actix_web::{get, post, web, HttpResponse, Responder};
use tracing::{info, warn};

use crate::bridge::{self, BridgeCall};
use crate::coordinator::PrintCoordinator;
use crate::errors::AppError;

#[post("/exec")]
pub async fn exec(
    coordinator: web::Data<PrintCoordinator>,
    body: web::Json<BridgeCall>,
) -> Result<HttpResponse, AppError> {
    let call = body.into_inner();
    if call.callback_id.trim().is_empty() {
        warn!("Bridge call {} missing callbackId", call.method);
        return Err(AppError::Web("callbackId is required".to_string()));
    }

    info!("Bridge call {} ({})", call.method, call.callback_id);
    let response = bridge::dispatch(&coordinator, call).await;
    Ok(HttpResponse::Ok().json(response))
}

#[get("/health")]
pub async fn health(coordinator: web::Data<PrintCoordinator>) -> impl Responder {
    HttpResponse::Ok().json(serde_json::json!({
        "ok": true,
        "state": coordinator.state(),
        "session": coordinator.active_session()
    }))
}
