use crate::errors::{GatewayError, Result};
use crate::models::{DisplayAdQuery, HealthResponse, UserQuery};
use actix_web::{web, HttpResponse};
use hourlymotion_ledger::{Event, Ledger, Settings};
use std::sync::Arc;

/// Health check endpoint
pub async fn health_check(ledger: web::Data<Arc<Ledger>>) -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy",
        service: env!("CARGO_PKG_NAME").to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        backend: ledger.storage().backend(),
        policy: ledger.policy().name(),
    })
}

/// Record a player engagement event
///
/// Anonymous events are accepted with 200 and not stored; events for a known
/// viewer are applied and answered with 201.
pub async fn store_event(
    ledger: web::Data<Arc<Ledger>>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let event: Event = serde_json::from_slice(&body)?;

    match ledger.record_event(&event).await? {
        Some(_) => Ok(HttpResponse::Created().finish()),
        None => Ok(HttpResponse::Ok().finish()),
    }
}

/// Decide whether the player should show an ad before the video
pub async fn display_ad(
    ledger: web::Data<Arc<Ledger>>,
    query: web::Query<DisplayAdQuery>,
) -> Result<HttpResponse> {
    let (user_xid, video_xid) = query.validate()?;

    let show_ad = ledger.decide(user_xid).await?;
    tracing::debug!(user_xid, video_xid, display = show_ad, "Gating decision");

    Ok(HttpResponse::Ok()
        .content_type("text/plain; charset=utf-8")
        .body(show_ad.to_string()))
}

/// Every user record
pub async fn admin_data(ledger: web::Data<Arc<Ledger>>) -> Result<HttpResponse> {
    let records = ledger.list_all().await?;
    Ok(HttpResponse::Ok().json(records))
}

/// One user record
pub async fn user_data(
    ledger: web::Data<Arc<Ledger>>,
    query: web::Query<UserQuery>,
) -> Result<HttpResponse> {
    let user_xid = query.user_xid()?;

    match ledger.get_user(user_xid).await? {
        Some(record) => Ok(HttpResponse::Ok().json(record)),
        None => Err(GatewayError::NotFound(user_xid.to_string())),
    }
}

/// Replace a user's settings
///
/// A `null` body clears them.
pub async fn user_settings(
    ledger: web::Data<Arc<Ledger>>,
    query: web::Query<UserQuery>,
    body: web::Bytes,
) -> Result<HttpResponse> {
    let user_xid = query.user_xid()?;
    let settings: Option<Settings> = serde_json::from_slice(&body)?;

    ledger
        .update_settings(user_xid, settings.unwrap_or_default())
        .await?;
    Ok(HttpResponse::Created().finish())
}

/// Prometheus metrics endpoint
pub async fn metrics_endpoint(ledger: web::Data<Arc<Ledger>>) -> Result<HttpResponse> {
    let body = ledger
        .metrics()
        .render()
        .map_err(|e| GatewayError::Internal(format!("failed to gather metrics: {}", e)))?;

    Ok(HttpResponse::Ok()
        .content_type("text/plain; version=0.0.4")
        .body(body))
}

/// Configure routes
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/event", web::post().to(store_event))
        .route("/displayAd", web::get().to(display_ad))
        .route("/admin-data", web::get().to(admin_data))
        .route("/user-data", web::get().to(user_data))
        .route("/user-settings", web::post().to(user_settings))
        .route("/metrics", web::get().to(metrics_endpoint))
        .route("/health", web::get().to(health_check));
}
