//! HTTP API: dispatch a scrape, list spiders, list catalog products.
//!
//! All responses use the `{success, message, data}` envelope. The scraper
//! endpoint acknowledges immediately; the scrape outcome is observable
//! only through logs and the catalog itself.

use crate::catalog::{Catalog, ProductFilter, ProductPage};
use crate::config::ScraperConfig;
use crate::error::ScrapeError;
use crate::jobs;
use crate::spiders::{SpiderKind, SpiderOverrides};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ScraperConfig>,
    pub catalog: Catalog,
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

fn success<T: Serialize>(message: &str, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: message.to_string(),
        data: Some(data),
    })
}

fn failure(message: String) -> Json<ApiResponse<Value>> {
    Json(ApiResponse {
        success: false,
        message,
        data: None,
    })
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/products", get(list_products))
        .route("/api/spiders", get(list_spiders))
        .route("/api/scraper/run", post(run_scraper))
        .with_state(state)
}

pub async fn serve(address: &str, state: AppState) -> Result<(), ScrapeError> {
    let listener = tokio::net::TcpListener::bind(address).await?;
    log::info!("Listening on {}", address);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct RunSpiderBody {
    spider_type: String,
    #[serde(default)]
    start_url: Option<String>,
}

async fn run_scraper(
    State(state): State<AppState>,
    Json(body): Json<RunSpiderBody>,
) -> Result<Json<ApiResponse<Value>>, (StatusCode, Json<ApiResponse<Value>>)> {
    let kind: SpiderKind = body
        .spider_type
        .parse()
        .map_err(|e: ScrapeError| (StatusCode::BAD_REQUEST, failure(e.to_string())))?;

    let overrides = SpiderOverrides {
        start_urls: body.start_url.map(|url| vec![url]),
    };

    let (job_id, _handle) = jobs::dispatch(
        Arc::clone(&state.config),
        state.catalog.clone(),
        kind,
        overrides,
    );

    Ok(success(
        "Spider job dispatched successfully",
        json!({
            "spider_type": kind.as_str(),
            "spider_name": kind.display_name(),
            "job_id": job_id,
            "background": true,
            "status": "queued",
        }),
    ))
}

async fn list_spiders() -> Json<ApiResponse<BTreeMap<&'static str, &'static str>>> {
    let spiders: BTreeMap<_, _> = SpiderKind::available()
        .into_iter()
        .map(|kind| (kind.as_str(), kind.display_name()))
        .collect();

    success("Spiders retrieved successfully", spiders)
}

async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<ApiResponse<ProductPage>>, (StatusCode, Json<ApiResponse<Value>>)> {
    match state.catalog.list_products(&filter).await {
        Ok(page) => Ok(success("Products retrieved successfully", page)),
        Err(e) => {
            log::error!("Failed to list products: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                failure("Failed to retrieve products".to_string()),
            ))
        }
    }
}
