use actix_web::{web, HttpResponse};
use metacatalog::{CancelFlag, CatalogError, Document};
use serde::{Deserialize, Deserializer};

use crate::AppState;

/// Configure all API routes. Entity routes come from the schema registry.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/health", web::get().to(health))
        .route("/{route}", web::get().to(list_documents))
        .route("/{route}", web::post().to(add_document))
        .route("/{route}/{id}", web::get().to(get_document))
        .route("/{route}/{id}", web::put().to(update_document));
}

// ── Helpers ─────────────────────────────────────────────────────────

fn ok_json(value: serde_json::Value) -> HttpResponse {
    HttpResponse::Ok().json(value)
}

fn unknown_route(route: &str) -> HttpResponse {
    HttpResponse::NotFound().json(serde_json::json!({
        "error": format!("Unknown route '/{route}'")
    }))
}

fn internal_error() -> HttpResponse {
    HttpResponse::InternalServerError().json(serde_json::json!({
        "error": "Internal server error"
    }))
}

fn err_response(e: CatalogError) -> HttpResponse {
    match &e {
        CatalogError::NotFound { .. } => HttpResponse::NotFound().json(serde_json::json!({
            "error": e.to_string()
        })),
        CatalogError::Validation(_) => {
            HttpResponse::UnprocessableEntity().json(serde_json::json!({
                "error": e.to_string()
            }))
        }
        CatalogError::AlreadyExists { .. } => HttpResponse::Conflict().json(serde_json::json!({
            "error": e.to_string()
        })),
        CatalogError::Cancelled => {
            log::debug!("Request dropped before embedding finished");
            internal_error()
        }
        _ => {
            log::error!("Internal error: {e}");
            internal_error()
        }
    }
}

fn body_document(body: serde_json::Value) -> Result<Document, HttpResponse> {
    Document::from_value(body).map_err(err_response)
}

/// Cancels an in-flight embedding when the request future is dropped
struct CancelOnDrop(CancelFlag);

impl Drop for CancelOnDrop {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

// ── Health ──────────────────────────────────────────────────────────

async fn health() -> HttpResponse {
    ok_json(serde_json::json!({ "status": "OK" }))
}

// ── Entity handlers ─────────────────────────────────────────────────

async fn list_documents(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let route = path.into_inner();
    let Some(handle) = state.catalog.route(&route) else {
        return unknown_route(&route);
    };
    match handle.list() {
        Ok(ids) => ok_json(serde_json::json!(ids)),
        Err(e) => err_response(e),
    }
}

#[derive(Deserialize)]
struct GetQuery {
    #[serde(default, deserialize_with = "query_flag")]
    embedded: bool,
}

/// Query-string boolean: `1/0`, `true/false`, `t/f`, `yes/no`, `y/n`,
/// `on/off`, in any case
fn query_flag<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
    let raw = String::deserialize(deserializer)?;
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Ok(false),
        _ => Err(serde::de::Error::custom(format!("invalid boolean '{raw}'"))),
    }
}

async fn get_document(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    query: web::Query<GetQuery>,
) -> HttpResponse {
    let (route, id) = path.into_inner();
    if state.catalog.route(&route).is_none() {
        return unknown_route(&route);
    }

    let cancel = CancelFlag::new();
    let _guard = CancelOnDrop(cancel.clone());
    let embedded = query.embedded;

    let result = web::block(move || {
        let handle = state
            .catalog
            .route(&route)
            .ok_or_else(|| CatalogError::Other(format!("unknown route '{route}'")))?;
        handle.get_cancellable(&id, embedded, &cancel)
    })
    .await;

    match result {
        Ok(Ok(document)) => ok_json(document.into_value()),
        Ok(Err(e)) => err_response(e),
        Err(e) => {
            log::error!("Blocking task failed: {e}");
            internal_error()
        }
    }
}

async fn add_document(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let route = path.into_inner();
    let Some(handle) = state.catalog.route(&route) else {
        return unknown_route(&route);
    };
    let document = match body_document(body.into_inner()) {
        Ok(document) => document,
        Err(response) => return response,
    };
    match handle.add(document) {
        Ok(added) => ok_json(added.into_value()),
        Err(e) => err_response(e),
    }
}

async fn update_document(
    state: web::Data<AppState>,
    path: web::Path<(String, String)>,
    body: web::Json<serde_json::Value>,
) -> HttpResponse {
    let (route, id) = path.into_inner();
    let Some(handle) = state.catalog.route(&route) else {
        return unknown_route(&route);
    };
    let partial = match body_document(body.into_inner()) {
        Ok(partial) => partial,
        Err(response) => return response,
    };
    match handle.update(&id, partial) {
        Ok(updated) => ok_json(updated.into_value()),
        Err(e) => err_response(e),
    }
}
