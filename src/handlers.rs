use crate::advice::AdviceService;
use crate::config::Config;
use crate::db_storage::{ContactStorage, CreditStorage, WorksheetStorage};
use crate::errors::{AppError, ResultExt};
use crate::models::*;
use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, Query, State,
    },
    http::StatusCode,
    Json,
};
use serde_json::json;
use sqlx::PgPool;
use std::sync::Arc;

/// Shared application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: PgPool,
    /// Application configuration.
    pub config: Config,
    /// Daily advice cache in front of the text generator.
    pub advice: Arc<AdviceService>,
}

/// Unwraps a JSON body, turning syntax and type errors into a 400 with a JSON error body.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    let Json(value) = payload?;
    Ok(value)
}

/// Unwraps a numeric `:id` segment; non-numeric or out-of-range ids become a JSON 400.
fn path_id(path: Result<Path<i32>, PathRejection>) -> Result<i32, AppError> {
    let Path(id) = path?;
    Ok(id)
}

/// Health check endpoint.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "agro-finance-api",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// GET /api/consejo
///
/// Today's advice. When the generator fails the configured fallback text is served instead
/// and nothing is persisted, so the next request tries the generator again.
pub async fn get_daily_advice(State(state): State<Arc<AppState>>) -> Json<AdviceResponse> {
    let today = chrono::Local::now().date_naive();

    let consejo = match state.advice.get_advice(today).await {
        Ok(text) => text,
        Err(e) => {
            tracing::warn!("Advice generation failed, serving fallback: {}", e);
            state.config.advice_fallback.clone()
        }
    };

    Json(AdviceResponse {
        fecha: today,
        consejo,
    })
}

// ============ Credit simulations ============

/// POST /api/credito
pub async fn create_credit_simulation(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewCreditSimulation>, JsonRejection>,
) -> Result<(StatusCode, Json<CreditSimulation>), AppError> {
    let input = json_body(payload)?.validate()?;
    tracing::info!("POST /api/credito - applicant {}", input.national_id);

    let simulation = CreditStorage::new(state.db.clone())
        .create(input)
        .await
        .context("creating credit simulation")?;

    Ok((StatusCode::CREATED, Json(simulation)))
}

/// GET /api/credito?cedula=
pub async fn list_credit_simulations(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OwnerQuery>,
) -> Result<Json<Vec<CreditSimulation>>, AppError> {
    let cedula = params.require_owner()?;
    tracing::info!("GET /api/credito - cedula {}", cedula);

    let simulations = CreditStorage::new(state.db.clone())
        .list_by_owner(&cedula)
        .await
        .context("listing credit simulations")?;

    Ok(Json(simulations))
}

/// PUT /api/credito/:id
///
/// Only the supplied fields change; `valor_aprobado` is recomputed by the database.
pub async fn update_credit_simulation(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i32>, PathRejection>,
    payload: Result<Json<CreditSimulationPatch>, JsonRejection>,
) -> Result<Json<CreditSimulation>, AppError> {
    let id = path_id(path)?;
    let patch = json_body(payload)?;
    tracing::info!("PUT /api/credito/{}", id);

    let simulation = CreditStorage::new(state.db.clone())
        .update(id, patch)
        .await
        .with_context(|| format!("updating credit simulation {}", id))?;

    Ok(Json(simulation))
}

/// DELETE /api/credito/:id
pub async fn delete_credit_simulation(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i32>, PathRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id = path_id(path)?;
    tracing::info!("DELETE /api/credito/{}", id);

    CreditStorage::new(state.db.clone())
        .delete(id)
        .await
        .with_context(|| format!("deleting credit simulation {}", id))?;

    Ok(Json(DeleteResponse {
        mensaje: "Eliminado".to_string(),
    }))
}

// ============ Financial worksheets ============

/// POST /api/planilla
pub async fn create_worksheet(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewWorksheet>, JsonRejection>,
) -> Result<(StatusCode, Json<WorksheetView>), AppError> {
    let input = json_body(payload)?.validate()?;
    tracing::info!("POST /api/planilla - cedula {}", input.owner_id);

    let worksheet = WorksheetStorage::new(state.db.clone())
        .create(input)
        .await
        .context("creating worksheet")?;

    Ok((StatusCode::CREATED, Json(worksheet.into())))
}

/// GET /api/planilla?cedula=
pub async fn list_worksheets(
    State(state): State<Arc<AppState>>,
    Query(params): Query<OwnerQuery>,
) -> Result<Json<Vec<WorksheetView>>, AppError> {
    let cedula = params.require_owner()?;
    tracing::info!("GET /api/planilla - cedula {}", cedula);

    let worksheets = WorksheetStorage::new(state.db.clone())
        .list_by_owner(&cedula)
        .await
        .context("listing worksheets")?;

    Ok(Json(worksheets.into_iter().map(WorksheetView::from).collect()))
}

/// PUT /api/planilla/:id
pub async fn update_worksheet(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i32>, PathRejection>,
    payload: Result<Json<WorksheetPatch>, JsonRejection>,
) -> Result<Json<WorksheetView>, AppError> {
    let id = path_id(path)?;
    let patch = json_body(payload)?;
    tracing::info!("PUT /api/planilla/{}", id);

    let worksheet = WorksheetStorage::new(state.db.clone())
        .update(id, patch)
        .await
        .with_context(|| format!("updating worksheet {}", id))?;

    Ok(Json(worksheet.into()))
}

/// DELETE /api/planilla/:id
pub async fn delete_worksheet(
    State(state): State<Arc<AppState>>,
    path: Result<Path<i32>, PathRejection>,
) -> Result<Json<DeleteResponse>, AppError> {
    let id = path_id(path)?;
    tracing::info!("DELETE /api/planilla/{}", id);

    WorksheetStorage::new(state.db.clone())
        .delete(id)
        .await
        .with_context(|| format!("deleting worksheet {}", id))?;

    Ok(Json(DeleteResponse {
        mensaje: "Eliminada".to_string(),
    }))
}

// ============ Contact messages ============

/// POST /api/contacto
pub async fn create_contact_message(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<NewContactMessage>, JsonRejection>,
) -> Result<(StatusCode, Json<ContactMessage>), AppError> {
    let input = json_body(payload)?.validate()?;
    tracing::info!("POST /api/contacto");

    let contact = ContactStorage::new(state.db.clone())
        .create(input)
        .await
        .context("creating contact message")?;

    Ok((StatusCode::CREATED, Json(contact)))
}

/// GET /api/contacto
pub async fn list_contact_messages(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<ContactMessage>>, AppError> {
    let contacts = ContactStorage::new(state.db.clone())
        .list()
        .await
        .context("listing contact messages")?;

    Ok(Json(contacts))
}
