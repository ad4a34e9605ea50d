use crate::handlers::{self, AppState};
use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Largest accepted request body; the forms post a few hundred bytes.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Serves the OpenAPI specification YAML file.
///
/// Reads `openapi.yml` from the working directory; 404 when it is absent.
async fn serve_openapi_spec() -> impl IntoResponse {
    match tokio::fs::read_to_string("openapi.yml").await {
        Ok(content) => (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "text/yaml")],
            content,
        )
            .into_response(),
        Err(_) => (StatusCode::NOT_FOUND, "OpenAPI spec not found").into_response(),
    }
}

/// Serves a Swagger UI page pointed at [`serve_openapi_spec`].
async fn serve_swagger_ui() -> impl IntoResponse {
    let html = r#"
<!DOCTYPE html>
<html lang="es">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>Agro Finance API - Swagger UI</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
    <style>
        body { margin: 0; padding: 0; }
    </style>
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-standalone-preset.js"></script>
    <script>
        window.onload = function() {
            window.ui = SwaggerUIBundle({
                url: "/api-docs/openapi.yml",
                dom_id: '#swagger-ui',
                deepLinking: true,
                presets: [
                    SwaggerUIBundle.presets.apis,
                    SwaggerUIStandalonePreset
                ],
                layout: "StandaloneLayout"
            });
        };
    </script>
</body>
</html>
"#;
    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "text/html; charset=utf-8")],
        html,
    )
}

/// Builds the full application router.
///
/// Contact messages expose create and list only; credit simulations and worksheets expose
/// the full create/list/update/delete set.
pub fn build_router(state: Arc<AppState>) -> Router {
    let api_routes = Router::new()
        .route(
            "/api/credito",
            get(handlers::list_credit_simulations).post(handlers::create_credit_simulation),
        )
        .route(
            "/api/credito/:id",
            put(handlers::update_credit_simulation).delete(handlers::delete_credit_simulation),
        )
        .route(
            "/api/planilla",
            get(handlers::list_worksheets).post(handlers::create_worksheet),
        )
        .route(
            "/api/planilla/:id",
            put(handlers::update_worksheet).delete(handlers::delete_worksheet),
        )
        .route(
            "/api/contacto",
            get(handlers::list_contact_messages).post(handlers::create_contact_message),
        )
        .route("/api/consejo", get(handlers::get_daily_advice))
        .layer(ServiceBuilder::new().layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES)));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/docs", get(serve_swagger_ui))
        .route("/api-docs/openapi.yml", get(serve_openapi_spec))
        .merge(api_routes)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
