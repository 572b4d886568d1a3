use crate::state::AppState;
use axum::middleware;
use axum::{
    routing::{get, post},
    Json, Router,
};

pub mod conversations;
use conversations::{create_conversation, list_conversations, mark_as_read};
pub mod messages;
use messages::{get_message_history, send_message};

// OpenAPI endpoint handler
async fn openapi_json() -> Json<serde_json::Value> {
    use utoipa::OpenApi;
    Json(serde_json::to_value(crate::openapi::ApiDoc::openapi()).unwrap_or_default())
}

// Swagger UI handler
async fn swagger_ui() -> axum::response::Html<&'static str> {
    axum::response::Html(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <title>Worklink Chat Service API</title>
    <link rel="stylesheet" type="text/css" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
    <div id="swagger-ui"></div>
    <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
    <script>
        window.onload = function() {
            SwaggerUIBundle({
                url: "/openapi.json",
                dom_id: '#swagger-ui',
                deepLinking: true,
            });
        };
    </script>
</body>
</html>"#,
    )
}

// Documentation entry point
async fn docs() -> axum::response::Html<&'static str> {
    axum::response::Html(
        r#"<!DOCTYPE html>
<html>
<head><title>Worklink Chat Service API</title></head>
<body>
    <h1>Worklink Chat Service API</h1>
    <ul>
        <li><a href="/swagger-ui">Swagger UI (interactive)</a></li>
        <li><a href="/openapi.json">OpenAPI JSON (raw)</a></li>
    </ul>
</body>
</html>"#,
    )
}

pub fn build_router(state: AppState) -> Router {
    // Service introspection endpoints (public for healthchecks and scrapes)
    let introspection = Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/metrics", get(crate::metrics::metrics_handler))
        .route("/openapi.json", get(openapi_json))
        .route("/swagger-ui", get(swagger_ui))
        .route("/docs", get(docs));

    // API v1: all business routes behind bearer authentication
    let api_v1 = Router::new()
        .route(
            "/conversations",
            post(create_conversation).get(list_conversations),
        )
        .route(
            "/conversations/:id/messages",
            get(get_message_history).post(send_message),
        )
        .route("/conversations/:id/read", post(mark_as_read))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::auth::auth_middleware,
        ));

    // The realtime gateway authenticates during its own handshake (query
    // token or Authorization header), so /ws sits outside the HTTP auth
    // layer.
    Router::new()
        .merge(introspection)
        .nest("/api/v1", api_v1)
        .route("/ws", get(crate::websocket::handlers::ws_handler))
        .layer(middleware::from_fn(crate::metrics::track_http_metrics))
        .with_state(state)
}
