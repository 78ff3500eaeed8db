//!
//! src/server.rs
//!
//! HTTP surface: `GET /?user=<name>` answers with the user's current track
//! as JSON. Every response carries a wildcard CORS origin so browser
//! widgets can poll it directly.
//!

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get
};
use serde::Deserialize;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tower_http::{set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::NowPlayingResolver;
use crate::config::ServerConfig;
use crate::errors::ResolverError;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    pub user: Option<String>
}

fn error_body(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn now_playing(
    State(resolver): State<Arc<NowPlayingResolver>>,
    Query(query): Query<UserQuery>
) -> Response {
    let Some(user) = query.user.filter(|u| !u.is_empty()) else {
        return error_body(StatusCode::BAD_REQUEST, "no user param specified");
    };

    match resolver.resolve(&user).await {
        Ok(track) => Json(track).into_response(),
        Err(e) => {
            error!(error = %e, user = %user, "server.resolve.failed");
            error_body(StatusCode::BAD_GATEWAY, &e.to_string())
        }
    }
}

pub fn router(resolver: Arc<NowPlayingResolver>) -> Router {
    Router::new()
        .route("/", get(now_playing))
        .layer(SetResponseHeaderLayer::overriding(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*")
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(resolver)
}

pub async fn serve(
    cfg: &ServerConfig,
    resolver: Arc<NowPlayingResolver>,
    shutdown: CancellationToken
) -> Result<(), ResolverError> {
    let listener = tokio::net::TcpListener::bind(cfg.bind_addr).await?;
    info!(addr = %cfg.bind_addr, "server.listen");

    axum::serve(listener, router(resolver))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    info!("server.stop");
    Ok(())
}
