//! Liveness endpoint for hosting platforms: `GET /` -> `{"version": "..."}`.

use std::net::SocketAddr;

use axum::{response::Json, routing::get, Router};

pub fn build_router() -> Router {
    Router::new().route("/", get(version))
}

/// Serve the health router until the process exits. Run it from `tokio::spawn`.
pub async fn serve(port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "health endpoint listening");
    axum::serve(listener, build_router()).await?;
    Ok(())
}

async fn version() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "version": env!("CARGO_PKG_VERSION") }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use tower::ServiceExt;

    #[tokio::test]
    async fn root_reports_package_version() {
        let req = Request::builder()
            .uri("/")
            .body(Body::empty())
            .expect("request");

        let resp = build_router().oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::OK);

        let bytes = axum::body::to_bytes(resp.into_body(), 1024)
            .await
            .expect("body");
        let json: serde_json::Value = serde_json::from_slice(&bytes).expect("json");
        assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let req = Request::builder()
            .uri("/nope")
            .body(Body::empty())
            .expect("request");

        let resp = build_router().oneshot(req).await.expect("response");
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }
}
