//! Thin HTTP wiring for the rotation trigger, force-rotation trigger,
//! health checks, and the JWKS endpoint (§6, §10, §11). No authentication,
//! OpenAPI generation, or request-tracing interceptors are added here;
//! those are out of scope.

use std::sync::Arc;
use std::time::Duration;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use http::StatusCode;

use jvs_core::{JvsError, JwksCache};
use jvs_kms::KmsAdapter;
use jvs_rotation::{RotationPolicy, rotate_all};

pub struct AppState {
    pub adapter: Box<dyn KmsAdapter>,
    pub key_names: Vec<String>,
    pub rotation_policy: RotationPolicy,
    pub jwks_cache: JwksCache,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(route_rotate))
        .route("/rotate/force", post(route_rotate_force))
        .route("/health", get(route_health))
        .route("/healthz", get(route_health))
        .route("/.well-known/jwks", get(route_jwks))
        .with_state(state)
}

async fn route_health() -> StatusCode {
    StatusCode::OK
}

async fn route_jwks(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.jwks_cache.get(state.adapter.as_ref()).await {
        Ok(document) => (
            StatusCode::OK,
            [(http::header::CONTENT_TYPE, "application/json")],
            document,
        )
            .into_response(),
        Err(error) => error.into_response(),
    }
}

/// Performs one planning+execution cycle for every configured key, using
/// the ordinary `RotationAge` gate.
async fn route_rotate(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, JvsError> {
    perform_rotation(state, false).await
}

/// Same as `route_rotate`, but plans every configured key with the
/// force-rotation override (§4.C, §10): the current primary is treated as
/// already past `RotationAge` regardless of its actual age. This is the
/// operator-reachable entry point for an out-of-band rotation.
async fn route_rotate_force(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, JvsError> {
    perform_rotation(state, true).await
}

/// Rotates every configured key, aggregating partial failures across keys
/// into a `RotationBatchFailure` (every key is attempted regardless of
/// earlier ones' outcomes), then invalidates the JWKS cache so a rotation
/// that changed which versions are `Enabled` is reflected immediately
/// rather than after the cache's TTL elapses.
async fn perform_rotation(
    state: Arc<AppState>,
    force: bool,
) -> Result<Json<serde_json::Value>, JvsError> {
    let now = chrono::Utc::now();
    rotate_all(
        state.adapter.as_ref(),
        &state.key_names,
        &state.rotation_policy,
        now,
        force,
    )
    .await?;

    state.jwks_cache.invalidate();
    Ok(Json(serde_json::json!({})))
}

#[cfg(test)]
mod tests {
    use super::*;
    use jvs_kms::VersionState;
    use jvs_kms::adapter::fake::FakeKmsAdapter;
    use tower::ServiceExt;

    const KEY: &str = "projects/p/locations/l/keyRings/r/cryptoKeys/k";

    fn policy() -> RotationPolicy {
        RotationPolicy::try_new(
            chrono::Duration::minutes(10),
            chrono::Duration::minutes(5),
            chrono::Duration::minutes(5),
            chrono::Duration::minutes(2),
        )
        .unwrap()
    }

    fn state_with(adapter: FakeKmsAdapter) -> Arc<AppState> {
        Arc::new(AppState {
            adapter: Box::new(adapter),
            key_names: vec![KEY.to_string()],
            rotation_policy: policy(),
            jwks_cache: JwksCache::new(vec![KEY.to_string()], Duration::from_secs(300)),
        })
    }

    #[tokio::test]
    async fn health_always_returns_200() {
        let app = build_router(state_with(FakeKmsAdapter::new()));
        let response = app
            .oneshot(
                http::Request::builder()
                    .uri("/health")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rotate_bootstraps_a_key_with_no_versions() {
        let app = build_router(state_with(FakeKmsAdapter::new()));
        let response = app
            .oneshot(
                http::Request::builder()
                    .uri("/")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn force_rotate_route_rotates_a_fresh_primary() {
        let adapter = FakeKmsAdapter::new();
        let v1 = adapter.seed_version(KEY, "1", VersionState::Enabled, chrono::Utc::now());
        jvs_kms::label::set_primary(&adapter, KEY, &v1).await.unwrap();
        let app = build_router(state_with(adapter));

        let response = app
            .oneshot(
                http::Request::builder()
                    .method(http::Method::POST)
                    .uri("/rotate/force")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn jwks_endpoint_serves_the_cached_document() {
        let adapter = FakeKmsAdapter::new();
        adapter.seed_version(KEY, "1", VersionState::Enabled, chrono::Utc::now());
        let app = build_router(state_with(adapter));

        let response = app
            .oneshot(
                http::Request::builder()
                    .uri("/.well-known/jwks")
                    .body(axum::body::Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let document: jvs_core::JwksDocument = serde_json::from_slice(&body).unwrap();
        assert_eq!(document.keys.len(), 1);
    }
}
