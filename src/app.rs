use std::{sync::Arc, time::SystemTime};

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use time::{format_description::well_known::Rfc3339, OffsetDateTime};
use tower_http::cors::CorsLayer;
use tracing::{error, info, info_span, Instrument};
use uuid::Uuid;

use crate::{
    aggregator::{PriceTableInfo, ValuationAggregator, ValuationError},
    domain::ValuationResult,
    infra::CacheStatus,
    util::version,
};

#[derive(Clone)]
pub struct AppState {
    aggregator: Arc<ValuationAggregator>,
}

impl AppState {
    pub fn new(aggregator: ValuationAggregator) -> Self {
        Self {
            aggregator: Arc::new(aggregator),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/api/player/:user_id", get(player_valuation))
        .route("/api/clearCache", post(clear_cache))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PlayerResponse {
    success: bool,
    #[serde(flatten)]
    valuation: ValuationResult,
    price_table: PriceTableBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PriceTableBody {
    status: CacheStatus,
    fetched_at: Option<String>,
}

impl From<PriceTableInfo> for PriceTableBody {
    fn from(info: PriceTableInfo) -> Self {
        Self {
            status: info.status,
            fetched_at: format_timestamp(info.fetched_at),
        }
    }
}

fn format_timestamp(time: SystemTime) -> Option<String> {
    OffsetDateTime::from(time).format(&Rfc3339).ok()
}

async fn index() -> String {
    version::banner()
}

async fn player_valuation(
    State(state): State<AppState>,
    Path(raw_user_id): Path<String>,
) -> Result<Json<PlayerResponse>, ApiError> {
    let span = info_span!("player", request_id = %Uuid::new_v4(), user_id = %raw_user_id);
    async move {
        let report = state.aggregator.compute_valuation(&raw_user_id).await?;
        info!(
            total_value = report.valuation.total_value,
            total_rap = report.valuation.total_rap,
            items = report.valuation.items.len(),
            price_table = ?report.price_table.status,
            "player valued"
        );
        Ok::<_, ApiError>(Json(PlayerResponse {
            success: true,
            valuation: report.valuation,
            price_table: report.price_table.into(),
        }))
    }
    .instrument(span)
    .await
}

async fn clear_cache(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.aggregator.price_cache().invalidate().await;
    Json(serde_json::json!({ "ok": true }))
}

#[derive(Debug)]
pub struct ApiError(ValuationError);

impl From<ValuationError> for ApiError {
    fn from(err: ValuationError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            ValuationError::InvalidUserId(_) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "success": false, "error": "invalid user id" }),
            ),
            ValuationError::UpstreamUnavailable { call, .. } => (
                StatusCode::BAD_GATEWAY,
                serde_json::json!({
                    "success": false,
                    "error": "upstream error",
                    "upstream": call.as_str(),
                }),
            ),
            ValuationError::Internal(detail) => {
                error!(%detail, "internal error while valuing player");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    serde_json::json!({ "success": false, "error": "internal error" }),
                )
            }
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        AssetTypeId, CatalogPrices, Collectible, OwnedAccessory, OwnedBundle, PriceTable,
        PriceTableEntry, UserId,
    };
    use crate::infra::{PriceTableCache, PriceTableSource, UpstreamClient, UpstreamError};
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use tower::ServiceExt;

    struct StubUpstream {
        collectibles_down: bool,
    }

    #[async_trait]
    impl UpstreamClient for StubUpstream {
        async fn fetch_collectibles(&self, _: UserId) -> Result<Vec<Collectible>, UpstreamError> {
            if self.collectibles_down {
                return Err(UpstreamError::Api("inventory offline".into()));
            }
            Ok(vec![Collectible {
                asset_id: "100".into(),
                name: "Domino Crown".into(),
                rap: Some(500),
            }])
        }

        async fn fetch_bundles(&self, _: UserId) -> Result<Vec<OwnedBundle>, UpstreamError> {
            Ok(vec![OwnedBundle {
                id: "192".into(),
                name: "Korblox Deathspeaker".into(),
            }])
        }

        async fn fetch_accessories(
            &self,
            _: UserId,
            _: AssetTypeId,
        ) -> Result<Vec<OwnedAccessory>, UpstreamError> {
            Ok(vec![OwnedAccessory {
                asset_id: 55,
                name: "Offsale Cap".into(),
            }])
        }

        async fn fetch_catalog_prices(&self, _: &[u64]) -> Result<CatalogPrices, UpstreamError> {
            Ok(CatalogPrices::new())
        }
    }

    #[derive(Default)]
    struct StubValues {
        fetches: AtomicUsize,
        down: AtomicBool,
    }

    #[async_trait]
    impl PriceTableSource for StubValues {
        async fn fetch_price_table(&self) -> Result<PriceTable, UpstreamError> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if self.down.load(Ordering::SeqCst) {
                return Err(UpstreamError::Api("values offline".into()));
            }
            Ok([(
                "100".to_string(),
                PriceTableEntry { value: Some(700) },
            )]
            .into_iter()
            .collect())
        }
    }

    fn app_with(collectibles_down: bool, values: Arc<StubValues>) -> Router {
        let cache = PriceTableCache::with_ttl(
            values as Arc<dyn PriceTableSource>,
            crate::infra::cache::DEFAULT_TTL,
        );
        let aggregator =
            ValuationAggregator::new(Arc::new(StubUpstream { collectibles_down }), cache);
        build_app(AppState::new(aggregator))
    }

    async fn read_json(res: Response) -> Value {
        let bytes = axum::body::to_bytes(res.into_body(), 1024 * 1024)
            .await
            .expect("read body");
        serde_json::from_slice(&bytes).expect("json")
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn player_route_returns_breakdown() {
        let app = app_with(false, Arc::new(StubValues::default()));
        let res = app.oneshot(get("/api/player/261")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);

        let body = read_json(res).await;
        assert_eq!(body["success"], json!(true));
        assert_eq!(body["userId"], json!("261"));
        assert_eq!(body["totalValue"], json!(17_700));
        assert_eq!(body["totalRap"], json!(500));
        assert_eq!(
            body["items"],
            json!([
                {"id": "100", "name": "Domino Crown", "category": "Limited", "rap": 500, "value": 700, "valueSource": "priceTable"},
                {"id": "192", "name": "Korblox Deathspeaker", "category": "Bundle", "value": 17000}
            ])
        );
        assert_eq!(body["priceTable"]["status"], json!("fresh"));
        assert!(body["priceTable"]["fetchedAt"].is_string());
    }

    #[tokio::test]
    async fn invalid_user_id_is_bad_request() {
        let app = app_with(false, Arc::new(StubValues::default()));
        let res = app.oneshot(get("/api/player/abc")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = read_json(res).await;
        assert_eq!(body["success"], json!(false));
    }

    #[tokio::test]
    async fn upstream_failure_is_bad_gateway() {
        let app = app_with(true, Arc::new(StubValues::default()));
        let res = app.oneshot(get("/api/player/5")).await.unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        let body = read_json(res).await;
        assert_eq!(body["upstream"], json!("collectibles"));
    }

    #[tokio::test]
    async fn price_table_failure_is_bad_gateway() {
        let values = Arc::new(StubValues::default());
        values.down.store(true, Ordering::SeqCst);
        let res = app_with(false, values)
            .oneshot(get("/api/player/5"))
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(read_json(res).await["upstream"], json!("price_table"));
    }

    #[tokio::test]
    async fn internal_error_is_500_without_detail() {
        let res = ApiError(ValuationError::Internal("task panicked".into())).into_response();
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let body = read_json(res).await;
        assert_eq!(body["error"], json!("internal error"));
    }

    #[tokio::test]
    async fn clear_cache_forces_refetch() {
        let values = Arc::new(StubValues::default());
        let app = app_with(false, values.clone());

        app.clone().oneshot(get("/api/player/1")).await.unwrap();
        app.clone().oneshot(get("/api/player/1")).await.unwrap();
        assert_eq!(values.fetches.load(Ordering::SeqCst), 1);

        let res = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/clearCache")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(read_json(res).await, json!({"ok": true}));

        app.oneshot(get("/api/player/1")).await.unwrap();
        assert_eq!(values.fetches.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn index_reports_version() {
        let app = app_with(false, Arc::new(StubValues::default()));
        let res = app.oneshot(get("/")).await.unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(res.into_body(), 1024).await.unwrap();
        let text = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(text.contains(version::APP_NAME));
    }

    #[test]
    fn timestamps_are_rfc3339() {
        let formatted = format_timestamp(SystemTime::UNIX_EPOCH).unwrap();
        assert_eq!(formatted, "1970-01-01T00:00:00Z");
    }
}
