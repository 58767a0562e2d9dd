//! Read-only HTTP API served next to the WebSocket listener.

use crate::content::DanmakuKind;
use crate::context::ReadOnlyView;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use stagehand_core::messages::ReversalEntry;
use stagehand_core::{PresentationSnapshot, StageError, StageResult};
use std::future::Future;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// Items returned by the per-streamer and per-topic list routes.
const LIST_LIMIT: usize = 10;
/// Quotes returned by `/api/anti_fan_quotes`.
const QUOTE_COUNT: usize = 3;

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    #[serde(default)]
    term: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct NameQuery {
    #[serde(default)]
    name: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct DanmakuQuery {
    #[serde(default)]
    name: String,
    #[serde(default, rename = "type")]
    kind: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct EventQuery {
    #[serde(default)]
    event: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct HealthResponse {
    status: &'static str,
    controllers: usize,
    viewers: usize,
    store: String,
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: &'static str,
    pub message: String,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(&'static str),
    Content(StageError),
}

impl From<StageError> for ApiError {
    fn from(err: StageError) -> Self {
        Self::Content(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, "invalid_request", message.to_string())
            }
            ApiError::Content(e) => match e.root() {
                StageError::StoreUnavailable(_) => {
                    (StatusCode::SERVICE_UNAVAILABLE, "store_unavailable", e.to_string())
                }
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "store_error", e.to_string()),
            },
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn logged<T>(route: &'static str, res: StageResult<Vec<T>>) -> ApiResult<Vec<T>> {
    match res {
        Ok(items) => {
            debug!(route, n = items.len(), "http content served");
            Ok(Json(items))
        }
        Err(e) => {
            warn!(route, error = %e, "http content query failed");
            Err(e.into())
        }
    }
}

/// GET /api/search_streamers?term=
async fn search_streamers(
    State(view): State<ReadOnlyView>,
    Query(query): Query<SearchQuery>,
) -> Json<Vec<String>> {
    let term = query.term.trim();
    if term.is_empty() {
        return Json(Vec::new());
    }
    let results = view
        .content()
        .search_streamers(term, view.search_limit())
        .await
        .unwrap_or_else(|e| {
            warn!(term, error = %e, "http search failed");
            Vec::new()
        });
    Json(results)
}

/// GET /api/streamer_danmaku?name=&type=welcome|roast
async fn streamer_danmaku(
    State(view): State<ReadOnlyView>,
    Query(query): Query<DanmakuQuery>,
) -> ApiResult<Vec<String>> {
    let name = query.name.trim();
    let kind = DanmakuKind::parse(&query.kind.trim().to_lowercase());
    let (false, Some(kind)) = (name.is_empty(), kind) else {
        return Err(ApiError::BadRequest("'name' and a 'type' of welcome or roast are required"));
    };
    logged(
        "streamer_danmaku",
        view.content().danmaku_for_streamer(name, kind, LIST_LIMIT).await,
    )
}

/// GET /api/streamer_reversal_copy?name=
async fn streamer_reversal_copy(
    State(view): State<ReadOnlyView>,
    Query(query): Query<NameQuery>,
) -> ApiResult<Vec<ReversalEntry>> {
    let name = query.name.trim();
    if name.is_empty() {
        return Err(ApiError::BadRequest("'name' is required"));
    }
    logged("streamer_reversal_copy", view.content().reversal(name, LIST_LIMIT).await)
}

/// GET /api/streamer_social_topics?name=
async fn streamer_social_topics(
    State(view): State<ReadOnlyView>,
    Query(query): Query<NameQuery>,
) -> ApiResult<Vec<String>> {
    let topic = query.name.trim();
    if topic.is_empty() {
        return Err(ApiError::BadRequest("'name' (topic name) is required"));
    }
    logged("streamer_social_topics", view.content().captions(topic, LIST_LIMIT).await)
}

/// GET /api/reversal_copy?name=
///
/// Lenient form of `streamer_reversal_copy`: a blank name yields `[]`.
async fn reversal_copy(
    State(view): State<ReadOnlyView>,
    Query(query): Query<NameQuery>,
) -> ApiResult<Vec<ReversalEntry>> {
    let name = query.name.trim();
    if name.is_empty() {
        return Ok(Json(Vec::new()));
    }
    logged("reversal_copy", view.content().reversal(name, LIST_LIMIT).await)
}

/// GET /api/generated_captions?event=
async fn generated_captions(
    State(view): State<ReadOnlyView>,
    Query(query): Query<EventQuery>,
) -> ApiResult<Vec<String>> {
    let event = query.event.trim();
    if event.is_empty() {
        return Ok(Json(Vec::new()));
    }
    logged("generated_captions", view.content().captions(event, LIST_LIMIT).await)
}

/// GET /api/anti_fan_quotes
async fn anti_fan_quotes(State(view): State<ReadOnlyView>) -> ApiResult<Vec<String>> {
    logged("anti_fan_quotes", view.content().anti_fan_quotes(QUOTE_COUNT).await)
}

/// GET /api/state
async fn state(State(view): State<ReadOnlyView>) -> Json<PresentationSnapshot> {
    Json(view.snapshot().await)
}

/// GET /api/health
async fn health(State(view): State<ReadOnlyView>) -> Json<HealthResponse> {
    let (controllers, viewers) = view.counts().await;
    let store = view.content().handle();
    Json(HealthResponse {
        status: if store.is_connected() { "ok" } else { "degraded" },
        controllers,
        viewers,
        store: store.status().to_string(),
    })
}

pub fn router(view: ReadOnlyView) -> Router {
    Router::new()
        .route("/api/search_streamers", get(search_streamers))
        .route("/api/streamer_danmaku", get(streamer_danmaku))
        .route("/api/streamer_reversal_copy", get(streamer_reversal_copy))
        .route("/api/streamer_social_topics", get(streamer_social_topics))
        .route("/api/reversal_copy", get(reversal_copy))
        .route("/api/generated_captions", get(generated_captions))
        .route("/api/anti_fan_quotes", get(anti_fan_quotes))
        .route("/api/state", get(state))
        .route("/api/health", get(health))
        .with_state(view)
}

/// Serve until `shutdown` resolves.
pub async fn serve<F>(listener: TcpListener, view: ReadOnlyView, shutdown: F) -> StageResult<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "http api listening");
    }
    axum::serve(listener, router(view))
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::StoreHandle;
    use crate::session::Connection;
    use crate::testutil::{test_context, test_context_with};
    use stagehand_core::ClientRole;

    fn query(term: &str) -> Query<SearchQuery> {
        Query(SearchQuery {
            term: term.to_string(),
        })
    }

    #[tokio::test]
    async fn search_returns_names_or_nothing() {
        let (ctx, _dir) = test_context();
        let Json(found) = search_streamers(State(ctx.read_only()), query("老")).await;
        assert_eq!(found, vec!["老王"]);
        let Json(blank) = search_streamers(State(ctx.read_only()), query("  ")).await;
        assert!(blank.is_empty());

        let (offline, _dir2) = test_context_with(StoreHandle::Disconnected {
            reason: "offline".into(),
        });
        let Json(none) = search_streamers(State(offline.read_only()), query("老")).await;
        assert!(none.is_empty());
    }

    fn name(n: &str) -> Query<NameQuery> {
        Query(NameQuery { name: n.to_string() })
    }

    fn status_of<T: std::fmt::Debug>(res: ApiResult<T>) -> StatusCode {
        res.expect_err("expected an error response").into_response().status()
    }

    #[tokio::test]
    async fn streamer_danmaku_validates_and_serves() {
        let (ctx, _dir) = test_context();
        let ask = |name: &str, kind: &str| {
            Query(DanmakuQuery {
                name: name.to_string(),
                kind: kind.to_string(),
            })
        };
        let Json(mut found) = streamer_danmaku(State(ctx.read_only()), ask("老王", "Welcome"))
            .await
            .unwrap();
        found.sort();
        assert_eq!(found, vec!["欢迎老王1", "欢迎老王2"]);

        let Json(none) = streamer_danmaku(State(ctx.read_only()), ask("nobody", "roast"))
            .await
            .unwrap();
        assert!(none.is_empty());

        let bad = streamer_danmaku(State(ctx.read_only()), ask("老王", "hype")).await;
        assert_eq!(status_of(bad), StatusCode::BAD_REQUEST);
        let bad = streamer_danmaku(State(ctx.read_only()), ask(" ", "welcome")).await;
        assert_eq!(status_of(bad), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn reversal_and_topic_routes() {
        let (ctx, _dir) = test_context();
        let Json(entries) = streamer_reversal_copy(State(ctx.read_only()), name("老王"))
            .await
            .unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].read_part, "r1");
        let missing = streamer_reversal_copy(State(ctx.read_only()), name("")).await;
        assert_eq!(status_of(missing), StatusCode::BAD_REQUEST);

        // The lenient route answers a blank name with an empty list.
        let Json(lenient) = reversal_copy(State(ctx.read_only()), name("")).await.unwrap();
        assert!(lenient.is_empty());
        let Json(same) = reversal_copy(State(ctx.read_only()), name("老王")).await.unwrap();
        assert_eq!(same, entries);

        let Json(topics) = streamer_social_topics(State(ctx.read_only()), name("天气"))
            .await
            .unwrap();
        assert!(!topics.is_empty());
        let missing = streamer_social_topics(State(ctx.read_only()), name(" ")).await;
        assert_eq!(status_of(missing), StatusCode::BAD_REQUEST);

        let event = |e: &str| Query(EventQuery { event: e.to_string() });
        let Json(captions) = generated_captions(State(ctx.read_only()), event("天气"))
            .await
            .unwrap();
        assert_eq!(captions.len(), topics.len());
        let Json(blank) = generated_captions(State(ctx.read_only()), event("")).await.unwrap();
        assert!(blank.is_empty());
    }

    #[tokio::test]
    async fn quotes_are_capped() {
        let (ctx, _dir) = test_context();
        let Json(quotes) = anti_fan_quotes(State(ctx.read_only())).await.unwrap();
        assert!(!quotes.is_empty());
        assert!(quotes.len() <= QUOTE_COUNT);
    }

    #[tokio::test]
    async fn disconnected_store_is_service_unavailable() {
        let (offline, _dir) = test_context_with(StoreHandle::Disconnected {
            reason: "offline".into(),
        });
        let res = anti_fan_quotes(State(offline.read_only())).await;
        assert_eq!(status_of(res), StatusCode::SERVICE_UNAVAILABLE);
        let res = streamer_reversal_copy(State(offline.read_only()), name("老王")).await;
        assert_eq!(status_of(res), StatusCode::SERVICE_UNAVAILABLE);
        // Validation still comes first.
        let res = streamer_social_topics(State(offline.read_only()), name("")).await;
        assert_eq!(status_of(res), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn health_reports_counts_and_store() {
        let (ctx, _dir) = test_context();
        let (conn, _rx) = Connection::channel_pair(1);
        ctx.registry.register(&conn, ClientRole::Viewer).await;

        let Json(report) = health(State(ctx.read_only())).await;
        assert_eq!(
            report,
            HealthResponse {
                status: "ok",
                controllers: 0,
                viewers: 1,
                store: "connected".to_string(),
            }
        );

        let (offline, _dir2) = test_context_with(StoreHandle::Disconnected {
            reason: "offline".into(),
        });
        let Json(report) = health(State(offline.read_only())).await;
        assert_eq!(report.status, "degraded");
        assert_eq!(report.store, "disconnected");
    }

    #[tokio::test]
    async fn state_reflects_the_shared_machine() {
        let (ctx, _dir) = test_context();
        ctx.state
            .lock()
            .await
            .start_roast("小明", vec!["a，b".to_string()])
            .unwrap();
        let Json(snapshot) = state(State(ctx.read_only())).await;
        assert!(snapshot.is_roast_mode);
        assert_eq!(snapshot.current_roast_target.as_deref(), Some("小明"));
    }
}
