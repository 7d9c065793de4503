//! Web server for the quakescope dashboard.
//!
//! Provides the live dashboard using:
//! - Axum for HTTP server
//! - SSE (Server-Sent Events) to tell the page when to redraw, which tones
//!   to play and when to shake
//! - Leaflet + markercluster (2D) and Cesium (3D) in the page for drawing
//!
//! The server owns the two periodic timers: the incremental poll and the
//! playback tick. Each lives in a [`Timers`] slot and is aborted before it
//! is re-armed, so restarts never leave duplicate timers behind.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Json, Router,
    extract::State,
    response::{
        Html,
        sse::{Event, KeepAlive, Sse},
    },
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::BroadcastStream;

use crate::audio::{Tone, ToneEmitter};
use crate::client::{FeedQuery, FeedSource, TimeRange};
use crate::controller::{Dashboard, FetchOutcome, Filters, Status};
use crate::errors::{ApiError, QuakeError};
use crate::models::FeatureCollection;
use crate::playback::{Playback, PlaybackState, TICK_INTERVAL, TickOutcome};
use crate::render::{View, ViewMode};
use crate::stats::Snapshot;

/// Capacity of the broadcast channel for page notices.
const BROADCAST_CAPACITY: usize = 256;

/// Lower bound on the poll interval, to be polite to the upstream service.
pub const MIN_POLL_INTERVAL_SECS: u64 = 30;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
    /// Seconds between incremental updates
    pub poll_interval: u64,
    pub filters: Filters,
    /// Virtual time advanced per playback tick
    pub playback_step: chrono::Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            host: "127.0.0.1".to_string(),
            poll_interval: 300,
            filters: Filters::default(),
            playback_step: crate::playback::DEFAULT_STEP,
        }
    }
}

/// Messages pushed to every connected page.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Notice {
    /// State changed; fetch `/api/view` and `/api/status` again
    Refresh,
    /// Play this tone
    Tone(Tone),
    /// A significant event arrived
    Shake,
}

impl Notice {
    const fn name(&self) -> &'static str {
        match self {
            Self::Refresh => "refresh",
            Self::Tone(_) => "tone",
            Self::Shake => "shake",
        }
    }
}

/// Handles of the running periodic tasks.
#[derive(Debug, Default)]
pub struct Timers {
    poll: Option<JoinHandle<()>>,
    playback: Option<JoinHandle<()>>,
}

impl Timers {
    fn replace_poll(&mut self, handle: Option<JoinHandle<()>>) {
        if let Some(old) = std::mem::replace(&mut self.poll, handle) {
            old.abort();
        }
    }

    fn replace_playback(&mut self, handle: Option<JoinHandle<()>>) {
        if let Some(old) = std::mem::replace(&mut self.playback, handle) {
            old.abort();
        }
    }
}

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// The single writer-guarded dashboard
    dashboard: Arc<RwLock<Dashboard>>,
    /// Channel for broadcasting notices to SSE clients
    tx: broadcast::Sender<Notice>,
    /// Where events come from
    source: Arc<dyn FeedSource>,
    /// Periodic tasks owned by the app
    timers: Arc<Mutex<Timers>>,
    /// Server configuration
    config: ServerConfig,
}

impl AppState {
    #[must_use]
    pub fn new(config: ServerConfig, source: Arc<dyn FeedSource>) -> Self {
        let (tx, _rx) = broadcast::channel(BROADCAST_CAPACITY);
        let dashboard = Dashboard::new(config.filters, Playback::new(config.playback_step));

        Self {
            dashboard: Arc::new(RwLock::new(dashboard)),
            tx,
            source,
            timers: Arc::new(Mutex::new(Timers::default())),
            config,
        }
    }

    /// Subscribe to page notices.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<Notice> {
        self.tx.subscribe()
    }

    fn notify(&self, notice: Notice) {
        // No subscribers is fine
        let _ = self.tx.send(notice);
    }
}

/// Create the Axum router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/stream", get(sse_handler))
        .route("/api/view", get(view_handler))
        .route("/api/stats", get(stats_handler))
        .route("/api/status", get(status_handler))
        .route("/api/filters", post(filters_handler))
        .route("/api/refresh", post(refresh_handler))
        .route("/api/playback/toggle", post(toggle_handler))
        .route("/api/playback/play", post(play_handler))
        .route("/api/playback/pause", post(pause_handler))
        .route("/api/playback/seek", post(seek_handler))
        .route("/api/audio", post(audio_handler))
        .route("/api/view-mode", post(view_mode_handler))
        .route("/health", get(health_handler))
        .with_state(state)
}

/// Start the web server.
///
/// # Errors
///
/// Returns an error if the listener cannot bind or the server fails.
pub async fn run_server(config: ServerConfig, source: Arc<dyn FeedSource>) -> anyhow::Result<()> {
    let state = AppState::new(config.clone(), source);

    // Initial load, then the poll timer
    let startup = state.clone();
    tokio::spawn(async move {
        full_fetch(&startup).await;
    });
    arm_poll_timer(&state).await;

    let app = create_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("🌍 quakescope dashboard starting at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Controller plumbing
// ============================================================================

/// Run a feed query on the blocking pool.
async fn query_feed(
    source: Arc<dyn FeedSource>,
    query: FeedQuery,
) -> Result<FeatureCollection, QuakeError> {
    tokio::task::spawn_blocking(move || source.query(&query))
        .await
        .map_err(|e| QuakeError::Task(e.to_string()))?
}

/// Reload everything for the current filters.
pub async fn full_fetch(state: &AppState) -> FetchOutcome {
    // A full fetch pauses playback, so its tick timer goes too. The timer
    // slot stays locked until both have happened.
    let ticket = {
        let mut timers = state.timers.lock().await;
        let ticket = state.dashboard.write().await.begin_full_fetch(Utc::now());
        timers.replace_playback(None);
        ticket
    };
    state.notify(Notice::Refresh);

    let result = query_feed(state.source.clone(), ticket.query).await;
    let outcome = state.dashboard.write().await.complete_full_fetch(ticket, result);

    if outcome != FetchOutcome::Superseded {
        state.notify(Notice::Refresh);
    }
    outcome
}

/// Poll the last hour and merge anything new.
pub async fn incremental_update(state: &AppState) {
    let Some(query) = state.dashboard.read().await.update_query(Utc::now()) else {
        tracing::debug!("skipping update during playback");
        return;
    };

    tracing::debug!("checking for updates");
    let result = query_feed(state.source.clone(), query).await;
    let outcome = state.dashboard.write().await.apply_update(result, Utc::now());

    if outcome.merged == 0 {
        return;
    }
    for tone in outcome.tones {
        state.notify(Notice::Tone(tone));
    }
    if outcome.significant {
        state.notify(Notice::Shake);
    }
    state.notify(Notice::Refresh);
}

/// (Re)arm the incremental poll timer.
pub async fn arm_poll_timer(state: &AppState) {
    let period = Duration::from_secs(state.config.poll_interval.max(MIN_POLL_INTERVAL_SECS));
    let task_state = state.clone();

    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            incremental_update(&task_state).await;
        }
    });

    state.timers.lock().await.replace_poll(Some(handle));
}

/// Start playback and its tick timer.
async fn start_playback(state: &AppState) -> Result<(), ApiError> {
    if !state.dashboard.write().await.play() {
        return Err(ApiError::NoData);
    }
    arm_playback_timer(state).await;
    Ok(())
}

/// (Re)arm the playback tick timer. The task ends itself once the pointer
/// reaches the end of the window.
async fn arm_playback_timer(state: &AppState) {
    let task_state = state.clone();
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval_at(Instant::now() + TICK_INTERVAL, TICK_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        loop {
            interval.tick().await;
            let outcome = task_state.dashboard.write().await.tick();
            if outcome != TickOutcome::Idle {
                task_state.notify(Notice::Refresh);
            }
            if outcome != TickOutcome::Advanced {
                break;
            }
        }
    });

    state.timers.lock().await.replace_playback(Some(handle));
    state.notify(Notice::Refresh);
}

async fn pause_playback(state: &AppState) {
    state.dashboard.write().await.pause();
    state.timers.lock().await.replace_playback(None);
    state.notify(Notice::Refresh);
}

// ============================================================================
// Route Handlers
// ============================================================================

/// Main page handler - serves the dashboard.
async fn index_handler() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// SSE stream handler for page notices.
async fn sse_handler(
    State(state): State<AppState>,
) -> Sse<impl tokio_stream::Stream<Item = Result<Event, Infallible>>> {
    let stream = BroadcastStream::new(state.subscribe()).filter_map(|result| {
        let notice = result.ok()?;
        Event::default().event(notice.name()).json_data(&notice).ok().map(Ok)
    });

    Sse::new(stream).keep_alive(KeepAlive::default())
}

async fn view_handler(State(state): State<AppState>) -> Json<View> {
    Json(state.dashboard.read().await.view(Utc::now()))
}

async fn stats_handler(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.dashboard.read().await.snapshot().clone())
}

async fn status_handler(State(state): State<AppState>) -> Json<Status> {
    Json(state.dashboard.read().await.status())
}

/// Body of `POST /api/filters`. Missing fields keep their current value.
#[derive(Debug, Deserialize)]
struct FiltersBody {
    range: Option<String>,
    min_magnitude: Option<f64>,
}

async fn filters_handler(
    State(state): State<AppState>,
    Json(body): Json<FiltersBody>,
) -> Result<Json<Status>, ApiError> {
    let mut filters = state.dashboard.read().await.filters();

    if let Some(range) = body.range {
        filters.range = range.parse::<TimeRange>().map_err(ApiError::InvalidInput)?;
    }
    if let Some(min) = body.min_magnitude {
        if !min.is_finite() {
            return Err(ApiError::InvalidInput(format!("bad minimum magnitude: {min}")));
        }
        filters.min_magnitude = min;
    }

    tracing::info!(
        "filters changed: range={} min_magnitude={}",
        filters.range.as_str(),
        filters.min_magnitude
    );
    state.dashboard.write().await.set_filters(filters);

    arm_poll_timer(&state).await;
    full_fetch(&state).await;
    Ok(Json(state.dashboard.read().await.status()))
}

async fn refresh_handler(State(state): State<AppState>) -> Json<Status> {
    full_fetch(&state).await;
    Json(state.dashboard.read().await.status())
}

async fn toggle_handler(State(state): State<AppState>) -> Result<Json<Status>, ApiError> {
    let mut dashboard = state.dashboard.write().await;
    let was_playing = dashboard.playback_state() == PlaybackState::Playing;
    let playing = dashboard.toggle_playback();
    drop(dashboard);

    if playing {
        arm_playback_timer(&state).await;
    } else if was_playing {
        state.timers.lock().await.replace_playback(None);
        state.notify(Notice::Refresh);
    } else {
        return Err(ApiError::NoData);
    }
    Ok(Json(state.dashboard.read().await.status()))
}

async fn play_handler(State(state): State<AppState>) -> Result<Json<Status>, ApiError> {
    start_playback(&state).await?;
    Ok(Json(state.dashboard.read().await.status()))
}

async fn pause_handler(State(state): State<AppState>) -> Json<Status> {
    pause_playback(&state).await;
    Json(state.dashboard.read().await.status())
}

#[derive(Debug, Deserialize)]
struct SeekBody {
    percent: f64,
}

async fn seek_handler(
    State(state): State<AppState>,
    Json(body): Json<SeekBody>,
) -> Result<Json<Status>, ApiError> {
    if !state.dashboard.write().await.seek(body.percent) {
        return Err(ApiError::NoData);
    }
    state.notify(Notice::Refresh);
    Ok(Json(state.dashboard.read().await.status()))
}

async fn audio_handler(
    State(state): State<AppState>,
    Json(audio): Json<AudioBody>,
) -> Json<Status> {
    state.dashboard.write().await.set_audio(ToneEmitter {
        enabled: audio.enabled,
        armed: audio.armed,
    });
    tracing::debug!("audio cues enabled={} armed={}", audio.enabled, audio.armed);
    Json(state.dashboard.read().await.status())
}

#[derive(Debug, Deserialize)]
struct AudioBody {
    enabled: bool,
    #[serde(default = "default_armed")]
    armed: bool,
}

fn default_armed() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct ViewModeBody {
    mode: String,
}

async fn view_mode_handler(
    State(state): State<AppState>,
    Json(body): Json<ViewModeBody>,
) -> Result<Json<Status>, ApiError> {
    let mode = body.mode.parse::<ViewMode>().map_err(ApiError::InvalidInput)?;
    state.dashboard.write().await.set_view_mode(mode);
    state.notify(Notice::Refresh);
    Ok(Json(state.dashboard.read().await.status()))
}

/// Health check endpoint.
async fn health_handler() -> &'static str {
    "OK"
}

// ============================================================================
// HTML Template (embedded for single-binary deployment)
// ============================================================================

const INDEX_HTML: &str = include_str!("../assets/index.html");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metadata, test_event};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use serde_json::Value;
    use std::collections::VecDeque;
    use tower::ServiceExt;

    type Reply = Box<dyn FnOnce() -> Result<FeatureCollection, QuakeError> + Send>;

    /// Feed source that answers from a queue of canned replies.
    #[derive(Default)]
    struct ScriptedSource {
        replies: std::sync::Mutex<VecDeque<Reply>>,
    }

    impl ScriptedSource {
        fn push_events(&self, features: Vec<crate::models::Feature>) {
            self.replies.lock().unwrap().push_back(Box::new(move || {
                Ok(FeatureCollection {
                    type_: "FeatureCollection".into(),
                    metadata: Metadata::default(),
                    features,
                })
            }));
        }

        fn push_error(&self) {
            self.replies.lock().unwrap().push_back(Box::new(|| {
                Err(QuakeError::Api {
                    status: 500,
                    message: "upstream down".into(),
                })
            }));
        }
    }

    impl FeedSource for ScriptedSource {
        fn query(&self, _query: &FeedQuery) -> Result<FeatureCollection, QuakeError> {
            let reply = self.replies.lock().unwrap().pop_front();
            match reply {
                Some(reply) => reply(),
                None => Err(QuakeError::InvalidResponse("no scripted reply".into())),
            }
        }
    }

    fn minutes_ago(m: i64) -> i64 {
        (Utc::now() - chrono::Duration::minutes(m)).timestamp_millis()
    }

    fn setup() -> (AppState, Arc<ScriptedSource>) {
        let source = Arc::new(ScriptedSource::default());
        let state = AppState::new(ServerConfig::default(), source.clone());
        (state, source)
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (state, _) = setup();
        let response = create_router(state)
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_index_page() {
        let (state, _) = setup();
        let response = create_router(state)
            .oneshot(Request::get("/").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(bytes.to_vec()).unwrap();
        assert!(html.contains("quakescope"));
        assert!(html.contains("/stream"));
    }

    #[tokio::test]
    async fn test_refresh_loads_stats() {
        let (state, source) = setup();
        source.push_events(vec![
            test_event("a", 3.2, minutes_ago(300), "10 km N of Anza, CA"),
            test_event("b", 5.5, minutes_ago(200), "Fiji region"),
            test_event("c", 7.1, minutes_ago(100), "100 km E of Miyako, Japan"),
        ]);
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(Request::post("/api/refresh").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = body_json(response).await;
        assert_eq!(status["load"]["state"], "ready");
        assert_eq!(status["event_count"], 3);

        let response = app
            .oneshot(Request::get("/api/stats").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let stats = body_json(response).await;
        assert_eq!(stats["count"], 3);
        assert_eq!(stats["histogram"][1]["count"], 0);
        assert_eq!(stats["histogram"][3]["count"], 1);
    }

    #[tokio::test]
    async fn test_failed_fetch_shows_error() {
        let (state, source) = setup();
        source.push_error();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(Request::post("/api/refresh").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = body_json(response).await;
        assert_eq!(status["load"]["state"], "error");

        let response = app
            .oneshot(Request::get("/api/view").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let view = body_json(response).await;
        assert_eq!(view["message"], crate::controller::FETCH_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_seek_before_load_conflicts() {
        let (state, _) = setup();
        let response = create_router(state)
            .oneshot(post_json("/api/playback/seek", r#"{"percent": 50}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn test_bad_filters_rejected() {
        let (state, _) = setup();
        let response = create_router(state)
            .oneshot(post_json("/api/filters", r#"{"range": "decade"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_filters_refetch() {
        let (state, source) = setup();
        source.push_events(vec![test_event("a", 4.6, minutes_ago(60), "x")]);
        let response = create_router(state.clone())
            .oneshot(post_json("/api/filters", r#"{"range": "week", "min_magnitude": 4.5}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let status = body_json(response).await;
        assert_eq!(status["filters"]["range"], "week");
        assert_eq!(status["event_count"], 1);
        assert!(state.timers.lock().await.poll.is_some());
    }

    #[tokio::test]
    async fn test_view_mode_switch() {
        let (state, source) = setup();
        source.push_events(vec![test_event("a", 6.1, minutes_ago(30), "x")]);
        full_fetch(&state).await;
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(post_json("/api/view-mode", r#"{"mode": "3d"}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app
            .oneshot(Request::get("/api/view").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let view = body_json(response).await;
        assert_eq!(view["mode"], "3d");
        assert_eq!(view["entities"].as_array().map(Vec::len), Some(1));
        assert_eq!(view["markers"].as_array().map(Vec::len), Some(0));
    }

    #[tokio::test]
    async fn test_update_broadcasts_tone_and_shake() {
        let (state, source) = setup();
        source.push_events(vec![test_event("known", 3.0, minutes_ago(50), "x")]);
        full_fetch(&state).await;
        state
            .dashboard
            .write()
            .await
            .set_audio(ToneEmitter { enabled: true, armed: true });

        let mut rx = state.subscribe();
        source.push_events(vec![
            test_event("known", 3.0, minutes_ago(50), "x"),
            test_event("fresh", 6.2, minutes_ago(1), "y"),
        ]);
        incremental_update(&state).await;

        let mut names = Vec::new();
        while let Ok(notice) = rx.try_recv() {
            names.push(notice.name());
        }
        assert_eq!(names, vec!["tone", "shake", "refresh"]);
        assert_eq!(state.dashboard.read().await.store().len(), 2);
    }

    #[tokio::test]
    async fn test_update_failure_is_silent() {
        let (state, source) = setup();
        source.push_events(vec![test_event("a", 3.0, minutes_ago(50), "x")]);
        full_fetch(&state).await;

        let mut rx = state.subscribe();
        source.push_error();
        incremental_update(&state).await;

        assert!(rx.try_recv().is_err());
        let dash = state.dashboard.read().await;
        assert_eq!(dash.store().len(), 1);
        assert_eq!(dash.load_state(), &crate::controller::LoadState::Ready);
    }

    #[tokio::test]
    async fn test_play_and_pause() {
        let (state, source) = setup();
        source.push_events(vec![test_event("a", 3.0, minutes_ago(50), "x")]);
        full_fetch(&state).await;
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(Request::post("/api/playback/toggle").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = body_json(response).await;
        assert_eq!(status["playback"], "playing");
        assert!(state.timers.lock().await.playback.is_some());

        let response = app
            .oneshot(Request::post("/api/playback/pause").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = body_json(response).await;
        assert_eq!(status["playback"], "paused");
        assert!(state.timers.lock().await.playback.is_none());
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_markers() {
        let (state, source) = setup();
        source.push_events(vec![test_event("a", 4.0, minutes_ago(30), "x")]);
        full_fetch(&state).await;
        source.push_error();
        let app = create_router(state);

        let response = app
            .clone()
            .oneshot(Request::post("/api/refresh").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = body_json(response).await;
        assert_eq!(status["load"]["state"], "error");

        let response = app
            .oneshot(Request::get("/api/view").body(Body::empty()).unwrap())
            .await
            .unwrap();
        let view = body_json(response).await;
        assert_eq!(view["markers"].as_array().map(Vec::len), Some(1));
        assert_eq!(view["list"].as_array().map(Vec::len), Some(0));
        assert_eq!(view["message"], crate::controller::FETCH_ERROR_MESSAGE);
    }

    #[tokio::test]
    async fn test_full_fetch_cancels_playback_timer() {
        let (state, source) = setup();
        source.push_events(vec![test_event("a", 3.0, minutes_ago(50), "x")]);
        full_fetch(&state).await;
        start_playback(&state).await.unwrap();
        assert!(state.timers.lock().await.playback.is_some());

        source.push_events(vec![test_event("b", 3.0, minutes_ago(20), "x")]);
        assert_eq!(full_fetch(&state).await, FetchOutcome::Loaded(1));

        assert!(state.timers.lock().await.playback.is_none());
        let dash = state.dashboard.read().await;
        assert_eq!(dash.playback_state(), PlaybackState::Paused);
        assert!(dash.update_query(Utc::now()).is_some());
    }

    #[tokio::test]
    async fn test_toggle_refused_during_full_fetch() {
        let (state, source) = setup();
        source.push_events(vec![test_event("a", 3.0, minutes_ago(50), "x")]);
        full_fetch(&state).await;

        // A reload has begun but not completed
        let ticket = state.dashboard.write().await.begin_full_fetch(Utc::now());

        let response = create_router(state.clone())
            .oneshot(Request::post("/api/playback/toggle").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
        assert!(state.timers.lock().await.playback.is_none());

        let mut dash = state.dashboard.write().await;
        dash.complete_full_fetch(ticket, Err(QuakeError::InvalidResponse("down".into())));
        assert_ne!(dash.playback_state(), PlaybackState::Playing);
        assert!(dash.update_query(Utc::now()).is_some());
    }
}
