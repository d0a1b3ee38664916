//! REST API handlers for the control surface
//!
//! Only configuration and validation failures are reported synchronously.
//! Once a campaign is accepted it runs in the background and its outcome
//! is read back through `/api/progress` and `/api/last_result`.

use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::campaign::{CampaignJob, CampaignMode, CampaignRunner, JobContent, ValidationError};
use crate::config::{CampaignSettings, Config};
use crate::error::{Error, RelayErrorTrait};
use crate::input::{clean_pairs, parse_recipient_blob, MessagePair};
use crate::storage::MergeOutcome;

use super::server::AppState;

/// Preview size of `GET /api/recipients`
pub const DEFAULT_PREVIEW_LIMIT: usize = 50;

// ============================================================================
// API Response Types
// ============================================================================

/// Generic API response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

/// Simple error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            success: false,
            error: message.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

/// Recipient selection of `POST /api/send`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SendMode {
    /// Addresses in the request, merged into the store first
    #[default]
    List,
    /// Every stored address
    All,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    #[serde(default)]
    pub mode: SendMode,
    /// Free-text address blob, list mode only
    #[serde(default)]
    pub recipients: Option<String>,
    /// HTML template
    #[serde(default)]
    pub body: String,
    /// Replaces the configured subject when non-empty
    #[serde(default)]
    pub subject: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct PairsRequest {
    #[serde(default)]
    pub pairs: Vec<MessagePair>,
    #[serde(default)]
    pub subject: Option<String>,
}

/// Reply to an accepted campaign
#[derive(Debug, Serialize)]
pub struct SendAccepted {
    pub accepted: bool,
    pub mode: CampaignMode,
    pub count: usize,
}

#[derive(Debug, Deserialize)]
pub struct RecipientsRequest {
    #[serde(default)]
    pub recipients: String,
}

#[derive(Debug, Serialize)]
pub struct RecipientsSummary {
    pub count: usize,
    pub preview: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PreviewQuery {
    pub limit: Option<usize>,
}

#[derive(Debug, Serialize)]
pub struct TemplateResponse {
    pub template: Option<String>,
}

// ============================================================================
// API Routes
// ============================================================================

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(health_check))
        // Configuration
        .route("/api/config", get(get_config).post(save_config))
        // Campaigns
        .route("/api/send", post(send_campaign))
        .route("/api/send/pairs", post(send_pairs))
        // Recipient store
        .route(
            "/api/recipients",
            get(list_recipients)
                .post(save_recipients)
                .delete(clear_recipients),
        )
        .route("/api/recipients/export", get(export_recipients))
        // Artifacts
        .route("/api/template", get(get_template))
        .route("/api/progress", get(get_progress))
        .route("/api/last_result", get(get_last_result))
        .with_state(state)
}

/// Map a handler result onto the JSON envelope
fn respond<T: Serialize>(result: Result<T, Error>) -> Response {
    match result {
        Ok(data) => (StatusCode::OK, Json(ApiResponse::success(data))).into_response(),
        Err(e) => error_response(e),
    }
}

fn error_response(err: Error) -> Response {
    let status = if err.category().is_caller_error() {
        StatusCode::BAD_REQUEST
    } else {
        warn!(error = %err, category = %err.category(), "Request failed");
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(ErrorResponse::new(err.to_string()))).into_response()
}

// ============================================================================
// Health Handlers
// ============================================================================

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    }))
}

// ============================================================================
// Config Handlers
// ============================================================================

async fn get_config(State(state): State<AppState>) -> Response {
    respond(state.stored_config().map_err(Error::from))
}

/// Replace the configuration file
async fn save_config(State(state): State<AppState>, Json(config): Json<Config>) -> Response {
    let result = config
        .save_to_file(&state.config_path)
        .map(|()| config)
        .map_err(Error::from);
    if result.is_ok() {
        info!(path = %state.config_path.display(), "Configuration replaced");
    }
    respond(result)
}

// ============================================================================
// Campaign Handlers
// ============================================================================

/// Start a templated campaign
async fn send_campaign(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Response {
    respond(start_templated(&state, request))
}

fn start_templated(state: &AppState, request: SendRequest) -> Result<SendAccepted, Error> {
    let settings = campaign_settings(state, request.subject.as_deref())?;

    let (mode, recipients) = match request.mode {
        SendMode::List => {
            let parsed = parse_recipient_blob(request.recipients.as_deref().unwrap_or_default());
            (CampaignMode::List, parsed)
        }
        SendMode::All => (CampaignMode::All, state.recipients.load_all()?),
    };

    let job = CampaignJob::templated(mode, settings.subject.clone(), recipients, request.body);
    job.validate()?;
    let runner = state.runner_for(&settings)?;

    if let JobContent::Template {
        recipients,
        template,
    } = &job.content
    {
        if mode == CampaignMode::List {
            state.recipients.merge(recipients.as_slice())?;
        }
        if let Err(e) = state.templates.save(template) {
            warn!(error = %e, "Failed to save template");
        }
    }

    submit(state, runner, job, settings)
}

/// Start a campaign with a body per recipient
async fn send_pairs(State(state): State<AppState>, Json(request): Json<PairsRequest>) -> Response {
    respond(start_pairs(&state, request))
}

fn start_pairs(state: &AppState, request: PairsRequest) -> Result<SendAccepted, Error> {
    let settings = campaign_settings(state, request.subject.as_deref())?;

    let job = CampaignJob::pairs(settings.subject.clone(), clean_pairs(&request.pairs));
    job.validate()?;
    let runner = state.runner_for(&settings)?;

    submit(state, runner, job, settings)
}

fn campaign_settings(state: &AppState, subject: Option<&str>) -> Result<CampaignSettings, Error> {
    let config = state.effective_config()?;
    Ok(config.campaign_settings(subject)?)
}

fn submit(
    state: &AppState,
    runner: CampaignRunner,
    job: CampaignJob,
    settings: CampaignSettings,
) -> Result<SendAccepted, Error> {
    let accepted = SendAccepted {
        accepted: true,
        mode: job.mode,
        count: job.len(),
    };
    // the handle is dropped: progress is polled separately
    state.dispatcher.submit(runner, job, settings)?;
    Ok(accepted)
}

// ============================================================================
// Recipient Handlers
// ============================================================================

/// Merge addresses into the store without sending
async fn save_recipients(
    State(state): State<AppState>,
    Json(request): Json<RecipientsRequest>,
) -> Response {
    respond(merge_blob(&state, &request.recipients))
}

fn merge_blob(state: &AppState, text: &str) -> Result<MergeOutcome, Error> {
    let parsed = parse_recipient_blob(text);
    if parsed.is_empty() {
        return Err(ValidationError::NoRecipients.into());
    }
    Ok(state.recipients.merge(parsed.as_slice())?)
}

async fn list_recipients(
    State(state): State<AppState>,
    Query(query): Query<PreviewQuery>,
) -> Response {
    let limit = query.limit.unwrap_or(DEFAULT_PREVIEW_LIMIT);
    respond(
        state
            .recipients
            .load_all()
            .map(|all| RecipientsSummary {
                count: all.len(),
                preview: all.into_iter().take(limit).collect(),
            })
            .map_err(Error::from),
    )
}

async fn clear_recipients(State(state): State<AppState>) -> Response {
    let result = state.recipients.clear().map_err(Error::from);
    if result.is_ok() {
        info!("Recipient store cleared");
    }
    respond(result.map(|()| "cleared"))
}

/// Raw newline-delimited list
async fn export_recipients(State(state): State<AppState>) -> Response {
    match state.recipients.export() {
        Ok(text) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

// ============================================================================
// Artifact Handlers
// ============================================================================

async fn get_template(State(state): State<AppState>) -> Response {
    respond(
        state
            .templates
            .load()
            .map(|template| TemplateResponse { template })
            .map_err(Error::from),
    )
}

async fn get_progress(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::success(state.progress.read()))
}

async fn get_last_result(State(state): State<AppState>) -> Response {
    match state.results.load() {
        Ok(Some(result)) => respond(Ok(result)),
        Ok(None) => (
            StatusCode::NOT_FOUND,
            Json(ErrorResponse::new("No campaign has finished yet")),
        )
            .into_response(),
        Err(e) => error_response(e.into()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::server::MailerFactory;
    use crate::campaign::{DispatchMode, Dispatcher};
    use crate::relay::testing::ScriptedTransport;
    use crate::relay::{Mailer, TransportError};
    use crate::storage::{MemoryStore, ProgressStatus, SharedStore};
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use std::time::Duration;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const CONFIG: &str = r#"
[postal]
server = "https://postal.example.com"
key = "secret"
from_name = "News Desk"
from_email = "news@example.com"

[setting]
subject = "Weekly digest"
limit = 0
"#;

    struct Harness {
        _dir: TempDir,
        state: AppState,
        transport: Arc<ScriptedTransport>,
    }

    fn harness(config: Option<&str>) -> Harness {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        if let Some(contents) = config {
            std::fs::write(&config_path, contents).unwrap();
        }

        let transport = Arc::new(ScriptedTransport::always_success());
        let scripted = transport.clone();
        let mailers: MailerFactory = Arc::new(
            move |_: &CampaignSettings| -> Result<Mailer, TransportError> {
                Ok(Mailer::new(scripted.clone()))
            },
        );
        let store: SharedStore = Arc::new(MemoryStore::new());

        let state = AppState::new(
            config_path,
            store,
            Dispatcher::new(DispatchMode::Serialized),
            mailers,
        );
        Harness {
            _dir: dir,
            state,
            transport,
        }
    }

    async fn call(state: &AppState, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let request = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => request
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => request.body(Body::empty()).unwrap(),
        };

        let response = create_router(state.clone()).oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn wait_for_completion(state: &AppState) {
        for _ in 0..200 {
            if state.progress.read().status == ProgressStatus::Completed {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("campaign did not complete");
    }

    #[tokio::test]
    async fn test_health() {
        let h = harness(None);
        let (status, body) = call(&h.state, "GET", "/api/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "healthy");
    }

    #[tokio::test]
    async fn test_send_list_merges_and_dispatches() {
        let h = harness(Some(CONFIG));
        let (status, body) = call(
            &h.state,
            "POST",
            "/api/send",
            Some(json!({
                "mode": "list",
                "recipients": "a@x.com, A@X.com; b@x.com",
                "body": "hello {{email}}"
            })),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["accepted"], true);
        assert_eq!(body["data"]["count"], 2);
        assert_eq!(body["data"]["mode"], "list");

        wait_for_completion(&h.state).await;
        assert_eq!(h.transport.recipients(), vec!["a@x.com", "b@x.com"]);
        assert_eq!(h.state.recipients.count().unwrap(), 2);
        assert_eq!(
            h.state.templates.load().unwrap().as_deref(),
            Some("hello {{email}}")
        );

        let (status, body) = call(&h.state, "GET", "/api/last_result", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["success"], 2);
        assert_eq!(body["data"]["total"], 2);
    }

    #[tokio::test]
    async fn test_send_uses_subject_override() {
        let h = harness(Some(CONFIG));
        call(
            &h.state,
            "POST",
            "/api/send",
            Some(json!({"recipients": "a@x.com", "body": "b", "subject": "Special"})),
        )
        .await;

        wait_for_completion(&h.state).await;
        assert_eq!(h.transport.requests()[0].message.subject, "Special");
    }

    #[tokio::test]
    async fn test_send_rejects_missing_config() {
        let h = harness(None);
        let (status, body) = call(
            &h.state,
            "POST",
            "/api/send",
            Some(json!({"recipients": "a@x.com", "body": "hi"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert!(h.transport.requests().is_empty());
    }

    #[tokio::test]
    async fn test_send_rejects_empty_input() {
        let h = harness(Some(CONFIG));

        let (status, _) = call(
            &h.state,
            "POST",
            "/api/send",
            Some(json!({"recipients": "nobody here", "body": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = call(
            &h.state,
            "POST",
            "/api/send",
            Some(json!({"recipients": "a@x.com", "body": "   "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        // rejected requests leave the store untouched
        assert_eq!(h.state.recipients.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_bad_proxy_rejected_before_store_changes() {
        let dir = TempDir::new().unwrap();
        let config_path = dir.path().join("config.toml");
        let config = CONFIG.replace("limit = 0", "limit = 0\nproxy = \"::not a proxy::\"");
        std::fs::write(&config_path, config).unwrap();

        let store: SharedStore = Arc::new(MemoryStore::new());
        let state = AppState::new(
            config_path,
            store,
            Dispatcher::new(DispatchMode::Serialized),
            crate::api::server::http_mailers(),
        );

        let (status, body) = call(
            &state,
            "POST",
            "/api/send",
            Some(json!({"recipients": "a@x.com b@x.com", "body": "hi"})),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
        assert_eq!(state.recipients.count().unwrap(), 0);
        assert_eq!(state.templates.load().unwrap(), None);
    }

    #[tokio::test]
    async fn test_send_all_uses_store() {
        let h = harness(Some(CONFIG));
        h.state.recipients.merge(&["a@x.com", "b@x.com", "c@x.com"]).unwrap();

        let (status, body) = call(
            &h.state,
            "POST",
            "/api/send",
            Some(json!({"mode": "all", "body": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["count"], 3);
        assert_eq!(body["data"]["mode"], "all");

        wait_for_completion(&h.state).await;
        let mut sent = h.transport.recipients();
        sent.sort();
        assert_eq!(sent, vec!["a@x.com", "b@x.com", "c@x.com"]);
    }

    #[tokio::test]
    async fn test_send_all_with_empty_store() {
        let h = harness(Some(CONFIG));
        let (status, _) = call(
            &h.state,
            "POST",
            "/api/send",
            Some(json!({"mode": "all", "body": "hi"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_send_pairs() {
        let h = harness(Some(CONFIG));
        let (status, body) = call(
            &h.state,
            "POST",
            "/api/send/pairs",
            Some(json!({"pairs": [
                {"email": " a@x.com ", "body": "<p>one</p>"},
                {"email": "header", "body": "skipped"},
                {"email": "b@x.com", "body": "<p>two</p>"}
            ]})),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["mode"], "excel");
        assert_eq!(body["data"]["count"], 2);

        wait_for_completion(&h.state).await;
        let bodies: Vec<String> = h
            .transport
            .requests()
            .into_iter()
            .map(|r| r.message.html_body)
            .collect();
        assert_eq!(bodies, vec!["<p>one</p>", "<p>two</p>"]);
    }

    #[tokio::test]
    async fn test_recipient_endpoints() {
        let h = harness(None);

        let (status, body) = call(
            &h.state,
            "POST",
            "/api/recipients",
            Some(json!({"recipients": "A@x.com b@x.com"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["total"], 2);
        assert_eq!(body["data"]["appended"], 2);

        let (_, body) = call(
            &h.state,
            "POST",
            "/api/recipients",
            Some(json!({"recipients": "a@x.com"})),
        )
        .await;
        assert_eq!(body["data"]["total"], 2);
        assert_eq!(body["data"]["appended"], 0);

        let (_, body) = call(&h.state, "GET", "/api/recipients?limit=1", None).await;
        assert_eq!(body["data"]["count"], 2);
        assert_eq!(body["data"]["preview"].as_array().unwrap().len(), 1);

        let (status, _) = call(&h.state, "DELETE", "/api/recipients", None).await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = call(&h.state, "GET", "/api/recipients", None).await;
        assert_eq!(body["data"]["count"], 0);
    }

    #[tokio::test]
    async fn test_export_is_plain_text() {
        let h = harness(None);
        h.state.recipients.merge(&["a@x.com"]).unwrap();

        let response = create_router(h.state.clone())
            .oneshot(
                Request::builder()
                    .uri("/api/recipients/export")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(response.headers()[header::CONTENT_TYPE]
            .to_str()
            .unwrap()
            .starts_with("text/plain"));
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"a@x.com\n");
    }

    #[tokio::test]
    async fn test_progress_idle_and_missing_result() {
        let h = harness(None);

        let (status, body) = call(&h.state, "GET", "/api/progress", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["status"], "idle");

        let (status, body) = call(&h.state, "GET", "/api/last_result", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["success"], false);
    }

    #[tokio::test]
    async fn test_config_round_trip() {
        let h = harness(None);

        let (status, body) = call(&h.state, "GET", "/api/config", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["postal"]["server"], "");

        let mut config: Config = toml::from_str(CONFIG).unwrap();
        config.setting.limit = 12.0;
        let (status, _) = call(
            &h.state,
            "POST",
            "/api/config",
            Some(serde_json::to_value(&config).unwrap()),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let stored = h.state.stored_config().unwrap();
        assert_eq!(stored, config);
    }
}
