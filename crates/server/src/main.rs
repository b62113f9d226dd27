use std::{collections::BTreeMap, fs, net::SocketAddr, path::Path, sync::Arc};

use anyhow::Context;
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{header, HeaderMap, HeaderValue, Method as HttpMethod, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::{any, get},
    Json, Router,
};
use form_step::{
    default_registry, final_step_paths, FormController, FormRequest, Method, Outcome, StepContext,
    StepEvent, WizardDefinition,
};
use serde::Serialize;
use shared::{
    domain::{SessionId, ValuesMap},
    error::{ApiError, ErrorCode},
};
use storage::{SessionFlash, SessionValues, Storage};
use tokio::sync::broadcast::{self, error::RecvError};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;
mod session;

const SUBMISSION_CAPACITY: usize = 16;

use config::{load_settings, prepare_database_url};
use render::Renderer;
use session::{session_cookie, session_from_headers};

#[derive(Clone)]
struct AppState {
    storage: Storage,
    renderer: Arc<Renderer>,
    flash_ttl: Option<chrono::Duration>,
    base_url: Option<String>,
    max_body_bytes: usize,
    submissions: broadcast::Sender<Submission>,
}

/// Every saved step of one session, published when a final step completes.
#[derive(Debug, Clone, Serialize)]
struct Submission {
    session_id: SessionId,
    steps: BTreeMap<String, ValuesMap>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let settings = load_settings()?;
    let database_url = prepare_database_url(&settings.database_url)?;
    let storage = Storage::new(&database_url).await.map_err(|error| {
        error!(
            %database_url,
            %error,
            "failed to open SQLite database; verify parent directory exists and permissions are correct"
        );
        error
    })?;

    let wizard = load_wizard(&settings.wizard_path)?;
    for (step, next) in wizard.external_next_pages() {
        info!(%step, %next, "step hands off outside the wizard");
    }
    let steps = wizard.build(default_registry())?;

    let renderer = Renderer::from_glob(&settings.templates_glob)?;
    renderer.ensure_templates(steps.iter().map(|(_, controller)| controller.template()))?;

    let state = AppState {
        storage,
        renderer: Arc::new(renderer),
        flash_ttl: settings.flash_ttl(),
        base_url: settings.mount_prefix(),
        max_body_bytes: settings.max_body_bytes,
        submissions: broadcast::channel(SUBMISSION_CAPACITY).0,
    };
    let app = build_router(state, steps);

    let addr: SocketAddr = settings.bind_addr.parse()?;
    info!(%addr, base_url = ?settings.mount_prefix(), "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn load_wizard(path: &Path) -> anyhow::Result<WizardDefinition> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read wizard definition '{}'", path.display()))?;
    let wizard = WizardDefinition::from_toml_str(&raw)?;
    info!(path = %path.display(), steps = wizard.steps.len(), "loaded wizard definition");
    Ok(wizard)
}

/// Mounts every step on its path behind the optional base URL. Must be
/// called inside a tokio runtime: each step gets a completion logger task.
fn build_router(state: AppState, steps: Vec<(String, FormController)>) -> Router {
    let values = Arc::new(SessionValues::new(state.storage.clone()));
    let finals = final_step_paths(&steps);
    let mut router: Router<AppState> = Router::new();

    for (path, controller) in steps {
        let controller = Arc::new(
            controller
                .with_values_provider(values.clone())
                .with_values_store(values.clone()),
        );
        spawn_completion_logger(
            path.clone(),
            finals.contains(&path),
            controller.subscribe(),
            state.storage.clone(),
            state.submissions.clone(),
        );

        let step_path = path.clone();
        router = router.route(
            &path,
            any(
                move |State(state): State<AppState>,
                      method: HttpMethod,
                      headers: HeaderMap,
                      Query(params): Query<BTreeMap<String, String>>,
                      body: Bytes| {
                    let controller = Arc::clone(&controller);
                    let path = step_path.clone();
                    async move {
                        handle_step(state, controller, path, method, headers, params, body).await
                    }
                },
            ),
        );
    }

    let max_body_bytes = state.max_body_bytes;
    let router = match state.base_url.clone() {
        Some(base_url) => Router::<AppState>::new().nest(&base_url, router),
        None => router,
    };

    router
        .route("/healthz", get(healthz))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .with_state(state)
}

async fn healthz(State(state): State<AppState>) -> Result<&'static str, (StatusCode, Json<ApiError>)> {
    state.storage.health_check().await.map_err(|e| {
        error!(error = %e, "health check failed");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ApiError::new(ErrorCode::Internal, e.to_string())),
        )
    })?;
    Ok("ok")
}

async fn handle_step(
    state: AppState,
    controller: Arc<FormController>,
    path: String,
    method: HttpMethod,
    headers: HeaderMap,
    params: BTreeMap<String, String>,
    body: Bytes,
) -> Response {
    let (session_id, fresh_session) = match session_from_headers(&headers) {
        Some(session_id) => (session_id, false),
        None => (SessionId::generate(), true),
    };

    let request = FormRequest {
        method: Method::from(method.as_str()),
        path,
        base_url: state.base_url.clone(),
        body: parse_form_body(&body),
        params,
    };
    debug!(method = %request.method, path = %request.path, session = %session_id, "step request");

    let mut flash = SessionFlash::new(state.storage.clone(), session_id.clone());
    if let Some(ttl) = state.flash_ttl {
        flash = flash.with_max_age(ttl);
    }
    let mut ctx = StepContext::new(request, Arc::new(flash)).with_session(session_id.clone());

    let mut response = match controller.handle(&mut ctx).await {
        Ok(Outcome::Render { template, payload }) => {
            match state.renderer.render(&template, &payload) {
                Ok(html) => Html(html).into_response(),
                Err(e) => {
                    error!(path = %ctx.request.path, %template, error = %e, "render failed");
                    internal_error(e.to_string())
                }
            }
        }
        Ok(Outcome::Redirect { target }) => Redirect::to(&target).into_response(),
        Ok(Outcome::MethodNotAllowed) => (
            StatusCode::METHOD_NOT_ALLOWED,
            [(header::ALLOW, "GET, POST")],
            Json(ApiError::new(
                ErrorCode::MethodNotAllowed,
                format!("{method} is not supported"),
            )),
        )
            .into_response(),
        Err(e) => {
            error!(path = %ctx.request.path, session = %session_id, error = %e, "step failed");
            internal_error(e.to_string())
        }
    };

    if fresh_session {
        match HeaderValue::from_str(&session_cookie(&session_id)) {
            Ok(cookie) => {
                response.headers_mut().append(header::SET_COOKIE, cookie);
            }
            Err(e) => warn!(error = %e, "session cookie is not a valid header value"),
        }
    }
    response
}

/// `application/x-www-form-urlencoded` body to a flat map. Repeated keys keep
/// the last value.
fn parse_form_body(body: &[u8]) -> BTreeMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

fn internal_error(message: String) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiError::new(ErrorCode::Internal, message)),
    )
        .into_response()
}

fn spawn_completion_logger(
    step: String,
    is_final: bool,
    mut events: broadcast::Receiver<StepEvent>,
    storage: Storage,
    submissions: broadcast::Sender<Submission>,
) {
    tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(StepEvent::Complete {
                    request,
                    session_id,
                    outcome,
                }) => {
                    let target = match &outcome {
                        Outcome::Redirect { target } => Some(target.as_str()),
                        _ => None,
                    };
                    info!(%step, method = %request.method, ?target, "step completed");
                    if is_final {
                        if let Some(session_id) = session_id {
                            if let Some(submission) = log_submission(&storage, session_id).await {
                                // Nobody listening is fine.
                                let _ = submissions.send(submission);
                            }
                        }
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(%step, skipped, "completion logger fell behind");
                }
                Err(RecvError::Closed) => break,
            }
        }
    });
}

async fn log_submission(storage: &Storage, session_id: SessionId) -> Option<Submission> {
    let steps = match storage.load_session_values(&session_id).await {
        Ok(steps) => steps,
        Err(e) => {
            error!(session = %session_id, error = %e, "failed to load submission values");
            return None;
        }
    };
    let submission = Submission {
        session_id,
        steps: steps
            .into_iter()
            .map(|step| (step.step_path, step.values))
            .collect(),
    };
    match serde_json::to_string(&submission.steps) {
        Ok(summary) => info!(
            session = %submission.session_id,
            steps = submission.steps.len(),
            %summary,
            "submission complete"
        ),
        Err(e) => error!(session = %submission.session_id, error = %e, "failed to encode submission summary"),
    }
    Some(submission)
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
