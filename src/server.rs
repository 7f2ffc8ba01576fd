use crate::{
    avatar::{self, AllowedRoots, ValidatedPath},
    chat::{self, Chat},
    config::Config,
    errors::{into_response, AppError, AppResult},
    icons::{self, ChatIcon},
    security::{self, RateLimiters},
};
use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use http::{header, HeaderValue, Method};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{sync::Arc, time::Instant};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    limit::RequestBodyLimitLayer,
    trace::TraceLayer,
};

#[derive(Clone)]
pub struct AppState {
    pub cfg: Arc<Config>,
    pub roots: Arc<AllowedRoots>,
    pub rls: RateLimiters,
}

impl AppState {
    pub fn new(cfg: Config, roots: Arc<AllowedRoots>) -> Self {
        let l = &cfg.limits;
        let rls = RateLimiters::new(l.rate_per_sec, l.rate_burst, l.token_rate_per_sec, l.token_rate_burst);
        Self { cfg: Arc::new(cfg), roots, rls }
    }
}

#[derive(Debug, Deserialize)]
pub struct AvatarRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct AvatarResponse {
    pub path: Option<ValidatedPath>,
    pub uri: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChatsRequest {
    pub chats: Vec<Chat>,
}

#[derive(Debug, Serialize)]
pub struct IconEntry {
    pub chat_id: String,
    pub title: String,
    pub icon: ChatIcon,
}

#[serde_with::skip_serializing_none]
#[derive(Debug, Serialize)]
pub struct UnreadEntry {
    pub chat_id: String,
    pub title: String,
    pub network: String,
    pub unread_count: u64,
    pub is_pinned: bool,
    pub is_muted: bool,
    pub last_activity: Option<String>,
    pub icon: ChatIcon,
}

pub async fn serve(cfg: Config, roots: Arc<AllowedRoots>) -> anyhow::Result<()> {
    let addr: std::net::SocketAddr = cfg
        .listen_addr()
        .parse()
        .with_context(|| format!("invalid listen address {}", cfg.listen_addr()))?;
    let app = build_router(AppState::new(cfg, roots));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

pub fn build_router(shared: AppState) -> Router {
    let base = shared.cfg.server.base_path.clone();
    let limit_bytes = shared.cfg.limits.max_request_kb.saturating_mul(1024);
    let origins: Vec<HeaderValue> = shared
        .cfg
        .auth
        .allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();
    let cors = CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE]);

    Router::new()
        .route("/healthz", get(health))
        .route(&format!("{base}/roots"), get(list_roots))
        .route(&format!("{base}/avatar"), post(check_avatar))
        .route(&format!("{base}/icons"), post(chat_icons))
        .route(&format!("{base}/unread"), post(unread_chats))
        .fallback(fallback)
        .layer(RequestBodyLimitLayer::new(limit_bytes))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(shared)
}

async fn health(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let audit = Audit::start(&headers, "healthz");
    if let Err(e) = admit(&state, &headers) {
        audit.finish("deny", e.code());
        return into_response(e).into_response();
    }
    audit.finish("allow", "OK");
    (StatusCode::OK, Json(json!({"status":"ok"}))).into_response()
}

async fn list_roots(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let audit = Audit::start(&headers, "roots");
    if let Err(e) = admit(&state, &headers) {
        audit.finish("deny", e.code());
        return into_response(e).into_response();
    }
    audit.finish("allow", "OK");
    (StatusCode::OK, Json(json!({"roots": state.roots.as_slice()}))).into_response()
}

async fn check_avatar(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<AvatarRequest>, JsonRejection>,
) -> Response {
    let audit = Audit::start(&headers, "avatar");
    let req = match admit(&state, &headers).and_then(|()| parse(payload)) {
        Ok(req) => req,
        Err(e) => {
            audit.finish("deny", e.code());
            return into_response(e).into_response();
        }
    };
    // the reason stays in the audit log, callers only see present/absent
    let body = match avatar::check(&req.url, &state.roots) {
        Ok(path) => {
            audit.finish("accept", "OK");
            AvatarResponse { uri: Some(path.to_file_uri()), path: Some(path) }
        }
        Err(reason) => {
            audit.finish("reject", reason.code());
            AvatarResponse { path: None, uri: None }
        }
    };
    (StatusCode::OK, Json(body)).into_response()
}

async fn chat_icons(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatsRequest>, JsonRejection>,
) -> Response {
    let audit = Audit::start(&headers, "icons");
    let req = match admit(&state, &headers).and_then(|()| parse(payload)) {
        Ok(req) => req,
        Err(e) => {
            audit.finish("deny", e.code());
            return into_response(e).into_response();
        }
    };
    let entries: Vec<IconEntry> = req
        .chats
        .iter()
        .map(|chat| IconEntry {
            chat_id: chat.id.clone(),
            title: chat.display_title().to_string(),
            icon: icons::resolve_chat_icon(chat, &state.roots),
        })
        .collect();
    audit.finish("allow", "OK");
    (StatusCode::OK, Json(json!({"icons": entries}))).into_response()
}

async fn unread_chats(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<Json<ChatsRequest>, JsonRejection>,
) -> Response {
    let audit = Audit::start(&headers, "unread");
    let req = match admit(&state, &headers).and_then(|()| parse(payload)) {
        Ok(req) => req,
        Err(e) => {
            audit.finish("deny", e.code());
            return into_response(e).into_response();
        }
    };
    let (unread, total) = chat::unread_view(&req.chats);
    let entries: Vec<UnreadEntry> = unread
        .into_iter()
        .map(|c| UnreadEntry {
            chat_id: c.id.clone(),
            title: c.display_title().to_string(),
            network: c.network.clone(),
            unread_count: c.unread_count,
            is_pinned: c.is_pinned,
            is_muted: c.is_muted,
            last_activity: c.last_activity.clone(),
            icon: icons::resolve_chat_icon(c, &state.roots),
        })
        .collect();
    audit.finish("allow", "OK");
    (StatusCode::OK, Json(json!({"total_unread": total, "chats": entries}))).into_response()
}

struct Audit {
    request_id: String,
    origin: String,
    token_present: bool,
    route: &'static str,
    started: Instant,
}

impl Audit {
    fn start(headers: &HeaderMap, route: &'static str) -> Self {
        Self {
            request_id: uuid::Uuid::new_v4().to_string(),
            origin: headers
                .get(header::ORIGIN)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("")
                .to_string(),
            token_present: security::extract_bearer(headers).is_some(),
            route,
            started: Instant::now(),
        }
    }

    fn finish(&self, decision: &str, code: &str) {
        tracing::info!(
            request_id = %self.request_id,
            origin = %self.origin,
            token_present = self.token_present,
            route = self.route,
            decision = decision,
            code = code,
            duration_ms = self.started.elapsed().as_millis() as u64,
            "audit"
        );
    }
}

fn admit(state: &AppState, headers: &HeaderMap) -> AppResult<()> {
    security::require_bearer(headers, &state.cfg.auth.bearer_token)?;
    security::check_origin(headers, &state.cfg.auth.allowed_origins)?;
    security::content_length_ok(headers, state.cfg.limits.max_request_kb)?;
    let token = security::extract_bearer(headers);
    state.rls.check(token.as_deref())
}

async fn fallback(headers: HeaderMap) -> Response {
    let err = AppError::NotFound;
    Audit::start(&headers, "fallback").finish("deny", err.code());
    into_response(err).into_response()
}

fn parse<T>(payload: Result<Json<T>, JsonRejection>) -> AppResult<T> {
    payload.map(|Json(v)| v).map_err(|rej| {
        if rej.status() == StatusCode::PAYLOAD_TOO_LARGE {
            AppError::RequestTooLarge
        } else {
            AppError::BadRequest(rej.body_text())
        }
    })
}
