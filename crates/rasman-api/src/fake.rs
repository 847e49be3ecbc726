//! An in-process stand-in for a RAS management API.
//!
//! Serves the same routes as the real server from in-memory state, with
//! knobs to make individual routes fail or hang and to switch between the
//! payload variants older servers produce.  Every request is recorded so
//! tests can assert which calls were (or were not) made.

use std::collections::{HashMap, HashSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use axum::{
    extract::{Path, Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tokio::task::JoinHandle;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use rasman_shared::{Category, ChatRoom, Keyword, Session, SuspendedStatus, User, VersionInfo};

use crate::client::ApiClient;

/// Route groups that can be made to fail or hang.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Sessions,
    UserSessions,
    Users,
    UserAccount,
    Rooms,
    Categories,
    Keywords,
    Version,
    InstantMessage,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub from: String,
    pub to: String,
    pub text: String,
}

#[derive(Debug)]
pub struct FakeState {
    pub users: Vec<User>,
    pub passwords: HashMap<String, String>,
    pub sessions: Vec<Session>,
    pub rooms: Vec<ChatRoom>,
    pub categories: Vec<Category>,
    pub keywords: Vec<Keyword>,
    pub version: VersionInfo,
    pub messages: Vec<SentMessage>,
    /// `GET /directory/category/0/keyword` returns every keyword.  When off
    /// it returns only uncategorized keywords, like older servers.
    pub aggregate_keywords: bool,
    /// `GET /session/{screen_name}` exists.  When off it answers 404.
    pub per_user_sessions: bool,
    /// Routes answering 500.
    pub failing: HashSet<Route>,
    /// Routes that never answer within any sane timeout.
    pub hanging: HashSet<Route>,
    /// `"METHOD /path"` of every request, in arrival order.
    pub requests: Vec<String>,
    next_id: i64,
}

impl Default for FakeState {
    fn default() -> Self {
        Self {
            users: Vec::new(),
            passwords: HashMap::new(),
            sessions: Vec::new(),
            rooms: Vec::new(),
            categories: Vec::new(),
            keywords: Vec::new(),
            version: VersionInfo {
                version: "0.11.0".into(),
                commit: "abc1234".into(),
                date: "2024-06-01".into(),
            },
            messages: Vec::new(),
            aggregate_keywords: true,
            per_user_sessions: true,
            failing: HashSet::new(),
            hanging: HashSet::new(),
            requests: Vec::new(),
            next_id: 100,
        }
    }
}

impl FakeState {
    pub fn with_user(mut self, screen_name: &str) -> Self {
        self.users.push(User {
            id: Uuid::new_v4().to_string(),
            screen_name: screen_name.into(),
            ..User::default()
        });
        self
    }

    pub fn with_session(mut self, screen_name: &str) -> Self {
        let n = self.sessions.len();
        self.sessions.push(Session {
            id: format!("sess-{n}"),
            screen_name: screen_name.into(),
            online_seconds: 120.0,
            remote_addr: "10.0.0.1".into(),
            remote_port: 5190,
            ..Session::default()
        });
        self
    }

    pub fn with_room(mut self, name: &str) -> Self {
        self.rooms.push(ChatRoom {
            name: name.into(),
            create_time: "2024-01-01T00:00:00Z".into(),
            ..ChatRoom::default()
        });
        self
    }

    pub fn with_category(mut self, id: i64, name: &str) -> Self {
        self.categories.push(Category {
            id,
            name: name.into(),
        });
        self
    }

    pub fn with_keyword(mut self, id: i64, name: &str, category_id: i64) -> Self {
        self.keywords.push(Keyword {
            id,
            name: name.into(),
            category_id,
        });
        self
    }

    pub fn failing(mut self, route: Route) -> Self {
        self.failing.insert(route);
        self
    }

    pub fn hanging(mut self, route: Route) -> Self {
        self.hanging.insert(route);
        self
    }

    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

type Shared = Arc<Mutex<FakeState>>;

/// A running fake server.  The server task stops when this is dropped.
pub struct FakeRas {
    addr: SocketAddr,
    state: Shared,
    task: JoinHandle<()>,
}

impl FakeRas {
    pub async fn start() -> std::io::Result<Self> {
        Self::start_with(FakeState::default()).await
    }

    pub async fn start_with(state: FakeState) -> std::io::Result<Self> {
        let state = Arc::new(Mutex::new(state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let app = build_router(state.clone());

        let task = tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, app).await {
                tracing::error!(error = %e, "Fake RAS server stopped");
            }
        });

        Ok(Self { addr, state, task })
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn client(&self) -> ApiClient {
        ApiClient::new(&self.url())
    }

    pub fn state(&self) -> MutexGuard<'_, FakeState> {
        lock(&self.state)
    }

    /// Requests seen so far whose `"METHOD /path"` starts with `prefix`.
    pub fn requests_matching(&self, prefix: &str) -> Vec<String> {
        self.state()
            .requests
            .iter()
            .filter(|r| r.starts_with(prefix))
            .cloned()
            .collect()
    }
}

impl Drop for FakeRas {
    fn drop(&mut self) {
        self.task.abort();
    }
}

fn lock(state: &Shared) -> MutexGuard<'_, FakeState> {
    match state.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn build_router(state: Shared) -> Router {
    Router::new()
        .route("/session", get(list_sessions))
        .route("/session/:screen_name", get(user_sessions))
        .route("/user", get(list_users).post(create_user).delete(delete_user))
        .route("/user/password", put(reset_password))
        .route(
            "/user/:screen_name/account",
            get(user_account).patch(update_account),
        )
        .route("/chat/room/public", get(list_rooms).post(create_room))
        .route("/chat/room/public/:name", delete(delete_room))
        .route("/directory/category", get(list_categories).post(create_category))
        .route("/directory/category/:id", delete(delete_category))
        .route("/directory/category/:id/keyword", get(category_keywords))
        .route("/directory/keyword", post(create_keyword))
        .route("/directory/keyword/:id", delete(delete_keyword))
        .route("/version", get(version))
        .route("/instant-message", post(instant_message))
        .layer(middleware::from_fn_with_state(state.clone(), record_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn record_request(State(state): State<Shared>, req: Request, next: Next) -> Response {
    let line = format!("{} {}", req.method(), req.uri().path());
    lock(&state).requests.push(line);
    next.run(req).await
}

/// Apply the failure knobs for a route.  Returns an error response when the
/// route is rigged to fail; sleeps first when it is rigged to hang.
async fn gate(state: &Shared, route: Route) -> Result<(), StatusCode> {
    let (fail, hang) = {
        let guard = lock(state);
        (guard.failing.contains(&route), guard.hanging.contains(&route))
    };
    if hang {
        tokio::time::sleep(Duration::from_secs(60)).await;
    }
    if fail {
        return Err(StatusCode::INTERNAL_SERVER_ERROR);
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

async fn list_sessions(State(state): State<Shared>) -> Result<Json<Value>, StatusCode> {
    gate(&state, Route::Sessions).await?;
    let guard = lock(&state);
    Ok(Json(json!({
        "count": guard.sessions.len(),
        "sessions": guard.sessions,
    })))
}

async fn user_sessions(
    State(state): State<Shared>,
    Path(screen_name): Path<String>,
) -> Result<Json<Value>, StatusCode> {
    gate(&state, Route::UserSessions).await?;
    let guard = lock(&state);
    if !guard.per_user_sessions {
        return Err(StatusCode::NOT_FOUND);
    }
    let sessions: Vec<&Session> = guard
        .sessions
        .iter()
        .filter(|s| s.screen_name.eq_ignore_ascii_case(&screen_name))
        .collect();
    Ok(Json(json!({ "count": sessions.len(), "sessions": sessions })))
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct CreateUserBody {
    screen_name: String,
    password: String,
}

#[derive(Deserialize)]
struct ScreenNameBody {
    screen_name: String,
}

#[derive(Deserialize)]
struct AccountBody {
    suspended_status: Option<SuspendedStatus>,
}

async fn list_users(State(state): State<Shared>) -> Result<Json<Value>, StatusCode> {
    gate(&state, Route::Users).await?;
    let guard = lock(&state);
    let users: Vec<Value> = guard
        .users
        .iter()
        .map(|u| {
            json!({
                "id": u.id,
                "screen_name": u.screen_name,
                "is_icq": u.is_icq,
                "suspended_status": u.suspended_status,
            })
        })
        .collect();
    Ok(Json(Value::Array(users)))
}

async fn create_user(
    State(state): State<Shared>,
    Json(body): Json<CreateUserBody>,
) -> Result<StatusCode, StatusCode> {
    gate(&state, Route::Users).await?;
    let mut guard = lock(&state);
    if body.screen_name.trim().is_empty() || body.password.is_empty() {
        return Err(StatusCode::BAD_REQUEST);
    }
    if guard
        .users
        .iter()
        .any(|u| u.screen_name.eq_ignore_ascii_case(&body.screen_name))
    {
        return Err(StatusCode::CONFLICT);
    }
    guard.users.push(User {
        id: Uuid::new_v4().to_string(),
        screen_name: body.screen_name.clone(),
        ..User::default()
    });
    guard.passwords.insert(body.screen_name, body.password);
    Ok(StatusCode::CREATED)
}

async fn delete_user(
    State(state): State<Shared>,
    Json(body): Json<ScreenNameBody>,
) -> Result<StatusCode, StatusCode> {
    gate(&state, Route::Users).await?;
    let mut guard = lock(&state);
    let before = guard.users.len();
    guard
        .users
        .retain(|u| !u.screen_name.eq_ignore_ascii_case(&body.screen_name));
    if guard.users.len() == before {
        Err(StatusCode::NOT_FOUND)
    } else {
        Ok(StatusCode::NO_CONTENT)
    }
}

async fn reset_password(
    State(state): State<Shared>,
    Json(body): Json<CreateUserBody>,
) -> Result<StatusCode, StatusCode> {
    gate(&state, Route::Users).await?;
    let mut guard = lock(&state);
    if !guard
        .users
        .iter()
        .any(|u| u.screen_name.eq_ignore_ascii_case(&body.screen_name))
    {
        return Err(StatusCode::NOT_FOUND);
    }
    guard.passwords.insert(body.screen_name, body.password);
    Ok(StatusCode::NO_CONTENT)
}

async fn user_account(
    State(state): State<Shared>,
    Path(screen_name): Path<String>,
) -> Result<Json<User>, StatusCode> {
    gate(&state, Route::UserAccount).await?;
    let guard = lock(&state);
    guard
        .users
        .iter()
        .find(|u| u.screen_name.eq_ignore_ascii_case(&screen_name))
        .cloned()
        .map(Json)
        .ok_or(StatusCode::NOT_FOUND)
}

async fn update_account(
    State(state): State<Shared>,
    Path(screen_name): Path<String>,
    Json(body): Json<AccountBody>,
) -> Result<StatusCode, StatusCode> {
    gate(&state, Route::UserAccount).await?;
    let mut guard = lock(&state);
    let user = guard
        .users
        .iter_mut()
        .find(|u| u.screen_name.eq_ignore_ascii_case(&screen_name))
        .ok_or(StatusCode::NOT_FOUND)?;
    user.suspended_status = body.suspended_status;
    Ok(StatusCode::NO_CONTENT)
}

// ---------------------------------------------------------------------------
// Chat rooms
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct NameBody {
    name: String,
}

async fn list_rooms(State(state): State<Shared>) -> Result<Json<Vec<ChatRoom>>, StatusCode> {
    gate(&state, Route::Rooms).await?;
    Ok(Json(lock(&state).rooms.clone()))
}

async fn create_room(
    State(state): State<Shared>,
    Json(body): Json<NameBody>,
) -> Result<StatusCode, StatusCode> {
    gate(&state, Route::Rooms).await?;
    let mut guard = lock(&state);
    if guard.rooms.iter().any(|r| r.name == body.name) {
        return Err(StatusCode::CONFLICT);
    }
    guard.rooms.push(ChatRoom {
        name: body.name,
        create_time: "2024-01-01T00:00:00Z".into(),
        ..ChatRoom::default()
    });
    Ok(StatusCode::CREATED)
}

async fn delete_room(
    State(state): State<Shared>,
    Path(name): Path<String>,
) -> Result<StatusCode, StatusCode> {
    gate(&state, Route::Rooms).await?;
    let mut guard = lock(&state);
    let before = guard.rooms.len();
    guard.rooms.retain(|r| r.name != name);
    if guard.rooms.len() == before {
        Err(StatusCode::NOT_FOUND)
    } else {
        Ok(StatusCode::NO_CONTENT)
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct KeywordBody {
    name: String,
    #[serde(default)]
    category_id: i64,
}

async fn list_categories(State(state): State<Shared>) -> Result<Json<Vec<Category>>, StatusCode> {
    gate(&state, Route::Categories).await?;
    Ok(Json(lock(&state).categories.clone()))
}

async fn create_category(
    State(state): State<Shared>,
    Json(body): Json<NameBody>,
) -> Result<(StatusCode, Json<Category>), StatusCode> {
    gate(&state, Route::Categories).await?;
    let mut guard = lock(&state);
    let category = Category {
        id: guard.allocate_id(),
        name: body.name,
    };
    guard.categories.push(category.clone());
    Ok((StatusCode::CREATED, Json(category)))
}

async fn delete_category(
    State(state): State<Shared>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    gate(&state, Route::Categories).await?;
    let mut guard = lock(&state);
    let before = guard.categories.len();
    guard.categories.retain(|c| c.id != id);
    if guard.categories.len() == before {
        return Err(StatusCode::NOT_FOUND);
    }
    guard.keywords.retain(|k| k.category_id != id);
    Ok(StatusCode::NO_CONTENT)
}

/// Per-category listings omit `category_id`, like the real server.  The
/// category 0 listing is the aggregate view and does carry it.
async fn category_keywords(
    State(state): State<Shared>,
    Path(id): Path<i64>,
) -> Result<Json<Value>, StatusCode> {
    gate(&state, Route::Keywords).await?;
    let guard = lock(&state);

    if id == 0 {
        let keywords: Vec<&Keyword> = guard
            .keywords
            .iter()
            .filter(|k| guard.aggregate_keywords || k.category_id == 0)
            .collect();
        return Ok(Json(json!(keywords)));
    }

    if !guard.categories.iter().any(|c| c.id == id) {
        return Err(StatusCode::NOT_FOUND);
    }
    let keywords: Vec<Value> = guard
        .keywords
        .iter()
        .filter(|k| k.category_id == id)
        .map(|k| json!({ "id": k.id, "name": k.name }))
        .collect();
    Ok(Json(Value::Array(keywords)))
}

async fn create_keyword(
    State(state): State<Shared>,
    Json(body): Json<KeywordBody>,
) -> Result<(StatusCode, Json<Keyword>), StatusCode> {
    gate(&state, Route::Keywords).await?;
    let mut guard = lock(&state);
    if body.category_id != 0 && !guard.categories.iter().any(|c| c.id == body.category_id) {
        return Err(StatusCode::BAD_REQUEST);
    }
    let keyword = Keyword {
        id: guard.allocate_id(),
        name: body.name,
        category_id: body.category_id,
    };
    guard.keywords.push(keyword.clone());
    Ok((StatusCode::CREATED, Json(keyword)))
}

async fn delete_keyword(
    State(state): State<Shared>,
    Path(id): Path<i64>,
) -> Result<StatusCode, StatusCode> {
    gate(&state, Route::Keywords).await?;
    let mut guard = lock(&state);
    let before = guard.keywords.len();
    guard.keywords.retain(|k| k.id != id);
    if guard.keywords.len() == before {
        Err(StatusCode::NOT_FOUND)
    } else {
        Ok(StatusCode::NO_CONTENT)
    }
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
struct MessageBody {
    from: String,
    to: String,
    text: String,
}

async fn version(State(state): State<Shared>) -> Result<Json<VersionInfo>, StatusCode> {
    gate(&state, Route::Version).await?;
    Ok(Json(lock(&state).version.clone()))
}

async fn instant_message(
    State(state): State<Shared>,
    Json(body): Json<MessageBody>,
) -> Response {
    if let Err(status) = gate(&state, Route::InstantMessage).await {
        return status.into_response();
    }
    lock(&state).messages.push(SentMessage {
        from: body.from,
        to: body.to,
        text: body.text,
    });
    (StatusCode::OK, Json(json!({ "sent": true }))).into_response()
}
