#![allow(dead_code)]

use async_trait::async_trait;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Semaphore;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use pameran::domain::engagement::{Comment, CommentId, Like};
use pameran::domain::gallery::{FeedPage, GalleryId, GalleryItem};
use pameran::domain::media::{Media, MediaId};
use pameran::domain::user::{User, UserId};
use pameran::http::ApiError;
use pameran::infra::api::GalleryApi;

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub const VIEWER: UserId = UserId(1);

pub fn user(id: i64) -> User {
    User {
        id: UserId(id),
        full_name: format!("User {}", id),
        email: Some(format!("user{}@example.com", id)),
        profile_picture: None,
    }
}

pub fn gallery(id: i64) -> GalleryItem {
    GalleryItem {
        id: GalleryId(id),
        caption: Some(format!("Gallery {}", id)),
        media: vec![Media {
            id: MediaId(id * 10),
            url: format!("https://cdn.example.com/{}.jpg", id),
            position: 0,
        }],
        likes: Vec::new(),
        likes_count: 0,
        comments: Vec::new(),
        owner: Some(user(2)),
        event_title: None,
    }
}

/// Gallery liked by `likers`, with the aggregate count set accordingly.
pub fn liked_gallery(id: i64, likers: &[i64]) -> GalleryItem {
    let mut item = gallery(id);
    item.likes = likers
        .iter()
        .map(|&user_id| Like {
            user_id: UserId(user_id),
        })
        .collect();
    item.likes_count = likers.len() as u32;
    item
}

pub fn galleries(ids: std::ops::RangeInclusive<i64>) -> Vec<GalleryItem> {
    ids.map(gallery).collect()
}

pub fn comment(id: i64, parent: Option<i64>) -> Comment {
    Comment {
        id: CommentId(id),
        content: format!("comment {}", id),
        author: user(id + 100),
        parent_id: parent.map(CommentId),
        created_at: None,
    }
}

pub fn temp_session_path() -> PathBuf {
    std::env::temp_dir()
        .join(format!("pameran-test-{}", Uuid::new_v4()))
        .join("session.json")
}

// ---------------------------------------------------------------------------
// FakeGalleryApi: scriptable in-memory collaborator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Call {
    Page,
    Detail,
    Like,
    Comment,
}

#[derive(Default)]
pub struct FakeGalleryApi {
    pages: Mutex<HashMap<u32, Vec<GalleryItem>>>,
    details: Mutex<HashMap<GalleryId, GalleryItem>>,
    failures: Mutex<HashMap<Call, usize>>,
    gates: Mutex<HashMap<Call, Arc<Semaphore>>>,
    calls: Mutex<HashMap<Call, usize>>,
    page_requests: Mutex<Vec<(u32, usize)>>,
    submitted: Mutex<Vec<(GalleryId, String, Option<CommentId>)>>,
    next_comment_id: AtomicI64,
}

impl FakeGalleryApi {
    pub fn new() -> Arc<Self> {
        let api = Self::default();
        api.next_comment_id.store(1000, Ordering::SeqCst);
        Arc::new(api)
    }

    pub fn with_pages(pages: Vec<Vec<GalleryItem>>) -> Arc<Self> {
        let api = Self::new();
        for (index, items) in pages.into_iter().enumerate() {
            api.set_page(index as u32 + 1, items);
        }
        api
    }

    pub fn set_page(&self, page: u32, items: Vec<GalleryItem>) {
        self.pages.lock().unwrap().insert(page, items);
    }

    pub fn set_detail(&self, item: GalleryItem) {
        self.details.lock().unwrap().insert(item.id, item);
    }

    /// The next `count` calls of `call` fail with a 503.
    pub fn fail_next(&self, call: Call, count: usize) {
        *self.failures.lock().unwrap().entry(call).or_default() += count;
    }

    /// Blocks calls of `call` until [`FakeGalleryApi::release`] lets them through.
    pub fn hold(&self, call: Call) {
        self.gates
            .lock()
            .unwrap()
            .insert(call, Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self, call: Call, count: usize) {
        if let Some(gate) = self.gates.lock().unwrap().get(&call) {
            gate.add_permits(count);
        }
    }

    pub fn calls(&self, call: Call) -> usize {
        self.calls.lock().unwrap().get(&call).copied().unwrap_or(0)
    }

    pub fn page_requests(&self) -> Vec<(u32, usize)> {
        self.page_requests.lock().unwrap().clone()
    }

    pub fn submitted(&self) -> Vec<(GalleryId, String, Option<CommentId>)> {
        self.submitted.lock().unwrap().clone()
    }

    async fn enter(&self, call: Call) -> Result<(), ApiError> {
        *self.calls.lock().unwrap().entry(call).or_default() += 1;

        let gate = self.gates.lock().unwrap().get(&call).cloned();
        if let Some(gate) = gate {
            let permit = gate.acquire().await.expect("gate closed");
            permit.forget();
        }

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&call) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ApiError::Status {
                    status: 503,
                    message: "service unavailable".into(),
                });
            }
        }
        Ok(())
    }
}

#[async_trait]
impl GalleryApi for FakeGalleryApi {
    async fn fetch_gallery_page(&self, page: u32, page_size: usize) -> Result<FeedPage, ApiError> {
        self.page_requests.lock().unwrap().push((page, page_size));
        self.enter(Call::Page).await?;
        let items = self
            .pages
            .lock()
            .unwrap()
            .get(&page)
            .cloned()
            .unwrap_or_default();
        Ok(FeedPage::from_items(items, page_size))
    }

    async fn fetch_gallery_detail(&self, id: GalleryId) -> Result<GalleryItem, ApiError> {
        self.enter(Call::Detail).await?;
        self.details
            .lock()
            .unwrap()
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::Status {
                status: 404,
                message: "gallery not found".into(),
            })
    }

    async fn toggle_like(&self, _id: GalleryId) -> Result<(), ApiError> {
        self.enter(Call::Like).await
    }

    async fn submit_comment(
        &self,
        id: GalleryId,
        content: &str,
        parent_id: Option<CommentId>,
    ) -> Result<Comment, ApiError> {
        self.submitted
            .lock()
            .unwrap()
            .push((id, content.to_string(), parent_id));
        self.enter(Call::Comment).await?;
        Ok(Comment {
            id: CommentId(self.next_comment_id.fetch_add(1, Ordering::SeqCst)),
            content: content.to_string(),
            author: user(VIEWER.0),
            parent_id,
            created_at: None,
        })
    }
}

// ---------------------------------------------------------------------------
// StubServer: the gallery API over real HTTP
// ---------------------------------------------------------------------------

pub const MALFORMED_GALLERY_ID: i64 = 999;
pub const EXPIRED_TOKEN_GALLERY_ID: i64 = 13;

#[derive(Default)]
pub struct StubState {
    pub galleries: Vec<Value>,
    pub authorizations: Mutex<Vec<Option<String>>>,
    pub request_ids: Mutex<Vec<Option<String>>>,
    pub comment_bodies: Mutex<Vec<Value>>,
}

pub struct StubServer {
    pub addr: SocketAddr,
    pub state: Arc<StubState>,
}

impl StubServer {
    pub fn base_url(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn broken_base_url(&self) -> String {
        format!("http://{}/broken", self.addr)
    }

    pub fn authorizations(&self) -> Vec<Option<String>> {
        self.state.authorizations.lock().unwrap().clone()
    }
}

#[derive(Deserialize)]
struct PageQuery {
    page: usize,
    limit: usize,
}

pub fn gallery_json(id: i64) -> Value {
    json!({
        "id": id,
        "caption": format!("Gallery {}", id),
        "media": [
            { "id": id * 10, "mediaUrl": format!("https://cdn.example.com/{}-a.jpg", id) },
            { "id": id * 10 + 1, "mediaUrl": format!("https://cdn.example.com/{}-b.jpg", id) }
        ],
        "likes": [ { "userId": 1 } ],
        "_count": { "likes": 7 },
        "comments": [
            {
                "id": id * 100,
                "content": "first",
                "parentId": null,
                "user": { "id": 5, "fullName": "Sari", "profilePicture": null },
                "createdAt": "2025-01-02T03:04:05Z"
            },
            {
                "id": id * 100 + 1,
                "content": "reply",
                "parentId": id * 100,
                "user": { "id": 6, "fullName": "Budi" }
            }
        ],
        "user": { "id": 2, "fullName": "Owner", "email": "owner@example.com" },
        "event": { "title": "Expo" }
    })
}

fn record(state: &StubState, headers: &HeaderMap) {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string)
    };
    state
        .authorizations
        .lock()
        .unwrap()
        .push(header("authorization"));
    state.request_ids.lock().unwrap().push(header("x-request-id"));
}

async fn list_galleries(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Query(query): Query<PageQuery>,
) -> Json<Value> {
    record(&state, &headers);
    let start = query.page.saturating_sub(1) * query.limit;
    let items: Vec<Value> = state
        .galleries
        .iter()
        .skip(start)
        .take(query.limit)
        .cloned()
        .collect();
    Json(json!({ "items": items, "total": state.galleries.len() }))
}

async fn get_gallery(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> (StatusCode, Json<Value>) {
    record(&state, &headers);
    if id == MALFORMED_GALLERY_ID {
        let mut body = gallery_json(id);
        body["media"][0]["mediaUrl"] = json!("");
        return (StatusCode::OK, Json(json!({ "data": body })));
    }
    match state.galleries.iter().find(|gallery| gallery["id"] == json!(id)) {
        Some(gallery) => (StatusCode::OK, Json(json!({ "data": gallery }))),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "error": "gallery not found" })),
        ),
    }
}

async fn toggle_like(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> (StatusCode, Json<Value>) {
    record(&state, &headers);
    if id == EXPIRED_TOKEN_GALLERY_ID {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "error": "token expired" })),
        );
    }
    (StatusCode::OK, Json(json!({ "liked": true })))
}

async fn add_comment(
    State(state): State<Arc<StubState>>,
    headers: HeaderMap,
    Path(_id): Path<i64>,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    record(&state, &headers);
    state.comment_bodies.lock().unwrap().push(body.clone());
    let created = json!({
        "id": 500,
        "content": body["content"],
        "parentId": body["parentId"],
        "user": { "id": 1, "fullName": "Viewer" },
        "createdAt": "2025-02-03T10:00:00Z"
    });
    (StatusCode::CREATED, Json(created))
}

async fn broken_page() -> Json<Value> {
    Json(json!({ "items": [ { "id": "not-a-number" } ] }))
}

async fn broken_detail(Path(_id): Path<i64>) -> Json<Value> {
    let mut body = gallery_json(3);
    body["comments"][0]["user"] = Value::Null;
    Json(body)
}

/// Starts the stub API on an ephemeral port inside the current runtime.
pub async fn spawn_stub_server(galleries: Vec<Value>) -> StubServer {
    let state = Arc::new(StubState {
        galleries,
        ..StubState::default()
    });

    let router = Router::new()
        .route("/api/galleries", get(list_galleries))
        .route("/api/galleries/:id", get(get_gallery))
        .route("/api/galleries/:id/like", post(toggle_like))
        .route("/api/galleries/:id/comments", post(add_comment))
        .route("/broken/galleries", get(broken_page))
        .route("/broken/galleries/:id", get(broken_detail))
        .layer(TraceLayer::new_for_http())
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("failed to bind stub server");
    let addr = listener.local_addr().expect("stub server has no address");
    tokio::spawn(async move {
        axum::serve(listener, router)
            .await
            .expect("stub server crashed");
    });

    StubServer { addr, state }
}
