#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use axum::Router;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use http_body_util::BodyExt;
use serde_json::Value;
use time::OffsetDateTime;
use tower::ServiceExt;
use uuid::Uuid;

use townsquare::app::auth::hash_password;
use townsquare::domain::user::NewUser;
use townsquare::infra::memory::MemoryStore;
use townsquare::infra::queue::MemoryQueue;
use townsquare::infra::repo::Store;
use townsquare::infra::storage::MemoryPictureStore;
use townsquare::AppState;

// "0123456789abcdef0123456789abcdef"
const TEST_TOKEN_KEY: [u8; 32] = *b"0123456789abcdef0123456789abcdef";
pub const DEFAULT_PASSWORD: &str = "testpassword123";
/// Smallest byte sequence `image::guess_format` recognises as PNG.
pub const PNG_BYTES: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0];

// ---------------------------------------------------------------------------
// TestApp: one in-memory application per test
// ---------------------------------------------------------------------------

pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub memory: MemoryStore,
    pub queue: MemoryQueue,
    pub pictures: MemoryPictureStore,
}

pub struct TestResponse {
    pub status: StatusCode,
    body_bytes: bytes::Bytes,
}

impl TestResponse {
    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body_bytes).unwrap_or(Value::Null)
    }

    pub fn error_message(&self) -> String {
        self.json()["error"].as_str().unwrap_or("").to_string()
    }

    /// Messages reported for one field of a 422 response.
    pub fn field_errors(&self, field: &str) -> Vec<String> {
        self.json()["fields"][field]
            .as_array()
            .map(|messages| {
                messages
                    .iter()
                    .filter_map(|message| message.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

pub struct TestUser {
    pub id: Uuid,
    pub email: String,
    pub token: String,
}

pub fn app() -> TestApp {
    TestApp::with_pictures(MemoryPictureStore::new())
}

pub fn png_base64() -> String {
    STANDARD.encode(PNG_BYTES)
}

impl TestApp {
    pub fn with_pictures(pictures: MemoryPictureStore) -> Self {
        let memory = MemoryStore::new();
        Self::build(Store::from_memory(memory.clone()), memory, pictures)
    }

    /// Uses `store` for the application while keeping `memory` reachable for
    /// direct setup; `store` is expected to wrap `memory`.
    pub fn with_store(store: Store, memory: MemoryStore) -> Self {
        Self::build(store, memory, MemoryPictureStore::new())
    }

    fn build(store: Store, memory: MemoryStore, pictures: MemoryPictureStore) -> Self {
        let queue = MemoryQueue::new();

        let state = AppState {
            store,
            queue: Arc::new(queue.clone()),
            pictures: Arc::new(pictures.clone()),
            token_key: TEST_TOKEN_KEY,
            token_ttl_days: 30,
            purge_retention_days: 10,
            purge_batch_size: 3,
            picture_max_bytes: 2 * 1024 * 1024,
            max_body_bytes: 4 * 1024 * 1024,
        };
        let router = townsquare::http::router(state.clone());

        TestApp {
            router,
            state,
            memory,
            queue,
            pictures,
        }
    }

    // ------------------------------------------------------------------
    // Low-level request helper
    // ------------------------------------------------------------------
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("host", "localhost");

        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }

        let request = if let Some(body) = body {
            builder
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        };

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("oneshot failed");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("failed to collect body")
            .to_bytes();

        TestResponse { status, body_bytes }
    }

    pub async fn get(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::GET, path, None, token).await
    }

    pub async fn post(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::POST, path, None, token).await
    }

    pub async fn post_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.request(Method::POST, path, Some(body), token).await
    }

    pub async fn patch_json(&self, path: &str, body: Value, token: Option<&str>) -> TestResponse {
        self.request(Method::PATCH, path, Some(body), token).await
    }

    pub async fn delete(&self, path: &str, token: Option<&str>) -> TestResponse {
        self.request(Method::DELETE, path, None, token).await
    }

    // ------------------------------------------------------------------
    // Fixtures
    // ------------------------------------------------------------------

    /// Inserts a user directly, bypassing registration.
    pub async fn insert_user(&self, name: &str, approved: bool, admin: bool) -> Uuid {
        let email = format!("{}@example.com", name);
        let user = self
            .state
            .store
            .users
            .create(NewUser {
                name: name.to_string(),
                email,
                password_hash: hash_password(DEFAULT_PASSWORD).expect("hash_password failed"),
                description: None,
                profile_picture: None,
                is_approved: approved,
                is_admin: admin,
            })
            .await
            .expect("insert user failed");
        user.id
    }

    /// An approved user with a fresh token.
    pub async fn create_user(&self, name: &str) -> TestUser {
        let id = self.insert_user(name, true, false).await;
        self.user_with_token(id, name).await
    }

    pub async fn create_admin(&self, name: &str) -> TestUser {
        let id = self.insert_user(name, true, true).await;
        self.user_with_token(id, name).await
    }

    async fn user_with_token(&self, id: Uuid, name: &str) -> TestUser {
        let issued = self
            .state
            .auth_service()
            .issue_token(id)
            .await
            .expect("issue_token failed");
        TestUser {
            id,
            email: format!("{}@example.com", name),
            token: issued.token,
        }
    }

    pub async fn create_post(&self, user_id: Uuid, content: &str) -> Uuid {
        self.state
            .store
            .posts
            .create(user_id, content.to_string())
            .await
            .expect("create post failed")
            .expect("author is not live")
            .post
            .id
    }

    pub async fn soft_delete_post_at(&self, post_id: Uuid, at: OffsetDateTime) {
        let deleted = self
            .state
            .store
            .posts
            .soft_delete(post_id, at)
            .await
            .expect("soft delete failed");
        assert!(deleted, "post was not live");
    }

    pub async fn post_is_live(&self, post_id: Uuid) -> Option<bool> {
        self.state
            .store
            .posts
            .find_any(post_id)
            .await
            .expect("find post failed")
            .map(|post| post.is_live())
    }
}
