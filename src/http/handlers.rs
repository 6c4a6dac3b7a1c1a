use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::app::auth::{LoginInput, RegisterInput};
use crate::app::clamp_limit;
use crate::app::posts::CreatePostInput;
use crate::app::purge::SweepReport;
use crate::app::users::UpdateProfileInput;
use crate::domain::post::{Post, PostFilter, PostView};
use crate::domain::user::{ProfileStats, User, UserFilter};
use crate::http::{AdminUser, AppError, AuthUser, JsonBody};
use crate::AppState;

#[derive(Serialize)]
pub(crate) struct HealthResponse {
    status: &'static str,
}

#[derive(Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

#[derive(Deserialize)]
pub struct CursorQuery {
    pub cursor: Option<String>,
}

fn parse_cursor(cursor: Option<String>) -> Result<Option<(OffsetDateTime, Uuid)>, AppError> {
    let Some(cursor) = cursor else {
        return Ok(None);
    };

    let (timestamp, id) = cursor
        .split_once('/')
        .ok_or_else(|| AppError::bad_request("invalid cursor"))?;

    let timestamp = OffsetDateTime::parse(timestamp, &Rfc3339)
        .map_err(|_| AppError::bad_request("invalid cursor"))?;
    let id = Uuid::parse_str(id).map_err(|_| AppError::bad_request("invalid cursor"))?;

    Ok(Some((timestamp, id)))
}

fn encode_cursor(cursor: Option<(OffsetDateTime, Uuid)>) -> Option<String> {
    let (timestamp, id) = cursor?;
    let timestamp = timestamp.format(&Rfc3339).ok()?;
    Some(format!("{}/{}", timestamp, id))
}

pub(crate) async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let status = if state.store.ping().await.is_ok() {
        "ok"
    } else {
        "degraded"
    };
    Json(HealthResponse { status })
}

pub async fn register(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<RegisterInput>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    state
        .auth_service()
        .register(payload)
        .await
        .map_err(|err| AppError::from_service(err, "failed to register"))?;

    Ok((
        StatusCode::CREATED,
        Json(MessageResponse {
            message: "Registered, but approval is expected.",
        }),
    ))
}

#[derive(Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub token_type: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub expires_at: OffsetDateTime,
    pub user: User,
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(payload): JsonBody<LoginInput>,
) -> Result<Json<LoginResponse>, AppError> {
    let outcome = state
        .auth_service()
        .login(payload)
        .await
        .map_err(|err| AppError::from_service(err, "failed to login"))?;

    Ok(Json(LoginResponse {
        token: outcome.token.token,
        token_type: "Bearer",
        expires_at: outcome.token.expires_at,
        user: outcome.user,
    }))
}

pub async fn logout(
    State(state): State<AppState>,
    AuthUser(session): AuthUser,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .auth_service()
        .logout(&session)
        .await
        .map_err(|err| AppError::from_service(err, "failed to logout"))?;

    Ok(Json(MessageResponse {
        message: "Logged out.",
    }))
}

#[derive(Serialize)]
pub struct ProfileResponse {
    pub user: User,
    pub stats: ProfileStats,
}

pub async fn get_profile(
    State(state): State<AppState>,
    auth: AuthUser,
) -> Result<Json<ProfileResponse>, AppError> {
    let profile = state
        .profile_service()
        .profile(auth.user_id())
        .await
        .map_err(|err| AppError::from_service(err, "failed to load profile"))?;

    Ok(Json(ProfileResponse {
        user: profile.user,
        stats: profile.stats,
    }))
}

#[derive(Serialize)]
pub struct UpdateProfileResponse {
    pub message: &'static str,
    pub user: User,
}

pub async fn update_profile(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<UpdateProfileInput>,
) -> Result<Json<UpdateProfileResponse>, AppError> {
    let user = state
        .profile_service()
        .update_profile(auth.user_id(), payload)
        .await
        .map_err(|err| AppError::from_service(err, "failed to update profile"))?;

    Ok(Json(UpdateProfileResponse {
        message: "Profile updated.",
        user,
    }))
}

pub async fn list_posts(
    State(state): State<AppState>,
    auth: AuthUser,
    Query(query): Query<CursorQuery>,
) -> Result<Json<ListResponse<PostView>>, AppError> {
    let cursor = parse_cursor(query.cursor)?;
    let page = state
        .post_service()
        .feed(auth.user_id(), cursor)
        .await
        .map_err(|err| AppError::from_service(err, "failed to list posts"))?;

    Ok(Json(ListResponse {
        items: page.items,
        next_cursor: encode_cursor(page.next_cursor),
    }))
}

#[derive(Serialize)]
pub struct CreatePostResponse {
    pub message: &'static str,
    pub post: PostView,
}

pub async fn create_post(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(payload): JsonBody<CreatePostInput>,
) -> Result<(StatusCode, Json<CreatePostResponse>), AppError> {
    let post = state
        .post_service()
        .create(auth.user_id(), payload)
        .await
        .map_err(|err| AppError::from_service(err, "failed to create post"))?;

    Ok((
        StatusCode::CREATED,
        Json(CreatePostResponse {
            message: "Post created.",
            post,
        }),
    ))
}

#[derive(Serialize)]
pub struct LikeResponse {
    pub message: &'static str,
    pub is_liked: bool,
    pub likes_count: i64,
}

pub async fn toggle_like(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<LikeResponse>, AppError> {
    let toggle = state
        .engagement_service()
        .toggle_like(auth.user_id(), post_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to toggle like"))?;

    Ok(Json(LikeResponse {
        message: if toggle.is_liked {
            "Post liked."
        } else {
            "Post unliked."
        },
        is_liked: toggle.is_liked,
        likes_count: toggle.likes_count,
    }))
}

pub async fn delete_post(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .post_service()
        .delete_own(auth.user_id(), post_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to delete post"))?;

    Ok(Json(MessageResponse {
        message: "Post is soft deleted.",
    }))
}

#[derive(Deserialize)]
pub struct AdminUsersQuery {
    #[serde(default)]
    pub filter: UserFilter,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Serialize)]
pub struct AdminUsersResponse {
    pub items: Vec<User>,
    pub next_cursor: Option<String>,
    pub pending_approvals: i64,
}

pub async fn admin_list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminUsersQuery>,
) -> Result<Json<AdminUsersResponse>, AppError> {
    let cursor = parse_cursor(query.cursor)?;
    let listing = state
        .admin_service()
        .list_users(query.filter, cursor, clamp_limit(query.limit))
        .await
        .map_err(|err| AppError::from_service(err, "failed to list users"))?;

    Ok(Json(AdminUsersResponse {
        items: listing.page.items,
        next_cursor: encode_cursor(listing.page.next_cursor),
        pending_approvals: listing.pending_approvals,
    }))
}

#[derive(Deserialize)]
pub struct ApprovalRequest {
    pub approved: bool,
}

pub async fn admin_set_approval(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<Uuid>,
    JsonBody(payload): JsonBody<ApprovalRequest>,
) -> Result<Json<User>, AppError> {
    let user = state
        .admin_service()
        .set_approval(user_id, payload.approved)
        .await
        .map_err(|err| AppError::from_service(err, "failed to update approval"))?;

    Ok(Json(user))
}

#[derive(Deserialize)]
pub struct DeleteUserQuery {
    #[serde(default)]
    pub force: bool,
}

#[derive(Serialize)]
pub struct CascadeResponse {
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posts_affected: Option<u64>,
}

pub async fn admin_delete_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<Uuid>,
    Query(query): Query<DeleteUserQuery>,
) -> Result<Json<CascadeResponse>, AppError> {
    let service = state.soft_delete_service();
    if query.force {
        service
            .force_delete_user(user_id)
            .await
            .map_err(|err| AppError::from_service(err, "failed to delete user"))?;
        return Ok(Json(CascadeResponse {
            message: "User is permanently deleted.",
            posts_affected: None,
        }));
    }

    let outcome = service
        .delete_user(user_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to delete user"))?;

    Ok(Json(CascadeResponse {
        message: "User is soft deleted.",
        posts_affected: Some(outcome.posts_affected),
    }))
}

pub async fn admin_restore_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(user_id): Path<Uuid>,
) -> Result<Json<CascadeResponse>, AppError> {
    let outcome = state
        .soft_delete_service()
        .restore_user(user_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to restore user"))?;

    Ok(Json(CascadeResponse {
        message: "User is restored.",
        posts_affected: Some(outcome.posts_affected),
    }))
}

#[derive(Deserialize)]
pub struct AdminPostsQuery {
    #[serde(default)]
    pub filter: PostFilter,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

pub async fn admin_list_posts(
    State(state): State<AppState>,
    _admin: AdminUser,
    Query(query): Query<AdminPostsQuery>,
) -> Result<Json<ListResponse<Post>>, AppError> {
    let cursor = parse_cursor(query.cursor)?;
    let page = state
        .post_service()
        .list(query.filter, cursor, clamp_limit(query.limit))
        .await
        .map_err(|err| AppError::from_service(err, "failed to list posts"))?;

    Ok(Json(ListResponse {
        items: page.items,
        next_cursor: encode_cursor(page.next_cursor),
    }))
}

pub async fn admin_delete_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<MessageResponse>, AppError> {
    state
        .post_service()
        .delete_any(post_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to delete post"))?;

    Ok(Json(MessageResponse {
        message: "Post is soft deleted.",
    }))
}

pub async fn admin_restore_post(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(post_id): Path<Uuid>,
) -> Result<Json<Post>, AppError> {
    let post = state
        .post_service()
        .restore(post_id)
        .await
        .map_err(|err| AppError::from_service(err, "failed to restore post"))?;

    Ok(Json(post))
}

pub async fn admin_purge(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<SweepReport>, AppError> {
    let report = state
        .purge_service()
        .sweep(OffsetDateTime::now_utc())
        .await
        .map_err(|err| AppError::from_service(err, "failed to run purge sweep"))?;

    Ok(Json(report))
}
