use async_trait::async_trait;
use sqlx::postgres::PgRow;
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::domain::deletion::{CascadeOutcome, CascadeResult, DeletionMarker};
use crate::domain::engagement::LikeToggle;
use crate::domain::post::{Post, PostAuthor, PostFilter, PostView, PurgeCandidate};
use crate::domain::token::NewAccessToken;
use crate::domain::user::{NewUser, ProfileChanges, ProfileStats, User, UserCredentials, UserFilter};
use crate::infra::db::Db;
use crate::infra::repo::{Cursor, LikeRepo, PostRepo, RepoError, RepoResult, TokenRepo, UserRepo};

const USER_COLUMNS: &str = "id, name, email, description, profile_picture, is_approved, is_admin, \
                            created_at, updated_at, deleted_at, deletion_seq";

const POST_COLUMNS: &str = "id, user_id, content, created_at, updated_at, deleted_at, deletion_seq";

#[derive(Clone)]
pub struct PgStore {
    db: Db,
}

impl PgStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgStore {
    async fn create(&self, new_user: NewUser) -> RepoResult<User> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (name, email, password_hash, description, profile_picture, is_approved, is_admin) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(new_user.name)
        .bind(new_user.email)
        .bind(new_user.password_hash)
        .bind(new_user.description)
        .bind(new_user.profile_picture)
        .bind(new_user.is_approved)
        .bind(new_user.is_admin)
        .fetch_one(self.db.pool())
        .await
        .map_err(map_unique_email)?;

        Ok(user_from_row(&row))
    }

    async fn find_live(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(user_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_any(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn find_credentials(&self, email: &str) -> RepoResult<Option<UserCredentials>> {
        let row = sqlx::query(&format!(
            "SELECT {USER_COLUMNS}, password_hash \
             FROM users WHERE email = $1 AND deleted_at IS NULL"
        ))
        .bind(email)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.map(|row| UserCredentials {
            user: user_from_row(&row),
            password_hash: row.get("password_hash"),
        }))
    }

    async fn email_taken(&self, email: &str) -> RepoResult<bool> {
        let taken: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE email = $1)")
            .bind(email)
            .fetch_one(self.db.pool())
            .await?;
        Ok(taken)
    }

    async fn update_profile(&self, user_id: Uuid, changes: ProfileChanges) -> RepoResult<Option<User>> {
        let (description_set, description) = match changes.description {
            Some(description) => (true, description),
            None => (false, None),
        };

        let row = sqlx::query(&format!(
            "UPDATE users \
             SET name = COALESCE($2, name), \
                 description = CASE WHEN $3 THEN $4 ELSE description END, \
                 profile_picture = COALESCE($5, profile_picture), \
                 updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(changes.name)
        .bind(description_set)
        .bind(description)
        .bind(changes.profile_picture)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn set_approved(&self, user_id: Uuid, approved: bool) -> RepoResult<Option<User>> {
        let row = sqlx::query(&format!(
            "UPDATE users SET is_approved = $2, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(user_id)
        .bind(approved)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(user_from_row))
    }

    async fn list(&self, filter: UserFilter, cursor: Option<Cursor>, limit: i64) -> RepoResult<Vec<User>> {
        let condition = match filter {
            UserFilter::Live => "deleted_at IS NULL",
            UserFilter::Unapproved => "deleted_at IS NULL AND NOT is_approved",
            UserFilter::Trashed => "deleted_at IS NOT NULL",
            UserFilter::WithTrashed => "TRUE",
        };

        let rows = match cursor {
            Some((created_at, user_id)) => {
                sqlx::query(&format!(
                    "SELECT {USER_COLUMNS} FROM users \
                     WHERE {condition} \
                       AND (created_at < $1 OR (created_at = $1 AND id < $2)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $3"
                ))
                .bind(created_at)
                .bind(user_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {USER_COLUMNS} FROM users \
                     WHERE {condition} \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $1"
                ))
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(user_from_row).collect())
    }

    async fn count_pending_approval(&self) -> RepoResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE deleted_at IS NULL AND NOT is_approved",
        )
        .fetch_one(self.db.pool())
        .await?;
        Ok(count)
    }

    async fn stats(&self, user_id: Uuid) -> RepoResult<ProfileStats> {
        let row = sqlx::query(
            "SELECT COUNT(DISTINCT p.id) AS total_posts, COUNT(l.user_id) AS total_likes \
             FROM posts p \
             LEFT JOIN likes l ON l.post_id = p.id \
             WHERE p.user_id = $1 AND p.deleted_at IS NULL",
        )
        .bind(user_id)
        .fetch_one(self.db.pool())
        .await?;

        Ok(ProfileStats {
            total_posts: row.get("total_posts"),
            total_likes: row.get("total_likes"),
        })
    }

    async fn soft_delete_cascade(&self, user_id: Uuid, at: OffsetDateTime) -> RepoResult<CascadeResult> {
        let mut tx = self.db.pool().begin().await?;

        let current = sqlx::query("SELECT deleted_at FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(CascadeResult::NotFound);
        };
        if current.get::<Option<OffsetDateTime>, _>("deleted_at").is_some() {
            tx.rollback().await?;
            return Ok(CascadeResult::Unchanged);
        }

        let row = sqlx::query(
            "UPDATE users \
             SET deleted_at = $2, deletion_seq = nextval('soft_delete_seq'), updated_at = now() \
             WHERE id = $1 \
             RETURNING deleted_at, deletion_seq",
        )
        .bind(user_id)
        .bind(at)
        .fetch_one(&mut *tx)
        .await?;
        let marker = DeletionMarker {
            at: row.get("deleted_at"),
            seq: row.get("deletion_seq"),
        };

        let result = sqlx::query(
            "UPDATE posts \
             SET deleted_at = $2, deletion_seq = $3, updated_at = now() \
             WHERE user_id = $1 AND deleted_at IS NULL",
        )
        .bind(user_id)
        .bind(marker.at)
        .bind(marker.seq)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CascadeResult::Applied(CascadeOutcome {
            user_id,
            marker,
            posts_affected: result.rows_affected(),
        }))
    }

    async fn restore_cascade(&self, user_id: Uuid) -> RepoResult<CascadeResult> {
        let mut tx = self.db.pool().begin().await?;

        let current = sqlx::query("SELECT deleted_at, deletion_seq FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(current) = current else {
            tx.rollback().await?;
            return Ok(CascadeResult::NotFound);
        };
        let Some(marker) =
            DeletionMarker::from_columns(current.get("deleted_at"), current.get("deletion_seq"))
        else {
            tx.rollback().await?;
            return Ok(CascadeResult::Unchanged);
        };

        // Same comparison as DeletionMarker::restored_with.
        let result = sqlx::query(
            "UPDATE posts \
             SET deleted_at = NULL, deletion_seq = NULL, updated_at = now() \
             WHERE user_id = $1 AND deletion_seq >= $2",
        )
        .bind(user_id)
        .bind(marker.seq)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            "UPDATE users \
             SET deleted_at = NULL, deletion_seq = NULL, updated_at = now() \
             WHERE id = $1",
        )
        .bind(user_id)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CascadeResult::Applied(CascadeOutcome {
            user_id,
            marker,
            posts_affected: result.rows_affected(),
        }))
    }

    async fn force_delete(&self, user_id: Uuid) -> RepoResult<Option<User>> {
        let row = sqlx::query(&format!("DELETE FROM users WHERE id = $1 RETURNING {USER_COLUMNS}"))
            .bind(user_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(user_from_row))
    }
}

#[async_trait]
impl PostRepo for PgStore {
    async fn create(&self, user_id: Uuid, content: String) -> RepoResult<Option<PostView>> {
        // The share lock makes a concurrent user cascade wait for this insert.
        let row = sqlx::query(&format!(
            "WITH author AS ( \
                SELECT id, name, profile_picture FROM users \
                WHERE id = $1 AND deleted_at IS NULL \
                FOR SHARE \
             ), inserted_post AS ( \
                INSERT INTO posts (user_id, content) \
                SELECT id, $2 FROM author \
                RETURNING {POST_COLUMNS} \
             ) \
             SELECT p.*, a.name AS author_name, a.profile_picture AS author_picture, \
                    0::BIGINT AS likes_count, false AS is_liked \
             FROM inserted_post p \
             JOIN author a ON a.id = p.user_id"
        ))
        .bind(user_id)
        .bind(content)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(post_view_from_row))
    }

    async fn find_live(&self, post_id: Uuid) -> RepoResult<Option<Post>> {
        let row = sqlx::query(&format!(
            "SELECT {POST_COLUMNS} FROM posts WHERE id = $1 AND deleted_at IS NULL"
        ))
        .bind(post_id)
        .fetch_optional(self.db.pool())
        .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    async fn find_any(&self, post_id: Uuid) -> RepoResult<Option<Post>> {
        let row = sqlx::query(&format!("SELECT {POST_COLUMNS} FROM posts WHERE id = $1"))
            .bind(post_id)
            .fetch_optional(self.db.pool())
            .await?;

        Ok(row.as_ref().map(post_from_row))
    }

    async fn feed(&self, viewer_id: Uuid, cursor: Option<Cursor>, limit: i64) -> RepoResult<Vec<PostView>> {
        let rows = match cursor {
            Some((created_at, post_id)) => {
                sqlx::query(
                    "SELECT p.id, p.user_id, p.content, p.created_at, p.updated_at, p.deleted_at, p.deletion_seq, \
                            u.name AS author_name, u.profile_picture AS author_picture, \
                            (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count, \
                            EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $1) AS is_liked \
                     FROM posts p \
                     JOIN users u ON u.id = p.user_id AND u.deleted_at IS NULL \
                     WHERE p.deleted_at IS NULL \
                       AND (p.created_at < $2 OR (p.created_at = $2 AND p.id < $3)) \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $4",
                )
                .bind(viewer_id)
                .bind(created_at)
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT p.id, p.user_id, p.content, p.created_at, p.updated_at, p.deleted_at, p.deletion_seq, \
                            u.name AS author_name, u.profile_picture AS author_picture, \
                            (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS likes_count, \
                            EXISTS (SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = $1) AS is_liked \
                     FROM posts p \
                     JOIN users u ON u.id = p.user_id AND u.deleted_at IS NULL \
                     WHERE p.deleted_at IS NULL \
                     ORDER BY p.created_at DESC, p.id DESC \
                     LIMIT $2",
                )
                .bind(viewer_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(post_view_from_row).collect())
    }

    async fn list(&self, filter: PostFilter, cursor: Option<Cursor>, limit: i64) -> RepoResult<Vec<Post>> {
        let condition = match filter {
            PostFilter::Live => "deleted_at IS NULL",
            PostFilter::Trashed => "deleted_at IS NOT NULL",
            PostFilter::WithTrashed => "TRUE",
        };

        let rows = match cursor {
            Some((created_at, post_id)) => {
                sqlx::query(&format!(
                    "SELECT {POST_COLUMNS} FROM posts \
                     WHERE {condition} \
                       AND (created_at < $1 OR (created_at = $1 AND id < $2)) \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $3"
                ))
                .bind(created_at)
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(&format!(
                    "SELECT {POST_COLUMNS} FROM posts \
                     WHERE {condition} \
                     ORDER BY created_at DESC, id DESC \
                     LIMIT $1"
                ))
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows.iter().map(post_from_row).collect())
    }

    async fn soft_delete(&self, post_id: Uuid, at: OffsetDateTime) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE posts \
             SET deleted_at = $2, deletion_seq = nextval('soft_delete_seq'), updated_at = now() \
             WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(post_id)
        .bind(at)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn restore(&self, post_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE posts \
             SET deleted_at = NULL, deletion_seq = NULL, updated_at = now() \
             WHERE id = $1 AND deleted_at IS NOT NULL",
        )
        .bind(post_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn purge_candidates(
        &self,
        cutoff: OffsetDateTime,
        after: Option<(OffsetDateTime, Uuid)>,
        limit: i64,
    ) -> RepoResult<Vec<PurgeCandidate>> {
        let rows = match after {
            Some((deleted_at, post_id)) => {
                sqlx::query(
                    "SELECT id, deleted_at, deletion_seq FROM posts \
                     WHERE deleted_at IS NOT NULL AND deleted_at <= $1 \
                       AND (deleted_at, id) > ($2, $3) \
                     ORDER BY deleted_at, id \
                     LIMIT $4",
                )
                .bind(cutoff)
                .bind(deleted_at)
                .bind(post_id)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
            None => {
                sqlx::query(
                    "SELECT id, deleted_at, deletion_seq FROM posts \
                     WHERE deleted_at IS NOT NULL AND deleted_at <= $1 \
                     ORDER BY deleted_at, id \
                     LIMIT $2",
                )
                .bind(cutoff)
                .bind(limit)
                .fetch_all(self.db.pool())
                .await?
            }
        };

        Ok(rows
            .iter()
            .map(|row| PurgeCandidate {
                id: row.get("id"),
                deleted_at: row.get("deleted_at"),
                deletion_seq: row.get("deletion_seq"),
            })
            .collect())
    }

    async fn purge(&self, post_id: Uuid, deletion_seq: i64) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1 AND deletion_seq = $2")
            .bind(post_id)
            .bind(deletion_seq)
            .execute(self.db.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl LikeRepo for PgStore {
    async fn toggle(&self, user_id: Uuid, post_id: Uuid) -> RepoResult<Option<LikeToggle>> {
        let mut tx = self.db.pool().begin().await?;

        let live: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM posts WHERE id = $1 AND deleted_at IS NULL FOR SHARE")
                .bind(post_id)
                .fetch_optional(&mut *tx)
                .await?;
        if live.is_none() {
            tx.rollback().await?;
            return Ok(None);
        }

        let removed = sqlx::query("DELETE FROM likes WHERE user_id = $1 AND post_id = $2")
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?
            .rows_affected()
            > 0;

        if !removed {
            // The primary key on (user_id, post_id) absorbs a concurrent toggle.
            sqlx::query(
                "INSERT INTO likes (user_id, post_id) VALUES ($1, $2) \
                 ON CONFLICT DO NOTHING",
            )
            .bind(user_id)
            .bind(post_id)
            .execute(&mut *tx)
            .await?;
        }

        let likes_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM likes WHERE post_id = $1")
            .bind(post_id)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(Some(LikeToggle {
            is_liked: !removed,
            likes_count,
        }))
    }
}

#[async_trait]
impl TokenRepo for PgStore {
    async fn insert(&self, token: NewAccessToken) -> RepoResult<()> {
        sqlx::query(
            "INSERT INTO access_tokens (id, user_id, token_hash, expires_at) \
             VALUES ($1, $2, $3, $4)",
        )
        .bind(token.id)
        .bind(token.user_id)
        .bind(token.token_hash)
        .bind(token.expires_at)
        .execute(self.db.pool())
        .await?;

        Ok(())
    }

    async fn is_active(
        &self,
        token_id: Uuid,
        user_id: Uuid,
        token_hash: &str,
        now: OffsetDateTime,
    ) -> RepoResult<bool> {
        let active: bool = sqlx::query_scalar(
            "SELECT EXISTS ( \
                SELECT 1 FROM access_tokens \
                WHERE id = $1 \
                  AND user_id = $2 \
                  AND token_hash = $3 \
                  AND revoked_at IS NULL \
                  AND expires_at > $4 \
             )",
        )
        .bind(token_id)
        .bind(user_id)
        .bind(token_hash)
        .bind(now)
        .fetch_one(self.db.pool())
        .await?;

        Ok(active)
    }

    async fn revoke(&self, token_id: Uuid, user_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query(
            "UPDATE access_tokens SET revoked_at = now() \
             WHERE id = $1 AND user_id = $2 AND revoked_at IS NULL",
        )
        .bind(token_id)
        .bind(user_id)
        .execute(self.db.pool())
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

fn user_from_row(row: &PgRow) -> User {
    User {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        description: row.get("description"),
        profile_picture: row.get("profile_picture"),
        is_approved: row.get("is_approved"),
        is_admin: row.get("is_admin"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
        deletion_seq: row.get("deletion_seq"),
    }
}

fn post_from_row(row: &PgRow) -> Post {
    Post {
        id: row.get("id"),
        user_id: row.get("user_id"),
        content: row.get("content"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
        deleted_at: row.get("deleted_at"),
        deletion_seq: row.get("deletion_seq"),
    }
}

fn post_view_from_row(row: &PgRow) -> PostView {
    let post = post_from_row(row);
    PostView {
        author: PostAuthor {
            id: post.user_id,
            name: row.get("author_name"),
            profile_picture: row.get("author_picture"),
        },
        likes_count: row.get("likes_count"),
        is_liked: row.get("is_liked"),
        post,
    }
}

fn map_unique_email(err: sqlx::Error) -> RepoError {
    if let Some(db_err) = err.as_database_error() {
        if db_err.is_unique_violation() && db_err.constraint() == Some("users_email_key") {
            return RepoError::Duplicate("email");
        }
    }
    RepoError::Database(err)
}
