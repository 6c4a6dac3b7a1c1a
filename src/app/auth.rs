use std::sync::Arc;

use anyhow::{anyhow, Result};
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::keys::SymmetricKey;
use pasetors::token::UntrustedToken;
use pasetors::{local, version4::V4, Local};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use time::{Duration, OffsetDateTime};
use uuid::Uuid;
use validator::Validate;

use crate::app::error::{merge, taken, ServiceError, ServiceResult};
use crate::app::pictures::{decode_picture, store_picture};
use crate::domain::token::NewAccessToken;
use crate::domain::user::{NewUser, User};
use crate::infra::repo::Store;
use crate::infra::storage::PictureStore;

const TOKEN_ISSUER: &str = "townsquare";

/// Missing fields deserialize empty and are reported by validation.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterInput {
    #[serde(default)]
    #[validate(length(min = 1, max = 255, message = "name must be between 1 and 255 characters"))]
    pub name: String,
    #[serde(default)]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 7, message = "password must be at least 7 characters"))]
    pub password: String,
    #[validate(length(max = 255, message = "description must be at most 255 characters"))]
    pub description: Option<String>,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct LoginInput {
    #[serde(default)]
    #[validate(email(message = "email must be a valid email address"))]
    pub email: String,
    #[serde(default)]
    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub token_id: Uuid,
    pub expires_at: OffsetDateTime,
}

#[derive(Debug, Clone)]
pub struct LoginOutcome {
    pub token: IssuedToken,
    pub user: User,
}

/// An authenticated request: the live user behind a valid, unrevoked token.
#[derive(Debug, Clone)]
pub struct Session {
    pub user: User,
    pub token_id: Uuid,
}

#[derive(Clone)]
pub struct AuthService {
    store: Store,
    pictures: Arc<dyn PictureStore>,
    token_key: [u8; 32],
    token_ttl_days: u64,
    picture_max_bytes: usize,
}

impl AuthService {
    pub fn new(
        store: Store,
        pictures: Arc<dyn PictureStore>,
        token_key: [u8; 32],
        token_ttl_days: u64,
        picture_max_bytes: usize,
    ) -> Self {
        Self {
            store,
            pictures,
            token_key,
            token_ttl_days,
            picture_max_bytes,
        }
    }

    pub async fn register(&self, input: RegisterInput) -> ServiceResult<User> {
        let email = normalize_email(&input.email);
        let mut extra = Vec::new();

        if !email.is_empty() && self.store.users.email_taken(&email).await? {
            extra.push(("email", taken("email")));
        }
        let picture = match input.profile_picture.as_deref() {
            Some(encoded) => match decode_picture(encoded, self.picture_max_bytes) {
                Ok(picture) => Some(picture),
                Err(err) => {
                    extra.push(("profile_picture", err));
                    None
                }
            },
            None => None,
        };
        merge(input.validate(), extra)?;

        let password_hash = hash_password(&input.password)?;
        let profile_picture = match picture {
            Some(picture) => Some(store_picture(self.pictures.as_ref(), picture).await?),
            None => None,
        };

        let created = self
            .store
            .users
            .create(NewUser {
                name: input.name,
                email,
                password_hash,
                description: input.description,
                profile_picture: profile_picture.clone(),
                is_approved: false,
                is_admin: false,
            })
            .await;

        match created {
            Ok(user) => {
                tracing::info!(user_id = %user.id, "user registered");
                Ok(user)
            }
            Err(err) => {
                if let Some(key) = profile_picture {
                    if let Err(cleanup) = self.pictures.delete(&key).await {
                        tracing::warn!(error = ?cleanup, key = %key, "failed to discard picture of failed registration");
                    }
                }
                Err(err.into())
            }
        }
    }

    pub async fn login(&self, input: LoginInput) -> ServiceResult<LoginOutcome> {
        input.validate()?;

        let credentials = self
            .store
            .users
            .find_credentials(&normalize_email(&input.email))
            .await?
            .ok_or(ServiceError::InvalidCredentials)?;

        if !verify_password(&input.password, &credentials.password_hash)? {
            return Err(ServiceError::InvalidCredentials);
        }
        if !credentials.user.is_approved {
            return Err(ServiceError::NotApproved);
        }

        let token = self.issue_token(credentials.user.id).await?;
        Ok(LoginOutcome {
            token,
            user: credentials.user,
        })
    }

    /// Revokes exactly the token the session was authenticated with.
    pub async fn logout(&self, session: &Session) -> ServiceResult<bool> {
        Ok(self
            .store
            .tokens
            .revoke(session.token_id, session.user.id)
            .await?)
    }

    pub async fn authenticate(&self, token: &str) -> ServiceResult<Option<Session>> {
        let Some(claims) = self.decrypt_claims(token)? else {
            return Ok(None);
        };
        if !has_token_type(&claims, "access") {
            return Ok(None);
        }
        let (Ok(user_id), Ok(token_id)) = (claim_uuid(&claims, "sub"), claim_uuid(&claims, "jti")) else {
            return Ok(None);
        };

        let active = self
            .store
            .tokens
            .is_active(token_id, user_id, &hash_token(token), OffsetDateTime::now_utc())
            .await?;
        if !active {
            return Ok(None);
        }

        let user = self.store.users.find_live(user_id).await?;
        Ok(user.map(|user| Session { user, token_id }))
    }

    pub async fn issue_token(&self, user_id: Uuid) -> ServiceResult<IssuedToken> {
        let token_id = Uuid::new_v4();
        let (token, expires_at) = self.encrypt_token(user_id, token_id)?;

        self.store
            .tokens
            .insert(NewAccessToken {
                id: token_id,
                user_id,
                token_hash: hash_token(&token),
                expires_at,
            })
            .await?;

        Ok(IssuedToken {
            token,
            token_id,
            expires_at,
        })
    }

    fn decrypt_claims(&self, token: &str) -> Result<Option<Claims>> {
        let key = SymmetricKey::<V4>::from(&self.token_key)?;
        let mut rules = ClaimsValidationRules::new();
        rules.validate_issuer_with(TOKEN_ISSUER);
        rules.validate_audience_with(TOKEN_ISSUER);

        let untrusted = match UntrustedToken::<Local, V4>::try_from(token) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        let trusted = match local::decrypt(&key, &untrusted, &rules, None, None) {
            Ok(token) => token,
            Err(_) => return Ok(None),
        };
        Ok(trusted.payload_claims().cloned())
    }

    fn encrypt_token(&self, user_id: Uuid, token_id: Uuid) -> Result<(String, OffsetDateTime)> {
        let (claims, expires_at) = self.build_claims(user_id, token_id)?;
        let key = SymmetricKey::<V4>::from(&self.token_key)?;
        let token = local::encrypt(&key, &claims, None, None)?;
        Ok((token, expires_at))
    }

    fn build_claims(&self, user_id: Uuid, token_id: Uuid) -> Result<(Claims, OffsetDateTime)> {
        let duration = std::time::Duration::from_secs(self.token_ttl_days * 24 * 60 * 60);
        let mut claims = Claims::new_expires_in(&duration)?;
        claims.issuer(TOKEN_ISSUER)?;
        claims.audience(TOKEN_ISSUER)?;
        claims.subject(&user_id.to_string())?;
        claims.token_identifier(&token_id.to_string())?;
        claims.add_additional("typ", "access")?;
        let expires_at = OffsetDateTime::now_utc() + Duration::days(self.token_ttl_days as i64);
        Ok((claims, expires_at))
    }
}

pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut argon2::password_hash::rand_core::OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|err| anyhow!("failed to hash password: {}", err))?;
    Ok(hash.to_string())
}

fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(hash)
        .map_err(|err| anyhow!("failed to parse password hash: {}", err))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn claim_uuid(claims: &Claims, name: &str) -> Result<Uuid> {
    let value = claims
        .get_claim(name)
        .and_then(|value| value.as_str())
        .ok_or_else(|| anyhow!("missing {} claim", name))?;
    Ok(Uuid::parse_str(value)?)
}

fn has_token_type(claims: &Claims, expected: &str) -> bool {
    claims
        .get_claim("typ")
        .and_then(|value| value.as_str())
        .map(|value| value == expected)
        .unwrap_or(false)
}
