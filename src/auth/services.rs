use anyhow::Context;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{
    auth::{
        dto::{LoginRequest, RegisterInput, TokenPair},
        jwt::JwtKeys,
        password::{hash_password, verify_password},
    },
    error::ApiError,
    media::upload_media,
    state::AppState,
    users::{DuplicateUser, NewUser, PublicUser, User},
};

const AVATAR_FOLDER: &str = "avatars";
const COVER_FOLDER: &str = "covers";

/// Trimmed value, or `None` when missing or blank.
fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Creates an account and returns it sanitized.
pub async fn register_user(st: &AppState, input: RegisterInput) -> Result<PublicUser, ApiError> {
    let fields = [
        non_blank(input.fullname.as_deref()),
        non_blank(input.email.as_deref()),
        non_blank(input.username.as_deref()),
        non_blank(input.password.as_deref()),
    ];
    let [Some(fullname), Some(email), Some(username), Some(_)] = fields else {
        warn!("register missing required fields");
        return Err(ApiError::Validation("All fields are required".into()));
    };
    let fullname = fullname.to_string();
    let email = email.to_lowercase();
    let username = username.to_lowercase();
    // The password is hashed as typed; only blankness is checked above.
    let password = input.password.unwrap_or_default();

    let Some(avatar) = input.avatar.filter(|a| !a.body.is_empty()) else {
        warn!(%username, "register without avatar");
        return Err(ApiError::Validation("Avatar file is required".into()));
    };
    if !avatar.is_image() {
        warn!(%username, content_type = %avatar.content_type, "avatar is not an image");
        return Err(ApiError::Validation(
            "Avatar must be a JPEG, PNG, WebP, GIF or HEIC image".into(),
        ));
    }
    let cover = input.cover_image.filter(|c| !c.body.is_empty());
    if cover.as_ref().is_some_and(|c| !c.is_image()) {
        warn!(%username, "cover image is not an image");
        return Err(ApiError::Validation(
            "Cover image must be a JPEG, PNG, WebP, GIF or HEIC image".into(),
        ));
    }

    let existing = st
        .users
        .find_by_username_or_email(Some(&username), Some(&email))
        .await
        .map_err(internal)?;
    if existing.is_some() {
        warn!(%username, %email, "username or email already registered");
        return Err(conflict());
    }

    let avatar_url = upload_media(st, AVATAR_FOLDER, avatar).await.map_err(|e| {
        error!(error = %e, %username, "avatar upload failed");
        ApiError::Upload("Avatar upload failed".into())
    })?;

    let mut cover_url = None;
    if let Some(cover) = cover {
        match upload_media(st, COVER_FOLDER, cover).await {
            Ok(url) => cover_url = Some(url),
            Err(e) => warn!(error = %e, %username, "cover image upload failed; continuing without it"),
        }
    }

    let password_hash = hash_password(&password).map_err(internal)?;

    let created = st
        .users
        .create(&NewUser {
            username,
            email,
            fullname,
            avatar: avatar_url,
            cover_image: cover_url,
            password_hash,
        })
        .await
        .map_err(|e| {
            if e.is::<DuplicateUser>() {
                conflict()
            } else {
                internal(e)
            }
        })?;

    let user = st
        .users
        .find_by_id(created.id)
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            error!(user_id = %created.id, "user missing right after insert");
            ApiError::Internal("Something went wrong while registering the user".into())
        })?;

    info!(user_id = %user.id, username = %user.username, "user registered");
    Ok(user.into())
}

/// Verifies credentials and issues a fresh token pair.
pub async fn login_user(
    st: &AppState,
    req: LoginRequest,
) -> Result<(PublicUser, TokenPair), ApiError> {
    let username = non_blank(req.username.as_deref()).map(str::to_lowercase);
    let email = non_blank(req.email.as_deref()).map(str::to_lowercase);
    if username.is_none() && email.is_none() {
        warn!("login without identifier");
        return Err(ApiError::Validation("username or email is required".into()));
    }

    let user = st
        .users
        .find_by_username_or_email(username.as_deref(), email.as_deref())
        .await
        .map_err(internal)?
        .ok_or_else(|| {
            warn!(?username, ?email, "login unknown user");
            ApiError::NotFound("User does not exist".into())
        })?;

    let password = req.password.unwrap_or_default();
    let ok = verify_password(&password, &user.password_hash).map_err(internal)?;
    if !ok {
        warn!(user_id = %user.id, "login invalid password");
        return Err(ApiError::Unauthorized("Invalid user credentials".into()));
    }

    let tokens = generate_access_and_refresh_tokens(st, user.id).await?;

    info!(user_id = %user.id, username = %user.username, "user logged in");
    Ok((user.into(), tokens))
}

/// Drops the stored refresh token so it can no longer be exchanged.
pub async fn logout_user(st: &AppState, user_id: Uuid) -> Result<(), ApiError> {
    st.users
        .set_refresh_token(user_id, None)
        .await
        .map_err(internal)?;
    info!(%user_id, "user logged out");
    Ok(())
}

/// Signs a new access/refresh pair for `user_id` and stores the refresh token.
///
/// Any failure is reported as the same generic 500; the cause only goes to the log.
pub async fn generate_access_and_refresh_tokens(
    st: &AppState,
    user_id: Uuid,
) -> Result<TokenPair, ApiError> {
    issue_tokens(st, user_id).await.map_err(|e| {
        error!(error = %e, %user_id, "token issuance failed");
        ApiError::Internal(
            "Something went wrong while generating refresh and access token".into(),
        )
    })
}

async fn issue_tokens(st: &AppState, user_id: Uuid) -> anyhow::Result<TokenPair> {
    let user = st
        .users
        .find_by_id(user_id)
        .await?
        .context("user not found")?;

    let keys = JwtKeys::from(&st.config.jwt);
    let access_token = keys.sign_access(&user).context("sign access token")?;
    let refresh_token = keys.sign_refresh(user.id).context("sign refresh token")?;

    st.users
        .set_refresh_token(user.id, Some(&refresh_token))
        .await?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Exchanges a refresh token for a new pair, rotating the stored token.
///
/// Every failure comes back as 401 carrying the underlying message.
pub async fn refresh_access_token(
    st: &AppState,
    incoming: Option<String>,
) -> Result<TokenPair, ApiError> {
    let Some(incoming) = incoming.filter(|t| !t.is_empty()) else {
        return Err(ApiError::Unauthorized("Unauthorized request".into()));
    };

    rotate(st, &incoming).await.map_err(|e| {
        warn!(error = %e, "refresh rejected");
        match e {
            ApiError::Unauthorized(msg) => ApiError::Unauthorized(msg),
            other => ApiError::Unauthorized(other.to_string()),
        }
    })
}

async fn rotate(st: &AppState, incoming: &str) -> Result<TokenPair, ApiError> {
    let keys = JwtKeys::from(&st.config.jwt);
    let claims = keys
        .verify_refresh(incoming)
        .map_err(|e| ApiError::Unauthorized(e.to_string()))?;

    let user: User = st
        .users
        .find_by_id(claims.sub)
        .await
        .map_err(internal)?
        .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".into()))?;

    if user.refresh_token.as_deref() != Some(incoming) {
        warn!(user_id = %user.id, "stale or reused refresh token");
        return Err(ApiError::Unauthorized(
            "Refresh token is expired or used".into(),
        ));
    }

    let tokens = generate_access_and_refresh_tokens(st, user.id).await?;
    info!(user_id = %user.id, "access token refreshed");
    Ok(tokens)
}

fn conflict() -> ApiError {
    ApiError::Conflict("User with email or username already exists".into())
}

fn internal(e: anyhow::Error) -> ApiError {
    error!(error = %e, "internal error");
    ApiError::Internal("Internal server error".into())
}
