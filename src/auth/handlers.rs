use axum::{
    extract::{multipart::MultipartRejection, DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    routing::{get, post},
    Router,
};
use axum_extra::extract::cookie::CookieJar;
use tracing::{error, instrument};

use crate::{
    auth::{
        cookies::{self, REFRESH_COOKIE},
        dto::{LoginRequest, LoginResponse, RefreshRequest, RegisterInput, TokenPair},
        extractors::{AuthUser, JsonOrForm},
        services,
    },
    error::ApiError,
    media::UploadItem,
    response::{ApiResponse, Empty},
    state::AppState,
    users::PublicUser,
};

pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/users/register",
            post(register).layer(DefaultBodyLimit::max(20 * 1024 * 1024)), // 20MB
        )
        .route("/users/login", post(login))
        .route("/users/logout", post(logout))
        .route("/users/refresh-token", post(refresh))
}

pub fn me_routes() -> Router<AppState> {
    Router::new().route("/users/me", get(current_user))
}

/// POST /users/register (multipart)
/// Text fields: fullname, email, username, password. Files: avatar (required), coverImage.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    mp: Result<Multipart, MultipartRejection>,
) -> Result<ApiResponse<PublicUser>, ApiError> {
    let mut mp = mp.map_err(|e| ApiError::Validation(e.body_text()))?;
    let input = read_register_form(&mut mp).await?;
    let user = services::register_user(&state, input).await?;
    Ok(ApiResponse::new(
        StatusCode::CREATED,
        user,
        "User registered successfully",
    ))
}

async fn read_register_form(mp: &mut Multipart) -> Result<RegisterInput, ApiError> {
    let mut input = RegisterInput::default();
    while let Some(field) = mp
        .next_field()
        .await
        .map_err(|e| ApiError::Validation(e.body_text()))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "fullname" | "email" | "username" | "password" => {
                let value = field
                    .text()
                    .await
                    .map_err(|e| ApiError::Validation(e.body_text()))?;
                let slot = match name.as_str() {
                    "fullname" => &mut input.fullname,
                    "email" => &mut input.email,
                    "username" => &mut input.username,
                    _ => &mut input.password,
                };
                *slot = Some(value);
            }
            "avatar" | "coverImage" => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".into());
                let body = field
                    .bytes()
                    .await
                    .map_err(|e| ApiError::Validation(e.body_text()))?;
                let slot = if name == "avatar" {
                    &mut input.avatar
                } else {
                    &mut input.cover_image
                };
                // single file per slot; extra parts are ignored
                if slot.is_none() {
                    *slot = Some(UploadItem { body, content_type });
                }
            }
            _ => {}
        }
    }
    Ok(input)
}

#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    jar: CookieJar,
    JsonOrForm(payload): JsonOrForm<LoginRequest>,
) -> Result<(CookieJar, ApiResponse<LoginResponse>), ApiError> {
    let (user, tokens) = services::login_user(&state, payload).await?;
    let jar = cookies::set_tokens(jar, &tokens);
    Ok((
        jar,
        ApiResponse::ok(
            LoginResponse {
                user,
                access_token: tokens.access_token,
                refresh_token: tokens.refresh_token,
            },
            "User logged in successfully",
        ),
    ))
}

#[instrument(skip(state, jar))]
pub async fn logout(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    jar: CookieJar,
) -> Result<(CookieJar, ApiResponse<Empty>), ApiError> {
    services::logout_user(&state, user_id).await?;
    Ok((
        cookies::clear_tokens(jar),
        ApiResponse::ok(Empty {}, "User logged out"),
    ))
}

#[instrument(skip_all)]
pub async fn refresh(
    State(state): State<AppState>,
    jar: CookieJar,
    body: Option<JsonOrForm<RefreshRequest>>,
) -> Result<(CookieJar, ApiResponse<TokenPair>), ApiError> {
    let incoming = jar
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| body.and_then(|JsonOrForm(b)| b.refresh_token));

    let tokens = services::refresh_access_token(&state, incoming).await?;
    let jar = cookies::set_tokens(jar, &tokens);
    Ok((jar, ApiResponse::ok(tokens, "Access token refreshed")))
}

#[instrument(skip(state))]
pub async fn current_user(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<ApiResponse<PublicUser>, ApiError> {
    let user = state
        .users
        .find_by_id(user_id)
        .await
        .map_err(|e| {
            error!(error = %e, %user_id, "load current user failed");
            ApiError::Internal("Internal server error".into())
        })?
        .ok_or_else(|| ApiError::NotFound("User does not exist".into()))?;

    Ok(ApiResponse::ok(
        PublicUser::from(user),
        "Current user fetched successfully",
    ))
}
