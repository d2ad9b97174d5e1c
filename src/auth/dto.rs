use serde::{Deserialize, Serialize};

use crate::{media::UploadItem, users::PublicUser};

/// Registration input gathered from the multipart form.
#[derive(Debug, Default)]
pub struct RegisterInput {
    pub fullname: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub avatar: Option<UploadItem>,
    pub cover_image: Option<UploadItem>,
}

/// Request body for login. At least one identifier is required.
#[derive(Debug, Default, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
}

/// Request body for token refresh; the cookie takes precedence.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// Access and refresh token issued together.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

/// Body returned after login.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub user: PublicUser,
    pub access_token: String,
    pub refresh_token: String,
}
