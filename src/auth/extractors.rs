use axum::{
    async_trait,
    extract::{FromRef, FromRequest, FromRequestParts, Request},
    http::{header, request::Parts},
    Form, Json,
};
use axum_extra::extract::cookie::CookieJar;
use serde::de::DeserializeOwned;
use tracing::warn;
use uuid::Uuid;

use super::{cookies::ACCESS_COOKIE, jwt::JwtKeys};
use crate::error::ApiError;

/// Authenticated caller, taken from the `accessToken` cookie or a Bearer header.
pub struct AuthUser(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    JwtKeys: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let keys = JwtKeys::from_ref(state);

        let from_cookie = CookieJar::from_headers(&parts.headers)
            .get(ACCESS_COOKIE)
            .map(|c| c.value().to_string())
            .filter(|v| !v.is_empty());

        let token = match from_cookie {
            Some(t) => t,
            None => parts
                .headers
                .get(header::AUTHORIZATION)
                .and_then(|h| h.to_str().ok())
                .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
                .map(str::to_string)
                .ok_or_else(|| ApiError::Unauthorized("Unauthorized request".into()))?,
        };

        let claims = keys.verify_access(&token).map_err(|e| {
            warn!(error = %e, "invalid or expired access token");
            ApiError::Unauthorized("Invalid access token".into())
        })?;

        Ok(AuthUser(claims.sub))
    }
}

/// Deserializes a JSON body when the content type says so, an urlencoded form otherwise.
pub struct JsonOrForm<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for JsonOrForm<T>
where
    S: Send + Sync,
    T: DeserializeOwned + Send,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|ct| ct.starts_with("application/json"));

        if is_json {
            let Json(value) = Json::<T>::from_request(req, state)
                .await
                .map_err(|e| ApiError::Validation(e.body_text()))?;
            Ok(Self(value))
        } else {
            let Form(value) = Form::<T>::from_request(req, state)
                .await
                .map_err(|e| ApiError::Validation(e.body_text()))?;
            Ok(Self(value))
        }
    }
}
