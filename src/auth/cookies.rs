use axum_extra::extract::cookie::{Cookie, CookieJar};
use time::{Duration, OffsetDateTime};

use super::dto::TokenPair;

pub const ACCESS_COOKIE: &str = "accessToken";
pub const REFRESH_COOKIE: &str = "refreshToken";

fn session_cookie(name: &'static str, value: String) -> Cookie<'static> {
    Cookie::build((name, value))
        .http_only(true)
        .secure(true)
        .path("/")
        .build()
}

/// Adds (or overwrites) both token cookies.
pub fn set_tokens(jar: CookieJar, tokens: &TokenPair) -> CookieJar {
    jar.add(session_cookie(ACCESS_COOKIE, tokens.access_token.clone()))
        .add(session_cookie(REFRESH_COOKIE, tokens.refresh_token.clone()))
}

fn expired_cookie(name: &'static str) -> Cookie<'static> {
    let mut cookie = session_cookie(name, String::new());
    cookie.set_max_age(Duration::ZERO);
    cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
    cookie
}

/// Expires both token cookies on the client, whether or not the request carried them.
pub fn clear_tokens(jar: CookieJar) -> CookieJar {
    jar.add(expired_cookie(ACCESS_COOKIE))
        .add(expired_cookie(REFRESH_COOKIE))
}
