use std::time::Duration;

use axum::extract::FromRef;
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use time::{Duration as TimeDuration, OffsetDateTime};
use tracing::debug;
use uuid::Uuid;

use crate::{
    auth::claims::{Claims, TokenKind},
    config::{JwtConfig, MAX_TTL_MINUTES},
    state::AppState,
    users::User,
};

/// Signing and verification keys. Access and refresh tokens use separate secrets.
#[derive(Clone)]
pub struct JwtKeys {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    pub issuer: String,
    pub audience: String,
    pub access_ttl: Duration,
    pub refresh_ttl: Duration,
}

impl From<&JwtConfig> for JwtKeys {
    fn from(cfg: &JwtConfig) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(cfg.access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(cfg.access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(cfg.refresh_secret.as_bytes()),
            issuer: cfg.issuer.clone(),
            audience: cfg.audience.clone(),
            access_ttl: ttl(cfg.ttl_minutes),
            refresh_ttl: ttl(cfg.refresh_ttl_minutes),
        }
    }
}

// Config may be built by hand, so clamp here too.
fn ttl(minutes: i64) -> Duration {
    Duration::from_secs(minutes.clamp(0, MAX_TTL_MINUTES) as u64 * 60)
}

impl FromRef<AppState> for JwtKeys {
    fn from_ref(state: &AppState) -> Self {
        Self::from(&state.config.jwt)
    }
}

impl JwtKeys {
    fn base_claims(&self, user_id: Uuid, kind: TokenKind) -> Claims {
        let now = OffsetDateTime::now_utc();
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        let exp = now + TimeDuration::seconds(ttl.as_secs() as i64);
        Claims {
            sub: user_id,
            iat: now.unix_timestamp() as usize,
            exp: exp.unix_timestamp() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: Uuid::new_v4(),
            kind,
            email: None,
            username: None,
            fullname: None,
        }
    }

    /// Short-lived token carrying the user's identity.
    pub fn sign_access(&self, user: &User) -> anyhow::Result<String> {
        let claims = Claims {
            email: Some(user.email.clone()),
            username: Some(user.username.clone()),
            fullname: Some(user.fullname.clone()),
            ..self.base_claims(user.id, TokenKind::Access)
        };
        let token = encode(&Header::default(), &claims, &self.access_encoding)?;
        debug!(user_id = %user.id, kind = ?claims.kind, "jwt signed");
        Ok(token)
    }

    /// Long-lived token carrying only the user id.
    pub fn sign_refresh(&self, user_id: Uuid) -> anyhow::Result<String> {
        let claims = self.base_claims(user_id, TokenKind::Refresh);
        let token = encode(&Header::default(), &claims, &self.refresh_encoding)?;
        debug!(user_id = %user_id, kind = ?claims.kind, "jwt signed");
        Ok(token)
    }

    fn validation(&self) -> Validation {
        let mut validation = Validation::default();
        validation.set_audience(std::slice::from_ref(&self.audience));
        validation.set_issuer(std::slice::from_ref(&self.issuer));
        validation
    }

    fn verify_with(
        &self,
        token: &str,
        key: &DecodingKey,
        expected: TokenKind,
    ) -> anyhow::Result<Claims> {
        let data = decode::<Claims>(token, key, &self.validation())?;
        if data.claims.kind != expected {
            anyhow::bail!("not a {:?} token", expected);
        }
        debug!(user_id = %data.claims.sub, kind = ?data.claims.kind, "jwt verified");
        Ok(data.claims)
    }

    pub fn verify_access(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_with(token, &self.access_decoding, TokenKind::Access)
    }

    pub fn verify_refresh(&self, token: &str) -> anyhow::Result<Claims> {
        self.verify_with(token, &self.refresh_decoding, TokenKind::Refresh)
    }
}
