use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
    pub refresh_ttl_minutes: i64,
}

/// S3-compatible bucket that receives avatars and cover images.
#[derive(Debug, Clone, Deserialize)]
pub struct MediaConfig {
    pub endpoint: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// Base URL clients use to fetch uploaded objects.
    pub public_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub media: MediaConfig,
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            access_secret: required("ACCESS_TOKEN_SECRET")?,
            refresh_secret: required("REFRESH_TOKEN_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "videotube".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "videotube-users".into()),
            ttl_minutes: minutes("ACCESS_TOKEN_TTL_MINUTES", 60 * 24),
            refresh_ttl_minutes: minutes("REFRESH_TOKEN_TTL_MINUTES", 60 * 24 * 10),
        };

        let endpoint = required("MEDIA_ENDPOINT")?;
        let bucket = required("MEDIA_BUCKET")?;
        let public_url = std::env::var("MEDIA_PUBLIC_URL")
            .unwrap_or_else(|_| default_public_url(&endpoint, &bucket));
        let media = MediaConfig {
            access_key: required("MEDIA_ACCESS_KEY")?,
            secret_key: required("MEDIA_SECRET_KEY")?,
            region: std::env::var("MEDIA_REGION").unwrap_or_else(|_| "us-east-1".into()),
            endpoint,
            bucket,
            public_url,
        };

        Ok(Self {
            database_url,
            jwt,
            media,
        })
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("missing env var {}", key))
}

/// Longest token lifetime accepted from the environment (ten years).
pub const MAX_TTL_MINUTES: i64 = 60 * 24 * 365 * 10;

fn minutes(key: &str, default: i64) -> i64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .map(|v| v.min(MAX_TTL_MINUTES))
        .unwrap_or(default)
}

fn default_public_url(endpoint: &str, bucket: &str) -> String {
    format!("{}/{}", endpoint.trim_end_matches('/'), bucket)
}
