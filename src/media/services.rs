use anyhow::Context;
use bytes::Bytes;
use uuid::Uuid;

use crate::state::AppState;

/// A file received from a client, held in memory until it is pushed to storage.
#[derive(Debug, Clone)]
pub struct UploadItem {
    pub body: Bytes,
    pub content_type: String,
}

impl UploadItem {
    /// Only raster formats we have an extension for are accepted.
    pub fn is_image(&self) -> bool {
        ext_from_mime(&self.content_type).is_some()
    }
}

/// Pushes one file under `<folder>/<uuid>.<ext>` and returns its public URL.
pub async fn upload_media(st: &AppState, folder: &str, item: UploadItem) -> anyhow::Result<String> {
    anyhow::ensure!(!item.body.is_empty(), "empty upload");
    let Some(ext) = ext_from_mime(&item.content_type) else {
        anyhow::bail!("unsupported content type {}", item.content_type);
    };

    let key = format!("{}/{}.{}", folder, Uuid::new_v4(), ext);
    st.storage
        .put_object(&key, item.body, &item.content_type)
        .await
        .with_context(|| format!("upload {}", key))?;

    Ok(st.storage.object_url(&key))
}

fn ext_from_mime(ct: &str) -> Option<&'static str> {
    match ct {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[cfg(test)]
mod media_tests {
    use super::*;
    use crate::state::AppState;

    #[test]
    fn test_ext_from_mime() {
        assert_eq!(ext_from_mime("image/jpeg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/jpg"), Some("jpg"));
        assert_eq!(ext_from_mime("image/png"), Some("png"));
        assert_eq!(ext_from_mime("image/webp"), Some("webp"));
        assert_eq!(ext_from_mime("image/gif"), Some("gif"));
        assert_eq!(ext_from_mime("application/octet-stream"), None);
    }

    #[tokio::test]
    async fn upload_returns_public_url_with_extension() {
        let state = AppState::fake();
        let url = upload_media(
            &state,
            "avatars",
            UploadItem {
                body: Bytes::from_static(b"\x89PNG"),
                content_type: "image/png".into(),
            },
        )
        .await
        .unwrap();
        assert!(url.starts_with("https://fake.local/avatars/"));
        assert!(url.ends_with(".png"));
    }

    #[tokio::test]
    async fn upload_rejects_empty_body() {
        let state = AppState::fake();
        let err = upload_media(
            &state,
            "avatars",
            UploadItem {
                body: Bytes::new(),
                content_type: "image/png".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("empty upload"));
    }

    #[tokio::test]
    async fn upload_rejects_non_image_content_type() {
        let state = AppState::fake();
        for ct in ["text/html", "image/svg+xml", "application/octet-stream"] {
            let item = UploadItem {
                body: Bytes::from_static(b"<script>alert(1)</script>"),
                content_type: ct.into(),
            };
            assert!(!item.is_image());
            let err = upload_media(&state, "avatars", item).await.unwrap_err();
            assert!(err.to_string().contains("unsupported content type"), "{ct}");
        }
    }

    #[tokio::test]
    async fn upload_surfaces_storage_failure() {
        let state = AppState::fake_with_failing_storage();
        let res = upload_media(
            &state,
            "covers",
            UploadItem {
                body: Bytes::from_static(b"img"),
                content_type: "image/jpeg".into(),
            },
        )
        .await;
        assert!(res.is_err());
    }
}
