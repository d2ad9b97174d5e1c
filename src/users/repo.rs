use anyhow::Context;
use async_trait::async_trait;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

use crate::users::repo_types::{NewUser, User};

/// Raised by [`UserRepo::create`] when the username or email is already taken.
#[derive(Debug, Error)]
#[error("user with this username or email already exists")]
pub struct DuplicateUser;

#[async_trait]
pub trait UserRepo: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>>;

    /// First user whose username or email matches. `None` arguments never match.
    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> anyhow::Result<Option<User>>;

    async fn create(&self, new: &NewUser) -> anyhow::Result<User>;

    /// Single-column update; the rest of the record is left untouched.
    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<()>;
}

const USER_COLUMNS: &str = "id, username, email, fullname, avatar, cover_image, \
                            password_hash, refresh_token, created_at, updated_at";

#[derive(Clone)]
pub struct PgUserRepo {
    db: PgPool,
}

impl PgUserRepo {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl UserRepo for PgUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await
        .context("find user by id")?;
        Ok(user)
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(&format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $2 LIMIT 1",
            USER_COLUMNS
        ))
        .bind(username)
        .bind(email)
        .fetch_optional(&self.db)
        .await
        .context("find user by username or email")?;
        Ok(user)
    }

    async fn create(&self, new: &NewUser) -> anyhow::Result<User> {
        let res = sqlx::query_as::<_, User>(&format!(
            r#"
            INSERT INTO users (id, username, email, fullname, avatar, cover_image, password_hash)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&new.username)
        .bind(&new.email)
        .bind(&new.fullname)
        .bind(&new.avatar)
        .bind(new.cover_image.as_deref())
        .bind(&new.password_hash)
        .fetch_one(&self.db)
        .await;

        match res {
            Ok(user) => Ok(user),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => Err(DuplicateUser.into()),
            Err(e) => Err(anyhow::Error::new(e).context("insert user")),
        }
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE users
               SET refresh_token = $2, updated_at = now()
             WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(token)
        .execute(&self.db)
        .await
        .context("update refresh token")?;
        Ok(())
    }
}
