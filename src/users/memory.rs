use std::sync::Mutex;

use async_trait::async_trait;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::users::{
    repo::{DuplicateUser, UserRepo},
    repo_types::{NewUser, User},
};

/// In-process store with the same uniqueness rules as the `users` table.
#[derive(Default)]
pub struct MemoryUserRepo {
    users: Mutex<Vec<User>>,
}

#[async_trait]
impl UserRepo for MemoryUserRepo {
    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        Ok(users.iter().find(|u| u.id == id).cloned())
    }

    async fn find_by_username_or_email(
        &self,
        username: Option<&str>,
        email: Option<&str>,
    ) -> anyhow::Result<Option<User>> {
        let users = self.users.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        Ok(users
            .iter()
            .find(|u| {
                username.is_some_and(|n| n == u.username) || email.is_some_and(|e| e == u.email)
            })
            .cloned())
    }

    async fn create(&self, new: &NewUser) -> anyhow::Result<User> {
        let mut users = self.users.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        if users
            .iter()
            .any(|u| u.username == new.username || u.email == new.email)
        {
            return Err(DuplicateUser.into());
        }
        let now = OffsetDateTime::now_utc();
        let user = User {
            id: Uuid::new_v4(),
            username: new.username.clone(),
            email: new.email.clone(),
            fullname: new.fullname.clone(),
            avatar: new.avatar.clone(),
            cover_image: new.cover_image.clone(),
            password_hash: new.password_hash.clone(),
            refresh_token: None,
            created_at: now,
            updated_at: now,
        };
        users.push(user.clone());
        Ok(user)
    }

    async fn set_refresh_token(&self, id: Uuid, token: Option<&str>) -> anyhow::Result<()> {
        let mut users = self.users.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        if let Some(u) = users.iter_mut().find(|u| u.id == id) {
            u.refresh_token = token.map(str::to_string);
            u.updated_at = OffsetDateTime::now_utc();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.into(),
            email: email.into(),
            fullname: "Test User".into(),
            avatar: "https://fake.local/a.png".into(),
            cover_image: None,
            password_hash: "hash".into(),
        }
    }

    #[tokio::test]
    async fn create_rejects_duplicates() {
        let repo = MemoryUserRepo::default();
        repo.create(&new_user("bob", "bob@example.com")).await.unwrap();

        let err = repo
            .create(&new_user("bob", "other@example.com"))
            .await
            .unwrap_err();
        assert!(err.is::<DuplicateUser>());

        let err = repo
            .create(&new_user("robert", "bob@example.com"))
            .await
            .unwrap_err();
        assert!(err.is::<DuplicateUser>());
    }

    #[tokio::test]
    async fn lookup_by_either_identifier() {
        let repo = MemoryUserRepo::default();
        let created = repo.create(&new_user("carol", "carol@example.com")).await.unwrap();

        let by_name = repo.find_by_username_or_email(Some("carol"), None).await.unwrap();
        assert_eq!(by_name.map(|u| u.id), Some(created.id));

        let by_mail = repo
            .find_by_username_or_email(None, Some("carol@example.com"))
            .await
            .unwrap();
        assert_eq!(by_mail.map(|u| u.id), Some(created.id));

        assert!(repo.find_by_username_or_email(None, None).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn refresh_token_set_and_cleared() {
        let repo = MemoryUserRepo::default();
        let u = repo.create(&new_user("dave", "dave@example.com")).await.unwrap();

        repo.set_refresh_token(u.id, Some("tok")).await.unwrap();
        let stored = repo.find_by_id(u.id).await.unwrap().unwrap();
        assert_eq!(stored.refresh_token.as_deref(), Some("tok"));

        repo.set_refresh_token(u.id, None).await.unwrap();
        let stored = repo.find_by_id(u.id).await.unwrap().unwrap();
        assert!(stored.refresh_token.is_none());
    }
}
