#[cfg(test)]
pub mod memory;
pub mod repo;
pub mod repo_types;

pub use repo::{DuplicateUser, PgUserRepo, UserRepo};
pub use repo_types::{NewUser, PublicUser, User};
