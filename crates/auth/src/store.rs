//! Credential verification against the identity tables.

use std::fmt::{self, Debug, Formatter};

use async_trait::async_trait;
use bookstore_db::{Database, Migration, StoreError};
use sqlx::Row;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::claims::Identity;
use crate::error::{AuthError, AuthResult};
use crate::password;

pub const IDENTITY_MIGRATION: Migration = Migration {
    id: "001_identity",
    up: r#"
        CREATE TABLE identity_users (
            id            TEXT PRIMARY KEY,
            username      TEXT NOT NULL UNIQUE COLLATE NOCASE,
            email         TEXT,
            password_hash TEXT NOT NULL,
            disabled      INTEGER NOT NULL DEFAULT 0,
            lockout_end   INTEGER
        );
        CREATE TABLE identity_roles (
            id   INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE COLLATE NOCASE
        );
        CREATE TABLE identity_user_roles (
            user_id TEXT NOT NULL REFERENCES identity_users(id) ON DELETE CASCADE,
            role_id INTEGER NOT NULL REFERENCES identity_roles(id) ON DELETE CASCADE,
            PRIMARY KEY (user_id, role_id)
        );
    "#,
};

/// Outcome of a password sign-in check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInResult {
    Succeeded,
    /// Unknown user or wrong password; deliberately indistinguishable.
    Failed,
    LockedOut,
    NotAllowed,
}

#[async_trait]
pub trait IdentityStore: Send + Sync {
    async fn check_password_sign_in(&self, username: &str, password: &str)
        -> AuthResult<SignInResult>;

    async fn find_by_name(&self, username: &str) -> AuthResult<Option<Identity>>;
}

/// Account registration request.
#[derive(Clone)]
pub struct NewIdentity {
    pub username: String,
    pub email: Option<String>,
    pub password: String,
    pub roles: Vec<String>,
}

impl Debug for NewIdentity {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("NewIdentity")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("roles", &self.roles)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct SqlIdentityStore {
    db: Database,
}

impl SqlIdentityStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Register an account. Fails with `DuplicateIdentity` when the username
    /// is taken (case-insensitively).
    pub async fn create_user(&self, new: &NewIdentity) -> AuthResult<Identity> {
        let plain = new.password.clone();
        let hash = tokio::task::spawn_blocking(move || password::hash_password(&plain)).await??;
        let id = Uuid::new_v4().to_string();

        let mut tx = self.db.timed("identity.begin", self.db.pool().begin()).await?;
        let inserted = self
            .db
            .timed(
                "identity.insert",
                sqlx::query(
                    "INSERT INTO identity_users (id, username, email, password_hash) VALUES (?, ?, ?, ?)",
                )
                .bind(&id)
                .bind(&new.username)
                .bind(&new.email)
                .bind(&hash)
                .execute(&mut *tx),
            )
            .await;
        match inserted {
            Err(StoreError::UniqueViolation(_)) => {
                return Err(AuthError::DuplicateIdentity(new.username.clone()))
            }
            other => {
                other?;
            }
        }

        for role in &new.roles {
            self.db
                .timed(
                    "identity.role",
                    sqlx::query("INSERT INTO identity_roles (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
                        .bind(role)
                        .execute(&mut *tx),
                )
                .await?;
            self.db
                .timed(
                    "identity.user_role",
                    sqlx::query(
                        "INSERT OR IGNORE INTO identity_user_roles (user_id, role_id) \
                         SELECT ?, id FROM identity_roles WHERE name = ?",
                    )
                    .bind(&id)
                    .bind(role)
                    .execute(&mut *tx),
                )
                .await?;
        }
        self.db.timed("identity.commit", tx.commit()).await?;

        tracing::info!(username = %new.username, roles = ?new.roles, "identity created");
        Ok(Identity {
            id,
            username: new.username.clone(),
            email: new.email.clone(),
            roles: new.roles.clone(),
        })
    }

    /// Returns true when the role did not exist yet.
    pub async fn ensure_role(&self, name: &str) -> AuthResult<bool> {
        let result = self
            .db
            .timed(
                "identity.ensure_role",
                sqlx::query("INSERT INTO identity_roles (name) VALUES (?) ON CONFLICT(name) DO NOTHING")
                    .bind(name)
                    .execute(self.db.pool()),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Returns false when no such user exists.
    pub async fn set_disabled(&self, username: &str, disabled: bool) -> AuthResult<bool> {
        let result = self
            .db
            .timed(
                "identity.set_disabled",
                sqlx::query("UPDATE identity_users SET disabled = ? WHERE username = ?")
                    .bind(disabled)
                    .bind(username)
                    .execute(self.db.pool()),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Lock the account until `until`; `None` lifts the lockout.
    pub async fn set_lockout_end(
        &self,
        username: &str,
        until: Option<OffsetDateTime>,
    ) -> AuthResult<bool> {
        let result = self
            .db
            .timed(
                "identity.set_lockout_end",
                sqlx::query("UPDATE identity_users SET lockout_end = ? WHERE username = ?")
                    .bind(until.map(|t| t.unix_timestamp()))
                    .bind(username)
                    .execute(self.db.pool()),
            )
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl IdentityStore for SqlIdentityStore {
    async fn check_password_sign_in(
        &self,
        username: &str,
        password: &str,
    ) -> AuthResult<SignInResult> {
        let row = self
            .db
            .timed(
                "identity.sign_in",
                sqlx::query(
                    "SELECT password_hash, disabled, lockout_end FROM identity_users WHERE username = ?",
                )
                .bind(username)
                .fetch_optional(self.db.pool()),
            )
            .await?;

        let Some(row) = row else {
            let password = password.to_string();
            tokio::task::spawn_blocking(move || password::verify_unknown_account(&password))
                .await?;
            return Ok(SignInResult::Failed);
        };

        let disabled: bool = row.try_get("disabled")?;
        if disabled {
            return Ok(SignInResult::NotAllowed);
        }

        let lockout_end: Option<i64> = row.try_get("lockout_end")?;
        if lockout_end.is_some_and(|end| end > OffsetDateTime::now_utc().unix_timestamp()) {
            return Ok(SignInResult::LockedOut);
        }

        let hash: String = row.try_get("password_hash")?;
        let password = password.to_string();
        let verified =
            tokio::task::spawn_blocking(move || password::verify_password(&hash, &password))
                .await?;

        Ok(if verified {
            SignInResult::Succeeded
        } else {
            SignInResult::Failed
        })
    }

    async fn find_by_name(&self, username: &str) -> AuthResult<Option<Identity>> {
        let row = self
            .db
            .timed(
                "identity.find",
                sqlx::query("SELECT id, username, email FROM identity_users WHERE username = ?")
                    .bind(username)
                    .fetch_optional(self.db.pool()),
            )
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let id: String = row.try_get("id")?;

        let roles: Vec<String> = self
            .db
            .timed(
                "identity.roles",
                sqlx::query_scalar(
                    "SELECT r.name FROM identity_roles r \
                     JOIN identity_user_roles ur ON ur.role_id = r.id \
                     WHERE ur.user_id = ? ORDER BY r.name",
                )
                .bind(&id)
                .fetch_all(self.db.pool()),
            )
            .await?;

        Ok(Some(Identity {
            id,
            username: row.try_get("username")?,
            email: row.try_get("email")?,
            roles,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::Duration;

    async fn store() -> SqlIdentityStore {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations(&[("users".to_string(), IDENTITY_MIGRATION)])
            .await
            .unwrap();
        SqlIdentityStore::new(db)
    }

    fn reader() -> NewIdentity {
        NewIdentity {
            username: "reader".into(),
            email: Some("reader@example.com".into()),
            password: "P@ssword1".into(),
            roles: vec!["Customer".into()],
        }
    }

    #[tokio::test]
    async fn correct_password_succeeds() {
        let store = store().await;
        store.create_user(&reader()).await.unwrap();

        let result = store
            .check_password_sign_in("reader", "P@ssword1")
            .await
            .unwrap();
        assert_eq!(result, SignInResult::Succeeded);
    }

    #[tokio::test]
    async fn wrong_password_and_unknown_user_both_fail() {
        let store = store().await;
        store.create_user(&reader()).await.unwrap();

        assert_eq!(
            store.check_password_sign_in("reader", "nope").await.unwrap(),
            SignInResult::Failed
        );
        assert_eq!(
            store.check_password_sign_in("ghost", "P@ssword1").await.unwrap(),
            SignInResult::Failed
        );
    }

    #[tokio::test]
    async fn disabled_and_locked_accounts_are_refused() {
        let store = store().await;
        store.create_user(&reader()).await.unwrap();

        store
            .set_lockout_end("reader", Some(OffsetDateTime::now_utc() + Duration::hours(1)))
            .await
            .unwrap();
        assert_eq!(
            store.check_password_sign_in("reader", "P@ssword1").await.unwrap(),
            SignInResult::LockedOut
        );

        store.set_lockout_end("reader", None).await.unwrap();
        assert!(store.set_disabled("reader", true).await.unwrap());
        assert_eq!(
            store.check_password_sign_in("reader", "P@ssword1").await.unwrap(),
            SignInResult::NotAllowed
        );
    }

    #[tokio::test]
    async fn find_by_name_returns_roles() {
        let store = store().await;
        let mut new = reader();
        new.roles = vec!["Customer".into(), "Administrator".into()];
        let created = store.create_user(&new).await.unwrap();

        let found = store.find_by_name("reader").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.email.as_deref(), Some("reader@example.com"));
        assert_eq!(found.roles, vec!["Administrator", "Customer"]);
        assert!(store.find_by_name("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn usernames_are_unique_regardless_of_case() {
        let store = store().await;
        store.create_user(&reader()).await.unwrap();

        let mut shouting = reader();
        shouting.username = "READER".into();
        let err = store.create_user(&shouting).await.unwrap_err();
        assert!(matches!(err, AuthError::DuplicateIdentity(_)));
    }

    #[tokio::test]
    async fn ensure_role_is_idempotent() {
        let store = store().await;
        assert!(store.ensure_role("Administrator").await.unwrap());
        assert!(!store.ensure_role("Administrator").await.unwrap());
    }

    #[test]
    fn debug_output_hides_the_password() {
        let rendered = format!("{:?}", reader());
        assert!(!rendered.contains("P@ssword1"));
    }
}
