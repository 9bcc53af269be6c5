//! Identity module: login endpoint and startup seeding of roles and the
//! administrator account.

pub mod models;
pub mod routes;

use std::sync::Arc;

use anyhow::{anyhow, Context};
use async_trait::async_trait;
use axum::Router;
use bookstore_auth::{
    IdentityStore, LoginService, NewIdentity, SqlIdentityStore, TokenIssuer, IDENTITY_MIGRATION,
    ROLE_ADMINISTRATOR, ROLE_CUSTOMER,
};
use bookstore_kernel::{settings::SeedAdmin, InitCtx, Migration, Module};
use once_cell::sync::OnceCell;
use utoipa::OpenApi;

#[derive(Clone)]
pub struct UsersState {
    pub login: LoginService,
}

pub struct UsersModule {
    state: OnceCell<UsersState>,
}

impl UsersModule {
    pub const fn new() -> Self {
        Self {
            state: OnceCell::new(),
        }
    }
}

impl Default for UsersModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for UsersModule {
    fn name(&self) -> &'static str {
        "users"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        // A missing or weak signing key must stop startup, not the first login.
        let issuer = TokenIssuer::from_settings(&ctx.settings.auth)
            .context("token issuer is misconfigured")?;
        let store = SqlIdentityStore::new(ctx.db.clone());

        seed(&store, ctx.settings.auth.seed_admin.as_ref()).await?;

        let state = UsersState {
            login: LoginService::new(Arc::new(store), Arc::new(issuer)),
        };
        self.state
            .set(state)
            .map_err(|_| anyhow!("users module initialized twice"))?;

        tracing::info!(module = self.name(), "users module initialized");
        Ok(())
    }

    fn routes(&self) -> Router {
        match self.state.get() {
            Some(state) => routes::router().with_state(state.clone()),
            None => {
                tracing::warn!(module = self.name(), "routes requested before init");
                Router::new()
            }
        }
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        serde_json::to_value(routes::UsersApi::openapi()).ok()
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![IDENTITY_MIGRATION]
    }
}

/// Ensure the built-in roles exist and create the configured administrator
/// when missing.
async fn seed(store: &SqlIdentityStore, admin: Option<&SeedAdmin>) -> anyhow::Result<()> {
    for role in [ROLE_ADMINISTRATOR, ROLE_CUSTOMER] {
        if store.ensure_role(role).await? {
            tracing::info!(role, "role seeded");
        }
    }

    let Some(admin) = admin else {
        return Ok(());
    };
    if store.find_by_name(&admin.username).await?.is_some() {
        return Ok(());
    }

    store
        .create_user(&NewIdentity {
            username: admin.username.clone(),
            email: Some(admin.email.clone()),
            password: admin.password.clone(),
            roles: vec![ROLE_ADMINISTRATOR.to_string()],
        })
        .await
        .with_context(|| format!("failed to seed administrator '{}'", admin.username))?;
    tracing::info!(username = %admin.username, "administrator seeded");
    Ok(())
}

pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(UsersModule::new())
}
