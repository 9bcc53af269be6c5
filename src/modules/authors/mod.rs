pub mod models;
pub mod routes;

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::Router;
use bookstore_db::{RepositoryArc, SqlRepository};
use bookstore_http::guard_writes;
use bookstore_kernel::{InitCtx, Migration, Module};
use once_cell::sync::OnceCell;
use utoipa::OpenApi;

use self::models::Author;
use super::books::models::Book;
use super::{write_verifier, Mounted};

#[derive(Clone)]
pub struct AuthorsState {
    pub authors: RepositoryArc<Author>,
    /// Used to embed an author's books
    pub books: SqlRepository<Book>,
}

pub struct AuthorsModule {
    mounted: OnceCell<Mounted<AuthorsState>>,
}

impl AuthorsModule {
    pub const fn new() -> Self {
        Self {
            mounted: OnceCell::new(),
        }
    }
}

impl Default for AuthorsModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for AuthorsModule {
    fn name(&self) -> &'static str {
        "authors"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let state = AuthorsState {
            authors: Arc::new(SqlRepository::<Author>::new(ctx.db.clone())),
            books: SqlRepository::new(ctx.db.clone()),
        };
        let verifier = write_verifier(ctx.settings)?;
        let guarded = verifier.is_some();

        self.mounted
            .set(Mounted { state, verifier })
            .map_err(|_| anyhow!("authors module initialized twice"))?;

        tracing::info!(module = self.name(), guarded, "authors module initialized");
        Ok(())
    }

    fn routes(&self) -> Router {
        match self.mounted.get() {
            Some(mounted) => guard_writes(
                routes::router().with_state(mounted.state.clone()),
                mounted.verifier.clone(),
            ),
            None => {
                tracing::warn!(module = self.name(), "routes requested before init");
                Router::new()
            }
        }
    }

    fn openapi(&self) -> Option<serde_json::Value> {
        serde_json::to_value(routes::AuthorsApi::openapi()).ok()
    }

    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE authors (
                    id         INTEGER PRIMARY KEY AUTOINCREMENT,
                    first_name TEXT NOT NULL,
                    last_name  TEXT NOT NULL,
                    bio        TEXT
                );
                "#,
        }]
    }
}

pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(AuthorsModule::new())
}
