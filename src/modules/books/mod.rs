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

use self::models::Book;
use super::{write_verifier, Mounted};

#[derive(Clone)]
pub struct BooksState {
    pub books: RepositoryArc<Book>,
}

pub struct BooksModule {
    mounted: OnceCell<Mounted<BooksState>>,
}

impl BooksModule {
    pub const fn new() -> Self {
        Self {
            mounted: OnceCell::new(),
        }
    }
}

impl Default for BooksModule {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Module for BooksModule {
    fn name(&self) -> &'static str {
        "books"
    }

    async fn init(&self, ctx: &InitCtx<'_>) -> anyhow::Result<()> {
        let state = BooksState {
            books: Arc::new(SqlRepository::<Book>::new(ctx.db.clone())),
        };
        let verifier = write_verifier(ctx.settings)?;
        let guarded = verifier.is_some();

        self.mounted
            .set(Mounted { state, verifier })
            .map_err(|_| anyhow!("books module initialized twice"))?;

        tracing::info!(module = self.name(), guarded, "books module initialized");
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
        serde_json::to_value(routes::BooksApi::openapi()).ok()
    }

    // Books reference authors; deleting an author with books is refused.
    fn migrations(&self) -> Vec<Migration> {
        vec![Migration {
            id: "001_init",
            up: r#"
                CREATE TABLE books (
                    id        INTEGER PRIMARY KEY AUTOINCREMENT,
                    title     TEXT NOT NULL,
                    year      INTEGER,
                    isbn      TEXT UNIQUE,
                    summary   TEXT,
                    author_id INTEGER REFERENCES authors(id) ON DELETE RESTRICT
                );
                CREATE INDEX books_author_id ON books (author_id);
                "#,
        }]
    }
}

pub fn create_module() -> std::sync::Arc<dyn Module> {
    std::sync::Arc::new(BooksModule::new())
}
