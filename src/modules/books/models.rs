use bookstore_db::{Entity, FieldValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use utoipa::ToSchema;

/// A catalogue entry, optionally attributed to an author.
#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Book {
    /// Store-assigned identifier
    pub id: i64,
    pub title: String,
    pub year: Option<i32>,
    /// Unique when present; the format is not checked
    pub isbn: Option<String>,
    pub summary: Option<String>,
    pub author_id: Option<i64>,
}

impl Entity for Book {
    const NAME: &'static str = "book";
    const TABLE: &'static str = "books";
    const COLUMNS: &'static [&'static str] = &["title", "year", "isbn", "summary", "author_id"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.title.as_str().into(),
            self.year.into(),
            self.isbn.clone().into(),
            self.summary.clone().into(),
            self.author_id.into(),
        ]
    }
}

/// Request model for creating a book.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookCreate {
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub author_id: Option<i64>,
}

impl BookCreate {
    pub fn validate(&self) -> Vec<serde_json::Value> {
        required_title(&self.title)
    }

    pub fn into_book(self) -> Book {
        Book {
            id: 0,
            title: self.title,
            year: self.year,
            isbn: self.isbn,
            summary: self.summary,
            author_id: self.author_id,
        }
    }
}

/// Full replacement of a stored book; `id` must match the path.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct BookUpdate {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub year: Option<i32>,
    #[serde(default)]
    pub isbn: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub author_id: Option<i64>,
}

impl BookUpdate {
    pub fn validate(&self) -> Vec<serde_json::Value> {
        required_title(&self.title)
    }

    pub fn into_book(self) -> Book {
        Book {
            id: self.id,
            title: self.title,
            year: self.year,
            isbn: self.isbn,
            summary: self.summary,
            author_id: self.author_id,
        }
    }
}

fn required_title(title: &str) -> Vec<serde_json::Value> {
    if title.trim().is_empty() {
        vec![json!({"field": "title", "error": "required"})]
    } else {
        Vec::new()
    }
}
