use bookstore_db::{Entity, FieldValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use sqlx::FromRow;
use utoipa::ToSchema;

use crate::modules::books::models::Book;

#[derive(Debug, Clone, PartialEq, Serialize, FromRow, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Author {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub bio: Option<String>,
    /// Filled only when a single author is fetched
    #[sqlx(skip)]
    pub books: Vec<Book>,
}

impl Entity for Author {
    const NAME: &'static str = "author";
    const TABLE: &'static str = "authors";
    const COLUMNS: &'static [&'static str] = &["first_name", "last_name", "bio"];

    fn id(&self) -> i64 {
        self.id
    }

    fn set_id(&mut self, id: i64) {
        self.id = id;
    }

    fn values(&self) -> Vec<FieldValue> {
        vec![
            self.first_name.as_str().into(),
            self.last_name.as_str().into(),
            self.bio.clone().into(),
        ]
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorCreate {
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub bio: Option<String>,
}

impl AuthorCreate {
    pub fn validate(&self) -> Vec<serde_json::Value> {
        required_names(&self.first_name, &self.last_name)
    }

    pub fn into_author(self) -> Author {
        Author {
            id: 0,
            first_name: self.first_name,
            last_name: self.last_name,
            bio: self.bio,
            books: Vec::new(),
        }
    }
}

/// Full replacement of a stored author; `id` must match the path.
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorUpdate {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub bio: Option<String>,
}

impl AuthorUpdate {
    pub fn validate(&self) -> Vec<serde_json::Value> {
        required_names(&self.first_name, &self.last_name)
    }

    pub fn into_author(self) -> Author {
        Author {
            id: self.id,
            first_name: self.first_name,
            last_name: self.last_name,
            bio: self.bio,
            books: Vec::new(),
        }
    }
}

fn required_names(first_name: &str, last_name: &str) -> Vec<serde_json::Value> {
    [("firstName", first_name), ("lastName", last_name)]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(field, _)| json!({"field": field, "error": "required"}))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_embedded_books() {
        let author = Author {
            id: 1,
            first_name: "A".into(),
            last_name: "B".into(),
            bio: None,
            books: vec![],
        };
        let value = serde_json::to_value(&author).unwrap();
        assert_eq!(value["firstName"], "A");
        assert_eq!(value["books"], json!([]));
    }

    #[test]
    fn missing_names_are_listed() {
        let payload = AuthorCreate {
            first_name: "".into(),
            last_name: " ".into(),
            bio: None,
        };
        assert_eq!(payload.validate().len(), 2);
    }
}
