//! Generic repository contract.
//!
//! One [`Repository`] trait is instantiated per entity type. Mutations are
//! staged into a [`UnitOfWork`] and committed with [`UnitOfWork::save`], which
//! reports a [`SaveOutcome`] instead of a bare success flag: a write that
//! changed nothing is a `NoOp`, a store fault is an `Err`.

use std::fmt::{self, Debug, Formatter};
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{FromRow, Row, Sqlite, Transaction};

use crate::{with_timeout, Database, StoreError, StoreResult};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// A persisted record type with an integer primary key named `id`.
pub trait Entity: for<'r> FromRow<'r, SqliteRow> + Debug + Send + Sync + Unpin + 'static {
    /// Singular name used in logs and messages.
    const NAME: &'static str;
    const TABLE: &'static str;
    /// Mapped columns, excluding `id`.
    const COLUMNS: &'static [&'static str];

    /// Store-assigned identity; `0` until the record has been inserted.
    fn id(&self) -> i64;
    fn set_id(&mut self, id: i64);
    /// Column values in `COLUMNS` order.
    fn values(&self) -> Vec<FieldValue>;
}

/// A bindable column value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Integer(Option<i64>),
    Text(Option<String>),
}

impl FieldValue {
    fn bind_to<'q>(self, query: SqliteQuery<'q>) -> SqliteQuery<'q> {
        match self {
            FieldValue::Integer(value) => query.bind(value),
            FieldValue::Text(value) => query.bind(value),
        }
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(Some(value))
    }
}

impl From<Option<i64>> for FieldValue {
    fn from(value: Option<i64>) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<Option<i32>> for FieldValue {
    fn from(value: Option<i32>) -> Self {
        FieldValue::Integer(value.map(i64::from))
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::Text(Some(value.to_string()))
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::Text(Some(value))
    }
}

impl From<Option<String>> for FieldValue {
    fn from(value: Option<String>) -> Self {
        FieldValue::Text(value)
    }
}

fn bind_all<'q>(mut query: SqliteQuery<'q>, values: Vec<FieldValue>) -> SqliteQuery<'q> {
    for value in values {
        query = value.bind_to(query);
    }
    query
}

/// Result of committing a unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    /// At least one row changed.
    Committed(u64),
    /// The commit succeeded but nothing changed (duplicate key, identical values,
    /// row already gone).
    NoOp,
}

impl SaveOutcome {
    pub fn from_rows(rows: u64) -> Self {
        if rows == 0 {
            SaveOutcome::NoOp
        } else {
            SaveOutcome::Committed(rows)
        }
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, SaveOutcome::Committed(_))
    }

    pub fn rows_affected(&self) -> u64 {
        match self {
            SaveOutcome::Committed(rows) => *rows,
            SaveOutcome::NoOp => 0,
        }
    }
}

/// Mutations staged inside one store transaction.
///
/// Dropping a unit of work without calling [`UnitOfWork::save`] rolls every
/// staged change back, which is also what happens when the owning request is
/// cancelled mid-flight.
pub struct UnitOfWork {
    tx: Transaction<'static, Sqlite>,
    staged_rows: u64,
    timeout: Duration,
}

impl UnitOfWork {
    pub async fn begin(db: &Database) -> StoreResult<Self> {
        let tx = db.timed("begin", db.pool().begin()).await?;
        Ok(Self {
            tx,
            staged_rows: 0,
            timeout: db.operation_timeout(),
        })
    }

    /// Rows affected by everything staged so far.
    pub fn staged_rows(&self) -> u64 {
        self.staged_rows
    }

    async fn execute(&mut self, operation: &'static str, query: SqliteQuery<'_>) -> StoreResult<u64> {
        let result = with_timeout(self.timeout, operation, query.execute(&mut *self.tx)).await?;
        self.staged_rows += result.rows_affected();
        Ok(result.rows_affected())
    }

    async fn insert_returning_id(
        &mut self,
        operation: &'static str,
        query: SqliteQuery<'_>,
    ) -> StoreResult<Option<i64>> {
        let row = with_timeout(self.timeout, operation, query.fetch_optional(&mut *self.tx)).await?;
        match row {
            Some(row) => {
                self.staged_rows += 1;
                Ok(Some(row.try_get::<i64, _>("id")?))
            }
            None => Ok(None),
        }
    }

    /// Commit all staged changes atomically.
    pub async fn save(self) -> StoreResult<SaveOutcome> {
        let rows = self.staged_rows;
        with_timeout(self.timeout, "commit", self.tx.commit()).await?;
        Ok(SaveOutcome::from_rows(rows))
    }

    /// Roll back all staged changes.
    pub async fn discard(self) -> StoreResult<()> {
        with_timeout(self.timeout, "rollback", self.tx.rollback()).await
    }
}

impl Debug for UnitOfWork {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("staged_rows", &self.staged_rows)
            .finish()
    }
}

/// Uniform persistence protocol over one entity type.
#[async_trait]
pub trait Repository<T: Entity>: Send + Sync {
    /// Every stored record, ordered by id.
    async fn find_all(&self) -> StoreResult<Vec<T>>;

    /// Point lookup; `None` means no such record.
    async fn find_by_id(&self, id: i64) -> StoreResult<Option<T>>;

    /// Existence probe that does not materialize the record.
    async fn exists(&self, id: i64) -> StoreResult<bool>;

    async fn begin(&self) -> StoreResult<UnitOfWork>;

    /// Stage an insert; yields the assigned id, or `None` when a unique key
    /// already holds the values.
    async fn stage_insert(&self, uow: &mut UnitOfWork, entity: &T) -> StoreResult<Option<i64>>;

    /// Stage a full-record replace keyed by `entity.id()`.
    async fn stage_update(&self, uow: &mut UnitOfWork, entity: &T) -> StoreResult<u64>;

    async fn stage_delete(&self, uow: &mut UnitOfWork, entity: &T) -> StoreResult<u64>;

    /// Insert and save. On `Committed` the store-assigned id is written back
    /// into `entity`.
    async fn create(&self, entity: &mut T) -> StoreResult<SaveOutcome> {
        let mut uow = self.begin().await?;
        let assigned = self.stage_insert(&mut uow, entity).await?;
        let outcome = uow.save().await?;
        if let (SaveOutcome::Committed(_), Some(id)) = (outcome, assigned) {
            entity.set_id(id);
        }
        Ok(outcome)
    }

    async fn update(&self, entity: &T) -> StoreResult<SaveOutcome> {
        let mut uow = self.begin().await?;
        self.stage_update(&mut uow, entity).await?;
        uow.save().await
    }

    async fn delete(&self, entity: &T) -> StoreResult<SaveOutcome> {
        let mut uow = self.begin().await?;
        self.stage_delete(&mut uow, entity).await?;
        uow.save().await
    }
}

pub type RepositoryArc<T> = Arc<dyn Repository<T>>;

/// SQL implementation of [`Repository`] shared by every entity.
pub struct SqlRepository<T> {
    db: Database,
    _entity: PhantomData<fn() -> T>,
}

impl<T> Clone for SqlRepository<T> {
    fn clone(&self) -> Self {
        Self {
            db: self.db.clone(),
            _entity: PhantomData,
        }
    }
}

impl<T: Entity> Debug for SqlRepository<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqlRepository")
            .field("table", &T::TABLE)
            .finish()
    }
}

impl<T: Entity> SqlRepository<T> {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            _entity: PhantomData,
        }
    }

    fn select_sql() -> String {
        format!("SELECT id, {} FROM {}", T::COLUMNS.join(", "), T::TABLE)
    }

    /// Records whose `column` equals `value` (NULL-safe), ordered by id.
    pub async fn find_by(&self, column: &'static str, value: FieldValue) -> StoreResult<Vec<T>> {
        if !T::COLUMNS.contains(&column) {
            return Err(StoreError::UnknownColumn {
                table: T::TABLE,
                column,
            });
        }

        let sql = format!("{} WHERE {} IS ? ORDER BY id", Self::select_sql(), column);
        let rows = self
            .db
            .timed(
                "find_by",
                value.bind_to(sqlx::query(&sql)).fetch_all(self.db.pool()),
            )
            .await?;

        rows.iter()
            .map(|row| T::from_row(row).map_err(StoreError::from))
            .collect()
    }
}

#[async_trait]
impl<T: Entity> Repository<T> for SqlRepository<T> {
    async fn find_all(&self) -> StoreResult<Vec<T>> {
        let sql = format!("{} ORDER BY id", Self::select_sql());
        self.db
            .timed(
                "find_all",
                sqlx::query_as::<Sqlite, T>(&sql).fetch_all(self.db.pool()),
            )
            .await
    }

    async fn find_by_id(&self, id: i64) -> StoreResult<Option<T>> {
        let sql = format!("{} WHERE id = ?", Self::select_sql());
        self.db
            .timed(
                "find_by_id",
                sqlx::query_as::<Sqlite, T>(&sql)
                    .bind(id)
                    .fetch_optional(self.db.pool()),
            )
            .await
    }

    async fn exists(&self, id: i64) -> StoreResult<bool> {
        let sql = format!("SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?)", T::TABLE);
        let found: i64 = self
            .db
            .timed(
                "exists",
                sqlx::query_scalar::<Sqlite, i64>(&sql)
                    .bind(id)
                    .fetch_one(self.db.pool()),
            )
            .await?;
        Ok(found != 0)
    }

    async fn begin(&self) -> StoreResult<UnitOfWork> {
        UnitOfWork::begin(&self.db).await
    }

    async fn stage_insert(&self, uow: &mut UnitOfWork, entity: &T) -> StoreResult<Option<i64>> {
        let values = entity.values();
        debug_assert_eq!(values.len(), T::COLUMNS.len());

        let placeholders = vec!["?"; T::COLUMNS.len()].join(", ");
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT DO NOTHING RETURNING id",
            T::TABLE,
            T::COLUMNS.join(", "),
            placeholders
        );

        let assigned = uow
            .insert_returning_id("insert", bind_all(sqlx::query(&sql), values))
            .await?;
        tracing::debug!(entity = T::NAME, id = ?assigned, "insert staged");
        Ok(assigned)
    }

    async fn stage_update(&self, uow: &mut UnitOfWork, entity: &T) -> StoreResult<u64> {
        let values = entity.values();
        debug_assert_eq!(values.len(), T::COLUMNS.len());

        let assignments: Vec<String> = T::COLUMNS.iter().map(|c| format!("{c} = ?")).collect();
        let changed: Vec<String> = T::COLUMNS.iter().map(|c| format!("{c} IS NOT ?")).collect();
        // Rows whose values already match are left untouched so that an
        // identical replace reports zero rows.
        let sql = format!(
            "UPDATE {} SET {} WHERE id = ? AND ({})",
            T::TABLE,
            assignments.join(", "),
            changed.join(" OR ")
        );

        let query = bind_all(sqlx::query(&sql), values.clone()).bind(entity.id());
        let rows = uow.execute("update", bind_all(query, values)).await?;
        tracing::debug!(entity = T::NAME, id = entity.id(), rows, "update staged");
        Ok(rows)
    }

    async fn stage_delete(&self, uow: &mut UnitOfWork, entity: &T) -> StoreResult<u64> {
        let sql = format!("DELETE FROM {} WHERE id = ?", T::TABLE);
        let rows = uow
            .execute("delete", sqlx::query(&sql).bind(entity.id()))
            .await?;
        tracing::debug!(entity = T::NAME, id = entity.id(), rows, "delete staged");
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Migration;

    #[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
    struct Gadget {
        id: i64,
        name: String,
        serial: String,
        owner_id: Option<i64>,
    }

    impl Gadget {
        fn new(name: &str, serial: &str, owner_id: Option<i64>) -> Self {
            Self {
                id: 0,
                name: name.to_string(),
                serial: serial.to_string(),
                owner_id,
            }
        }
    }

    impl Entity for Gadget {
        const NAME: &'static str = "gadget";
        const TABLE: &'static str = "gadgets";
        const COLUMNS: &'static [&'static str] = &["name", "serial", "owner_id"];

        fn id(&self) -> i64 {
            self.id
        }

        fn set_id(&mut self, id: i64) {
            self.id = id;
        }

        fn values(&self) -> Vec<FieldValue> {
            vec![
                self.name.as_str().into(),
                self.serial.as_str().into(),
                self.owner_id.into(),
            ]
        }
    }

    async fn setup() -> (Database, SqlRepository<Gadget>) {
        let db = Database::in_memory().await.unwrap();
        db.run_migrations(&[(
            "gadgets".to_string(),
            Migration {
                id: "001_init",
                up: r#"
                    CREATE TABLE owners (id INTEGER PRIMARY KEY AUTOINCREMENT);
                    CREATE TABLE gadgets (
                        id       INTEGER PRIMARY KEY AUTOINCREMENT,
                        name     TEXT NOT NULL,
                        serial   TEXT NOT NULL UNIQUE,
                        owner_id INTEGER REFERENCES owners(id) ON DELETE RESTRICT
                    );
                "#,
            },
        )])
        .await
        .unwrap();
        let repo = SqlRepository::new(db.clone());
        (db, repo)
    }

    #[tokio::test]
    async fn create_assigns_id_and_round_trips() {
        let (_db, repo) = setup().await;
        let mut gadget = Gadget::new("lamp", "SN-1", None);

        let outcome = repo.create(&mut gadget).await.unwrap();
        assert_eq!(outcome, SaveOutcome::Committed(1));
        assert!(gadget.id > 0);

        let stored = repo.find_by_id(gadget.id).await.unwrap().unwrap();
        assert_eq!(stored, gadget);
    }

    #[tokio::test]
    async fn exists_agrees_with_find_by_id() {
        let (_db, repo) = setup().await;
        let mut gadget = Gadget::new("lamp", "SN-1", None);
        repo.create(&mut gadget).await.unwrap();

        for id in [gadget.id, gadget.id + 1, 999, -1] {
            let exists = repo.exists(id).await.unwrap();
            let found = repo.find_by_id(id).await.unwrap();
            assert_eq!(exists, found.is_some(), "id {id}");
        }
    }

    #[tokio::test]
    async fn find_all_is_stable_without_mutation() {
        let (_db, repo) = setup().await;
        for serial in ["SN-1", "SN-2", "SN-3"] {
            repo.create(&mut Gadget::new("lamp", serial, None))
                .await
                .unwrap();
        }

        let first = repo.find_all().await.unwrap();
        let second = repo.find_all().await.unwrap();
        assert_eq!(first.len(), 3);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn duplicate_unique_key_is_a_noop() {
        let (_db, repo) = setup().await;
        repo.create(&mut Gadget::new("lamp", "SN-1", None))
            .await
            .unwrap();

        let mut duplicate = Gadget::new("other", "SN-1", None);
        let outcome = repo.create(&mut duplicate).await.unwrap();
        assert_eq!(outcome, SaveOutcome::NoOp);
        assert_eq!(duplicate.id, 0);
        assert_eq!(repo.find_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn identical_update_is_a_noop() {
        let (_db, repo) = setup().await;
        let mut gadget = Gadget::new("lamp", "SN-1", None);
        repo.create(&mut gadget).await.unwrap();

        assert_eq!(repo.update(&gadget).await.unwrap(), SaveOutcome::NoOp);

        gadget.name = "desk lamp".to_string();
        assert_eq!(
            repo.update(&gadget).await.unwrap(),
            SaveOutcome::Committed(1)
        );
        let stored = repo.find_by_id(gadget.id).await.unwrap().unwrap();
        assert_eq!(stored.name, "desk lamp");
    }

    #[tokio::test]
    async fn update_detects_changes_to_null() {
        let (db, repo) = setup().await;
        sqlx::query("INSERT INTO owners (id) VALUES (1)")
            .execute(db.pool())
            .await
            .unwrap();
        let mut gadget = Gadget::new("lamp", "SN-1", Some(1));
        repo.create(&mut gadget).await.unwrap();

        gadget.owner_id = None;
        assert!(repo.update(&gadget).await.unwrap().is_committed());
        let stored = repo.find_by_id(gadget.id).await.unwrap().unwrap();
        assert_eq!(stored.owner_id, None);
    }

    #[tokio::test]
    async fn delete_removes_then_reports_noop() {
        let (_db, repo) = setup().await;
        let mut gadget = Gadget::new("lamp", "SN-1", None);
        repo.create(&mut gadget).await.unwrap();

        assert_eq!(
            repo.delete(&gadget).await.unwrap(),
            SaveOutcome::Committed(1)
        );
        assert!(!repo.exists(gadget.id).await.unwrap());
        assert_eq!(repo.delete(&gadget).await.unwrap(), SaveOutcome::NoOp);
    }

    #[tokio::test]
    async fn foreign_key_violation_is_referential_integrity() {
        let (_db, repo) = setup().await;
        let err = repo
            .create(&mut Gadget::new("lamp", "SN-1", Some(42)))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ReferentialIntegrity(_)), "{err:?}");
        assert!(repo.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn restricted_parent_delete_is_rejected() {
        let (db, repo) = setup().await;
        sqlx::query("INSERT INTO owners (id) VALUES (1)")
            .execute(db.pool())
            .await
            .unwrap();
        repo.create(&mut Gadget::new("lamp", "SN-1", Some(1)))
            .await
            .unwrap();

        let err = db
            .timed(
                "delete owner",
                sqlx::query("DELETE FROM owners WHERE id = 1").execute(db.pool()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ReferentialIntegrity(_)), "{err:?}");
    }

    #[tokio::test]
    async fn unit_of_work_commits_all_staged_changes_together() {
        let (_db, repo) = setup().await;
        let mut uow = repo.begin().await.unwrap();
        repo.stage_insert(&mut uow, &Gadget::new("a", "SN-1", None))
            .await
            .unwrap();
        repo.stage_insert(&mut uow, &Gadget::new("b", "SN-2", None))
            .await
            .unwrap();
        assert_eq!(uow.staged_rows(), 2);

        assert_eq!(uow.save().await.unwrap(), SaveOutcome::Committed(2));
        assert_eq!(repo.find_all().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn discarded_unit_of_work_leaves_no_trace() {
        let (_db, repo) = setup().await;
        let mut uow = repo.begin().await.unwrap();
        repo.stage_insert(&mut uow, &Gadget::new("a", "SN-1", None))
            .await
            .unwrap();
        uow.discard().await.unwrap();

        assert!(repo.find_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn find_by_filters_on_mapped_columns_only() {
        let (db, repo) = setup().await;
        sqlx::query("INSERT INTO owners (id) VALUES (1)")
            .execute(db.pool())
            .await
            .unwrap();
        repo.create(&mut Gadget::new("a", "SN-1", Some(1)))
            .await
            .unwrap();
        repo.create(&mut Gadget::new("b", "SN-2", None))
            .await
            .unwrap();

        let owned = repo.find_by("owner_id", Some(1i64).into()).await.unwrap();
        assert_eq!(owned.len(), 1);
        assert_eq!(owned[0].serial, "SN-1");

        let unowned = repo.find_by("owner_id", FieldValue::Integer(None)).await.unwrap();
        assert_eq!(unowned.len(), 1);
        assert_eq!(unowned[0].serial, "SN-2");

        let err = repo.find_by("password", "x".into()).await.unwrap_err();
        assert!(matches!(err, StoreError::UnknownColumn { .. }));
    }

    #[test]
    fn save_outcome_counts_rows() {
        assert_eq!(SaveOutcome::from_rows(0), SaveOutcome::NoOp);
        assert_eq!(SaveOutcome::from_rows(3).rows_affected(), 3);
        assert!(!SaveOutcome::NoOp.is_committed());
    }
}
