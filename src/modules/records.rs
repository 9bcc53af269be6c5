//! Record flows shared by every entity module: existence short-circuits,
//! id checks and the mapping of save outcomes onto transport errors.

use bookstore_db::{Entity, Repository, SaveOutcome};
use bookstore_http::{AppError, AppResult};

use crate::utils::validate_id;

pub async fn get<T: Entity>(repo: &dyn Repository<T>, id: i64) -> AppResult<T> {
    match repo.find_by_id(id).await? {
        Some(record) => Ok(record),
        None => {
            tracing::warn!(entity = T::NAME, id, "not found");
            Err(AppError::not_found(format!("{} {} not found", T::NAME, id)))
        }
    }
}

/// Insert `record`; a write that changed nothing (duplicate unique key) is a
/// conflict.
pub async fn create<T: Entity>(repo: &dyn Repository<T>, mut record: T) -> AppResult<T> {
    match repo.create(&mut record).await? {
        SaveOutcome::Committed(_) => {
            tracing::info!(entity = T::NAME, id = record.id(), "created");
            Ok(record)
        }
        SaveOutcome::NoOp => {
            tracing::warn!(entity = T::NAME, "creation changed nothing");
            Err(AppError::conflict(
                Vec::new(),
                format!("{} already exists", T::NAME),
            ))
        }
    }
}

/// Replace the record stored under `id`. Identical values are a successful
/// no-op.
pub async fn update<T: Entity>(
    repo: &dyn Repository<T>,
    id: i64,
    record: T,
) -> AppResult<SaveOutcome> {
    validate_id(id)?;
    if record.id() != id {
        tracing::warn!(entity = T::NAME, id, body_id = record.id(), "update failed with bad data");
        return Err(AppError::bad_request(format!(
            "path id {} does not match body id {}",
            id,
            record.id()
        )));
    }

    if !repo.exists(id).await? {
        tracing::warn!(entity = T::NAME, id, "not found");
        return Err(AppError::not_found(format!("{} {} not found", T::NAME, id)));
    }

    let outcome = repo.update(&record).await?;
    tracing::info!(entity = T::NAME, id, ?outcome, "updated");
    Ok(outcome)
}

pub async fn delete<T: Entity>(repo: &dyn Repository<T>, id: i64) -> AppResult<()> {
    validate_id(id)?;

    if !repo.exists(id).await? {
        tracing::warn!(entity = T::NAME, id, "not found");
        return Err(AppError::not_found(format!("{} {} not found", T::NAME, id)));
    }
    let record = get(repo, id).await?;

    match repo.delete(&record).await? {
        SaveOutcome::Committed(_) => {
            tracing::info!(entity = T::NAME, id, "deleted");
            Ok(())
        }
        SaveOutcome::NoOp => {
            // Deleted concurrently between the probe and the delete.
            tracing::warn!(entity = T::NAME, id, "already gone");
            Err(AppError::not_found(format!("{} {} not found", T::NAME, id)))
        }
    }
}
