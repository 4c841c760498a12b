use thiserror::Error;

/// Errors surfaced by the relational store layer.
///
/// A failure partway through a multi-entity save is prevented structurally
/// (the whole save runs in one transaction), so partial-write failure has
/// no variant here — callers either get the full result or one of these.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("Constraint violation: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),
}
