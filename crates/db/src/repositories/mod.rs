use thiserror::Error;

use lynco_core::store::StoreError;

pub mod quote;

pub use quote::SqlQuoteStore;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

impl From<RepositoryError> for StoreError {
    fn from(error: RepositoryError) -> Self {
        match error {
            RepositoryError::Database(sqlx::Error::Database(db)) if is_constraint(db.kind()) => {
                StoreError::Constraint(db.message().to_string())
            }
            RepositoryError::Database(error) => StoreError::Backend(error.to_string()),
            RepositoryError::Decode(message) => StoreError::Decode(message),
        }
    }
}

fn is_constraint(kind: sqlx::error::ErrorKind) -> bool {
    use sqlx::error::ErrorKind;

    matches!(
        kind,
        ErrorKind::UniqueViolation
            | ErrorKind::ForeignKeyViolation
            | ErrorKind::NotNullViolation
            | ErrorKind::CheckViolation
    )
}
