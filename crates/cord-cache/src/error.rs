//! State cache errors

use thiserror::Error;

pub type StateResult<T> = Result<T, StateError>;

/// State cache errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateError {
    /// The client was built without a state cache
    #[error("state not instantiated")]
    NotInitialized,

    /// The cache holds no such entity
    #[error("{entity} {id} not found in state cache")]
    NotFound { entity: &'static str, id: String },
}

impl StateError {
    pub(crate) fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
