pub mod audit_service;
pub mod configuration_service;
pub mod education_service;
pub mod menu_service;
pub mod menu_tree;
pub mod role_service;
pub mod user_service;

pub use audit_service::{AuditContext, AuditService};
pub use configuration_service::ConfigurationService;
pub use education_service::EducationService;
pub use menu_service::MenuService;
pub use role_service::RoleService;
pub use user_service::UserService;

use serde::Serialize;
use thiserror::Error;

use crate::auth::password::PasswordError;
use crate::database::DatabaseError;
use crate::validation::FieldErrors;

/// Errors surfaced by the service layer
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("The given data was invalid.")]
    Validation(FieldErrors),

    #[error("{0}")]
    NotFound(String),

    /// Well-formed request the current user may not perform
    #[error("{0}")]
    Rejected(String),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

impl ServiceError {
    pub fn field(field: &str, message: &str) -> Self {
        let mut errors = FieldErrors::new();
        errors.add(field, message);
        ServiceError::Validation(errors)
    }
}

impl From<FieldErrors> for ServiceError {
    fn from(errors: FieldErrors) -> Self {
        ServiceError::Validation(errors)
    }
}

/// One page of a listing plus the counters clients page with
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub data: Vec<T>,
    pub current_page: u32,
    pub per_page: u32,
    pub total: i64,
    pub last_page: u32,
}

impl<T> Page<T> {
    pub fn new(data: Vec<T>, current_page: u32, per_page: u32, total: i64) -> Self {
        let per_page_count = i64::from(per_page.max(1));
        let pages = (total.max(0) + per_page_count - 1) / per_page_count;
        Self {
            data,
            current_page,
            per_page,
            total,
            last_page: u32::try_from(pages.max(1)).unwrap_or(u32::MAX),
        }
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            data: self.data.into_iter().map(f).collect(),
            current_page: self.current_page,
            per_page: self.per_page,
            total: self.total,
            last_page: self.last_page,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_page_rounds_up_and_never_drops_below_one() {
        assert_eq!(Page::<u8>::new(vec![], 1, 20, 0).last_page, 1);
        assert_eq!(Page::<u8>::new(vec![], 1, 20, 20).last_page, 1);
        assert_eq!(Page::<u8>::new(vec![], 1, 20, 21).last_page, 2);
        assert_eq!(Page::<u8>::new(vec![], 3, 12, 25).last_page, 3);
    }
}
