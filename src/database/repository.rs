use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashSet;

use crate::database::manager::DatabaseError;
use crate::database::models::{
    Audit, AuditFilter, Configuration, ConfigurationInput, Education, EducationFilter,
    EducationInput, MenuItem, MenuItemInput, NewAudit, Permission, PermissionInput, RoleInput,
    RoleWithPermissions, User, UserFilter, UserInput, UserStats, UserWithRoles,
};

#[async_trait]
pub trait MenuRepository: Send + Sync {
    /// Every row, active or not, in no particular order
    async fn list_menu_items(&self) -> Result<Vec<MenuItem>, DatabaseError>;

    async fn find_menu_item(&self, id: i64) -> Result<Option<MenuItem>, DatabaseError>;

    /// Subset of `ids` that refer to stored rows
    async fn existing_menu_item_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError>;

    async fn create_menu_item(&self, input: &MenuItemInput) -> Result<MenuItem, DatabaseError>;

    async fn update_menu_item(
        &self,
        id: i64,
        input: &MenuItemInput,
    ) -> Result<Option<MenuItem>, DatabaseError>;

    /// Removes the row and, transitively, its children
    async fn delete_menu_item(&self, id: i64) -> Result<bool, DatabaseError>;

    /// Single-row position write; parent is left untouched
    async fn set_menu_item_position(&self, id: i64, position: i32) -> Result<(), DatabaseError>;
}

#[async_trait]
pub trait ConfigurationRepository: Send + Sync {
    /// Ordered by group then key
    async fn list_configurations(&self) -> Result<Vec<Configuration>, DatabaseError>;

    async fn find_configuration(&self, id: i64) -> Result<Option<Configuration>, DatabaseError>;

    async fn find_configuration_by_key(
        &self,
        key: &str,
    ) -> Result<Option<Configuration>, DatabaseError>;

    /// Insert, or overwrite the row with the same key
    async fn upsert_configuration(
        &self,
        input: &ConfigurationInput,
    ) -> Result<Configuration, DatabaseError>;

    async fn update_configuration(
        &self,
        id: i64,
        input: &ConfigurationInput,
    ) -> Result<Option<Configuration>, DatabaseError>;

    async fn delete_configuration(&self, id: i64) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait AuditRepository: Send + Sync {
    async fn record_audit(&self, audit: &NewAudit) -> Result<Audit, DatabaseError>;

    /// One page, newest first, plus the total number of matches
    async fn list_audits(&self, filter: &AuditFilter) -> Result<(Vec<Audit>, i64), DatabaseError>;

    /// Count of records created in `[from, to)`; open bounds are unbounded
    async fn count_audits(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<i64, DatabaseError>;

    async fn count_audits_by_event(&self) -> Result<Vec<(String, i64)>, DatabaseError>;

    async fn count_audits_by_type(&self) -> Result<Vec<(String, i64)>, DatabaseError>;

    async fn recent_audits(&self, limit: u32) -> Result<Vec<Audit>, DatabaseError>;
}

#[async_trait]
pub trait RoleRepository: Send + Sync {
    /// Ordered by group (ungrouped first) then name
    async fn list_permissions(&self) -> Result<Vec<Permission>, DatabaseError>;

    async fn find_permission(&self, id: i64) -> Result<Option<Permission>, DatabaseError>;

    async fn find_permission_by_name(&self, name: &str)
        -> Result<Option<Permission>, DatabaseError>;

    async fn existing_permission_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError>;

    async fn create_permission(&self, input: &PermissionInput) -> Result<Permission, DatabaseError>;

    async fn update_permission(
        &self,
        id: i64,
        input: &PermissionInput,
    ) -> Result<Option<Permission>, DatabaseError>;

    /// Also detaches the permission from every role
    async fn delete_permission(&self, id: i64) -> Result<bool, DatabaseError>;

    /// Ordered by id
    async fn list_roles(&self) -> Result<Vec<RoleWithPermissions>, DatabaseError>;

    async fn find_role(&self, id: i64) -> Result<Option<RoleWithPermissions>, DatabaseError>;

    async fn find_role_by_name(&self, name: &str)
        -> Result<Option<RoleWithPermissions>, DatabaseError>;

    async fn create_role(&self, input: &RoleInput) -> Result<RoleWithPermissions, DatabaseError>;

    /// Replaces the attributes and syncs the permission set
    async fn update_role(
        &self,
        id: i64,
        input: &RoleInput,
    ) -> Result<Option<RoleWithPermissions>, DatabaseError>;

    async fn delete_role(&self, id: i64) -> Result<bool, DatabaseError>;
}

#[async_trait]
pub trait EducationRepository: Send + Sync {
    /// One page of non-deleted rows plus the total number of matches
    async fn list_education(
        &self,
        filter: &EducationFilter,
    ) -> Result<(Vec<Education>, i64), DatabaseError>;

    /// Soft-deleted rows are not found
    async fn find_education(&self, id: i64) -> Result<Option<Education>, DatabaseError>;

    async fn existing_education_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError>;

    async fn create_education(&self, input: &EducationInput) -> Result<Education, DatabaseError>;

    async fn update_education(
        &self,
        id: i64,
        input: &EducationInput,
    ) -> Result<Option<Education>, DatabaseError>;

    async fn soft_delete_education(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError>;

    async fn publish_education(&self, ids: &[i64], now: DateTime<Utc>)
        -> Result<u64, DatabaseError>;

    async fn unpublish_education(&self, ids: &[i64]) -> Result<u64, DatabaseError>;

    async fn soft_delete_education_many(
        &self,
        ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError>;

    /// Atomic increment; returns the new count
    async fn increment_education_views(&self, id: i64) -> Result<Option<i32>, DatabaseError>;
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// One page, newest first, plus the total number of matches
    async fn list_users(&self, filter: &UserFilter)
        -> Result<(Vec<UserWithRoles>, i64), DatabaseError>;

    async fn find_user(&self, id: i64) -> Result<Option<UserWithRoles>, DatabaseError>;

    /// Case-insensitive match
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError>;

    async fn existing_user_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError>;

    async fn existing_role_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError>;

    async fn create_user(&self, input: &UserInput) -> Result<UserWithRoles, DatabaseError>;

    /// Keeps the stored hash when `input.password` is `None` and the roles
    /// when `input.roles` is `None`
    async fn update_user(
        &self,
        id: i64,
        input: &UserInput,
    ) -> Result<Option<UserWithRoles>, DatabaseError>;

    async fn set_user_status(
        &self,
        id: i64,
        status: bool,
    ) -> Result<Option<UserWithRoles>, DatabaseError>;

    /// Adds one role, leaving the others in place
    async fn assign_user_role(&self, id: i64, role_id: i64) -> Result<bool, DatabaseError>;

    async fn delete_user(&self, id: i64) -> Result<bool, DatabaseError>;

    async fn user_stats(&self, registered_since: DateTime<Utc>) -> Result<UserStats, DatabaseError>;
}

/// Complete storage port used by the services
#[async_trait]
pub trait Store:
    MenuRepository
    + ConfigurationRepository
    + AuditRepository
    + RoleRepository
    + EducationRepository
    + UserRepository
{
    fn backend_name(&self) -> &'static str;

    async fn health_check(&self) -> Result<(), DatabaseError>;
}
