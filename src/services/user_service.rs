use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::{AuditContext, AuditService, Page, ServiceError};
use crate::auth::password::hash_password;
use crate::database::models::{RoleSummary, UserFilter, UserInput, UserStats, UserWithRoles};
use crate::database::Store;
use crate::validation::{check, deserialize_id_list, deserialize_optional_id, normalize, FieldErrors};

const NOT_FOUND: &str = "User not found.";
const PER_PAGE: u32 = 15;
const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const RECENT_DAYS: i64 = 7;

#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub search: Option<String>,
    /// `active` or `inactive`
    pub status: Option<String>,
    /// Role name
    pub role: Option<String>,
    pub page: Option<u32>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct UserPayload {
    #[validate(
        required(message = "Name is required."),
        length(max = 255, message = "Name cannot exceed 255 characters.")
    )]
    pub name: Option<String>,
    #[validate(
        required(message = "Email is required."),
        email(message = "Please provide a valid email address."),
        length(max = 255, message = "Email cannot exceed 255 characters.")
    )]
    pub email: Option<String>,
    pub password: Option<String>,
    pub password_confirmation: Option<String>,
    #[validate(length(max = 20, message = "Phone number cannot exceed 20 characters."))]
    pub phone: Option<String>,
    #[validate(length(max = 500, message = "Address cannot exceed 500 characters."))]
    pub address: Option<String>,
    pub status: Option<bool>,
    #[serde(default, deserialize_with = "deserialize_id_list")]
    pub roles: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserBulkActionPayload {
    pub action: Option<String>,
    #[serde(default, deserialize_with = "deserialize_id_list")]
    pub user_ids: Option<Vec<i64>>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub role_id: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserBulkAction {
    Activate,
    Deactivate,
    Delete,
    AssignRole,
}

impl UserBulkAction {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "activate" => Some(UserBulkAction::Activate),
            "deactivate" => Some(UserBulkAction::Deactivate),
            "delete" => Some(UserBulkAction::Delete),
            "assign_role" => Some(UserBulkAction::AssignRole),
            _ => None,
        }
    }

    fn past_tense(self) -> &'static str {
        match self {
            UserBulkAction::Activate => "activated",
            UserBulkAction::Deactivate => "deactivated",
            UserBulkAction::Delete => "deleted",
            UserBulkAction::AssignRole => "assigned role to",
        }
    }
}

/// Account as shown to administrators; timestamps are `Y-m-d H:M:S` in UTC
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub status: bool,
    pub status_text: &'static str,
    pub roles: Vec<RoleSummary>,
    pub role_names: Vec<String>,
    pub last_login_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

fn status_text(status: bool) -> &'static str {
    if status {
        "Active"
    } else {
        "Inactive"
    }
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.format(DATETIME_FORMAT).to_string()
}

impl From<UserWithRoles> for UserView {
    fn from(item: UserWithRoles) -> Self {
        let user = item.user;
        Self {
            id: user.id,
            name: user.name,
            email: user.email,
            phone: user.phone,
            address: user.address,
            status: user.status,
            status_text: status_text(user.status),
            role_names: item.roles.iter().map(|r| r.name.clone()).collect(),
            roles: item.roles,
            last_login_at: user.last_login_at.map(format_timestamp),
            created_at: format_timestamp(user.created_at),
            updated_at: format_timestamp(user.updated_at),
        }
    }
}

/// Result of a status toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UserStatus {
    pub status: bool,
    pub status_text: &'static str,
}

/// First failing strength rule for a new password
fn password_strength_error(password: &str) -> Option<&'static str> {
    if password.chars().count() < 8 {
        return Some("The password field must be at least 8 characters.");
    }
    if !(password.chars().any(char::is_uppercase) && password.chars().any(char::is_lowercase)) {
        return Some("The password field must contain at least one uppercase and one lowercase letter.");
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return Some("The password field must contain at least one symbol.");
    }
    if !password.chars().any(char::is_numeric) {
        return Some("The password field must contain at least one number.");
    }
    None
}

#[derive(Clone)]
pub struct UserService {
    store: Arc<dyn Store>,
    audit: AuditService,
}

impl UserService {
    pub fn new(store: Arc<dyn Store>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    /// Newest first, 15 per page; unknown `status` values are ignored
    pub async fn list(&self, query: UserQuery) -> Result<Page<UserView>, ServiceError> {
        let page = query.page.unwrap_or(1).max(1);
        let status = match normalize(query.status).as_deref() {
            Some("active") => Some(true),
            Some("inactive") => Some(false),
            _ => None,
        };
        let filter = UserFilter {
            search: normalize(query.search),
            status,
            role: normalize(query.role),
            page,
            per_page: PER_PAGE,
        };
        let (users, total) = self.store.list_users(&filter).await?;
        Ok(Page::new(users, page, PER_PAGE, total).map(UserView::from))
    }

    pub async fn show(&self, id: i64) -> Result<UserView, ServiceError> {
        Ok(self.find(id).await?.into())
    }

    pub async fn create(
        &self,
        ctx: &AuditContext,
        payload: UserPayload,
    ) -> Result<UserView, ServiceError> {
        let input = self.validate(payload, None).await?;
        let user = self.store.create_user(&input).await?;
        info!(id = user.user.id, email = %user.user.email, "User created");
        self.audit.record_created(ctx, &user.user).await?;
        Ok(user.into())
    }

    /// Password changes only when one is given; roles sync only when the key is present
    pub async fn update(
        &self,
        ctx: &AuditContext,
        id: i64,
        payload: UserPayload,
    ) -> Result<UserView, ServiceError> {
        let existing = self.find(id).await?;
        let input = self.validate(payload, Some(id)).await?;
        let updated = self
            .store
            .update_user(id, &input)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.to_string()))?;
        self.audit.record_updated(ctx, &existing.user, &updated.user).await?;
        Ok(updated.into())
    }

    pub async fn delete(&self, ctx: &AuditContext, id: i64) -> Result<(), ServiceError> {
        let existing = self.find(id).await?;
        if ctx.user_id == Some(id) {
            return Err(ServiceError::Rejected(
                "You cannot delete your own account".to_string(),
            ));
        }
        if !self.store.delete_user(id).await? {
            return Err(ServiceError::NotFound(NOT_FOUND.to_string()));
        }
        info!(id, "User deleted");
        self.audit.record_deleted(ctx, &existing.user).await?;
        Ok(())
    }

    pub async fn toggle_status(
        &self,
        ctx: &AuditContext,
        id: i64,
    ) -> Result<UserStatus, ServiceError> {
        let existing = self.find(id).await?;
        if ctx.user_id == Some(id) {
            return Err(ServiceError::Rejected(
                "You cannot change your own status".to_string(),
            ));
        }
        let updated = self
            .store
            .set_user_status(id, !existing.user.status)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.to_string()))?;
        self.audit.record_updated(ctx, &existing.user, &updated.user).await?;
        Ok(UserStatus {
            status: updated.user.status,
            status_text: status_text(updated.user.status),
        })
    }

    /// Applies one action to every listed user and returns the summary message
    pub async fn bulk_action(
        &self,
        ctx: &AuditContext,
        payload: UserBulkActionPayload,
    ) -> Result<String, ServiceError> {
        let mut errors = FieldErrors::new();
        let action = match normalize(payload.action) {
            None => {
                errors.add("action", "Action is required.");
                None
            }
            Some(raw) => {
                let action = UserBulkAction::parse(&raw);
                if action.is_none() {
                    errors.add("action", "Invalid action selected.");
                }
                action
            }
        };

        let mut user_ids = payload.user_ids.unwrap_or_default();
        if user_ids.is_empty() {
            errors.add("user_ids", "Please select at least one user.");
        }
        let existing = self.store.existing_user_ids(&user_ids).await?;
        for (index, id) in user_ids.iter().enumerate() {
            if !existing.contains(id) {
                errors.add(format!("user_ids.{}", index), "Selected user does not exist.");
            }
        }

        match payload.role_id {
            None if action == Some(UserBulkAction::AssignRole) => {
                errors.add("role_id", "Role is required when assigning roles.");
            }
            Some(role_id) => {
                if !self.store.existing_role_ids(&[role_id]).await?.contains(&role_id) {
                    errors.add("role_id", "Selected role does not exist.");
                }
            }
            None => {}
        }
        errors.into_result()?;
        let Some(action) = action else {
            return Err(ServiceError::field("action", "Action is required."));
        };

        if ctx.user_id.is_some_and(|me| user_ids.contains(&me)) {
            return Err(ServiceError::Rejected(
                "You cannot perform this action on your own account".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        user_ids.retain(|id| seen.insert(*id));

        match action {
            UserBulkAction::Activate | UserBulkAction::Deactivate => {
                let status = action == UserBulkAction::Activate;
                for id in &user_ids {
                    let Some(before) = self.store.find_user(*id).await? else {
                        continue;
                    };
                    if let Some(after) = self.store.set_user_status(*id, status).await? {
                        self.audit.record_updated(ctx, &before.user, &after.user).await?;
                    }
                }
            }
            UserBulkAction::Delete => {
                for id in &user_ids {
                    let Some(before) = self.store.find_user(*id).await? else {
                        continue;
                    };
                    if self.store.delete_user(*id).await? {
                        self.audit.record_deleted(ctx, &before.user).await?;
                    }
                }
            }
            UserBulkAction::AssignRole => {
                let Some(role_id) = payload.role_id else {
                    return Err(ServiceError::field("role_id", "Role is required when assigning roles."));
                };
                for id in &user_ids {
                    self.store.assign_user_role(*id, role_id).await?;
                }
            }
        }
        info!(?action, count = user_ids.len(), "User bulk action applied");
        Ok(format!("{} users {} successfully", user_ids.len(), action.past_tense()))
    }

    pub async fn stats(&self, now: DateTime<Utc>) -> Result<UserStats, ServiceError> {
        Ok(self
            .store
            .user_stats(now - Duration::days(RECENT_DAYS))
            .await?)
    }

    async fn find(&self, id: i64) -> Result<UserWithRoles, ServiceError> {
        self.store
            .find_user(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.to_string()))
    }

    /// A password is required on create and optional on update
    async fn validate(
        &self,
        payload: UserPayload,
        own_id: Option<i64>,
    ) -> Result<UserInput, ServiceError> {
        let payload = UserPayload {
            name: normalize(payload.name),
            email: normalize(payload.email),
            password: payload.password.filter(|p| !p.is_empty()),
            phone: normalize(payload.phone),
            address: normalize(payload.address),
            ..payload
        };
        let mut errors = check(&payload);

        if let Some(email) = &payload.email {
            if let Some(other) = self.store.find_user_by_email(email).await? {
                if Some(other.id) != own_id {
                    errors.add("email", "This email is already taken.");
                }
            }
        }

        match &payload.password {
            None if own_id.is_none() => errors.add("password", "Password is required."),
            None => {}
            Some(password) => {
                if payload.password_confirmation.as_deref() != Some(password.as_str()) {
                    errors.add("password", "Password confirmation does not match.");
                } else if let Some(message) = password_strength_error(password) {
                    errors.add("password", message);
                }
            }
        }

        if let Some(roles) = &payload.roles {
            let existing = self.store.existing_role_ids(roles).await?;
            for (index, id) in roles.iter().enumerate() {
                if !existing.contains(id) {
                    errors.add(format!("roles.{}", index), "Selected role does not exist.");
                }
            }
        }
        errors.into_result()?;

        let password = match &payload.password {
            Some(password) => Some(hash_password(password)?),
            None => None,
        };
        Ok(UserInput {
            name: payload.name.unwrap_or_default(),
            email: payload.email.unwrap_or_default(),
            password,
            phone: payload.phone,
            address: payload.address,
            status: payload.status.unwrap_or(true),
            roles: payload.roles,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::verify_password;
    use crate::database::models::RoleInput;
    use crate::database::MemoryStore;

    const PASSWORD: &str = "Secret#123";

    fn service() -> (UserService, Arc<dyn Store>) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let audit = AuditService::new(store.clone(), true);
        (UserService::new(store.clone(), audit), store)
    }

    fn payload(name: &str) -> UserPayload {
        UserPayload {
            name: Some(name.into()),
            email: Some(format!("{}@example.com", name.to_lowercase())),
            password: Some(PASSWORD.into()),
            password_confirmation: Some(PASSWORD.into()),
            ..Default::default()
        }
    }

    fn admin(id: i64) -> AuditContext {
        AuditContext {
            user_id: Some(id),
            user_name: Some("Admin".into()),
            ..Default::default()
        }
    }

    fn field_error(err: ServiceError, field: &str) -> String {
        match err {
            ServiceError::Validation(errors) => errors.get(field).unwrap_or_default().to_string(),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn password_strength_rules_apply_in_order() {
        assert_eq!(
            password_strength_error("Ab1#"),
            Some("The password field must be at least 8 characters.")
        );
        assert_eq!(
            password_strength_error("secret#123"),
            Some("The password field must contain at least one uppercase and one lowercase letter.")
        );
        assert_eq!(
            password_strength_error("Secret1234"),
            Some("The password field must contain at least one symbol.")
        );
        assert_eq!(
            password_strength_error("Secret#abc"),
            Some("The password field must contain at least one number.")
        );
        assert_eq!(password_strength_error(PASSWORD), None);
    }

    #[tokio::test]
    async fn create_hashes_the_password() {
        let (users, store) = service();
        let view = users.create(&admin(99), payload("Ana")).await.unwrap();
        assert_eq!(view.status_text, "Active");

        let stored = store.find_user(view.id).await.unwrap().unwrap();
        assert_ne!(stored.user.password, PASSWORD);
        assert!(verify_password(PASSWORD, &stored.user.password).unwrap());
    }

    #[tokio::test]
    async fn create_requires_a_confirmed_password() {
        let (users, _) = service();
        let err = users
            .create(&admin(99), UserPayload { password: None, ..payload("Ana") })
            .await
            .unwrap_err();
        assert_eq!(field_error(err, "password"), "Password is required.");

        let err = users
            .create(
                &admin(99),
                UserPayload { password_confirmation: Some("Other#123".into()), ..payload("Ana") },
            )
            .await
            .unwrap_err();
        assert_eq!(field_error(err, "password"), "Password confirmation does not match.");
    }

    #[tokio::test]
    async fn emails_are_unique_ignoring_case_and_self() {
        let (users, _) = service();
        let ana = users.create(&admin(99), payload("Ana")).await.unwrap();

        let err = users
            .create(
                &admin(99),
                UserPayload { email: Some("ANA@example.com".into()), ..payload("Other") },
            )
            .await
            .unwrap_err();
        assert_eq!(field_error(err, "email"), "This email is already taken.");

        let updated = users
            .update(
                &admin(99),
                ana.id,
                UserPayload { name: Some("Ana Maria".into()), password: None, ..payload("Ana") },
            )
            .await
            .unwrap();
        assert_eq!(updated.name, "Ana Maria");
    }

    #[tokio::test]
    async fn update_keeps_password_and_roles_unless_given() {
        let (users, store) = service();
        let role = store
            .create_role(&RoleInput {
                name: "editor".into(),
                display_name: Some("Editor".into()),
                description: None,
                permissions: vec![],
            })
            .await
            .unwrap();
        let ana = users
            .create(&admin(99), UserPayload { roles: Some(vec![role.role.id]), ..payload("Ana") })
            .await
            .unwrap();
        let before = store.find_user(ana.id).await.unwrap().unwrap().user.password;

        let updated = users
            .update(&admin(99), ana.id, UserPayload { password: None, ..payload("Ana") })
            .await
            .unwrap();
        assert_eq!(updated.role_names, vec!["editor"]);
        let after = store.find_user(ana.id).await.unwrap().unwrap().user.password;
        assert_eq!(before, after);

        let cleared = users
            .update(
                &admin(99),
                ana.id,
                UserPayload { password: None, roles: Some(vec![]), ..payload("Ana") },
            )
            .await
            .unwrap();
        assert!(cleared.roles.is_empty());
    }

    #[tokio::test]
    async fn own_account_is_protected() {
        let (users, _) = service();
        let me = users.create(&admin(99), payload("Me")).await.unwrap();
        let ctx = admin(me.id);

        assert!(matches!(users.delete(&ctx, me.id).await, Err(ServiceError::Rejected(_))));
        assert!(matches!(users.toggle_status(&ctx, me.id).await, Err(ServiceError::Rejected(_))));
        let err = users
            .bulk_action(
                &ctx,
                UserBulkActionPayload {
                    action: Some("deactivate".into()),
                    user_ids: Some(vec![me.id]),
                    role_id: None,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "You cannot perform this action on your own account"
        );
    }

    #[tokio::test]
    async fn bulk_action_validates_before_writing() {
        let (users, _) = service();
        let ana = users.create(&admin(99), payload("Ana")).await.unwrap();

        let err = users
            .bulk_action(
                &admin(99),
                UserBulkActionPayload {
                    action: Some("assign_role".into()),
                    user_ids: Some(vec![ana.id, 404]),
                    role_id: None,
                },
            )
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => {
                assert_eq!(errors.get("user_ids.1"), Some("Selected user does not exist."));
                assert_eq!(errors.get("role_id"), Some("Role is required when assigning roles."));
                assert!(!errors.contains("user_ids.0"));
            }
            other => panic!("unexpected error: {other:?}"),
        }

        let message = users
            .bulk_action(
                &admin(99),
                UserBulkActionPayload {
                    action: Some("deactivate".into()),
                    user_ids: Some(vec![ana.id, ana.id]),
                    role_id: None,
                },
            )
            .await
            .unwrap();
        assert_eq!(message, "1 users deactivated successfully");
        assert!(!users.show(ana.id).await.unwrap().status);
    }
}
