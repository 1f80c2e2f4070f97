use serde::Deserialize;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::{AuditContext, AuditService, ServiceError};
use crate::database::models::{Permission, PermissionInput, RoleInput, RoleWithPermissions};
use crate::database::Store;
use crate::validation::{check, deserialize_id_list, normalize, FieldErrors};

const ROLE_NOT_FOUND: &str = "Role not found.";
const PERMISSION_NOT_FOUND: &str = "Permission not found.";

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RolePayload {
    #[validate(
        required(message = "Role name is required."),
        length(max = 255, message = "Role name cannot exceed 255 characters.")
    )]
    pub name: Option<String>,
    #[validate(length(max = 255, message = "Display name cannot exceed 255 characters."))]
    pub display_name: Option<String>,
    #[validate(length(max = 500, message = "Description cannot exceed 500 characters."))]
    pub description: Option<String>,
    #[serde(default, deserialize_with = "deserialize_id_list")]
    pub permissions: Option<Vec<i64>>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct PermissionPayload {
    #[validate(
        required(message = "Permission name is required."),
        length(max = 255, message = "Permission name cannot exceed 255 characters.")
    )]
    pub name: Option<String>,
    #[validate(length(max = 255, message = "Display name cannot exceed 255 characters."))]
    pub display_name: Option<String>,
    #[validate(length(max = 500, message = "Description cannot exceed 500 characters."))]
    pub description: Option<String>,
    #[validate(length(max = 100, message = "Group cannot exceed 100 characters."))]
    pub group: Option<String>,
}

#[derive(Clone)]
pub struct RoleService {
    store: Arc<dyn Store>,
    audit: AuditService,
}

impl RoleService {
    pub fn new(store: Arc<dyn Store>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    pub async fn list_roles(&self) -> Result<Vec<RoleWithPermissions>, ServiceError> {
        Ok(self.store.list_roles().await?)
    }

    pub async fn show_role(&self, id: i64) -> Result<RoleWithPermissions, ServiceError> {
        self.find_role(id).await
    }

    pub async fn create_role(
        &self,
        ctx: &AuditContext,
        payload: RolePayload,
    ) -> Result<RoleWithPermissions, ServiceError> {
        let input = self.validate_role(payload, None).await?;
        let role = self.store.create_role(&input).await?;
        info!(id = role.role.id, name = %role.role.name, "Role created");
        self.audit.record_created(ctx, &role).await?;
        Ok(role)
    }

    /// Replaces attributes and syncs permissions; absent permissions clear the set
    pub async fn update_role(
        &self,
        ctx: &AuditContext,
        id: i64,
        payload: RolePayload,
    ) -> Result<RoleWithPermissions, ServiceError> {
        let existing = self.find_role(id).await?;
        let input = self.validate_role(payload, Some(id)).await?;
        let updated = self
            .store
            .update_role(id, &input)
            .await?
            .ok_or_else(|| ServiceError::NotFound(ROLE_NOT_FOUND.to_string()))?;
        self.audit.record_updated(ctx, &existing, &updated).await?;
        Ok(updated)
    }

    pub async fn delete_role(&self, ctx: &AuditContext, id: i64) -> Result<(), ServiceError> {
        let existing = self.find_role(id).await?;
        if !self.store.delete_role(id).await? {
            return Err(ServiceError::NotFound(ROLE_NOT_FOUND.to_string()));
        }
        info!(id, "Role deleted");
        self.audit.record_deleted(ctx, &existing).await?;
        Ok(())
    }

    pub async fn list_permissions(&self) -> Result<Vec<Permission>, ServiceError> {
        Ok(self.store.list_permissions().await?)
    }

    pub async fn show_permission(&self, id: i64) -> Result<Permission, ServiceError> {
        self.find_permission(id).await
    }

    pub async fn create_permission(
        &self,
        ctx: &AuditContext,
        payload: PermissionPayload,
    ) -> Result<Permission, ServiceError> {
        let input = self.validate_permission(payload, None).await?;
        let permission = self.store.create_permission(&input).await?;
        self.audit.record_created(ctx, &permission).await?;
        Ok(permission)
    }

    pub async fn update_permission(
        &self,
        ctx: &AuditContext,
        id: i64,
        payload: PermissionPayload,
    ) -> Result<Permission, ServiceError> {
        let existing = self.find_permission(id).await?;
        let input = self.validate_permission(payload, Some(id)).await?;
        let updated = self
            .store
            .update_permission(id, &input)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PERMISSION_NOT_FOUND.to_string()))?;
        self.audit.record_updated(ctx, &existing, &updated).await?;
        Ok(updated)
    }

    /// Deleting a permission detaches it from every role
    pub async fn delete_permission(&self, ctx: &AuditContext, id: i64) -> Result<(), ServiceError> {
        let existing = self.find_permission(id).await?;
        if !self.store.delete_permission(id).await? {
            return Err(ServiceError::NotFound(PERMISSION_NOT_FOUND.to_string()));
        }
        self.audit.record_deleted(ctx, &existing).await?;
        Ok(())
    }

    async fn find_role(&self, id: i64) -> Result<RoleWithPermissions, ServiceError> {
        self.store
            .find_role(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(ROLE_NOT_FOUND.to_string()))
    }

    async fn find_permission(&self, id: i64) -> Result<Permission, ServiceError> {
        self.store
            .find_permission(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(PERMISSION_NOT_FOUND.to_string()))
    }

    async fn validate_role(
        &self,
        payload: RolePayload,
        own_id: Option<i64>,
    ) -> Result<RoleInput, ServiceError> {
        let payload = RolePayload {
            name: normalize(payload.name),
            display_name: normalize(payload.display_name),
            description: normalize(payload.description),
            ..payload
        };
        let mut errors = check(&payload);

        if let Some(name) = &payload.name {
            if let Some(other) = self.store.find_role_by_name(name).await? {
                if Some(other.role.id) != own_id {
                    errors.add("name", "Role name already exists.");
                }
            }
        }

        let permissions = payload.permissions.unwrap_or_default();
        let existing = self.store.existing_permission_ids(&permissions).await?;
        for (index, id) in permissions.iter().enumerate() {
            if !existing.contains(id) {
                errors.add(
                    format!("permissions.{}", index),
                    "Selected permission does not exist.",
                );
            }
        }
        errors.into_result()?;

        Ok(RoleInput {
            name: payload.name.unwrap_or_default(),
            display_name: payload.display_name,
            description: payload.description,
            permissions,
        })
    }

    async fn validate_permission(
        &self,
        payload: PermissionPayload,
        own_id: Option<i64>,
    ) -> Result<PermissionInput, ServiceError> {
        let payload = PermissionPayload {
            name: normalize(payload.name),
            display_name: normalize(payload.display_name),
            description: normalize(payload.description),
            group: normalize(payload.group),
        };
        let mut errors: FieldErrors = check(&payload);

        if let Some(name) = &payload.name {
            if let Some(other) = self.store.find_permission_by_name(name).await? {
                if Some(other.id) != own_id {
                    errors.add("name", "Permission name already exists.");
                }
            }
        }
        errors.into_result()?;

        Ok(PermissionInput {
            name: payload.name.unwrap_or_default(),
            display_name: payload.display_name,
            description: payload.description,
            group: payload.group,
        })
    }
}
