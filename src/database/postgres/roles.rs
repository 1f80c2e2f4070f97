use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use sqlx::{FromRow, PgConnection};

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{Permission, PermissionInput, Role, RoleInput, RoleWithPermissions};
use crate::database::repository::RoleRepository;

const PERMISSION_COLUMNS: &str =
    r#"id, name, display_name, description, "group", created_at, updated_at"#;
const ROLE_COLUMNS: &str = "id, name, display_name, description, created_at, updated_at";
const PERMISSION_ORDER: &str = r#"ORDER BY p."group" NULLS FIRST, p.name"#;

#[derive(FromRow)]
struct RolePermissionRow {
    role_id: i64,
    #[sqlx(flatten)]
    permission: Permission,
}

impl PgStore {
    async fn permissions_for_role(&self, role_id: i64) -> Result<Vec<Permission>, DatabaseError> {
        let query = format!(
            r#"SELECT p.id, p.name, p.display_name, p.description, p."group", p.created_at, p.updated_at
               FROM permissions p
               JOIN role_has_permissions rp ON rp.permission_id = p.id
               WHERE rp.role_id = $1 {}"#,
            PERMISSION_ORDER
        );
        let permissions = sqlx::query_as::<_, Permission>(&query)
            .bind(role_id)
            .fetch_all(self.pool())
            .await?;
        Ok(permissions)
    }

    async fn load_role(&self, role: Option<Role>) -> Result<Option<RoleWithPermissions>, DatabaseError> {
        match role {
            Some(role) => {
                let permissions = self.permissions_for_role(role.id).await?;
                Ok(Some(RoleWithPermissions { role, permissions }))
            }
            None => Ok(None),
        }
    }
}

async fn sync_permissions(
    conn: &mut PgConnection,
    role_id: i64,
    permission_ids: &[i64],
) -> Result<(), DatabaseError> {
    sqlx::query("DELETE FROM role_has_permissions WHERE role_id = $1")
        .bind(role_id)
        .execute(&mut *conn)
        .await?;
    if !permission_ids.is_empty() {
        sqlx::query(
            "INSERT INTO role_has_permissions (role_id, permission_id) \
             SELECT $1, id FROM permissions WHERE id = ANY($2)",
        )
        .bind(role_id)
        .bind(permission_ids)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl RoleRepository for PgStore {
    async fn list_permissions(&self) -> Result<Vec<Permission>, DatabaseError> {
        let query = format!(
            r#"SELECT {} FROM permissions ORDER BY "group" NULLS FIRST, name"#,
            PERMISSION_COLUMNS
        );
        let permissions = sqlx::query_as::<_, Permission>(&query)
            .fetch_all(self.pool())
            .await?;
        Ok(permissions)
    }

    async fn find_permission(&self, id: i64) -> Result<Option<Permission>, DatabaseError> {
        let query = format!("SELECT {} FROM permissions WHERE id = $1", PERMISSION_COLUMNS);
        let permission = sqlx::query_as::<_, Permission>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(permission)
    }

    async fn find_permission_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Permission>, DatabaseError> {
        let query = format!("SELECT {} FROM permissions WHERE name = $1", PERMISSION_COLUMNS);
        let permission = sqlx::query_as::<_, Permission>(&query)
            .bind(name)
            .fetch_optional(self.pool())
            .await?;
        Ok(permission)
    }

    async fn existing_permission_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query_as::<_, (i64,)>("SELECT id FROM permissions WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn create_permission(&self, input: &PermissionInput) -> Result<Permission, DatabaseError> {
        let query = format!(
            r#"INSERT INTO permissions (name, display_name, description, "group")
               VALUES ($1, $2, $3, $4) RETURNING {}"#,
            PERMISSION_COLUMNS
        );
        let permission = sqlx::query_as::<_, Permission>(&query)
            .bind(&input.name)
            .bind(&input.display_name)
            .bind(&input.description)
            .bind(&input.group)
            .fetch_one(self.pool())
            .await?;
        Ok(permission)
    }

    async fn update_permission(
        &self,
        id: i64,
        input: &PermissionInput,
    ) -> Result<Option<Permission>, DatabaseError> {
        let query = format!(
            r#"UPDATE permissions SET name = $2, display_name = $3, description = $4, "group" = $5,
                   updated_at = NOW()
               WHERE id = $1 RETURNING {}"#,
            PERMISSION_COLUMNS
        );
        let permission = sqlx::query_as::<_, Permission>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.display_name)
            .bind(&input.description)
            .bind(&input.group)
            .fetch_optional(self.pool())
            .await?;
        Ok(permission)
    }

    async fn delete_permission(&self, id: i64) -> Result<bool, DatabaseError> {
        // Pivot rows go through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM permissions WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_roles(&self) -> Result<Vec<RoleWithPermissions>, DatabaseError> {
        let query = format!("SELECT {} FROM roles ORDER BY id", ROLE_COLUMNS);
        let roles = sqlx::query_as::<_, Role>(&query)
            .fetch_all(self.pool())
            .await?;

        let pivot_query = format!(
            r#"SELECT rp.role_id, p.id, p.name, p.display_name, p.description, p."group",
                      p.created_at, p.updated_at
               FROM role_has_permissions rp
               JOIN permissions p ON p.id = rp.permission_id {}"#,
            PERMISSION_ORDER
        );
        let pivot = sqlx::query_as::<_, RolePermissionRow>(&pivot_query)
            .fetch_all(self.pool())
            .await?;

        let mut by_role: HashMap<i64, Vec<Permission>> = HashMap::new();
        for row in pivot {
            by_role.entry(row.role_id).or_default().push(row.permission);
        }

        Ok(roles
            .into_iter()
            .map(|role| {
                let permissions = by_role.remove(&role.id).unwrap_or_default();
                RoleWithPermissions { role, permissions }
            })
            .collect())
    }

    async fn find_role(&self, id: i64) -> Result<Option<RoleWithPermissions>, DatabaseError> {
        let query = format!("SELECT {} FROM roles WHERE id = $1", ROLE_COLUMNS);
        let role = sqlx::query_as::<_, Role>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        self.load_role(role).await
    }

    async fn find_role_by_name(
        &self,
        name: &str,
    ) -> Result<Option<RoleWithPermissions>, DatabaseError> {
        let query = format!("SELECT {} FROM roles WHERE name = $1", ROLE_COLUMNS);
        let role = sqlx::query_as::<_, Role>(&query)
            .bind(name)
            .fetch_optional(self.pool())
            .await?;
        self.load_role(role).await
    }

    async fn create_role(&self, input: &RoleInput) -> Result<RoleWithPermissions, DatabaseError> {
        let mut tx = self.pool().begin().await?;
        let query = format!(
            "INSERT INTO roles (name, display_name, description) VALUES ($1, $2, $3) RETURNING {}",
            ROLE_COLUMNS
        );
        let role = sqlx::query_as::<_, Role>(&query)
            .bind(&input.name)
            .bind(&input.display_name)
            .bind(&input.description)
            .fetch_one(&mut *tx)
            .await?;
        sync_permissions(&mut tx, role.id, &input.permissions).await?;
        tx.commit().await?;

        let permissions = self.permissions_for_role(role.id).await?;
        Ok(RoleWithPermissions { role, permissions })
    }

    async fn update_role(
        &self,
        id: i64,
        input: &RoleInput,
    ) -> Result<Option<RoleWithPermissions>, DatabaseError> {
        let mut tx = self.pool().begin().await?;
        let query = format!(
            "UPDATE roles SET name = $2, display_name = $3, description = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            ROLE_COLUMNS
        );
        let role = sqlx::query_as::<_, Role>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.display_name)
            .bind(&input.description)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(role) = role else {
            tx.rollback().await?;
            return Ok(None);
        };
        sync_permissions(&mut tx, role.id, &input.permissions).await?;
        tx.commit().await?;

        self.load_role(Some(role)).await
    }

    async fn delete_role(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
