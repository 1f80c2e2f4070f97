use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use sqlx::{FromRow, PgConnection, Postgres, QueryBuilder};

use super::{like_pattern, PgStore};
use crate::database::manager::DatabaseError;
use crate::database::models::{
    RoleSummary, User, UserFilter, UserInput, UserStats, UserWithRoles,
};
use crate::database::repository::UserRepository;

const USER_COLUMNS: &str =
    "id, name, email, password, phone, address, status, last_login_at, created_at, updated_at";

#[derive(FromRow)]
struct UserRoleRow {
    user_id: i64,
    #[sqlx(flatten)]
    role: RoleSummary,
}

fn push_user_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &UserFilter) {
    builder.push(" WHERE TRUE");
    if let Some(search) = &filter.search {
        let pattern = like_pattern(search);
        builder
            .push(" AND (u.name ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR u.phone ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
    if let Some(status) = filter.status {
        builder.push(" AND u.status = ").push_bind(status);
    }
    if let Some(role) = &filter.role {
        builder
            .push(
                " AND EXISTS (SELECT 1 FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
                 WHERE ur.user_id = u.id AND r.name = ",
            )
            .push_bind(role.clone())
            .push(")");
    }
}

impl PgStore {
    /// Roles per user, ordered by role id
    async fn roles_for_users(
        &self,
        user_ids: &[i64],
    ) -> Result<HashMap<i64, Vec<RoleSummary>>, DatabaseError> {
        let mut by_user: HashMap<i64, Vec<RoleSummary>> = HashMap::new();
        if user_ids.is_empty() {
            return Ok(by_user);
        }
        let rows = sqlx::query_as::<_, UserRoleRow>(
            "SELECT ur.user_id, r.id, r.name, r.display_name \
             FROM user_roles ur JOIN roles r ON r.id = ur.role_id \
             WHERE ur.user_id = ANY($1) ORDER BY r.id",
        )
        .bind(user_ids)
        .fetch_all(self.pool())
        .await?;
        for row in rows {
            by_user.entry(row.user_id).or_default().push(row.role);
        }
        Ok(by_user)
    }

    async fn with_roles(&self, users: Vec<User>) -> Result<Vec<UserWithRoles>, DatabaseError> {
        let ids: Vec<i64> = users.iter().map(|u| u.id).collect();
        let mut roles = self.roles_for_users(&ids).await?;
        Ok(users
            .into_iter()
            .map(|user| {
                let roles = roles.remove(&user.id).unwrap_or_default();
                UserWithRoles { user, roles }
            })
            .collect())
    }

    async fn load_user(&self, user: Option<User>) -> Result<Option<UserWithRoles>, DatabaseError> {
        match user {
            Some(user) => Ok(self.with_roles(vec![user]).await?.pop()),
            None => Ok(None),
        }
    }
}

async fn sync_roles(
    conn: &mut PgConnection,
    user_id: i64,
    role_ids: &[i64],
) -> Result<(), DatabaseError> {
    sqlx::query("DELETE FROM user_roles WHERE user_id = $1")
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    if !role_ids.is_empty() {
        sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) SELECT $1, id FROM roles WHERE id = ANY($2)",
        )
        .bind(user_id)
        .bind(role_ids)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

#[async_trait]
impl UserRepository for PgStore {
    async fn list_users(
        &self,
        filter: &UserFilter,
    ) -> Result<(Vec<UserWithRoles>, i64), DatabaseError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users u");
        push_user_filter(&mut count, filter);
        let (total,) = count
            .build_query_as::<(i64,)>()
            .fetch_one(self.pool())
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(
            "SELECT u.id, u.name, u.email, u.password, u.phone, u.address, u.status, \
             u.last_login_at, u.created_at, u.updated_at FROM users u",
        );
        push_user_filter(&mut select, filter);
        select
            .push(" ORDER BY u.created_at DESC, u.id DESC LIMIT ")
            .push_bind(i64::from(filter.per_page))
            .push(" OFFSET ")
            .push_bind(filter.offset() as i64);
        let users = select
            .build_query_as::<User>()
            .fetch_all(self.pool())
            .await?;

        Ok((self.with_roles(users).await?, total))
    }

    async fn find_user(&self, id: i64) -> Result<Option<UserWithRoles>, DatabaseError> {
        let query = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        self.load_user(user).await
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let query = format!("SELECT {} FROM users WHERE LOWER(email) = LOWER($1)", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&query)
            .bind(email)
            .fetch_optional(self.pool())
            .await?;
        Ok(user)
    }

    async fn existing_user_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query_as::<_, (i64,)>("SELECT id FROM users WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn existing_role_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows = sqlx::query_as::<_, (i64,)>("SELECT id FROM roles WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn create_user(&self, input: &UserInput) -> Result<UserWithRoles, DatabaseError> {
        let mut tx = self.pool().begin().await?;
        let query = format!(
            "INSERT INTO users (name, email, password, phone, address, status) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(&input.name)
            .bind(&input.email)
            .bind(input.password.as_deref().unwrap_or_default())
            .bind(&input.phone)
            .bind(&input.address)
            .bind(input.status)
            .fetch_one(&mut *tx)
            .await?;
        if let Some(roles) = &input.roles {
            sync_roles(&mut tx, user.id, roles).await?;
        }
        tx.commit().await?;

        self.load_user(Some(user))
            .await?
            .ok_or_else(|| DatabaseError::NotFound("User not found.".to_string()))
    }

    async fn update_user(
        &self,
        id: i64,
        input: &UserInput,
    ) -> Result<Option<UserWithRoles>, DatabaseError> {
        let mut tx = self.pool().begin().await?;
        let query = format!(
            "UPDATE users SET name = $2, email = $3, password = COALESCE($4, password), \
                 phone = $5, address = $6, status = $7, updated_at = NOW() \
             WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(&input.name)
            .bind(&input.email)
            .bind(&input.password)
            .bind(&input.phone)
            .bind(&input.address)
            .bind(input.status)
            .fetch_optional(&mut *tx)
            .await?;
        let Some(user) = user else {
            tx.rollback().await?;
            return Ok(None);
        };
        if let Some(roles) = &input.roles {
            sync_roles(&mut tx, user.id, roles).await?;
        }
        tx.commit().await?;

        self.load_user(Some(user)).await
    }

    async fn set_user_status(
        &self,
        id: i64,
        status: bool,
    ) -> Result<Option<UserWithRoles>, DatabaseError> {
        let query = format!(
            "UPDATE users SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&query)
            .bind(id)
            .bind(status)
            .fetch_optional(self.pool())
            .await?;
        self.load_user(user).await
    }

    async fn assign_user_role(&self, id: i64, role_id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query(
            "INSERT INTO user_roles (user_id, role_id) \
             SELECT u.id, r.id FROM users u, roles r WHERE u.id = $1 AND r.id = $2 \
             ON CONFLICT DO NOTHING",
        )
        .bind(id)
        .bind(role_id)
        .execute(self.pool())
        .await?;
        if result.rows_affected() > 0 {
            return Ok(true);
        }
        // Already assigned also counts
        let (exists,) = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM user_roles WHERE user_id = $1 AND role_id = $2)",
        )
        .bind(id)
        .bind(role_id)
        .fetch_one(self.pool())
        .await?;
        Ok(exists)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, DatabaseError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn user_stats(&self, registered_since: DateTime<Utc>) -> Result<UserStats, DatabaseError> {
        let (total_users, active_users, recent_registrations, users_with_roles) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(
                "SELECT COUNT(*), \
                        COUNT(*) FILTER (WHERE status), \
                        COUNT(*) FILTER (WHERE created_at >= $1), \
                        COUNT(*) FILTER (WHERE EXISTS \
                            (SELECT 1 FROM user_roles ur WHERE ur.user_id = users.id)) \
                 FROM users",
            )
            .bind(registered_since)
            .fetch_one(self.pool())
            .await?;
        Ok(UserStats {
            total_users,
            active_users,
            inactive_users: total_users - active_users,
            recent_registrations,
            users_with_roles,
            users_without_roles: total_users - users_with_roles,
        })
    }
}
