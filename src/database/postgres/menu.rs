use async_trait::async_trait;
use std::collections::HashSet;
use tracing::debug;

use super::PgStore;
use crate::database::manager::DatabaseError;
use crate::database::models::{MenuItem, MenuItemInput};
use crate::database::repository::MenuRepository;

const MENU_COLUMNS: &str = "id, title, href, icon, position, parent_id, badge, disabled, \
     is_separator, is_active, created_at, updated_at";

#[async_trait]
impl MenuRepository for PgStore {
    async fn list_menu_items(&self) -> Result<Vec<MenuItem>, DatabaseError> {
        let query = format!("SELECT {} FROM menu_items", MENU_COLUMNS);
        let items = sqlx::query_as::<_, MenuItem>(&query)
            .fetch_all(self.pool())
            .await?;
        Ok(items)
    }

    async fn find_menu_item(&self, id: i64) -> Result<Option<MenuItem>, DatabaseError> {
        let query = format!("SELECT {} FROM menu_items WHERE id = $1", MENU_COLUMNS);
        let item = sqlx::query_as::<_, MenuItem>(&query)
            .bind(id)
            .fetch_optional(self.pool())
            .await?;
        Ok(item)
    }

    async fn existing_menu_item_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError> {
        if ids.is_empty() {
            return Ok(HashSet::new());
        }
        let rows: Vec<(i64,)> = sqlx::query_as("SELECT id FROM menu_items WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(self.pool())
            .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    async fn create_menu_item(&self, input: &MenuItemInput) -> Result<MenuItem, DatabaseError> {
        let query = format!(
            "INSERT INTO menu_items (title, href, icon, position, parent_id, badge, disabled, \
             is_separator, is_active) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) RETURNING {}",
            MENU_COLUMNS
        );
        let item = sqlx::query_as::<_, MenuItem>(&query)
            .bind(&input.title)
            .bind(&input.href)
            .bind(&input.icon)
            .bind(input.position)
            .bind(input.parent_id)
            .bind(&input.badge)
            .bind(input.disabled)
            .bind(input.is_separator)
            .bind(input.is_active)
            .fetch_one(self.pool())
            .await?;
        Ok(item)
    }

    async fn update_menu_item(
        &self,
        id: i64,
        input: &MenuItemInput,
    ) -> Result<Option<MenuItem>, DatabaseError> {
        let query = format!(
            "UPDATE menu_items SET title = $2, href = $3, icon = $4, position = $5, \
             parent_id = $6, badge = $7, disabled = $8, is_separator = $9, is_active = $10, \
             updated_at = NOW() WHERE id = $1 RETURNING {}",
            MENU_COLUMNS
        );
        let item = sqlx::query_as::<_, MenuItem>(&query)
            .bind(id)
            .bind(&input.title)
            .bind(&input.href)
            .bind(&input.icon)
            .bind(input.position)
            .bind(input.parent_id)
            .bind(&input.badge)
            .bind(input.disabled)
            .bind(input.is_separator)
            .bind(input.is_active)
            .fetch_optional(self.pool())
            .await?;
        Ok(item)
    }

    async fn delete_menu_item(&self, id: i64) -> Result<bool, DatabaseError> {
        // Children go through ON DELETE CASCADE
        let result = sqlx::query("DELETE FROM menu_items WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn set_menu_item_position(&self, id: i64, position: i32) -> Result<(), DatabaseError> {
        let result =
            sqlx::query("UPDATE menu_items SET position = $2, updated_at = NOW() WHERE id = $1")
                .bind(id)
                .bind(position)
                .execute(self.pool())
                .await?;
        debug!(id, position, rows = result.rows_affected(), "menu position written");
        Ok(())
    }
}
