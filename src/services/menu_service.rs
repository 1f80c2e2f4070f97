use serde::Deserialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::info;
use validator::Validate;

use super::menu_tree::{active_flat, build_tree, subtree};
use super::{AuditContext, AuditService, ServiceError};
use crate::database::models::{MenuItem, MenuItemInput, MenuNode};
use crate::database::Store;
use crate::validation::{check, deserialize_optional_id, normalize, FieldErrors};

const NOT_FOUND: &str = "Menu item not found.";

/// Body of create and update requests
#[derive(Debug, Default, Deserialize, Validate)]
pub struct MenuItemPayload {
    #[validate(
        required(message = "Menu title is required."),
        length(max = 255, message = "Menu title cannot exceed 255 characters.")
    )]
    pub title: Option<String>,
    #[validate(length(max = 255, message = "URL cannot exceed 255 characters."))]
    pub href: Option<String>,
    #[validate(length(max = 255, message = "Icon name cannot exceed 255 characters."))]
    pub icon: Option<String>,
    #[validate(
        required(message = "Position is required."),
        range(min = 0, message = "Position must be at least 0.")
    )]
    pub position: Option<i32>,
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub parent_id: Option<i64>,
    #[validate(length(max = 50, message = "Badge text cannot exceed 50 characters."))]
    pub badge: Option<String>,
    pub disabled: Option<bool>,
    pub is_separator: Option<bool>,
    pub is_active: Option<bool>,
}

impl MenuItemPayload {
    fn normalized(self) -> Self {
        Self {
            title: normalize(self.title),
            href: normalize(self.href),
            icon: normalize(self.icon),
            badge: normalize(self.badge),
            ..self
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct ReorderEntry {
    #[serde(default, deserialize_with = "deserialize_optional_id")]
    pub id: Option<i64>,
    pub position: Option<i64>,
}

/// Body of the reorder request
#[derive(Debug, Default, Deserialize)]
pub struct ReorderPayload {
    pub items: Option<Vec<ReorderEntry>>,
}

#[derive(Clone)]
pub struct MenuService {
    store: Arc<dyn Store>,
    audit: AuditService,
}

impl MenuService {
    pub fn new(store: Arc<dyn Store>, audit: AuditService) -> Self {
        Self { store, audit }
    }

    /// Active navigation tree
    pub async fn tree(&self) -> Result<Vec<MenuNode>, ServiceError> {
        let items = self.store.list_menu_items().await?;
        Ok(build_tree(&items))
    }

    /// Active items in display order, unnested
    pub async fn all_active(&self) -> Result<Vec<MenuItem>, ServiceError> {
        let items = self.store.list_menu_items().await?;
        Ok(active_flat(items))
    }

    pub async fn show(&self, id: i64) -> Result<MenuNode, ServiceError> {
        let item = self.find(id).await?;
        self.management_node(&item).await
    }

    pub async fn create(
        &self,
        ctx: &AuditContext,
        payload: MenuItemPayload,
    ) -> Result<MenuNode, ServiceError> {
        let payload = payload.normalized();
        let mut errors = check(&payload);
        self.check_parent(None, payload.parent_id, &mut errors).await?;
        errors.into_result()?;

        let input = MenuItemInput {
            title: payload.title.unwrap_or_default(),
            href: payload.href,
            icon: payload.icon,
            position: payload.position.unwrap_or_default(),
            parent_id: payload.parent_id,
            badge: payload.badge,
            disabled: payload.disabled.unwrap_or(false),
            is_separator: payload.is_separator.unwrap_or(false),
            is_active: true,
        };
        let item = self.store.create_menu_item(&input).await?;
        info!(id = item.id, title = %item.title, "Menu item created");
        self.audit.record_created(ctx, &item).await?;

        self.management_node(&item).await
    }

    pub async fn update(
        &self,
        ctx: &AuditContext,
        id: i64,
        payload: MenuItemPayload,
    ) -> Result<MenuNode, ServiceError> {
        let existing = self.find(id).await?;

        let payload = payload.normalized();
        let mut errors = check(&payload);
        self.check_parent(Some(id), payload.parent_id, &mut errors).await?;
        errors.into_result()?;

        let input = MenuItemInput {
            title: payload.title.unwrap_or_default(),
            href: payload.href,
            icon: payload.icon,
            position: payload.position.unwrap_or_default(),
            parent_id: payload.parent_id,
            badge: payload.badge,
            disabled: payload.disabled.unwrap_or(existing.disabled),
            is_separator: payload.is_separator.unwrap_or(existing.is_separator),
            is_active: payload.is_active.unwrap_or(existing.is_active),
        };
        let updated = self
            .store
            .update_menu_item(id, &input)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.to_string()))?;
        self.audit.record_updated(ctx, &existing, &updated).await?;

        self.management_node(&updated).await
    }

    /// Deletes the item; descendants go with it
    pub async fn delete(&self, ctx: &AuditContext, id: i64) -> Result<(), ServiceError> {
        let existing = self.find(id).await?;
        if !self.store.delete_menu_item(id).await? {
            return Err(ServiceError::NotFound(NOT_FOUND.to_string()));
        }
        info!(id, "Menu item deleted");
        self.audit.record_deleted(ctx, &existing).await?;
        Ok(())
    }

    /// Validates the whole batch, then writes each position on its own.
    /// Writes are not wrapped in a transaction.
    pub async fn reorder(&self, payload: ReorderPayload) -> Result<usize, ServiceError> {
        let entries = validate_reorder(payload, self).await?;

        info!(count = entries.len(), "Reorder request received");
        for (id, position) in &entries {
            info!("Updating menu item {} to position {}", id, position);
            self.store.set_menu_item_position(*id, *position).await?;
        }
        Ok(entries.len())
    }

    async fn find(&self, id: i64) -> Result<MenuItem, ServiceError> {
        self.store
            .find_menu_item(id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(NOT_FOUND.to_string()))
    }

    async fn management_node(&self, item: &MenuItem) -> Result<MenuNode, ServiceError> {
        let items = self.store.list_menu_items().await?;
        Ok(subtree(item, &items))
    }

    async fn check_parent(
        &self,
        own_id: Option<i64>,
        parent_id: Option<i64>,
        errors: &mut FieldErrors,
    ) -> Result<(), ServiceError> {
        let Some(parent_id) = parent_id else {
            return Ok(());
        };
        if own_id == Some(parent_id) {
            errors.add("parent_id", "A menu item cannot be its own parent.");
            return Ok(());
        }
        let Some(parent) = self.store.find_menu_item(parent_id).await? else {
            errors.add("parent_id", "Selected parent menu does not exist.");
            return Ok(());
        };
        let Some(own_id) = own_id else {
            return Ok(());
        };

        // Walk up from the new parent; reaching the item means a cycle
        let mut seen = HashSet::from([parent.id]);
        let mut cursor = parent.parent_id;
        while let Some(ancestor_id) = cursor {
            if ancestor_id == own_id {
                errors.add("parent_id", "A menu item cannot be moved under its own descendant.");
                return Ok(());
            }
            if !seen.insert(ancestor_id) {
                break;
            }
            cursor = match self.store.find_menu_item(ancestor_id).await? {
                Some(ancestor) => ancestor.parent_id,
                None => None,
            };
        }
        Ok(())
    }
}

async fn validate_reorder(
    payload: ReorderPayload,
    service: &MenuService,
) -> Result<Vec<(i64, i32)>, ServiceError> {
    let mut errors = FieldErrors::new();
    let Some(items) = payload.items else {
        errors.add("items", "Items array is required.");
        return Err(errors.into());
    };
    if items.is_empty() {
        errors.add("items", "At least one item is required.");
        return Err(errors.into());
    }

    let ids: Vec<i64> = items.iter().filter_map(|e| e.id).collect();
    let existing = service.store.existing_menu_item_ids(&ids).await?;

    let mut entries = Vec::with_capacity(items.len());
    for (index, entry) in items.iter().enumerate() {
        let id_field = format!("items.{}.id", index);
        let position_field = format!("items.{}.position", index);

        match entry.id {
            None => errors.add(id_field, "Item ID is required."),
            Some(id) if !existing.contains(&id) => errors.add(id_field, "Item does not exist."),
            Some(_) => {}
        }
        let position = match entry.position {
            None => {
                errors.add(position_field, "Item position is required.");
                None
            }
            Some(p) if p < 0 => {
                errors.add(position_field, "Item position must be at least 0.");
                None
            }
            Some(p) => match i32::try_from(p) {
                Ok(p) => Some(p),
                Err(_) => {
                    errors.add(position_field, "Item position must be a number.");
                    None
                }
            },
        };
        if let (Some(id), Some(position)) = (entry.id, position) {
            entries.push((id, position));
        }
    }

    errors.into_result()?;
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{MemoryStore, MenuRepository};

    fn service() -> (MenuService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let audit = AuditService::new(store.clone(), true);
        (MenuService::new(store.clone(), audit), store)
    }

    fn payload(title: &str, position: i32, parent_id: Option<i64>) -> MenuItemPayload {
        MenuItemPayload {
            title: Some(title.to_string()),
            position: Some(position),
            parent_id,
            ..Default::default()
        }
    }

    fn validation(err: ServiceError) -> FieldErrors {
        match err {
            ServiceError::Validation(errors) => errors,
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn create_requires_title_and_position() {
        let (menu, _) = service();
        let err = menu
            .create(&AuditContext::default(), MenuItemPayload {
                title: Some("   ".into()),
                ..Default::default()
            })
            .await
            .unwrap_err();
        let errors = validation(err);
        assert_eq!(errors.get("title"), Some("Menu title is required."));
        assert_eq!(errors.get("position"), Some("Position is required."));
    }

    #[tokio::test]
    async fn update_rejects_self_parent_before_writing() {
        let (menu, store) = service();
        let ctx = AuditContext::default();
        let node = menu.create(&ctx, payload("Users", 0, None)).await.unwrap();
        let id: i64 = node.id.parse().unwrap();

        let err = menu
            .update(&ctx, id, payload("Renamed", 3, Some(id)))
            .await
            .unwrap_err();
        assert_eq!(
            validation(err).get("parent_id"),
            Some("A menu item cannot be its own parent.")
        );

        let stored = store.find_menu_item(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "Users");
        assert_eq!(stored.position, 0);
    }

    #[tokio::test]
    async fn update_rejects_moving_under_a_descendant() {
        let (menu, store) = service();
        let ctx = AuditContext::default();
        let a: i64 = menu.create(&ctx, payload("A", 0, None)).await.unwrap().id.parse().unwrap();
        let b: i64 = menu.create(&ctx, payload("B", 0, Some(a))).await.unwrap().id.parse().unwrap();
        let c: i64 = menu.create(&ctx, payload("C", 0, Some(b))).await.unwrap().id.parse().unwrap();

        for descendant in [b, c] {
            let err = menu
                .update(&ctx, a, payload("A", 0, Some(descendant)))
                .await
                .unwrap_err();
            assert_eq!(
                validation(err).get("parent_id"),
                Some("A menu item cannot be moved under its own descendant.")
            );
        }
        assert_eq!(store.find_menu_item(a).await.unwrap().unwrap().parent_id, None);

        // Moving a child under a sibling branch is still allowed
        let moved = menu.update(&ctx, c, payload("C", 0, Some(a))).await.unwrap();
        assert_eq!(moved.parent_id.as_deref(), Some(a.to_string().as_str()));
    }

    #[tokio::test]
    async fn update_keeps_absent_flags() {
        let (menu, _) = service();
        let ctx = AuditContext::default();
        let node = menu
            .create(&ctx, MenuItemPayload {
                disabled: Some(true),
                ..payload("Reports", 1, None)
            })
            .await
            .unwrap();
        let id: i64 = node.id.parse().unwrap();

        let updated = menu.update(&ctx, id, payload("Reports", 2, None)).await.unwrap();
        assert!(updated.disabled);
        assert_eq!(updated.position, 2);
    }

    #[tokio::test]
    async fn reorder_with_unknown_id_writes_nothing() {
        let (menu, store) = service();
        let ctx = AuditContext::default();
        let first = menu.create(&ctx, payload("Dashboard", 5, None)).await.unwrap();
        let first_id: i64 = first.id.parse().unwrap();

        let err = menu
            .reorder(ReorderPayload {
                items: Some(vec![
                    ReorderEntry { id: Some(first_id), position: Some(0) },
                    ReorderEntry { id: Some(999), position: Some(1) },
                ]),
            })
            .await
            .unwrap_err();
        let errors = validation(err);
        assert_eq!(errors.get("items.1.id"), Some("Item does not exist."));
        assert_eq!(store.find_menu_item(first_id).await.unwrap().unwrap().position, 5);
    }

    #[tokio::test]
    async fn reorder_reports_every_bad_entry() {
        let (menu, _) = service();
        let err = menu
            .reorder(ReorderPayload {
                items: Some(vec![
                    ReorderEntry { id: None, position: Some(-1) },
                    ReorderEntry { id: Some(3), position: None },
                ]),
            })
            .await
            .unwrap_err();
        let errors = validation(err);
        assert_eq!(errors.get("items.0.id"), Some("Item ID is required."));
        assert_eq!(errors.get("items.0.position"), Some("Item position must be at least 0."));
        assert_eq!(errors.get("items.1.id"), Some("Item does not exist."));
        assert_eq!(errors.get("items.1.position"), Some("Item position is required."));

        let empty = menu.reorder(ReorderPayload { items: Some(vec![]) }).await.unwrap_err();
        assert_eq!(validation(empty).get("items"), Some("At least one item is required."));
    }

    #[tokio::test]
    async fn reorder_changes_sibling_order() {
        let (menu, _) = service();
        let ctx = AuditContext::default();
        let mut ids = Vec::new();
        for (i, title) in ["A", "B", "C"].iter().enumerate() {
            let node = menu.create(&ctx, payload(title, i as i32, None)).await.unwrap();
            ids.push(node.id.parse::<i64>().unwrap());
        }

        let applied = menu
            .reorder(ReorderPayload {
                items: Some(vec![
                    ReorderEntry { id: Some(ids[2]), position: Some(0) },
                    ReorderEntry { id: Some(ids[0]), position: Some(1) },
                    ReorderEntry { id: Some(ids[1]), position: Some(2) },
                ]),
            })
            .await
            .unwrap();
        assert_eq!(applied, 3);

        let titles: Vec<String> = menu.tree().await.unwrap().into_iter().map(|n| n.title).collect();
        assert_eq!(titles, vec!["C", "A", "B"]);
    }
}
