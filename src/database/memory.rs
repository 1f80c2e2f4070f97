//! In-process storage backend.
//!
//! Every table lives in one struct behind a single `RwLock`, so each
//! repository call observes and mutates a consistent snapshot. Nothing is
//! persisted; used by the integration tests and `serve --memory`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::database::manager::DatabaseError;
use crate::database::models::role::sort_permissions;
use crate::database::models::{
    Audit, AuditFilter, Configuration, ConfigurationInput, Education, EducationFilter,
    EducationInput, MenuItem, MenuItemInput, NewAudit, Permission, PermissionInput, Role,
    RoleInput, RoleSummary, RoleWithPermissions, User, UserFilter, UserInput, UserStats,
    UserWithRoles,
};
use crate::database::repository::{
    AuditRepository, ConfigurationRepository, EducationRepository, MenuRepository,
    RoleRepository, Store, UserRepository,
};

#[derive(Debug, Default)]
struct Sequences {
    menu_items: i64,
    configurations: i64,
    audits: i64,
    permissions: i64,
    roles: i64,
    education: i64,
    users: i64,
}

fn next_id(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Default)]
struct Tables {
    menu_items: BTreeMap<i64, MenuItem>,
    configurations: BTreeMap<i64, Configuration>,
    audits: Vec<Audit>,
    permissions: BTreeMap<i64, Permission>,
    roles: BTreeMap<i64, Role>,
    /// (role_id, permission_id)
    role_permissions: BTreeSet<(i64, i64)>,
    education: BTreeMap<i64, Education>,
    users: BTreeMap<i64, User>,
    /// (user_id, role_id)
    user_roles: BTreeSet<(i64, i64)>,
    sequences: Sequences,
}

impl Tables {
    fn role_with_permissions(&self, role: &Role) -> RoleWithPermissions {
        let mut permissions: Vec<Permission> = self
            .role_permissions
            .iter()
            .filter(|(role_id, _)| *role_id == role.id)
            .filter_map(|(_, permission_id)| self.permissions.get(permission_id).cloned())
            .collect();
        sort_permissions(&mut permissions);
        RoleWithPermissions {
            role: role.clone(),
            permissions,
        }
    }

    fn sync_role_permissions(&mut self, role_id: i64, permission_ids: &[i64]) {
        self.role_permissions.retain(|(r, _)| *r != role_id);
        for permission_id in permission_ids {
            if self.permissions.contains_key(permission_id) {
                self.role_permissions.insert((role_id, *permission_id));
            }
        }
    }

    fn user_with_roles(&self, user: &User) -> UserWithRoles {
        let roles = self
            .user_roles
            .iter()
            .filter(|(user_id, _)| *user_id == user.id)
            .filter_map(|(_, role_id)| self.roles.get(role_id))
            .map(|role| RoleSummary {
                id: role.id,
                name: role.name.clone(),
                display_name: role.display_name.clone(),
            })
            .collect();
        UserWithRoles {
            user: user.clone(),
            roles,
        }
    }

    fn sync_user_roles(&mut self, user_id: i64, role_ids: &[i64]) {
        self.user_roles.retain(|(u, _)| *u != user_id);
        for role_id in role_ids {
            if self.roles.contains_key(role_id) {
                self.user_roles.insert((user_id, *role_id));
            }
        }
    }

    fn live_education_ids(&self, ids: &[i64]) -> Vec<i64> {
        ids.iter()
            .copied()
            .filter(|id| {
                self.education
                    .get(id)
                    .is_some_and(|e| e.deleted_at.is_none())
            })
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// Thread-safe, cloneable in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn paginate<T>(items: Vec<T>, offset: u64, limit: u32) -> Vec<T> {
    items
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(limit as usize)
        .collect()
}

/// Descending order with missing values last
fn desc_nulls_last(a: Option<DateTime<Utc>>, b: Option<DateTime<Utc>>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

fn count_grouped<'a>(keys: impl Iterator<Item = &'a str>) -> Vec<(String, i64)> {
    let mut counts: BTreeMap<String, i64> = BTreeMap::new();
    for key in keys {
        *counts.entry(key.to_string()).or_insert(0) += 1;
    }
    let mut grouped: Vec<(String, i64)> = counts.into_iter().collect();
    grouped.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    grouped
}

#[async_trait]
impl MenuRepository for MemoryStore {
    async fn list_menu_items(&self) -> Result<Vec<MenuItem>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.menu_items.values().cloned().collect())
    }

    async fn find_menu_item(&self, id: i64) -> Result<Option<MenuItem>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.menu_items.get(&id).cloned())
    }

    async fn existing_menu_item_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| tables.menu_items.contains_key(id))
            .collect())
    }

    async fn create_menu_item(&self, input: &MenuItemInput) -> Result<MenuItem, DatabaseError> {
        let mut tables = self.tables.write().await;
        if let Some(parent_id) = input.parent_id {
            if !tables.menu_items.contains_key(&parent_id) {
                return Err(DatabaseError::QueryError(format!(
                    "menu_items.parent_id {} violates foreign key",
                    parent_id
                )));
            }
        }
        let now = Utc::now();
        let id = next_id(&mut tables.sequences.menu_items);
        let item = MenuItem {
            id,
            title: input.title.clone(),
            href: input.href.clone(),
            icon: input.icon.clone(),
            position: input.position,
            parent_id: input.parent_id,
            badge: input.badge.clone(),
            disabled: input.disabled,
            is_separator: input.is_separator,
            is_active: input.is_active,
            created_at: now,
            updated_at: now,
        };
        tables.menu_items.insert(id, item.clone());
        Ok(item)
    }

    async fn update_menu_item(
        &self,
        id: i64,
        input: &MenuItemInput,
    ) -> Result<Option<MenuItem>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.menu_items.get(&id) else {
            return Ok(None);
        };
        let mut updated = input.apply_to(existing);
        updated.updated_at = Utc::now();
        tables.menu_items.insert(id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_menu_item(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.menu_items.contains_key(&id) {
            return Ok(false);
        }
        let mut doomed = vec![id];
        let mut seen = HashSet::from([id]);
        let mut cursor = 0;
        while cursor < doomed.len() {
            let parent = doomed[cursor];
            let children: Vec<i64> = tables
                .menu_items
                .values()
                .filter(|item| item.parent_id == Some(parent))
                .map(|item| item.id)
                .filter(|child| seen.insert(*child))
                .collect();
            doomed.extend(children);
            cursor += 1;
        }
        for doomed_id in doomed {
            tables.menu_items.remove(&doomed_id);
        }
        Ok(true)
    }

    async fn set_menu_item_position(&self, id: i64, position: i32) -> Result<(), DatabaseError> {
        let mut tables = self.tables.write().await;
        if let Some(item) = tables.menu_items.get_mut(&id) {
            item.position = position;
            item.updated_at = Utc::now();
        }
        Ok(())
    }
}

#[async_trait]
impl ConfigurationRepository for MemoryStore {
    async fn list_configurations(&self) -> Result<Vec<Configuration>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut configurations: Vec<Configuration> =
            tables.configurations.values().cloned().collect();
        configurations.sort_by(|a, b| {
            a.group
                .as_str()
                .cmp(b.group.as_str())
                .then_with(|| a.key.cmp(&b.key))
        });
        Ok(configurations)
    }

    async fn find_configuration(&self, id: i64) -> Result<Option<Configuration>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.configurations.get(&id).cloned())
    }

    async fn find_configuration_by_key(
        &self,
        key: &str,
    ) -> Result<Option<Configuration>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .configurations
            .values()
            .find(|c| c.key == key)
            .cloned())
    }

    async fn upsert_configuration(
        &self,
        input: &ConfigurationInput,
    ) -> Result<Configuration, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let existing_id = tables
            .configurations
            .values()
            .find(|c| c.key == input.key)
            .map(|c| c.id);

        let (id, created_at) = match existing_id {
            Some(id) => {
                let created_at = tables
                    .configurations
                    .get(&id)
                    .map(|c| c.created_at)
                    .unwrap_or(now);
                (id, created_at)
            }
            None => (next_id(&mut tables.sequences.configurations), now),
        };

        let configuration = Configuration {
            id,
            key: input.key.clone(),
            value: input.value.clone(),
            config_type: input.config_type,
            group: input.group,
            description: input.description.clone(),
            is_public: input.is_public,
            created_at,
            updated_at: now,
        };
        tables.configurations.insert(id, configuration.clone());
        Ok(configuration)
    }

    async fn update_configuration(
        &self,
        id: i64,
        input: &ConfigurationInput,
    ) -> Result<Option<Configuration>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(existing) = tables.configurations.get_mut(&id) else {
            return Ok(None);
        };
        existing.key = input.key.clone();
        existing.value = input.value.clone();
        existing.config_type = input.config_type;
        existing.group = input.group;
        existing.description = input.description.clone();
        existing.is_public = input.is_public;
        existing.updated_at = Utc::now();
        Ok(Some(existing.clone()))
    }

    async fn delete_configuration(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        Ok(tables.configurations.remove(&id).is_some())
    }
}

#[async_trait]
impl AuditRepository for MemoryStore {
    async fn record_audit(&self, audit: &NewAudit) -> Result<Audit, DatabaseError> {
        let mut tables = self.tables.write().await;
        let id = next_id(&mut tables.sequences.audits);
        let stored = Audit {
            id,
            event: audit.event,
            auditable_type: audit.auditable_type.clone(),
            auditable_id: audit.auditable_id,
            user_id: audit.user_id,
            user_name: audit.user_name.clone(),
            old_values: audit.old_values.clone(),
            new_values: audit.new_values.clone(),
            url: audit.url.clone(),
            ip_address: audit.ip_address.clone(),
            user_agent: audit.user_agent.clone(),
            created_at: Utc::now(),
        };
        tables.audits.push(stored.clone());
        Ok(stored)
    }

    async fn list_audits(&self, filter: &AuditFilter) -> Result<(Vec<Audit>, i64), DatabaseError> {
        let tables = self.tables.read().await;
        let mut matched: Vec<Audit> = tables
            .audits
            .iter()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        matched.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        let total = matched.len() as i64;
        Ok((paginate(matched, filter.offset(), filter.per_page), total))
    }

    async fn count_audits(
        &self,
        from: Option<DateTime<Utc>>,
        to: Option<DateTime<Utc>>,
    ) -> Result<i64, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .audits
            .iter()
            .filter(|a| from.map_or(true, |f| a.created_at >= f))
            .filter(|a| to.map_or(true, |t| a.created_at < t))
            .count() as i64)
    }

    async fn count_audits_by_event(&self) -> Result<Vec<(String, i64)>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(count_grouped(tables.audits.iter().map(|a| a.event.as_str())))
    }

    async fn count_audits_by_type(&self) -> Result<Vec<(String, i64)>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(count_grouped(
            tables.audits.iter().map(|a| a.auditable_type.as_str()),
        ))
    }

    async fn recent_audits(&self, limit: u32) -> Result<Vec<Audit>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut audits = tables.audits.clone();
        audits.sort_by(|a, b| b.created_at.cmp(&a.created_at).then_with(|| b.id.cmp(&a.id)));
        audits.truncate(limit as usize);
        Ok(audits)
    }
}

#[async_trait]
impl RoleRepository for MemoryStore {
    async fn list_permissions(&self) -> Result<Vec<Permission>, DatabaseError> {
        let tables = self.tables.read().await;
        let mut permissions: Vec<Permission> = tables.permissions.values().cloned().collect();
        sort_permissions(&mut permissions);
        Ok(permissions)
    }

    async fn find_permission(&self, id: i64) -> Result<Option<Permission>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.permissions.get(&id).cloned())
    }

    async fn find_permission_by_name(
        &self,
        name: &str,
    ) -> Result<Option<Permission>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.permissions.values().find(|p| p.name == name).cloned())
    }

    async fn existing_permission_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| tables.permissions.contains_key(id))
            .collect())
    }

    async fn create_permission(&self, input: &PermissionInput) -> Result<Permission, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let id = next_id(&mut tables.sequences.permissions);
        let permission = Permission {
            id,
            name: input.name.clone(),
            display_name: input.display_name.clone(),
            description: input.description.clone(),
            group: input.group.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.permissions.insert(id, permission.clone());
        Ok(permission)
    }

    async fn update_permission(
        &self,
        id: i64,
        input: &PermissionInput,
    ) -> Result<Option<Permission>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(permission) = tables.permissions.get_mut(&id) else {
            return Ok(None);
        };
        permission.name = input.name.clone();
        permission.display_name = input.display_name.clone();
        permission.description = input.description.clone();
        permission.group = input.group.clone();
        permission.updated_at = Utc::now();
        Ok(Some(permission.clone()))
    }

    async fn delete_permission(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.role_permissions.retain(|(_, p)| *p != id);
        Ok(tables.permissions.remove(&id).is_some())
    }

    async fn list_roles(&self) -> Result<Vec<RoleWithPermissions>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .values()
            .map(|role| tables.role_with_permissions(role))
            .collect())
    }

    async fn find_role(&self, id: i64) -> Result<Option<RoleWithPermissions>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .get(&id)
            .map(|role| tables.role_with_permissions(role)))
    }

    async fn find_role_by_name(
        &self,
        name: &str,
    ) -> Result<Option<RoleWithPermissions>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .roles
            .values()
            .find(|r| r.name == name)
            .map(|role| tables.role_with_permissions(role)))
    }

    async fn create_role(&self, input: &RoleInput) -> Result<RoleWithPermissions, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let id = next_id(&mut tables.sequences.roles);
        let role = Role {
            id,
            name: input.name.clone(),
            display_name: input.display_name.clone(),
            description: input.description.clone(),
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(id, role.clone());
        tables.sync_role_permissions(id, &input.permissions);
        Ok(tables.role_with_permissions(&role))
    }

    async fn update_role(
        &self,
        id: i64,
        input: &RoleInput,
    ) -> Result<Option<RoleWithPermissions>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(role) = tables.roles.get_mut(&id) else {
            return Ok(None);
        };
        role.name = input.name.clone();
        role.display_name = input.display_name.clone();
        role.description = input.description.clone();
        role.updated_at = Utc::now();
        let role = role.clone();
        tables.sync_role_permissions(id, &input.permissions);
        Ok(Some(tables.role_with_permissions(&role)))
    }

    async fn delete_role(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.role_permissions.retain(|(r, _)| *r != id);
        tables.user_roles.retain(|(_, r)| *r != id);
        Ok(tables.roles.remove(&id).is_some())
    }
}

#[async_trait]
impl EducationRepository for MemoryStore {
    async fn list_education(
        &self,
        filter: &EducationFilter,
    ) -> Result<(Vec<Education>, i64), DatabaseError> {
        let tables = self.tables.read().await;
        let mut matched: Vec<Education> = tables
            .education
            .values()
            .filter(|e| filter.matches(e))
            .cloned()
            .collect();
        matched.sort_by(|a, b| {
            a.sort_order
                .cmp(&b.sort_order)
                .then_with(|| {
                    if filter.order_by_published {
                        desc_nulls_last(a.published_at, b.published_at)
                    } else {
                        b.created_at.cmp(&a.created_at)
                    }
                })
                .then_with(|| b.id.cmp(&a.id))
        });
        let total = matched.len() as i64;
        Ok((paginate(matched, filter.offset(), filter.per_page), total))
    }

    async fn find_education(&self, id: i64) -> Result<Option<Education>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .education
            .get(&id)
            .filter(|e| e.deleted_at.is_none())
            .cloned())
    }

    async fn existing_education_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.live_education_ids(ids).into_iter().collect())
    }

    async fn create_education(&self, input: &EducationInput) -> Result<Education, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let id = next_id(&mut tables.sequences.education);
        let education = Education {
            id,
            title_id: input.title_id.clone(),
            title_en: input.title_en.clone(),
            description_id: input.description_id.clone(),
            description_en: input.description_en.clone(),
            content_id: input.content_id.clone(),
            content_en: input.content_en.clone(),
            image: input.image.clone(),
            category: input.category,
            tags: input.tags.clone(),
            is_published: input.is_published,
            published_at: input.published_at,
            meta_title_id: input.meta_title_id.clone(),
            meta_title_en: input.meta_title_en.clone(),
            meta_description_id: input.meta_description_id.clone(),
            meta_description_en: input.meta_description_en.clone(),
            sort_order: input.sort_order,
            view_count: 0,
            deleted_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.education.insert(id, education.clone());
        Ok(education)
    }

    async fn update_education(
        &self,
        id: i64,
        input: &EducationInput,
    ) -> Result<Option<Education>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(education) = tables
            .education
            .get_mut(&id)
            .filter(|e| e.deleted_at.is_none())
        else {
            return Ok(None);
        };
        education.title_id = input.title_id.clone();
        education.title_en = input.title_en.clone();
        education.description_id = input.description_id.clone();
        education.description_en = input.description_en.clone();
        education.content_id = input.content_id.clone();
        education.content_en = input.content_en.clone();
        education.image = input.image.clone();
        education.category = input.category;
        education.tags = input.tags.clone();
        education.is_published = input.is_published;
        education.published_at = input.published_at;
        education.meta_title_id = input.meta_title_id.clone();
        education.meta_title_en = input.meta_title_en.clone();
        education.meta_description_id = input.meta_description_id.clone();
        education.meta_description_en = input.meta_description_en.clone();
        education.sort_order = input.sort_order;
        education.updated_at = Utc::now();
        Ok(Some(education.clone()))
    }

    async fn soft_delete_education(
        &self,
        id: i64,
        now: DateTime<Utc>,
    ) -> Result<bool, DatabaseError> {
        Ok(self.soft_delete_education_many(&[id], now).await? > 0)
    }

    async fn publish_education(
        &self,
        ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let mut tables = self.tables.write().await;
        let live = tables.live_education_ids(ids);
        for id in &live {
            if let Some(education) = tables.education.get_mut(id) {
                education.is_published = true;
                education.published_at = Some(now);
                education.updated_at = now;
            }
        }
        Ok(live.len() as u64)
    }

    async fn unpublish_education(&self, ids: &[i64]) -> Result<u64, DatabaseError> {
        let mut tables = self.tables.write().await;
        let live = tables.live_education_ids(ids);
        let now = Utc::now();
        for id in &live {
            if let Some(education) = tables.education.get_mut(id) {
                education.is_published = false;
                education.updated_at = now;
            }
        }
        Ok(live.len() as u64)
    }

    async fn soft_delete_education_many(
        &self,
        ids: &[i64],
        now: DateTime<Utc>,
    ) -> Result<u64, DatabaseError> {
        let mut tables = self.tables.write().await;
        let live = tables.live_education_ids(ids);
        for id in &live {
            if let Some(education) = tables.education.get_mut(id) {
                education.deleted_at = Some(now);
            }
        }
        Ok(live.len() as u64)
    }

    async fn increment_education_views(&self, id: i64) -> Result<Option<i32>, DatabaseError> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .education
            .get_mut(&id)
            .filter(|e| e.deleted_at.is_none())
            .map(|e| {
                e.view_count += 1;
                e.view_count
            }))
    }
}

#[async_trait]
impl UserRepository for MemoryStore {
    async fn list_users(
        &self,
        filter: &UserFilter,
    ) -> Result<(Vec<UserWithRoles>, i64), DatabaseError> {
        let tables = self.tables.read().await;
        let mut matched: Vec<UserWithRoles> = tables
            .users
            .values()
            .map(|user| tables.user_with_roles(user))
            .filter(|user| filter.matches(user))
            .collect();
        matched.sort_by(|a, b| {
            b.user
                .created_at
                .cmp(&a.user.created_at)
                .then_with(|| b.user.id.cmp(&a.user.id))
        });
        let total = matched.len() as i64;
        Ok((paginate(matched, filter.offset(), filter.per_page), total))
    }

    async fn find_user(&self, id: i64) -> Result<Option<UserWithRoles>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables.users.get(&id).map(|user| tables.user_with_roles(user)))
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn existing_user_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| tables.users.contains_key(id))
            .collect())
    }

    async fn existing_role_ids(&self, ids: &[i64]) -> Result<HashSet<i64>, DatabaseError> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .copied()
            .filter(|id| tables.roles.contains_key(id))
            .collect())
    }

    async fn create_user(&self, input: &UserInput) -> Result<UserWithRoles, DatabaseError> {
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let id = next_id(&mut tables.sequences.users);
        let user = User {
            id,
            name: input.name.clone(),
            email: input.email.clone(),
            password: input.password.clone().unwrap_or_default(),
            phone: input.phone.clone(),
            address: input.address.clone(),
            status: input.status,
            last_login_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.insert(id, user.clone());
        if let Some(roles) = &input.roles {
            tables.sync_user_roles(id, roles);
        }
        Ok(tables.user_with_roles(&user))
    }

    async fn update_user(
        &self,
        id: i64,
        input: &UserInput,
    ) -> Result<Option<UserWithRoles>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        user.name = input.name.clone();
        user.email = input.email.clone();
        if let Some(password) = &input.password {
            user.password = password.clone();
        }
        user.phone = input.phone.clone();
        user.address = input.address.clone();
        user.status = input.status;
        user.updated_at = Utc::now();
        let user = user.clone();
        if let Some(roles) = &input.roles {
            tables.sync_user_roles(id, roles);
        }
        Ok(Some(tables.user_with_roles(&user)))
    }

    async fn set_user_status(
        &self,
        id: i64,
        status: bool,
    ) -> Result<Option<UserWithRoles>, DatabaseError> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.get_mut(&id) else {
            return Ok(None);
        };
        user.status = status;
        user.updated_at = Utc::now();
        let user = user.clone();
        Ok(Some(tables.user_with_roles(&user)))
    }

    async fn assign_user_role(&self, id: i64, role_id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        if !tables.users.contains_key(&id) || !tables.roles.contains_key(&role_id) {
            return Ok(false);
        }
        tables.user_roles.insert((id, role_id));
        Ok(true)
    }

    async fn delete_user(&self, id: i64) -> Result<bool, DatabaseError> {
        let mut tables = self.tables.write().await;
        tables.user_roles.retain(|(u, _)| *u != id);
        Ok(tables.users.remove(&id).is_some())
    }

    async fn user_stats(&self, registered_since: DateTime<Utc>) -> Result<UserStats, DatabaseError> {
        let tables = self.tables.read().await;
        let with_roles: HashSet<i64> = tables
            .user_roles
            .iter()
            .map(|(user_id, _)| *user_id)
            .filter(|id| tables.users.contains_key(id))
            .collect();
        let total_users = tables.users.len() as i64;
        let active_users = tables.users.values().filter(|u| u.status).count() as i64;
        let users_with_roles = with_roles.len() as i64;
        Ok(UserStats {
            total_users,
            active_users,
            inactive_users: total_users - active_users,
            recent_registrations: tables
                .users
                .values()
                .filter(|u| u.created_at >= registered_since)
                .count() as i64,
            users_with_roles,
            users_without_roles: total_users - users_with_roles,
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn health_check(&self) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn menu_input(title: &str, position: i32, parent_id: Option<i64>) -> MenuItemInput {
        MenuItemInput {
            title: title.to_string(),
            href: None,
            icon: None,
            position,
            parent_id,
            badge: None,
            disabled: false,
            is_separator: false,
            is_active: true,
        }
    }

    #[tokio::test]
    async fn delete_cascades_to_descendants() {
        let store = MemoryStore::new();
        let root = store.create_menu_item(&menu_input("System", 0, None)).await.unwrap();
        let child = store
            .create_menu_item(&menu_input("Users", 0, Some(root.id)))
            .await
            .unwrap();
        let grandchild = store
            .create_menu_item(&menu_input("Invites", 0, Some(child.id)))
            .await
            .unwrap();
        let other = store.create_menu_item(&menu_input("Dashboard", 1, None)).await.unwrap();

        assert!(store.delete_menu_item(root.id).await.unwrap());

        let remaining: Vec<i64> = store
            .list_menu_items()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(remaining, vec![other.id]);
        assert!(store.find_menu_item(grandchild.id).await.unwrap().is_none());
        assert!(!store.delete_menu_item(root.id).await.unwrap());
    }

    #[tokio::test]
    async fn delete_terminates_on_cyclic_rows() {
        let store = MemoryStore::new();
        let a = store.create_menu_item(&menu_input("A", 0, None)).await.unwrap();
        let b = store
            .create_menu_item(&menu_input("B", 0, Some(a.id)))
            .await
            .unwrap();
        store
            .update_menu_item(a.id, &menu_input("A", 0, Some(b.id)))
            .await
            .unwrap();

        assert!(store.delete_menu_item(a.id).await.unwrap());
        assert!(store.list_menu_items().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn create_rejects_unknown_parent() {
        let store = MemoryStore::new();
        let result = store.create_menu_item(&menu_input("Orphan", 0, Some(42))).await;
        assert!(matches!(result, Err(DatabaseError::QueryError(_))));
    }

    #[tokio::test]
    async fn set_position_leaves_parent_alone() {
        let store = MemoryStore::new();
        let root = store.create_menu_item(&menu_input("System", 0, None)).await.unwrap();
        let child = store
            .create_menu_item(&menu_input("Users", 0, Some(root.id)))
            .await
            .unwrap();

        store.set_menu_item_position(child.id, 7).await.unwrap();
        store.set_menu_item_position(999, 1).await.unwrap();

        let reloaded = store.find_menu_item(child.id).await.unwrap().unwrap();
        assert_eq!(reloaded.position, 7);
        assert_eq!(reloaded.parent_id, Some(root.id));
    }

    #[tokio::test]
    async fn deleting_permission_detaches_it_from_roles() {
        let store = MemoryStore::new();
        let view = store
            .create_permission(&PermissionInput {
                name: "menu.view".into(),
                display_name: None,
                description: None,
                group: Some("menu".into()),
            })
            .await
            .unwrap();
        let role = store
            .create_role(&RoleInput {
                name: "Editor".into(),
                display_name: None,
                description: None,
                permissions: vec![view.id],
            })
            .await
            .unwrap();
        assert_eq!(role.permissions.len(), 1);

        store.delete_permission(view.id).await.unwrap();

        let role = store.find_role(role.role.id).await.unwrap().unwrap();
        assert!(role.permissions.is_empty());
    }

    fn user_input(name: &str, status: bool, roles: Option<Vec<i64>>) -> UserInput {
        UserInput {
            name: name.into(),
            email: format!("{}@example.com", name.to_lowercase()),
            password: Some("$argon2id$hash".into()),
            phone: None,
            address: None,
            status,
            roles,
        }
    }

    #[tokio::test]
    async fn user_roles_follow_role_deletion() {
        let store = MemoryStore::new();
        let role = store
            .create_role(&RoleInput {
                name: "Editor".into(),
                display_name: None,
                description: None,
                permissions: vec![],
            })
            .await
            .unwrap();
        let user = store
            .create_user(&user_input("Ana", true, Some(vec![role.role.id, 99])))
            .await
            .unwrap();
        assert_eq!(user.roles.len(), 1);

        // Absent roles leave the pivot alone; the hash is kept without a new one
        let mut keep = user_input("Ana", true, None);
        keep.password = None;
        let updated = store.update_user(user.user.id, &keep).await.unwrap().unwrap();
        assert_eq!(updated.roles.len(), 1);
        assert_eq!(updated.user.password, "$argon2id$hash");

        store.delete_role(role.role.id).await.unwrap();
        let user = store.find_user(user.user.id).await.unwrap().unwrap();
        assert!(user.roles.is_empty());
    }

    #[tokio::test]
    async fn user_stats_count_status_and_roles() {
        let store = MemoryStore::new();
        let role = store
            .create_role(&RoleInput {
                name: "Viewer".into(),
                display_name: None,
                description: None,
                permissions: vec![],
            })
            .await
            .unwrap();
        store.create_user(&user_input("Ana", true, Some(vec![role.role.id]))).await.unwrap();
        store.create_user(&user_input("Bob", false, None)).await.unwrap();
        store.create_user(&user_input("Cy", true, None)).await.unwrap();

        let stats = store.user_stats(Utc::now() - chrono::Duration::days(7)).await.unwrap();
        assert_eq!(stats.total_users, 3);
        assert_eq!(stats.active_users, 2);
        assert_eq!(stats.inactive_users, 1);
        assert_eq!(stats.recent_registrations, 3);
        assert_eq!(stats.users_with_roles, 1);
        assert_eq!(stats.users_without_roles, 2);

        let later = store.user_stats(Utc::now() + chrono::Duration::days(1)).await.unwrap();
        assert_eq!(later.recent_registrations, 0);
    }
}
