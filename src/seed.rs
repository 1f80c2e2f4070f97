//! Default data for a fresh installation.
//!
//! Configuration keys are upserted, permissions and roles are created when
//! missing (role permission sets are re-synced), and the navigation menu is
//! only written into an empty table.

use serde_json::{json, Value};
use std::sync::Arc;
use tracing::info;

use crate::database::models::{
    ConfigGroup, ConfigType, ConfigurationInput, MenuItemInput, PermissionInput, RoleInput,
};
use crate::database::{DatabaseError, Store};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SeedSummary {
    pub menu_items: usize,
    pub configurations: usize,
    pub permissions: usize,
    pub roles: usize,
}

struct MenuSeed {
    title: &'static str,
    href: Option<&'static str>,
    icon: Option<&'static str>,
    position: i32,
    is_separator: bool,
    children: &'static [MenuSeed],
}

const fn link(title: &'static str, href: &'static str, icon: Option<&'static str>, position: i32) -> MenuSeed {
    MenuSeed {
        title,
        href: Some(href),
        icon,
        position,
        is_separator: false,
        children: &[],
    }
}

const fn section(
    title: &'static str,
    icon: &'static str,
    position: i32,
    children: &'static [MenuSeed],
) -> MenuSeed {
    MenuSeed {
        title,
        href: None,
        icon: Some(icon),
        position,
        is_separator: false,
        children,
    }
}

const fn separator(position: i32) -> MenuSeed {
    MenuSeed {
        title: "",
        href: None,
        icon: None,
        position,
        is_separator: true,
        children: &[],
    }
}

const MENU: &[MenuSeed] = &[
    link("Dashboard", "/dashboard", Some("LayoutGrid"), 1),
    section(
        "Report",
        "BarChart3",
        2,
        &[
            link("Analytics", "/reports/analytics", None, 1),
            link("Financial Reports", "/reports/financial", None, 2),
        ],
    ),
    separator(3),
    section(
        "System",
        "Settings",
        4,
        &[
            link("Users", "/system/users", Some("Users"), 1),
            link("Roles & Permissions", "/system/roles", Some("Shield"), 2),
            link("Menu", "/system/menu", Some("FileText"), 3),
            link("Audit Log", "/system/audit-log", Some("Activity"), 4),
            link("Configuration", "/system/configurations", Some("Settings"), 5),
        ],
    ),
    separator(5),
    section(
        "Content",
        "FileText",
        6,
        &[link("Education", "/education", Some("GraduationCap"), 1)],
    ),
];

fn configurations() -> Vec<ConfigurationInput> {
    let entry = |key: &str,
                 value: Value,
                 config_type: ConfigType,
                 group: ConfigGroup,
                 description: &str,
                 is_public: bool| {
        ConfigurationInput {
            key: key.to_string(),
            value,
            config_type,
            group,
            description: Some(description.to_string()),
            is_public,
        }
    };

    vec![
        entry("app_name", json!("TEZ Capital"), ConfigType::String, ConfigGroup::General, "Application name", true),
        entry(
            "app_description",
            json!("Platform keuangan digital terpercaya"),
            ConfigType::Text,
            ConfigGroup::General,
            "Application description",
            true,
        ),
        entry("app_timezone", json!("Asia/Jakarta"), ConfigType::String, ConfigGroup::General, "Application timezone", false),
        entry("company_name", json!("Tez Capital Dashboard"), ConfigType::String, ConfigGroup::Branding, "Company name", true),
        entry("company_logo", Value::Null, ConfigType::File, ConfigGroup::Branding, "Company logo", true),
        entry("company_logo_dark", Value::Null, ConfigType::File, ConfigGroup::Branding, "Company logo for dark mode", true),
        entry("favicon", Value::Null, ConfigType::File, ConfigGroup::Branding, "Favicon", true),
        entry(
            "homepage_hero_title",
            json!("Solusi Keuangan Digital Terdepan"),
            ConfigType::String,
            ConfigGroup::Homepage,
            "Homepage hero title",
            true,
        ),
        entry(
            "homepage_hero_subtitle",
            json!("Platform yang menghubungkan investor dan borrower dengan sistem kredit yang aman dan transparan"),
            ConfigType::Text,
            ConfigGroup::Homepage,
            "Homepage hero subtitle",
            true,
        ),
        entry("homepage_banners", json!("[]"), ConfigType::Json, ConfigGroup::Homepage, "Homepage banners", true),
        entry(
            "homepage_features",
            json!(r#"[{"title":"Aman & Terpercaya","description":"Sistem keamanan berlapis dengan teknologi enkripsi terdepan","icon":"shield"},{"title":"Bunga Kompetitif","description":"Dapatkan return investasi hingga 15% per tahun","icon":"trending-up"},{"title":"Proses Cepat","description":"Approval dalam 24 jam dengan persyaratan yang mudah","icon":"clock"}]"#),
            ConfigType::Json,
            ConfigGroup::Homepage,
            "Homepage feature highlights",
            true,
        ),
        entry("credit_min_amount", json!(1_000_000), ConfigType::Integer, ConfigGroup::Credit, "Minimum credit amount", true),
        entry("credit_max_amount", json!(500_000_000), ConfigType::Integer, ConfigGroup::Credit, "Maximum credit amount", true),
        entry("credit_tenors", json!("[6,12,18,24,36,48]"), ConfigType::Json, ConfigGroup::Credit, "Available tenors in months", true),
        entry(
            "credit_interest_rates",
            json!(r#"{"6":12,"12":13,"18":14,"24":15,"36":16,"48":17}"#),
            ConfigType::Json,
            ConfigGroup::Credit,
            "Interest rate per tenor",
            true,
        ),
        entry("credit_admin_fee", json!("2.5"), ConfigType::String, ConfigGroup::Credit, "Admin fee percentage", true),
        entry("maintenance_mode", json!(false), ConfigType::Boolean, ConfigGroup::Maintenance, "Maintenance mode", true),
        entry(
            "maintenance_message",
            json!("Situs sedang dalam pemeliharaan. Silakan coba beberapa saat lagi."),
            ConfigType::Text,
            ConfigGroup::Maintenance,
            "Maintenance message",
            true,
        ),
        entry("maintenance_end_time", Value::Null, ConfigType::String, ConfigGroup::Maintenance, "Maintenance end time", true),
        entry("contact_phone", json!("+62 21 1234 5678"), ConfigType::String, ConfigGroup::Contact, "Contact phone", true),
        entry("contact_email", json!("support@tezcapital.com"), ConfigType::Email, ConfigGroup::Contact, "Contact email", true),
        entry(
            "contact_address",
            json!("Jl. Sudirman No. 123, Jakarta Pusat 10220"),
            ConfigType::Text,
            ConfigGroup::Contact,
            "Contact address",
            true,
        ),
        entry("contact_whatsapp", json!("+62 812 3456 7890"), ConfigType::String, ConfigGroup::Contact, "WhatsApp number", true),
        entry(
            "social_media",
            json!(r#"{"facebook":"https://facebook.com/tezcapital","instagram":"https://instagram.com/tezcapital","twitter":"https://twitter.com/tezcapital","linkedin":"https://linkedin.com/company/tezcapital"}"#),
            ConfigType::Json,
            ConfigGroup::Contact,
            "Social media links",
            true,
        ),
        entry(
            "bilingual_enabled",
            json!(false),
            ConfigType::Boolean,
            ConfigGroup::Language,
            "Enable bilingual support (Indonesian & English)",
            true,
        ),
        entry("default_language", json!("id"), ConfigType::String, ConfigGroup::Language, "Default application language (id/en)", true),
        entry(
            "language_switcher_enabled",
            json!(true),
            ConfigType::Boolean,
            ConfigGroup::Language,
            "Show language switcher in frontend",
            true,
        ),
        entry(
            "auto_detect_language",
            json!(false),
            ConfigType::Boolean,
            ConfigGroup::Language,
            "Auto-detect user language from browser",
            true,
        ),
    ]
}

/// (name, display name, description, group)
const PERMISSIONS: &[(&str, &str, &str, &str)] = &[
    ("users.view", "View Users", "View user list and details", "User Management"),
    ("users.create", "Create Users", "Create new users", "User Management"),
    ("users.edit", "Edit Users", "Edit user information", "User Management"),
    ("users.delete", "Delete Users", "Delete users", "User Management"),
    ("users.bulk_actions", "User Bulk Actions", "Perform bulk actions on users", "User Management"),
    ("roles.view", "View Roles", "View roles and permissions", "Role Management"),
    ("roles.create", "Create Roles", "Create new roles", "Role Management"),
    ("roles.edit", "Edit Roles", "Edit role information", "Role Management"),
    ("roles.delete", "Delete Roles", "Delete roles", "Role Management"),
    ("permissions.view", "View Permissions", "View permissions", "Role Management"),
    ("permissions.create", "Create Permissions", "Create new permissions", "Role Management"),
    ("permissions.edit", "Edit Permissions", "Edit permission information", "Role Management"),
    ("permissions.delete", "Delete Permissions", "Delete permissions", "Role Management"),
    ("menu.view", "View Menu", "View menu configuration", "System Configuration"),
    ("menu.create", "Create Menu", "Create menu items", "System Configuration"),
    ("menu.edit", "Edit Menu", "Edit menu items", "System Configuration"),
    ("menu.delete", "Delete Menu", "Delete menu items", "System Configuration"),
    ("menu.reorder", "Reorder Menu", "Reorder menu items", "System Configuration"),
    ("audit-logs.view", "View Audit Logs", "View audit logs", "Audit & Monitoring"),
    ("audit-logs.export", "Export Audit Logs", "Export audit logs", "Audit & Monitoring"),
    ("dashboard.view", "View Dashboard", "Access dashboard", "General"),
    ("reports.view", "View Reports", "View reports section", "Reports"),
    ("reports.analytics", "Analytics Reports", "View analytics reports", "Reports"),
    ("reports.financial", "Financial Reports", "View financial reports", "Reports"),
];

enum Grant {
    All,
    Only(&'static [&'static str]),
}

/// (name, display name, description, permissions)
const ROLES: &[(&str, &str, &str, Grant)] = &[
    (
        "Super Admin",
        "Super Administrator",
        "Full system access with all permissions",
        Grant::All,
    ),
    (
        "Admin",
        "Administrator",
        "System administrator with most permissions",
        Grant::Only(&[
            "users.view", "users.create", "users.edit", "users.delete",
            "roles.view", "roles.create", "roles.edit",
            "permissions.view",
            "menu.view", "menu.create", "menu.edit", "menu.delete", "menu.reorder",
            "audit-logs.view", "audit-logs.export",
            "dashboard.view",
            "reports.view", "reports.analytics",
        ]),
    ),
    (
        "Manager",
        "Manager",
        "Manager with limited administrative access",
        Grant::Only(&[
            "users.view", "users.create", "users.edit",
            "roles.view",
            "permissions.view",
            "dashboard.view",
            "reports.view",
        ]),
    ),
    (
        "User",
        "User",
        "Standard user with basic access",
        Grant::Only(&["dashboard.view"]),
    ),
];

/// Write every default dataset; safe to run repeatedly
pub async fn run(store: &Arc<dyn Store>) -> Result<SeedSummary, DatabaseError> {
    let summary = SeedSummary {
        configurations: seed_configurations(store).await?,
        permissions: seed_permissions(store).await?,
        roles: seed_roles(store).await?,
        menu_items: seed_menu(store).await?,
    };
    info!(?summary, "Seeding finished");
    Ok(summary)
}

async fn seed_configurations(store: &Arc<dyn Store>) -> Result<usize, DatabaseError> {
    let entries = configurations();
    for entry in &entries {
        store.upsert_configuration(entry).await?;
    }
    Ok(entries.len())
}

async fn seed_permissions(store: &Arc<dyn Store>) -> Result<usize, DatabaseError> {
    let mut created = 0;
    for (name, display_name, description, group) in PERMISSIONS {
        if store.find_permission_by_name(name).await?.is_some() {
            continue;
        }
        store
            .create_permission(&PermissionInput {
                name: name.to_string(),
                display_name: Some(display_name.to_string()),
                description: Some(description.to_string()),
                group: Some(group.to_string()),
            })
            .await?;
        created += 1;
    }
    Ok(created)
}

async fn seed_roles(store: &Arc<dyn Store>) -> Result<usize, DatabaseError> {
    let permissions = store.list_permissions().await?;
    for (name, display_name, description, grant) in ROLES {
        let permission_ids = permissions
            .iter()
            .filter(|p| match grant {
                Grant::All => true,
                Grant::Only(names) => names.iter().any(|n| *n == p.name),
            })
            .map(|p| p.id)
            .collect();
        let input = RoleInput {
            name: name.to_string(),
            display_name: Some(display_name.to_string()),
            description: Some(description.to_string()),
            permissions: permission_ids,
        };
        match store.find_role_by_name(name).await? {
            Some(existing) => {
                store.update_role(existing.role.id, &input).await?;
            }
            None => {
                store.create_role(&input).await?;
            }
        }
    }
    Ok(ROLES.len())
}

async fn seed_menu(store: &Arc<dyn Store>) -> Result<usize, DatabaseError> {
    if !store.list_menu_items().await?.is_empty() {
        info!("Menu already populated, skipping");
        return Ok(0);
    }

    let mut created = 0;
    for root in MENU {
        let parent = store.create_menu_item(&menu_input(root, None)).await?;
        created += 1;
        for child in root.children {
            store.create_menu_item(&menu_input(child, Some(parent.id))).await?;
            created += 1;
        }
    }
    Ok(created)
}

fn menu_input(seed: &MenuSeed, parent_id: Option<i64>) -> MenuItemInput {
    MenuItemInput {
        title: seed.title.to_string(),
        href: seed.href.map(str::to_string),
        icon: seed.icon.map(str::to_string),
        position: seed.position,
        parent_id,
        badge: None,
        disabled: false,
        is_separator: seed.is_separator,
        is_active: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::MemoryStore;
    use crate::services::menu_tree::build_tree;

    #[tokio::test]
    async fn seeding_twice_changes_nothing_the_second_time() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let first = run(&store).await.unwrap();
        assert_eq!(first.menu_items, 14);
        assert_eq!(first.permissions, PERMISSIONS.len());

        let second = run(&store).await.unwrap();
        assert_eq!(second.menu_items, 0);
        assert_eq!(second.permissions, 0);
        assert_eq!(store.list_menu_items().await.unwrap().len(), 14);
    }

    #[tokio::test]
    async fn seeded_menu_nests_system_pages() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        run(&store).await.unwrap();

        let tree = build_tree(&store.list_menu_items().await.unwrap());
        let titles: Vec<&str> = tree.iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, vec!["Dashboard", "Report", "", "System", "", "Content"]);
        assert_eq!(tree[3].children.len(), 5);
    }

    #[tokio::test]
    async fn super_admin_holds_every_permission() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        run(&store).await.unwrap();

        let super_admin = store.find_role_by_name("Super Admin").await.unwrap().unwrap();
        assert_eq!(super_admin.permissions.len(), PERMISSIONS.len());
        let user = store.find_role_by_name("User").await.unwrap().unwrap();
        assert_eq!(user.permissions.len(), 1);
    }
}
