mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{id_of, TestServer};

const ROLES: &str = "/system/roles-permissions/roles";
const PERMISSIONS: &str = "/system/roles-permissions/permissions";

async fn permission(server: &TestServer, name: &str, group: Option<&str>) -> Result<i64> {
    let (status, body) = server
        .post(PERMISSIONS, json!({ "name": name, "display_name": name, "group": group }))
        .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "permission create failed: {}", body);
    id_of(&body["data"])
}

fn names(list: &Value) -> Vec<String> {
    list.as_array()
        .into_iter()
        .flatten()
        .filter_map(|p| p["name"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn permissions_are_listed_by_group_then_name() -> Result<()> {
    let server = TestServer::spawn().await?;
    permission(&server, "menu.edit", Some("menu")).await?;
    permission(&server, "audit.view", Some("audit")).await?;
    permission(&server, "menu.view", Some("menu")).await?;
    permission(&server, "dashboard", None).await?;

    let (status, body) = server.get(PERMISSIONS).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(names(&body["data"]), vec!["dashboard", "audit.view", "menu.edit", "menu.view"]);
    Ok(())
}

#[tokio::test]
async fn permission_names_are_unique() -> Result<()> {
    let server = TestServer::spawn().await?;
    let id = permission(&server, "users.view", Some("users")).await?;
    let other = permission(&server, "users.edit", Some("users")).await?;

    let (status, body) = server.post(PERMISSIONS, json!({ "name": "users.view" })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field_errors"]["name"], "Permission name already exists.");

    let (status, body) = server
        .put(&format!("{}/{}", PERMISSIONS, other), json!({ "name": "users.view" }))
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field_errors"]["name"], "Permission name already exists.");

    // Keeping its own name is fine
    let (status, body) = server
        .put(
            &format!("{}/{}", PERMISSIONS, id),
            json!({ "name": "users.view", "display_name": "View users" }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Permission updated successfully");
    assert_eq!(body["data"]["display_name"], "View users");
    assert_eq!(body["data"]["group"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn role_is_created_with_its_permissions() -> Result<()> {
    let server = TestServer::spawn().await?;
    let view = permission(&server, "menu.view", Some("menu")).await?;
    let edit = permission(&server, "menu.edit", Some("menu")).await?;

    let (status, body) = server
        .post(
            ROLES,
            json!({ "name": "Editor", "description": "Edits menus", "permissions": [view, edit.to_string()] }),
        )
        .await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "Role created successfully");
    assert_eq!(body["data"]["name"], "Editor");
    assert_eq!(names(&body["data"]["permissions"]), vec!["menu.edit", "menu.view"]);

    let role = id_of(&body["data"])?;
    let (status, body) = server.get(&format!("{}/{}", ROLES, role)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["description"], "Edits menus");
    Ok(())
}

#[tokio::test]
async fn role_rejects_unknown_permissions_and_duplicate_names() -> Result<()> {
    let server = TestServer::spawn().await?;
    let view = permission(&server, "menu.view", None).await?;
    server.post(ROLES, json!({ "name": "Admin" })).await?;

    let (status, body) = server
        .post(ROLES, json!({ "name": "Admin", "permissions": [view, 9999] }))
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field_errors"]["name"], "Role name already exists.");
    assert_eq!(body["field_errors"]["permissions.1"], "Selected permission does not exist.");
    assert!(body["field_errors"].get("permissions.0").is_none());

    let (status, body) = server.post(ROLES, json!({ "display_name": "Nameless" })).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field_errors"]["name"], "Role name is required.");
    Ok(())
}

#[tokio::test]
async fn update_syncs_and_clears_permissions() -> Result<()> {
    let server = TestServer::spawn().await?;
    let view = permission(&server, "menu.view", None).await?;
    let edit = permission(&server, "menu.edit", None).await?;
    let (_, created) = server
        .post(ROLES, json!({ "name": "Manager", "permissions": [view] }))
        .await?;
    let role = id_of(&created["data"])?;

    let (status, body) = server
        .put(&format!("{}/{}", ROLES, role), json!({ "name": "Manager", "permissions": [edit] }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Role updated successfully");
    assert_eq!(names(&body["data"]["permissions"]), vec!["menu.edit"]);

    let (status, body) = server
        .put(&format!("{}/{}", ROLES, role), json!({ "name": "Manager" }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["permissions"], json!([]));
    Ok(())
}

#[tokio::test]
async fn deleting_a_permission_detaches_it_from_roles() -> Result<()> {
    let server = TestServer::spawn().await?;
    let view = permission(&server, "menu.view", None).await?;
    let (_, created) = server
        .post(ROLES, json!({ "name": "Viewer", "permissions": [view] }))
        .await?;
    let role = id_of(&created["data"])?;

    let (status, body) = server.delete(&format!("{}/{}", PERMISSIONS, view)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Permission deleted successfully" }));

    let (_, body) = server.get(&format!("{}/{}", ROLES, role)).await?;
    assert_eq!(body["data"]["permissions"], json!([]));

    let (status, body) = server.delete(&format!("{}/{}", ROLES, role)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "Role deleted successfully" }));

    let (status, body) = server.get(&format!("{}/{}", ROLES, role)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Role not found.");
    let (status, body) = server.get(&format!("{}/{}", PERMISSIONS, view)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Permission not found.");
    Ok(())
}
