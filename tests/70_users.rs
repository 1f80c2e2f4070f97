mod common;

use anyhow::Result;
use reqwest::StatusCode;
use serde_json::{json, Value};

use common::{id_of, TestServer};

const PASSWORD: &str = "Secret#123";

fn new_user(name: &str) -> Value {
    json!({
        "name": name,
        "email": format!("{}@example.com", name.to_lowercase()),
        "password": PASSWORD,
        "password_confirmation": PASSWORD,
    })
}

async fn user(server: &TestServer, body: Value) -> Result<i64> {
    let (status, json) = server.post("/system/users", body).await?;
    anyhow::ensure!(status == StatusCode::CREATED, "user create failed: {} {}", status, json);
    id_of(&json["data"])
}

/// The token belongs to user 1, so the first account created is the caller's own
async fn own_account(server: &TestServer) -> Result<i64> {
    let id = user(server, new_user("Admin")).await?;
    anyhow::ensure!(id == 1, "expected the first user to get id 1, got {}", id);
    Ok(id)
}

async fn role(server: &TestServer, name: &str) -> Result<i64> {
    let (status, body) = server
        .post("/system/roles-permissions/roles", json!({ "name": name, "display_name": name }))
        .await?;
    anyhow::ensure!(status == StatusCode::CREATED, "role create failed: {}", body);
    id_of(&body["data"])
}

fn names(page: &Value) -> Vec<String> {
    page["data"]
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(|u| u["name"].as_str().map(str::to_string))
        .collect()
}

#[tokio::test]
async fn create_returns_the_account_without_its_password() -> Result<()> {
    let server = TestServer::spawn().await?;
    let editor = role(&server, "editor").await?;

    let mut body = new_user("Ana");
    body["phone"] = json!("08123456789");
    body["roles"] = json!([editor.to_string()]);
    let (status, body) = server.post("/system/users", body).await?;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["message"], "User created successfully");

    let data = &body["data"];
    assert_eq!(data["email"], "ana@example.com");
    assert_eq!(data["status"], true);
    assert_eq!(data["status_text"], "Active");
    assert_eq!(data["roles"], json!([{ "id": editor, "name": "editor", "display_name": "editor" }]));
    assert_eq!(data["role_names"], json!(["editor"]));
    assert_eq!(data["last_login_at"], Value::Null);
    assert_eq!(data["created_at"].as_str().map(str::len), Some(19));
    assert!(data.get("password").is_none());

    let id = id_of(data)?;
    let (status, body) = server.get(&format!("/system/users/{}", id)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["phone"], "08123456789");
    assert!(body["data"].get("password").is_none());

    let (_, audits) = server.get("/system/audit-log?auditable_type=User").await?;
    assert_eq!(audits["total"], 1);
    assert!(audits["data"][0]["new_values"].get("password").is_none());
    Ok(())
}

#[tokio::test]
async fn create_validates_every_field() -> Result<()> {
    let server = TestServer::spawn().await?;
    user(&server, new_user("Taken")).await?;

    let (status, body) = server
        .post(
            "/system/users",
            json!({ "email": "not-an-email", "phone": "1".repeat(21), "roles": [404] }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let errors = &body["field_errors"];
    assert_eq!(errors["name"], "Name is required.");
    assert_eq!(errors["email"], "Please provide a valid email address.");
    assert_eq!(errors["password"], "Password is required.");
    assert_eq!(errors["phone"], "Phone number cannot exceed 20 characters.");
    assert_eq!(errors["roles.0"], "Selected role does not exist.");

    let (status, body) = server
        .post(
            "/system/users",
            json!({ "name": "X", "email": "TAKEN@example.com", "password": "password", "password_confirmation": "password" }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field_errors"]["email"], "This email is already taken.");
    assert_eq!(
        body["field_errors"]["password"],
        "The password field must contain at least one uppercase and one lowercase letter."
    );

    let mut mismatch = new_user("Other");
    mismatch["password_confirmation"] = json!("Secret#124");
    let (status, body) = server.post("/system/users", mismatch).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field_errors"]["password"], "Password confirmation does not match.");
    Ok(())
}

#[tokio::test]
async fn update_keeps_roles_unless_given() -> Result<()> {
    let server = TestServer::spawn().await?;
    let editor = role(&server, "editor").await?;
    let mut body = new_user("Ana");
    body["roles"] = json!([editor]);
    let id = user(&server, body).await?;

    let (status, body) = server
        .put(&format!("/system/users/{}", id), json!({ "name": "Ana Maria", "email": "ana@example.com" }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "User updated successfully");
    assert_eq!(body["data"]["name"], "Ana Maria");
    assert_eq!(body["data"]["role_names"], json!(["editor"]));

    let (status, body) = server
        .put(
            &format!("/system/users/{}", id),
            json!({ "name": "Ana Maria", "email": "ana@example.com", "roles": [], "password": "short", "password_confirmation": "short" }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field_errors"]["password"], "The password field must be at least 8 characters.");

    let (status, body) = server
        .put(
            &format!("/system/users/{}", id),
            json!({ "name": "Ana Maria", "email": "ana@example.com", "roles": [] }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["roles"], json!([]));

    let (status, body) = server
        .put("/system/users/404", json!({ "name": "Nobody", "email": "nobody@example.com" }))
        .await?;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "User not found.");
    Ok(())
}

#[tokio::test]
async fn listing_filters_by_search_status_and_role() -> Result<()> {
    let server = TestServer::spawn().await?;
    let editor = role(&server, "editor").await?;
    let mut ana = new_user("Ana");
    ana["roles"] = json!([editor]);
    user(&server, ana).await?;
    let mut bob = new_user("Bob");
    bob["status"] = json!(false);
    bob["phone"] = json!("0800111");
    user(&server, bob).await?;
    user(&server, new_user("Cyd")).await?;

    let (status, body) = server.get("/system/users").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 3);
    assert_eq!(body["per_page"], 15);
    assert_eq!(names(&body), vec!["Cyd", "Bob", "Ana"]);

    let (_, body) = server.get("/system/users?search=0800").await?;
    assert_eq!(names(&body), vec!["Bob"]);

    let (_, body) = server.get("/system/users?status=inactive").await?;
    assert_eq!(names(&body), vec!["Bob"]);
    assert_eq!(body["data"][0]["status_text"], "Inactive");

    let (_, body) = server.get("/system/users?role=editor").await?;
    assert_eq!(names(&body), vec!["Ana"]);

    let (_, body) = server.get("/system/users?role=ghost").await?;
    assert_eq!(body["total"], 0);
    Ok(())
}

#[tokio::test]
async fn own_account_cannot_be_deleted_or_toggled() -> Result<()> {
    let server = TestServer::spawn().await?;
    let me = own_account(&server).await?;

    let (status, body) = server.delete(&format!("/system/users/{}", me)).await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "You cannot delete your own account");

    let (status, body) = server
        .post(&format!("/system/users/{}/toggle-status", me), json!({}))
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "You cannot change your own status");

    let other = user(&server, new_user("Other")).await?;
    let (status, body) = server
        .post("/system/users/bulk-action", json!({ "action": "delete", "user_ids": [other, me] }))
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["message"], "You cannot perform this action on your own account");

    let (_, body) = server.get("/system/users").await?;
    assert_eq!(body["total"], 2);
    Ok(())
}

#[tokio::test]
async fn toggle_and_delete_another_account() -> Result<()> {
    let server = TestServer::spawn().await?;
    own_account(&server).await?;
    let id = user(&server, new_user("Ana")).await?;

    let (status, body) = server
        .post(&format!("/system/users/{}/toggle-status", id), json!({}))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "message": "User status updated successfully", "data": { "status": false, "status_text": "Inactive" } })
    );

    let (status, body) = server.delete(&format!("/system/users/{}", id)).await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "User deleted successfully" }));

    let (status, _) = server.get(&format!("/system/users/{}", id)).await?;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, body) = server.get("/system/audit-log?auditable_type=User").await?;
    assert_eq!(body["total"], 4);
    assert_eq!(body["data"][0]["event"], "deleted");
    assert_eq!(body["data"][1]["new_values"], json!({ "status": false }));
    Ok(())
}

#[tokio::test]
async fn bulk_actions_report_how_many_users_changed() -> Result<()> {
    let server = TestServer::spawn().await?;
    own_account(&server).await?;
    let a = user(&server, new_user("Ana")).await?;
    let b = user(&server, new_user("Bob")).await?;
    let viewer = role(&server, "viewer").await?;

    let (status, body) = server
        .post("/system/users/bulk-action", json!({ "action": "deactivate", "user_ids": [a, b] }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "message": "2 users deactivated successfully" }));
    let (_, body) = server.get("/system/users?status=inactive").await?;
    assert_eq!(body["total"], 2);

    let (status, body) = server
        .post(
            "/system/users/bulk-action",
            json!({ "action": "assign_role", "user_ids": [a], "role_id": viewer }),
        )
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "1 users assigned role to successfully");
    let (_, body) = server.get(&format!("/system/users/{}", a)).await?;
    assert_eq!(body["data"]["role_names"], json!(["viewer"]));

    let (status, body) = server
        .post(
            "/system/users/bulk-action",
            json!({ "action": "archive", "user_ids": [a, 404], "role_id": 404 }),
        )
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field_errors"]["action"], "Invalid action selected.");
    assert_eq!(body["field_errors"]["user_ids.1"], "Selected user does not exist.");
    assert_eq!(body["field_errors"]["role_id"], "Selected role does not exist.");

    let (status, body) = server
        .post("/system/users/bulk-action", json!({ "action": "assign_role", "user_ids": [] }))
        .await?;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["field_errors"]["user_ids"], "Please select at least one user.");
    assert_eq!(body["field_errors"]["role_id"], "Role is required when assigning roles.");

    let (status, body) = server
        .post("/system/users/bulk-action", json!({ "action": "delete", "user_ids": [a, b] }))
        .await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "2 users deleted successfully");
    let (_, body) = server.get("/system/users").await?;
    assert_eq!(body["total"], 1);
    Ok(())
}

#[tokio::test]
async fn stats_count_accounts() -> Result<()> {
    let server = TestServer::spawn().await?;
    let editor = role(&server, "editor").await?;
    let mut ana = new_user("Ana");
    ana["roles"] = json!([editor]);
    user(&server, ana).await?;
    let mut bob = new_user("Bob");
    bob["status"] = json!(false);
    user(&server, bob).await?;

    let (status, body) = server.get("/system/users/stats").await?;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["data"],
        json!({
            "total_users": 2,
            "active_users": 1,
            "inactive_users": 1,
            "recent_registrations": 2,
            "users_with_roles": 1,
            "users_without_roles": 1,
        })
    );
    Ok(())
}
