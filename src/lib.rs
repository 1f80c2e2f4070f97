pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod seed;
pub mod services;
pub mod state;
pub mod validation;

use axum::{
    extract::DefaultBodyLimit,
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::config::Environment;
use crate::state::AppState;

/// Full application router with global middleware applied
pub fn app(state: AppState) -> Router {
    let cors = cors_layer(&state);
    let body_limit = state.config.api.max_request_size_bytes;
    let request_logging = state.config.api.enable_request_logging;

    let router = Router::new()
        // Public
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        .merge(public_routes())
        // Protected
        .nest("/system", system_routes(state.clone()))
        // Global middleware
        .layer(
            ServiceBuilder::new()
                .layer(cors)
                .layer(DefaultBodyLimit::max(body_limit)),
        );

    let router = if request_logging {
        router.layer(TraceLayer::new_for_http())
    } else {
        router
    };
    router.with_state(state)
}

fn public_routes() -> Router<AppState> {
    use handlers::public::{configurations, education, menu};

    Router::new()
        .route("/menu-items", get(menu::menu_tree))
        .route("/configurations/public", get(configurations::public_configurations))
        .route("/education", get(education::education_list))
        .route("/education/categories", get(education::education_categories))
}

fn system_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(menu_routes())
        .merge(configuration_routes())
        .merge(audit_routes())
        .merge(roles_permissions_routes())
        .merge(education_routes())
        .merge(user_routes())
        .route_layer(axum::middleware::from_fn_with_state(
            state,
            middleware::jwt_auth_middleware,
        ))
}

fn menu_routes() -> Router<AppState> {
    use handlers::system::menu;

    Router::new()
        .route("/menu/items", post(menu::item_create))
        .route("/menu/items/all", get(menu::items_all))
        .route("/menu/items/reorder", post(menu::items_reorder))
        .route(
            "/menu/items/:id",
            get(menu::item_show)
                .put(menu::item_update)
                .delete(menu::item_delete),
        )
}

fn configuration_routes() -> Router<AppState> {
    use handlers::system::configurations;

    Router::new()
        .route(
            "/configurations",
            get(configurations::configurations_index).post(configurations::configuration_store),
        )
        .route(
            "/configurations/bulk-update",
            post(configurations::configurations_bulk_update),
        )
        .route("/configurations/group/:group", get(configurations::configurations_group))
        .route(
            "/configurations/:id",
            get(configurations::configuration_show)
                .put(configurations::configuration_update)
                .delete(configurations::configuration_delete),
        )
}

fn audit_routes() -> Router<AppState> {
    use handlers::system::audit_log;

    Router::new()
        .route("/audit-log", get(audit_log::audit_index))
        .route("/audit-log/stats", get(audit_log::audit_stats))
}

fn roles_permissions_routes() -> Router<AppState> {
    use handlers::system::{permissions, roles};

    Router::new()
        .route(
            "/roles-permissions/roles",
            get(roles::roles_index).post(roles::role_store),
        )
        .route(
            "/roles-permissions/roles/:id",
            get(roles::role_show)
                .put(roles::role_update)
                .delete(roles::role_delete),
        )
        .route(
            "/roles-permissions/permissions",
            get(permissions::permissions_index).post(permissions::permission_store),
        )
        .route(
            "/roles-permissions/permissions/:id",
            get(permissions::permission_show)
                .put(permissions::permission_update)
                .delete(permissions::permission_delete),
        )
}

fn education_routes() -> Router<AppState> {
    use handlers::system::education;

    Router::new()
        .route(
            "/education",
            get(education::education_index).post(education::education_store),
        )
        .route("/education/bulk-action", post(education::education_bulk_action))
        .route(
            "/education/:id",
            get(education::education_show)
                .put(education::education_update)
                .delete(education::education_delete),
        )
        .route("/education/:id/view", post(education::education_view))
}

fn user_routes() -> Router<AppState> {
    use handlers::system::users;

    Router::new()
        .route("/users", get(users::users_index).post(users::user_store))
        .route("/users/stats", get(users::users_stats))
        .route("/users/bulk-action", post(users::users_bulk_action))
        .route(
            "/users/:id",
            get(users::user_show)
                .put(users::user_update)
                .delete(users::user_delete),
        )
        .route("/users/:id/toggle-status", post(users::user_toggle_status))
}

/// Permissive in development, configured origins elsewhere, closed when disabled
fn cors_layer(state: &AppState) -> CorsLayer {
    let security = &state.config.security;
    if !security.enable_cors {
        return CorsLayer::new();
    }
    if state.config.environment == Environment::Development {
        return CorsLayer::permissive();
    }

    let origins: Vec<HeaderValue> = security
        .cors_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods(Any)
        .allow_headers(Any)
}
