// handlers/system/mod.rs - System handlers (JWT authentication required)
//
// Route Prefix: /system/*
// Middleware: jwt_auth_middleware injects AuthUser; writes pick it up
// through the AuditContext extractor.

pub mod audit_log;
pub mod configurations;
pub mod education;
pub mod menu;
pub mod permissions;
pub mod roles;
pub mod users;
