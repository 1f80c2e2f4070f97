// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Read-only endpoints consumed by the site frontend.

pub mod configurations;
pub mod education;
pub mod menu;
