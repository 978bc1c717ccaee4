// handlers/public/mod.rs - Public handlers (no authentication required)
//
// Account creation and token acquisition. No middleware layers.
pub mod auth;
