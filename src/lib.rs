pub mod api;
pub mod app;
pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod images;
pub mod middleware;
pub mod pagination;
pub mod realtime;
pub mod services;
pub mod state;
pub mod validation;
