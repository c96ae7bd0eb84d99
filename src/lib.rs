pub mod auth;
pub mod cli;
pub mod config;
pub mod database;
pub mod entity;
pub mod error;
pub mod filter;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod validation;

pub use routes::{app, AppState};
