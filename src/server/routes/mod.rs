//! HTTP route modules

pub mod admin;
pub mod completions;
pub mod health;
