pub mod api;
pub mod config;
pub mod health;
pub mod humanize;
pub mod logs;
pub mod observability;
