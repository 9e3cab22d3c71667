//! Server side of the board: ordered store, ownership-checked service
//! operations, and the authenticated HTTP surface.
//!
//! - [`db`]: SQLite persistence of projects, lists, and tasks
//! - [`service`]: ownership checks, position assignment, move persistence
//! - [`auth`]: bearer-token extraction and identity providers
//! - [`api`]: axum handlers and error mapping
//! - [`server`]: router assembly and server start

pub mod api;
pub mod auth;
pub mod db;
pub mod models;
pub mod server;
pub mod service;
