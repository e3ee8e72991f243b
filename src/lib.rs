//! Chore board: household chore tracking client.

pub mod api;
pub mod app;
pub mod commands;
pub mod config;
pub mod error;
pub mod model;
pub mod push;
pub mod render;
pub mod session;
pub mod sync;
pub mod view;
