//! Terminal client for a remote to-do list service.

pub mod api;
pub mod commands;
pub mod config;
pub mod controller;
pub mod error;
pub mod session;
pub mod state;
pub mod storage;
pub mod task;
pub mod theme;
pub mod ui;

pub use api::{HttpTaskApi, TaskApi};
pub use controller::{Controller, Message, Timing};
pub use error::ClientError;
