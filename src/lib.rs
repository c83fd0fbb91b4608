//! readwise-notion-sync: incrementally mirror Readwise highlights into a
//! Notion database.

pub mod commands;
pub mod config;
pub mod destination;
pub mod error;
pub mod http;
pub mod models;
pub mod progress;
pub mod source;
pub mod state;
pub mod sync;

pub use error::{Error, Result};
