//! Shoebox: a local-first photo organizer.
//!
//! Photos are copied into managed storage under a data directory and
//! recorded in a SQLite catalog, where they can be tagged, grouped into
//! albums, searched by tag and exported as zip archives. Photos can also be
//! pulled from a remote photo library after an OAuth authorization.
//!
//! [`commands::Commands`] is the entry point for a UI shell; the services
//! underneath borrow an explicit [`db::Catalog`] and [`storage::Storage`].

pub mod albums;
pub mod commands;
pub mod config;
pub mod db;
pub mod error;
pub mod export;
pub mod images;
pub mod import;
pub mod logging;
pub mod photos_api;
pub mod search;
pub mod storage;
pub mod tags;
pub mod thumbnails;

pub use commands::{CommandResponse, Commands};
pub use config::Config;
pub use db::Catalog;
pub use error::{Error, Result};
pub use storage::Storage;
