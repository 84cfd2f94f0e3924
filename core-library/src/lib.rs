//! # Core Library
//!
//! Book and chapter models plus the [`CatalogSource`] contract the playback
//! core reads them through.
//!
//! ## Modules
//!
//! - `models`: `Book` and `Chapter`, serialized in the catalog's camelCase
//!   record format
//! - `catalog`: the async `CatalogSource` trait and `InMemoryCatalog`
//! - `error`: `LibraryError`

pub mod catalog;
pub mod error;
pub mod models;

pub use catalog::{CatalogSource, InMemoryCatalog};
pub use error::{LibraryError, Result};
pub use models::{Book, Chapter};
