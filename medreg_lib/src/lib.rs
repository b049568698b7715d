//! Library layer for medreg: locating drug-registry records across national portals.
//!
//! Wraps the `medreg_api` transport with per-country adapters. Static registries
//! are fetched and parsed directly; client-rendered registries are driven through
//! an injected browser-automation runtime.

pub mod adapters;
pub mod browser;
pub mod document;
pub mod error;
pub mod normalize;
pub mod query;
pub mod selector;
pub mod settings;
pub mod validation;

pub use medreg_api;
pub use medreg_api::types;
pub use medreg_api::types::SearchResult;

pub use adapters::{AdapterKind, Country, Dispatcher, RegistryAdapter};
pub use error::{ErrorKind, SearchError};
pub use query::SearchQuery;
pub use settings::Settings;
