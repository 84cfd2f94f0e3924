//! Desktop implementations of the bridge traits.
//!
//! Hosts running on a regular OS with network access can use these instead
//! of providing their own. Enabled in `core-runtime` through the
//! `desktop-shims` feature.

mod http;

pub use http::ReqwestHttpClient;
