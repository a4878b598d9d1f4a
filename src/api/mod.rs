//! REST access to the finance API.

mod client;
mod endpoint;
pub mod types;

pub use client::{ApiClient, HttpRemote};
pub use endpoint::{EditRoute, Endpoint, FieldMap};
