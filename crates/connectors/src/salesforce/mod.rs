pub mod auth;
pub mod client;
pub mod query;

pub use auth::Credentials;
pub use client::{SalesforceConnector, SalesforceSession};
