pub mod cdf;
pub mod error;
pub mod salesforce;
pub mod source;
