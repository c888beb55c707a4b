//! HTTP handlers for tenant administration.

pub mod admin;
pub use admin::*;
