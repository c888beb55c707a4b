pub mod env;
pub mod tenants;

pub use env::*;
pub use tenants::*;
