pub mod errors;
pub mod observability;
pub mod openapi;
pub mod representation;
pub mod response;
pub mod routes;
pub mod startup;

pub use startup::{build_app, run};
