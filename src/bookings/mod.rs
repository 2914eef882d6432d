pub mod capacity;
pub mod handlers;
pub mod models;
pub mod payment;
pub mod price_calculator;
pub mod repository;
pub mod service;
pub mod status_machine;

pub use capacity::*;
pub use handlers::*;
pub use models::*;
pub use payment::*;
pub use price_calculator::*;
pub use repository::*;
pub use service::*;
pub use status_machine::*;

#[cfg(test)]
mod tests;
