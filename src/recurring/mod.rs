pub mod generator;
pub mod handlers;
pub mod models;
pub mod repository;
pub mod service;

pub use generator::*;
pub use handlers::*;
pub use models::*;
pub use repository::*;
pub use service::*;

#[cfg(test)]
mod tests;
