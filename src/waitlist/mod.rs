pub mod handlers;
pub mod matcher;
pub mod models;
pub mod repository;
pub mod service;

pub use handlers::*;
pub use matcher::*;
pub use models::*;
pub use repository::*;
pub use service::*;

#[cfg(test)]
mod tests;
