pub mod models;
pub mod repository;
pub mod scheduler;

pub use models::*;
pub use repository::*;
pub use scheduler::*;
