pub mod channels;
pub mod dispatcher;
pub mod handlers;
pub mod realtime;
pub mod repository;
pub mod templates;

pub use channels::*;
pub use dispatcher::*;
pub use handlers::*;
pub use realtime::*;
pub use repository::*;
pub use templates::*;
