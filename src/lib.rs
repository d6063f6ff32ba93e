pub mod assistant;
pub mod config;
pub mod error;
pub mod middleware;
pub mod secrets;
pub mod session;
pub mod store;
pub mod types;

pub use error::{MiddlewareError, RemoteError, Result};
pub use middleware::{BotWorker, Hooks, Outcome, WatsonMiddleware};
