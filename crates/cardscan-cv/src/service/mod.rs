//! Session bookkeeping and asynchronous orchestration

pub mod config;
pub mod orchestrator;
pub mod store;

pub use config::ServiceConfig;
pub use orchestrator::CardDetectionService;
pub use store::SessionStore;
