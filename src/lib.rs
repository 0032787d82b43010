pub mod actors;
pub mod audit;
pub mod config;
pub mod domain;
pub mod messaging;
pub mod metrics;
pub mod notifications;
pub mod reconcile;
pub mod store;
pub mod utils;
