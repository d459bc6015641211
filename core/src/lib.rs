pub mod export;
pub mod import;
pub mod metrics;
pub mod models;
pub mod store;
pub mod tracker;
