pub mod analysis;
pub mod config;
pub mod errors;
pub mod logging;
pub mod runner;
pub mod store;
