pub mod apis;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod pipeline;
pub mod storage;
pub mod types;

// Layered boundaries for application and infrastructure
pub mod app;
pub mod infra;
