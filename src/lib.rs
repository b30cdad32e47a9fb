pub mod cli;
pub mod config;
pub mod error;
pub mod models;
pub mod pipeline;
pub mod siconfi;
pub mod telemetry;
