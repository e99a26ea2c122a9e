pub mod catalog;
pub mod config;
pub mod embedding;
pub mod engine;
pub mod errors;
pub mod generation;
pub mod logging;
pub mod server;
pub mod vector;
