pub mod aggregate;
pub mod analyze;
pub mod cancel;
pub mod cli;
pub mod config;
pub mod discovery;
pub mod error;
pub mod git;
pub mod hosting;
pub mod model;
pub mod pipeline;
pub mod pulls;
pub mod render;
