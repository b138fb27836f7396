pub mod app;
pub mod blizzard;
pub mod cli;
pub mod config;
pub mod data;
pub mod logging;
pub mod pipeline;
pub mod utils;
