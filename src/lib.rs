pub mod cli;
pub mod commands;
pub mod config;
pub mod media;
pub mod openai;
pub mod pipeline;
pub mod store;
