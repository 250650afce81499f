pub mod cli;
pub mod config;
pub mod error;
pub mod fetch;
pub mod load_config;
pub mod package;
pub mod pipeline;
pub mod publish;
pub mod stamp;
pub mod store;
