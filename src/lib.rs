pub mod api;
pub mod chain;
pub mod client;
pub mod config;
pub mod constants;
pub mod error;
pub mod game;
pub mod models;
pub mod services;
pub mod utils;
