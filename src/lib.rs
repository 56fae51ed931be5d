pub mod cli;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod locale;
pub mod logging;
pub mod models;
pub mod navigator;
pub mod sequencer;
pub mod session;
pub mod settings;
pub mod state;
pub mod sync;
pub mod ui;
pub mod viewport;
