pub mod bot;
pub mod config;
pub mod log;
pub mod safety;
pub mod selector;
pub mod settings;
pub mod source;
pub mod state;
