pub mod app;
pub mod audio;
pub mod catalog;
pub mod config;
pub mod core;
pub mod error;
pub mod events;
pub mod library;
pub mod logging;
pub mod media;
pub mod model;
pub mod queue;
pub mod store;
pub mod transport;
pub mod ui;
