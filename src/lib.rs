pub mod color;
pub mod config;
pub mod error;
pub mod grid;
pub mod message_handler;
pub mod model;
pub mod mqtt_client;
pub mod server;
pub mod state;
pub mod view;

pub use config::RunningConfig;
pub use state::State;
