//! Port traits: the boundaries between the domain and the outside world.

pub mod config_port;
pub mod data_port;
pub mod progress_port;
