pub mod catalog;
pub mod config;
pub mod directory;
pub mod error;
pub mod favorites;
pub mod platform;
pub mod playback;
pub mod resolve;
pub mod station;
