pub mod audio_models;
pub mod config;
pub mod error;
pub mod session_metadata;
pub mod state;
pub mod status;
