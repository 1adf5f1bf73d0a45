pub mod audio_driver;
pub mod flush_sink;
