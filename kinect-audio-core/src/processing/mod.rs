pub mod rate_meter;
pub mod sample_buffer;
pub mod sample_format;
