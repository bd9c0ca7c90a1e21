//! Configuration value objects

mod app_config;

pub use app_config::{
    is_valid_sample_buffer_len, AppConfig, DEFAULT_SAMPLE_BUFFER_LEN, DEFAULT_TICK_INTERVAL_MS,
    SAMPLE_BUFFER_RANGE, TICK_INTERVAL_RANGE_MS,
};
