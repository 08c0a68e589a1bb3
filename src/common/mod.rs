pub mod logging_setup;
pub mod timestamp_utils;
