use chrono::Utc;

// Frame time in microseconds since the Unix epoch. Zero is reserved for "no frame".
pub fn frame_time_micros() -> u64 {
    Utc::now().timestamp_micros().max(1) as u64
}
