//! Foundational low-level utilities shared across Quay crates.
//!
//! Provides the atomic file-write helper used by the durable state stores and
//! time helpers for retry-record timestamps.

pub mod atomic_io;
pub mod time_utils;

pub use atomic_io::write_text_atomic;
pub use time_utils::{current_unix_timestamp_ms, format_unix_ms_rfc3339};

#[cfg(test)]
mod tests {
    use std::fs::read_to_string;

    use super::*;

    #[test]
    fn unit_write_text_atomic_writes_content() {
        let tempdir = tempfile::tempdir().expect("tempdir");
        let path = tempdir.path().join("state.json");
        write_text_atomic(&path, "{\"ok\":true}").expect("write");
        assert_eq!(read_to_string(&path).expect("read"), "{\"ok\":true}");
    }

    #[test]
    fn unit_current_timestamp_renders_as_utc_rfc3339() {
        let rendered = format_unix_ms_rfc3339(current_unix_timestamp_ms());
        assert!(rendered.ends_with('Z'));
    }
}
