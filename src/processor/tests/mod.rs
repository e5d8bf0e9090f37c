//! Integration tests for the processor module
//!
//! Tests the complete processing pipeline over small trip datasets written
//! to temporary directories.


use std::fs;
use std::path::{Path, PathBuf};

pub const HEADER: &str = "ride_id,rideable_type,started_at,ended_at,start_station_name,start_station_id,end_station_name,end_station_id,member_casual";

/// Write a trip CSV with the published header
pub fn write_trip_file(dir: &Path, name: &str, rows: &[&str]) -> PathBuf {
    fs::create_dir_all(dir).unwrap();
    let path = dir.join(name);
    let mut content = String::from(HEADER);
    for row in rows {
        content.push('\n');
        content.push_str(row);
    }
    fs::write(&path, content).unwrap();
    path
}
