use anyhow::Result;
use chrono::{DateTime, Utc};

use super::{Field, FieldValues, Frame, FrameMeta, NavigationLink, Scalar, RAW_VALUE};
use crate::decode::SearchResultMetadata;

/// Parse a decimal nanosecond timestamp. Malformed or out-of-range input
/// yields the unix epoch.
pub fn parse_start_time(nanos: &str) -> DateTime<Utc> {
    nanos
        .trim()
        .parse::<u64>()
        .ok()
        .and_then(|n| i64::try_from(n).ok())
        .map_or(DateTime::UNIX_EPOCH, DateTime::from_timestamp_nanos)
}

/// Parse a decimal nanosecond duration. Malformed input yields zero.
pub fn parse_duration_nanos(nanos: &str) -> u64 {
    nanos.trim().parse().unwrap_or(0)
}

/// `service path:line`, leaving out the parts the hit does not carry.
fn location(result: &SearchResultMetadata) -> String {
    let mut location = String::new();
    if !result.service_name.is_empty() {
        location.push_str(&result.service_name);
        location.push(' ');
    }
    location.push_str(&result.file_path);
    if result.line_no != 0 {
        location.push_str(&format!(":{}", result.line_no));
    }
    location.trim_start().to_string()
}

/// One row per search hit, newest first.
pub fn search_frame(results: &[SearchResultMetadata]) -> Result<Frame> {
    let mut frame = Frame::new(
        "Search",
        vec![
            Field::new("snapshotID", FieldValues::String(Vec::new()))
                .with_label("Snapshot ID")
                .with_link(NavigationLink::new(
                    &format!("Snapshot: {RAW_VALUE}"),
                    "byid",
                    RAW_VALUE,
                )),
            Field::new("location", FieldValues::String(Vec::new())).with_label("Snapshot Location"),
            Field::new("startTime", FieldValues::Time(Vec::new())).with_label("Start time"),
            Field::new("duration", FieldValues::Uint64(Vec::new()))
                .with_label("Duration")
                .with_unit("ns"),
        ],
        FrameMeta::table(),
    );

    let mut start_times = Vec::with_capacity(results.len());
    for result in results {
        let start = parse_start_time(&result.start_time_unix_nano);
        start_times.push(start);

        frame.append_row(vec![
            Scalar::String(result.snapshot_id.clone()),
            Scalar::String(location(result)),
            Scalar::Time(start),
            Scalar::Uint64(parse_duration_nanos(&result.duration_nano)),
        ])?;
    }

    // Stable, so hits with equal start times keep backend order.
    let mut order: Vec<usize> = (0..start_times.len()).collect();
    order.sort_by(|&a, &b| start_times[b].cmp(&start_times[a]));
    frame.reorder_rows(&order);

    Ok(frame)
}
