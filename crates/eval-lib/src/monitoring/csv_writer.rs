//! CSV serialization of history records

use crate::error::Result;
use crate::models::HistoryRecord;
use chrono::{Local, TimeZone};
use serde_json::Value;
use std::io::{self, Write};
use tracing::warn;

/// Render a Unix timestamp as local `YYYY-MM-DD HH:MM:SS`
pub fn format_clock(clock: i64) -> Option<String> {
    Local
        .timestamp_opt(clock, 0)
        .single()
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
}

fn render_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Write `records` as CSV and return the number of data rows
///
/// The header is the field set of the first record. Every field is written
/// verbatim except `clock`, which becomes a local timestamp.
pub fn write_history_csv<W: Write>(records: &[HistoryRecord], writer: W) -> Result<usize> {
    let Some(first) = records.first() else {
        let err = io::Error::new(io::ErrorKind::InvalidInput, "no history records to write");
        return Err(err.into());
    };
    let header: Vec<&String> = first.fields().keys().collect();

    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(header.iter().map(|k| k.as_str()))?;

    for record in records {
        let row: Vec<String> = header
            .iter()
            .map(|key| {
                let value = record.fields().get(key.as_str()).unwrap_or(&Value::Null);
                if key.as_str() == "clock" {
                    if let Some(formatted) = record.clock().and_then(format_clock) {
                        return formatted;
                    }
                    warn!(clock = %value, "Unparsable clock value written verbatim");
                }
                render_value(value)
            })
            .collect();
        csv.write_record(&row)?;
    }

    csv.flush()?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> HistoryRecord {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_write_rows_with_formatted_clock() {
        let records = vec![
            record(json!({"itemid": "28778", "clock": "1500000000", "value": "0.25", "ns": "1"})),
            record(json!({"itemid": "28778", "clock": "1500000060", "value": "0.5", "ns": "2"})),
        ];
        let mut out = Vec::new();

        let rows = write_history_csv(&records, &mut out).unwrap();

        assert_eq!(rows, 2);
        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "itemid,clock,value,ns");
        assert_eq!(
            lines[1],
            format!("28778,{},0.25,1", format_clock(1_500_000_000).unwrap())
        );
    }

    #[test]
    fn test_non_string_values_and_missing_fields() {
        let records = vec![
            record(json!({"clock": 1500000000, "value": 1.5, "tag": null})),
            record(json!({"clock": "1500000001", "value": 2})),
        ];
        let mut out = Vec::new();

        write_history_csv(&records, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[0], "clock,value,tag");
        assert!(lines[1].ends_with(",1.5,"));
        assert!(lines[2].ends_with(",2,"));
    }

    #[test]
    fn test_unparsable_clock_is_kept() {
        let records = vec![record(json!({"clock": "yesterday", "value": "1"}))];
        let mut out = Vec::new();

        write_history_csv(&records, &mut out).unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().nth(1), Some("yesterday,1"));
    }

    #[test]
    fn test_empty_records_rejected() {
        let mut out = Vec::new();
        assert!(write_history_csv(&[], &mut out).is_err());
        assert!(out.is_empty());
    }

    #[test]
    fn test_format_clock_shape() {
        let formatted = format_clock(0).unwrap();
        assert_eq!(formatted.len(), "1970-01-01 00:00:00".len());
        assert_eq!(&formatted[4..5], "-");
        assert_eq!(&formatted[13..14], ":");
    }
}
