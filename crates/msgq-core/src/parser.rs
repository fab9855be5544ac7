//! Parser for the `ipcs -q` message queue report.
//!
//! The report has a fixed three line header followed by one row per queue:
//!
//! ```text
//!
//! ------ Message Queues --------
//! key        msqid      owner      perms      used-bytes   messages
//! 0x1a2b3c4d 32769      nagios     660        4096         42
//! ```
//!
//! Row parsing is a pure function over `&str`, so it is tested with string
//! fixtures. Other backends can plug in their own [`QueueParser`].

use std::fmt;

use tracing::{trace, warn};

use crate::source::RawSnapshot;

/// One kernel message queue observed during a scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct QueueRecord {
    /// Queue identifier (`msqid`).
    pub id: String,
    pub owner: String,
    /// Number of messages currently in the queue.
    pub length: f64,
}

/// Why a report row was not turned into a [`QueueRecord`].
#[derive(Debug, Clone, PartialEq)]
pub enum RowError {
    /// Row did not split into the expected number of fields.
    FieldCount { expected: usize, found: usize },
    /// The `messages` column is not a finite, non-negative number.
    InvalidLength(String),
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowError::FieldCount { expected, found } => {
                write!(f, "expected {} fields, got {}", expected, found)
            }
            RowError::InvalidLength(value) => write!(f, "invalid queue length '{}'", value),
        }
    }
}

impl std::error::Error for RowError {}

/// Turns a raw snapshot into queue records.
///
/// The returned iterator is lazy and borrows the snapshot; malformed rows are
/// skipped rather than aborting the whole report.
pub trait QueueParser: Send + Sync {
    fn parse<'a>(&'a self, raw: &'a RawSnapshot) -> impl Iterator<Item = QueueRecord> + 'a;
}

/// Number of report header lines emitted by `ipcs -q`.
pub const IPCS_HEADER_LINES: usize = 3;

/// Number of columns in a well-formed `ipcs -q` row.
pub const IPCS_ROW_FIELDS: usize = 6;

const ID_FIELD: usize = 1;
const OWNER_FIELD: usize = 2;
const LENGTH_FIELD: usize = 5;

/// Parser for the Linux `ipcs -q` report format.
#[derive(Debug, Clone, Copy, Default)]
pub struct IpcsParser;

impl IpcsParser {
    pub fn new() -> Self {
        Self
    }
}

impl QueueParser for IpcsParser {
    fn parse<'a>(&'a self, raw: &'a RawSnapshot) -> impl Iterator<Item = QueueRecord> + 'a {
        raw.as_str()
            .lines()
            .enumerate()
            .skip(IPCS_HEADER_LINES)
            .filter_map(|(idx, line)| match parse_queue_row(line) {
                Ok(record) => Some(record),
                Err(e @ RowError::FieldCount { .. }) => {
                    trace!(line = idx + 1, error = %e, "skipping non-queue row");
                    None
                }
                Err(e) => {
                    warn!(line = idx + 1, error = %e, "cannot parse queue length, dropping row");
                    None
                }
            })
    }
}

/// Parses one `ipcs -q` row: `key msqid owner perms used-bytes messages`.
pub fn parse_queue_row(line: &str) -> Result<QueueRecord, RowError> {
    let fields: Vec<&str> = line.split_whitespace().collect();

    if fields.len() != IPCS_ROW_FIELDS {
        return Err(RowError::FieldCount {
            expected: IPCS_ROW_FIELDS,
            found: fields.len(),
        });
    }

    let raw_length = fields[LENGTH_FIELD];
    let length: f64 = raw_length
        .parse()
        .map_err(|_| RowError::InvalidLength(raw_length.to_string()))?;
    if !length.is_finite() || length < 0.0 {
        return Err(RowError::InvalidLength(raw_length.to_string()));
    }

    Ok(QueueRecord {
        id: fields[ID_FIELD].to_string(),
        owner: fields[OWNER_FIELD].to_string(),
        length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::mock::{EMPTY_IPCS_OUTPUT, TYPICAL_IPCS_OUTPUT};

    const HEADER: &str = "\n------ Message Queues --------\nkey msqid owner perms used-bytes messages\n";

    fn parse(text: &str) -> Vec<QueueRecord> {
        let raw = RawSnapshot::new(text);
        IpcsParser::new().parse(&raw).collect()
    }

    #[test]
    fn test_parse_queue_row_basic() {
        let record = parse_queue_row("0 101 alice 0 0 42").unwrap();
        assert_eq!(
            record,
            QueueRecord {
                id: "101".to_string(),
                owner: "alice".to_string(),
                length: 42.0,
            }
        );
    }

    #[test]
    fn test_parse_queue_row_wrong_field_count() {
        assert_eq!(
            parse_queue_row("0 101 alice 0 0"),
            Err(RowError::FieldCount {
                expected: 6,
                found: 5
            })
        );
        assert_eq!(
            parse_queue_row("0 101 alice 0 0 42 extra"),
            Err(RowError::FieldCount {
                expected: 6,
                found: 7
            })
        );
        assert!(matches!(
            parse_queue_row(""),
            Err(RowError::FieldCount { found: 0, .. })
        ));
    }

    #[test]
    fn test_parse_queue_row_invalid_length() {
        assert_eq!(
            parse_queue_row("0 101 alice 0 0 notanumber"),
            Err(RowError::InvalidLength("notanumber".to_string()))
        );
        assert_eq!(
            parse_queue_row("0 101 alice 0 0 -1"),
            Err(RowError::InvalidLength("-1".to_string()))
        );
        assert_eq!(
            parse_queue_row("0 101 alice 0 0 NaN"),
            Err(RowError::InvalidLength("NaN".to_string()))
        );
    }

    #[test]
    fn test_single_queue() {
        let records = parse(&format!("{HEADER}0 101 alice 0 0 42\n"));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "101");
        assert_eq!(records[0].owner, "alice");
        assert_eq!(records[0].length, 42.0);
    }

    #[test]
    fn test_five_field_row_skipped() {
        assert!(parse(&format!("{HEADER}0 101 alice 0 0\n")).is_empty());
    }

    #[test]
    fn test_bad_number_dropped_and_parsing_continues() {
        let records = parse(&format!(
            "{HEADER}0 101 alice 0 0 notanumber\n0 102 bob 0 0 7\n"
        ));
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, "102");
        assert_eq!(records[0].length, 7.0);
    }

    #[test]
    fn test_header_always_skipped() {
        // Header rows that happen to have six fields are never records.
        let text = "a b c d e 1\na b c d e 2\na b c d e 3\n0 101 alice 0 0 4\n";
        let records = parse(text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].length, 4.0);
    }

    #[test]
    fn test_short_input_yields_nothing() {
        assert!(parse("").is_empty());
        assert!(parse("only one line").is_empty());
        assert!(parse("\n------ Message Queues --------\n").is_empty());
    }

    #[test]
    fn test_typical_output() {
        let records = parse(TYPICAL_IPCS_OUTPUT);
        let ids: Vec<&str> = records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["0", "32769", "65538"]);
        assert_eq!(records[1].owner, "nagios");
        assert_eq!(records[1].length, 42.0);
        assert_eq!(records[2].owner, "postgres");
        assert_eq!(records[2].length, 3.0);
    }

    #[test]
    fn test_empty_output() {
        assert!(parse(EMPTY_IPCS_OUTPUT).is_empty());
    }

    #[test]
    fn test_duplicates_and_order_preserved() {
        let records = parse(&format!(
            "{HEADER}0 9 zed 0 0 1\n0 1 amy 0 0 2\n0 9 zed 0 0 3\n"
        ));
        let lengths: Vec<f64> = records.iter().map(|r| r.length).collect();
        assert_eq!(lengths, vec![1.0, 2.0, 3.0]);
        assert_eq!(records[0].id, records[2].id);
    }

    #[test]
    fn test_count_matches_valid_rows() {
        let text = format!(
            "{HEADER}0 1 a 0 0 1\n\n0 2 b 0 0\n0 3 c 0 0 x\n0 4 d 0 0 4.5\n   \n0 5 e 0 0 0\n"
        );
        assert_eq!(parse(&text).len(), 3);
    }

    #[test]
    fn test_parse_is_idempotent() {
        let raw = RawSnapshot::new(TYPICAL_IPCS_OUTPUT);
        let parser = IpcsParser::new();
        let first: Vec<_> = parser.parse(&raw).collect();
        let second: Vec<_> = parser.parse(&raw).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn test_crlf_line_endings() {
        let records = parse("h1\r\nh2\r\nh3\r\n0 101 alice 0 0 42\r\n");
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].length, 42.0);
    }
}
