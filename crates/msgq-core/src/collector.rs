//! Per-scrape collector tying source, parser and projector together.
//!
//! The metric shape is fixed: one `message_queue_length` gauge family with
//! `{message_queue_id, owner}` labels and one `message_queue_up` gauge. Each
//! scrape emits whatever queues are currently observed as ad hoc samples, so
//! nothing is registered or unregistered as queues come and go.

use std::fmt;
use std::time::Instant;

use prometheus_client::collector::Collector;
use prometheus_client::encoding::{DescriptorEncoder, EncodeMetric};
use prometheus_client::metrics::MetricType;
use prometheus_client::metrics::gauge::ConstGauge;
use prometheus_client::registry::Registry;
use tracing::{debug, error};

use crate::parser::QueueParser;
use crate::projector::{MetricSample, project};
use crate::source::SnapshotSource;

pub const LENGTH_METRIC: &str = "message_queue_length";
pub const LENGTH_HELP: &str = "length of the kernel message queue";
pub const UP_METRIC: &str = "message_queue_up";
pub const UP_HELP: &str = "was the last message queue scrape successful";

/// Outcome of a single scrape.
#[derive(Debug, Clone, PartialEq)]
pub struct Scrape {
    /// One sample per well-formed queue row, in report order.
    pub samples: Vec<MetricSample>,
    /// Whether the snapshot was obtained.
    pub up: bool,
}

impl Scrape {
    /// Value of the `up` gauge.
    pub fn up_value(&self) -> i64 {
        i64::from(self.up)
    }
}

/// Collects message queue metrics on every registry encode.
///
/// Holds no mutable state: liveness is derived from each scrape's own outcome,
/// so concurrent scrapes do not interfere.
#[derive(Debug)]
pub struct QueueCollector<S, P> {
    source: S,
    parser: P,
}

impl<S: SnapshotSource, P: QueueParser> QueueCollector<S, P> {
    pub fn new(source: S, parser: P) -> Self {
        Self { source, parser }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Runs one capture-parse-project cycle.
    ///
    /// A failed capture is logged and reported as `up == false` with no
    /// samples; it is never returned as an error.
    pub fn scrape(&self) -> Scrape {
        let started = Instant::now();

        let raw = match self.source.capture() {
            Ok(raw) => raw,
            Err(e) => {
                error!(error = %e, "cannot get message queues");
                return Scrape {
                    samples: Vec::new(),
                    up: false,
                };
            }
        };

        let samples: Vec<MetricSample> = project(self.parser.parse(&raw)).collect();

        debug!(
            queues = samples.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "message queue scrape complete"
        );

        Scrape { samples, up: true }
    }
}

impl<S, P> Collector for QueueCollector<S, P>
where
    S: SnapshotSource + 'static,
    P: QueueParser + fmt::Debug + 'static,
{
    fn encode(&self, mut encoder: DescriptorEncoder) -> Result<(), fmt::Error> {
        let scrape = self.scrape();

        if scrape.up {
            let mut family =
                encoder.encode_descriptor(LENGTH_METRIC, LENGTH_HELP, None, MetricType::Gauge)?;
            for sample in &scrape.samples {
                let metric = family.encode_family(&sample.labels)?;
                ConstGauge::new(sample.value).encode(metric)?;
            }
        }

        // Liveness always goes last.
        let up = ConstGauge::new(scrape.up_value());
        let metric = encoder.encode_descriptor(UP_METRIC, UP_HELP, None, up.metric_type())?;
        up.encode(metric)?;

        Ok(())
    }
}

/// Builds a registry exposing `collector` under `<namespace>_message_queue_*`.
///
/// An empty namespace leaves the metric names unprefixed.
pub fn new_registry<C: Collector>(namespace: &str, collector: C) -> Registry {
    let mut registry = if namespace.is_empty() {
        Registry::default()
    } else {
        Registry::with_prefix(namespace)
    };
    registry.register_collector(Box::new(collector));
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::IpcsParser;
    use crate::source::MockSource;
    use prometheus_client::encoding::text::encode;

    const HEADER: &str = "\n------ Message Queues --------\nkey msqid owner perms used-bytes messages\n";

    fn collector(source: MockSource) -> QueueCollector<MockSource, IpcsParser> {
        QueueCollector::new(source, IpcsParser::new())
    }

    fn render(source: MockSource) -> String {
        let registry = new_registry("nagios", collector(source));
        let mut out = String::new();
        encode(&mut out, &registry).unwrap();
        out
    }

    fn sample_lines(text: &str) -> Vec<&str> {
        text.lines()
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .collect()
    }

    #[test]
    fn test_scrape_single_queue() {
        let scrape =
            collector(MockSource::with_output(format!("{HEADER}0 101 alice 0 0 42\n"))).scrape();
        assert!(scrape.up);
        assert_eq!(scrape.samples.len(), 1);
        assert_eq!(scrape.samples[0].labels.message_queue_id, "101");
        assert_eq!(scrape.samples[0].labels.owner, "alice");
        assert_eq!(scrape.samples[0].value, 42.0);
    }

    #[test]
    fn test_scrape_skipped_rows_keep_up() {
        let five_fields = collector(MockSource::with_output(format!("{HEADER}0 101 alice 0 0\n")));
        let scrape = five_fields.scrape();
        assert!(scrape.up);
        assert!(scrape.samples.is_empty());

        let bad_number = collector(MockSource::with_output(format!(
            "{HEADER}0 101 alice 0 0 notanumber\n"
        )));
        let scrape = bad_number.scrape();
        assert!(scrape.up);
        assert!(scrape.samples.is_empty());
    }

    #[test]
    fn test_scrape_source_failure() {
        let c = collector(MockSource::failing());
        let scrape = c.scrape();
        assert!(!scrape.up);
        assert_eq!(scrape.up_value(), 0);
        assert!(scrape.samples.is_empty());
        assert_eq!(c.source().calls(), 1);
    }

    #[test]
    fn test_encode_typical() {
        let out = render(MockSource::typical_queues());
        let lines = sample_lines(&out);

        assert_eq!(lines.len(), 4);
        assert!(out.contains("# TYPE nagios_message_queue_length gauge"));
        assert!(
            out.contains(
                "nagios_message_queue_length{message_queue_id=\"32769\",owner=\"nagios\"} 42"
            ),
            "{out}"
        );
        assert!(
            out.contains(
                "nagios_message_queue_length{message_queue_id=\"65538\",owner=\"postgres\"} 3"
            ),
            "{out}"
        );
        assert_eq!(lines.last(), Some(&"nagios_message_queue_up 1"));
    }

    #[test]
    fn test_encode_failure_emits_only_up() {
        let out = render(MockSource::failing());
        assert_eq!(sample_lines(&out), vec!["nagios_message_queue_up 0"]);
        assert!(!out.contains("message_queue_length"));
    }

    #[test]
    fn test_encode_no_queues_emits_only_up() {
        let out = render(MockSource::no_queues());
        assert_eq!(sample_lines(&out), vec!["nagios_message_queue_up 1"]);
    }

    #[test]
    fn test_each_encode_scrapes_again() {
        let registry = new_registry("nagios", collector(MockSource::typical_queues()));
        let mut out = String::new();
        encode(&mut out, &registry).unwrap();
        out.clear();
        encode(&mut out, &registry).unwrap();
        assert_eq!(sample_lines(&out).len(), 4);
    }

    #[test]
    fn test_empty_namespace() {
        let registry = new_registry("", collector(MockSource::no_queues()));
        let mut out = String::new();
        encode(&mut out, &registry).unwrap();
        assert!(out.contains("\nmessage_queue_up 1") || out.starts_with("message_queue_up 1"));
    }
}
