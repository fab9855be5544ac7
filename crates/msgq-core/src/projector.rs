//! Maps queue records to labeled gauge samples.

use prometheus_client::encoding::EncodeLabelSet;

use crate::parser::QueueRecord;

/// Label set identifying one queue in `message_queue_length`.
#[derive(Debug, Clone, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct QueueLabels {
    pub message_queue_id: String,
    pub owner: String,
}

/// One `message_queue_length` sample.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSample {
    pub labels: QueueLabels,
    pub value: f64,
}

impl From<QueueRecord> for MetricSample {
    fn from(record: QueueRecord) -> Self {
        Self {
            labels: QueueLabels {
                message_queue_id: record.id,
                owner: record.owner,
            },
            value: record.length,
        }
    }
}

/// Projects records one to one, in order.
///
/// Records sharing an `(id, owner)` pair are not merged: each yields its own
/// sample, and the scraper decides what to do with duplicate series.
pub fn project<I>(records: I) -> impl Iterator<Item = MetricSample>
where
    I: IntoIterator<Item = QueueRecord>,
{
    records.into_iter().map(MetricSample::from)
}
