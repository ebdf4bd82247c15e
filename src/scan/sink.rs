use crate::scan::record::PhotoRecord;

/// Receives each kept record as soon as it is complete.
pub trait RecordSink: Send + Sync {
    fn render(&self, record: &PhotoRecord);
}

/// Writes a one-record summary to the log.
#[derive(Debug, Default)]
pub struct TracingSink;

impl RecordSink for TracingSink {
    fn render(&self, record: &PhotoRecord) {
        let id = record.image.as_ref().map(|i| i.id.as_str()).unwrap_or("-");
        tracing::info!(
            "#{} photo {} ({} detail group(s))",
            record.sequence_number,
            id,
            record.details.len()
        );
        for (label, value) in record.details.iter().flat_map(|g| g.iter()) {
            tracing::info!("  {}: {}", label, value);
        }
        if let Some(location) = &record.location {
            tracing::info!("  map: {}", location.map_url);
        }
        if let Some(description) = record.description() {
            tracing::info!("  description: {}", description);
        }
    }
}

impl<T: RecordSink + ?Sized> RecordSink for std::sync::Arc<T> {
    fn render(&self, record: &PhotoRecord) {
        (**self).render(record)
    }
}
