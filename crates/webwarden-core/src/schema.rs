/// Arrow schema for the block ledger, used for tabular export and display.
pub mod ledger {
    use std::sync::Arc;

    use arrow::array::{BooleanArray, StringArray, TimestampMicrosecondArray};
    use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
    use arrow::error::ArrowError;
    use arrow::record_batch::RecordBatch;

    use crate::BlockedDomainEntry;

    /// Schema for `blocked_domains` rows.
    pub fn blocked_domains_schema() -> Schema {
        Schema::new(vec![
            Field::new("user_id", DataType::Utf8, false),
            Field::new("domain", DataType::Utf8, false),
            Field::new("original_category", DataType::Utf8, true),
            Field::new(
                "blocked_at",
                DataType::Timestamp(TimeUnit::Microsecond, Some("UTC".into())),
                false,
            ),
            Field::new("is_manual", DataType::Boolean, false),
            Field::new("notes", DataType::Utf8, false),
        ])
    }

    /// Build one RecordBatch from ledger entries, preserving their order.
    pub fn blocked_domains_batch(entries: &[BlockedDomainEntry]) -> Result<RecordBatch, ArrowError> {
        let user_ids: StringArray = entries.iter().map(|e| Some(e.user_id.as_str())).collect();
        let domains: StringArray = entries.iter().map(|e| Some(e.domain.as_str())).collect();
        let categories: StringArray = entries
            .iter()
            .map(|e| e.original_category.as_deref())
            .collect();
        let blocked_at = TimestampMicrosecondArray::from(
            entries
                .iter()
                .map(|e| e.blocked_at.timestamp_micros())
                .collect::<Vec<_>>(),
        )
        .with_timezone("UTC");
        let manual: BooleanArray = entries.iter().map(|e| Some(e.is_manual)).collect();
        let notes: StringArray = entries.iter().map(|e| Some(e.notes.as_str())).collect();

        RecordBatch::try_new(
            Arc::new(blocked_domains_schema()),
            vec![
                Arc::new(user_ids),
                Arc::new(domains),
                Arc::new(categories),
                Arc::new(blocked_at),
                Arc::new(manual),
                Arc::new(notes),
            ],
        )
    }
}

#[cfg(test)]
mod tests {
    use super::ledger;
    use crate::BlockedDomainEntry;
    use arrow::array::{Array, StringArray};
    use chrono::Utc;

    #[test]
    fn blocked_domains_schema_has_expected_fields() {
        let schema = ledger::blocked_domains_schema();
        assert_eq!(schema.fields().len(), 6);
        assert!(schema.field_with_name("domain").is_ok());
        assert!(schema.field_with_name("original_category").unwrap().is_nullable());
    }

    #[test]
    fn batch_from_entries() {
        let now = Utc::now();
        let entries = vec![
            BlockedDomainEntry::classified("u1", "game-site.com", "Games", now),
            BlockedDomainEntry::manual("u1", "casino.com", "", now),
        ];

        let batch = ledger::blocked_domains_batch(&entries).unwrap();
        assert_eq!(batch.num_rows(), 2);

        let categories = batch
            .column(2)
            .as_any()
            .downcast_ref::<StringArray>()
            .unwrap();
        assert_eq!(categories.value(0), "Games");
        assert!(categories.is_null(1));
    }

    #[test]
    fn empty_batch() {
        let batch = ledger::blocked_domains_batch(&[]).unwrap();
        assert_eq!(batch.num_rows(), 0);
        assert_eq!(batch.num_columns(), 6);
    }
}
