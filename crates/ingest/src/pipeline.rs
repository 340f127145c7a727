//! Ingestion Pipeline Implementation

use crate::decode::{decode_archive, parse_csv, FileKind};
use crate::report::{FileSummary, IngestionReport};
use crate::IngestError;
use chrono::{DateTime, Utc};
use feature_engine::{FeatureConfig, FeatureError, WindowConfig, WindowedSeries};
use metrics::counter;
use record_builder::{BuilderConfig, RawTable, RecordBuilder, TableFeatures};
use serde::Serialize;
use tracing::{debug, info, warn};

/// One uploaded payload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    /// Client-supplied file name
    pub name: String,
    /// Raw payload
    pub bytes: Vec<u8>,
}

impl UploadedFile {
    /// Create an uploaded file
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            bytes: bytes.into(),
        }
    }
}

/// Per-file processing state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileState {
    Received,
    Decoding,
    Ingesting,
    Done,
    Failed,
}

impl FileState {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Received => "received",
            FileState::Decoding => "decoding",
            FileState::Ingesting => "ingesting",
            FileState::Done => "done",
            FileState::Failed => "failed",
        }
    }
}

/// Default cap on the decompressed size of one archive entry
pub const DEFAULT_MAX_ENTRY_BYTES: u64 = 100 * 1024 * 1024;

/// Decodes uploads and turns every table row into a record or an alert
pub struct IngestPipeline {
    features: FeatureConfig,
    window: WindowConfig,
    builder: RecordBuilder,
    max_entry_bytes: u64,
}

impl IngestPipeline {
    /// Create a pipeline; rejects window parameters that can never produce a statistic
    pub fn new(features: FeatureConfig, builder: BuilderConfig) -> Result<Self, FeatureError> {
        let window = features.window_config();
        window.validate()?;

        info!(
            "Creating ingest pipeline: window={}, threshold={}, tracked={:?}",
            window.window, features.threshold, features.tracked_columns
        );

        Ok(Self {
            builder: RecordBuilder::new(builder, &features),
            features,
            window,
            max_entry_bytes: DEFAULT_MAX_ENTRY_BYTES,
        })
    }

    /// Cap the decompressed size of each archive entry
    pub fn with_max_entry_bytes(mut self, limit: u64) -> Self {
        self.max_entry_bytes = limit;
        self
    }

    /// Column whose oscillator drives the signal
    pub fn signal_column(&self) -> &str {
        &self.features.signal_column
    }

    /// Ingest files strictly in submission order
    pub fn ingest(&self, files: &[UploadedFile], now: DateTime<Utc>) -> IngestionReport {
        let mut report = IngestionReport::new();

        for file in files {
            self.ingest_file(file, now, &mut report);
        }

        info!(
            "Batch {} ingested: {} files, {} records, {} alerts",
            report.batch_id,
            files.len(),
            report.records.len(),
            report.alerts.len()
        );
        counter!("ingest_records_total").increment(report.records.len() as u64);
        counter!("ingest_alerts_total").increment(report.alerts.len() as u64);

        report
    }

    fn ingest_file(&self, file: &UploadedFile, now: DateTime<Utc>, report: &mut IngestionReport) {
        let name = base_name(&file.name);
        let mut summary = FileSummary::new(name.clone());
        let records_before = report.records.len();
        let alerts_before = report.alerts.len();

        transition(&mut summary, FileState::Decoding);
        let result = match FileKind::from_name(&name) {
            FileKind::Table => self.ingest_csv(&name, &file.bytes, now, report, &mut summary),
            FileKind::Archive => self.ingest_archive(&name, &file.bytes, now, report, &mut summary),
            FileKind::Unsupported => Err(IngestError::UnsupportedFile(name.clone())),
        };

        match result {
            Ok(()) => transition(&mut summary, FileState::Done),
            Err(e) => {
                warn!("{}", e);
                report.alerts.push(e);
                transition(&mut summary, FileState::Failed);
            }
        }

        summary.records = report.records.len() - records_before;
        summary.alerts = report.alerts.len() - alerts_before;
        counter!("ingest_files_total", "outcome" => summary.state.as_str()).increment(1);
        report.files.push(summary);
    }

    fn ingest_csv(
        &self,
        name: &str,
        bytes: &[u8],
        now: DateTime<Utc>,
        report: &mut IngestionReport,
        summary: &mut FileSummary,
    ) -> Result<(), IngestError> {
        let table = parse_csv(bytes).map_err(|e| IngestError::MalformedInput {
            file: name.to_string(),
            reason: e.to_string(),
        })?;

        transition(summary, FileState::Ingesting);
        self.ingest_table(name, &table, now, report);
        summary.tables += 1;
        Ok(())
    }

    fn ingest_archive(
        &self,
        name: &str,
        bytes: &[u8],
        now: DateTime<Utc>,
        report: &mut IngestionReport,
        summary: &mut FileSummary,
    ) -> Result<(), IngestError> {
        let entries =
            decode_archive(bytes, self.max_entry_bytes).map_err(|e| IngestError::CorruptArchive {
                file: name.to_string(),
                reason: e.to_string(),
            })?;

        if entries.is_empty() {
            return Err(IngestError::EmptyArchive(name.to_string()));
        }

        transition(summary, FileState::Ingesting);
        for entry in entries {
            let parsed = entry.contents.and_then(|contents| parse_csv(&contents));
            match parsed {
                Ok(table) => {
                    let source = format!("{}!{}", name, entry.name);
                    self.ingest_table(&source, &table, now, report);
                    summary.tables += 1;
                }
                Err(e) => {
                    let alert = IngestError::EntryFailed {
                        file: name.to_string(),
                        entry: entry.name,
                        reason: e.to_string(),
                    };
                    warn!("{}", alert);
                    report.alerts.push(alert);
                }
            }
        }

        Ok(())
    }

    /// Run the feature transform and record builder over one table.
    ///
    /// Returns the number of records built.
    pub fn ingest_table(
        &self,
        source: &str,
        table: &RawTable,
        now: DateTime<Utc>,
        report: &mut IngestionReport,
    ) -> usize {
        let features = self.table_features(table);
        let mut built = 0;

        for row in table.rows() {
            match self.builder.build(row, &features, now) {
                Ok(record) => {
                    report.records.push(record);
                    built += 1;
                }
                Err(reason) => {
                    let alert = IngestError::RowRejected {
                        source_name: source.to_string(),
                        row: row.index() + 1,
                        reason,
                    };
                    warn!("{}", alert);
                    report.alerts.push(alert);
                }
            }
        }

        debug!("Table {}: {} of {} rows built", source, built, table.len());
        built
    }

    /// Windowed series for each tracked column present in the table
    pub fn table_features(&self, table: &RawTable) -> TableFeatures {
        let mut features = TableFeatures::new();

        for column in &self.features.tracked_columns {
            let Some(series) = table.numeric_column(column) else {
                continue;
            };
            match WindowedSeries::compute(&series, &self.window) {
                Ok(windowed) => {
                    features.insert(column.clone(), windowed);
                }
                Err(e) => warn!("Skipping features for '{}': {}", column, e),
            }
        }

        features
    }
}

fn transition(summary: &mut FileSummary, next: FileState) {
    debug!("{}: {} -> {}", summary.file, summary.state.as_str(), next.as_str());
    summary.state = next;
}

/// Strip any client-side directory from an upload name
fn base_name(raw: &str) -> String {
    let name = raw.rsplit(['/', '\\']).next().unwrap_or(raw).trim();
    if name.is_empty() {
        "upload".to_string()
    } else {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::tests::{with_compression_method, zip_of};
    use chrono::TimeZone;
    use record_builder::ValidationError;

    const SWINGS: &str = "name,avg_bat_speed,batter_run_value,whiffs\n\
        Ohtani,10,1.0,20\n\
        Ohtani,12,2.0,21\n\
        Ohtani,11,1.5,19\n\
        Ohtani,13,2.5,22\n\
        Ohtani,9,0.5,25\n\
        Ohtani,8,0.1,27\n";

    fn pipeline() -> IngestPipeline {
        IngestPipeline::new(FeatureConfig::default(), BuilderConfig::default()).unwrap()
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_csv_upload() {
        let report = pipeline().ingest(&[UploadedFile::new("swings.csv", SWINGS)], now());

        assert!(report.alerts.is_empty());
        assert_eq!(report.records.len(), 6);
        assert_eq!(report.files[0].state, FileState::Done);
        assert_eq!(report.files[0].tables, 1);

        let summaries = report.summaries("avg_bat_speed");
        assert!(summaries[..4].iter().all(|s| s.oscillator.is_none()));
        let osc = summaries[4].oscillator.unwrap();
        assert!((osc - (-1.2649)).abs() < 1e-3);
        assert!(summaries.iter().all(|s| !s.signal));

        let last = &report.records[5];
        assert_eq!(last.delta("avg_bat_speed"), Some(-1.0));
        assert!(last.oscillator("batter_run_value").is_some());
        assert_eq!(last.metrics.whiffs, Some(27));
        assert!(last.signal_is_derived);
    }

    #[test]
    fn test_missing_identity_row() {
        let csv = "name,avg_bat_speed\nA,70\n,71\nC,72\n";
        let report = pipeline().ingest(&[UploadedFile::new("rows.csv", csv)], now());

        assert_eq!(report.records.len(), 2);
        assert_eq!(report.alerts.len(), 1);
        assert_eq!(
            report.alerts[0],
            IngestError::RowRejected {
                source_name: "rows.csv".into(),
                row: 2,
                reason: ValidationError::MissingIdentity("name".into()),
            }
        );
        assert_eq!(report.files[0].state, FileState::Done);
    }

    #[test]
    fn test_malformed_csv_fails_file_only() {
        let files = [
            UploadedFile::new("bad.csv", "name,avg_bat_speed\nA,1,2\n"),
            UploadedFile::new("good.csv", "name\nB\n"),
        ];
        let report = pipeline().ingest(&files, now());

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.alerts.len(), 1);
        assert!(matches!(report.alerts[0], IngestError::MalformedInput { .. }));
        assert!(report.alert_messages()[0].contains("bad.csv"));
        assert_eq!(report.files[0].state, FileState::Failed);
        assert_eq!(report.files[1].state, FileState::Done);
    }

    #[test]
    fn test_archive_with_corrupted_entry() {
        let bytes = zip_of(&[
            ("good.csv", SWINGS),
            ("broken.csv", "name,avg_bat_speed\nA,1\nB,2,3\n"),
        ]);
        let report = pipeline().ingest(&[UploadedFile::new("season.zip", bytes)], now());

        assert_eq!(report.records.len(), 6);
        assert_eq!(report.alerts.len(), 1);
        match &report.alerts[0] {
            IngestError::EntryFailed { file, entry, .. } => {
                assert_eq!(file, "season.zip");
                assert_eq!(entry, "broken.csv");
            }
            other => panic!("unexpected alert: {other:?}"),
        }
        assert_eq!(report.files[0].tables, 1);
        assert_eq!(report.files[0].state, FileState::Done);
    }

    #[test]
    fn test_archive_without_tables() {
        let bytes = zip_of(&[("notes.txt", "nothing here")]);
        let report = pipeline().ingest(&[UploadedFile::new("empty.zip", bytes)], now());

        assert!(report.records.is_empty());
        assert_eq!(report.alerts, vec![IngestError::EmptyArchive("empty.zip".into())]);
        assert_eq!(report.files[0].state, FileState::Failed);
    }

    #[test]
    fn test_archive_with_only_undecodable_non_table() {
        // 12 is bzip2, which this build cannot decompress
        let bytes = with_compression_method(zip_of(&[("readme.txt", "hello")]), 12);
        let report = pipeline().ingest(&[UploadedFile::new("x.zip", bytes)], now());

        assert_eq!(report.alerts, vec![IngestError::EmptyArchive("x.zip".into())]);
        assert_eq!(report.files[0].state, FileState::Failed);
    }

    #[test]
    fn test_corrupt_archive() {
        let report = pipeline().ingest(&[UploadedFile::new("junk.zip", "PK nope")], now());
        assert!(matches!(report.alerts[0], IngestError::CorruptArchive { .. }));
        assert_eq!(report.files[0].state, FileState::Failed);
    }

    #[test]
    fn test_unsupported_file() {
        let report = pipeline().ingest(&[UploadedFile::new("stats.xlsx", "x")], now());
        assert_eq!(report.alerts, vec![IngestError::UnsupportedFile("stats.xlsx".into())]);
    }

    #[test]
    fn test_alert_order_follows_submission() {
        let files = [
            UploadedFile::new("one.txt", ""),
            UploadedFile::new("two.csv", "name\n\n"),
            UploadedFile::new("three.zip", zip_of(&[])),
        ];
        let report = pipeline().ingest(&files, now());
        let messages = report.alert_messages();
        assert_eq!(messages.len(), 2);
        assert!(messages[0].contains("one.txt"));
        assert!(messages[1].contains("three.zip"));
    }

    #[test]
    fn test_tables_are_independent() {
        let bytes = zip_of(&[("a.csv", SWINGS), ("b.csv", "name,avg_bat_speed\nX,5\n")]);
        let report = pipeline().ingest(&[UploadedFile::new("two.zip", bytes)], now());

        // Second table starts a fresh series
        let x = report.records.iter().find(|r| r.name == "X").unwrap();
        assert_eq!(x.delta("avg_bat_speed"), None);
        assert_eq!(report.files[0].tables, 2);
    }

    #[test]
    fn test_untracked_table_has_no_features() {
        let report = pipeline().ingest(&[UploadedFile::new("plain.csv", "name,contact\nA,3\n")], now());
        let record = &report.records[0];
        assert!(record.features.is_empty());
        assert!(!record.signal_is_derived);
        assert_eq!(record.metrics.contact, Some(3));
    }

    #[test]
    fn test_short_row_keeps_file() {
        let csv = "name,avg_bat_speed,whiffs\nA,70,3\nB,71,4\nC,72\n";
        let report = pipeline().ingest(&[UploadedFile::new("s.csv", csv)], now());

        assert!(report.alerts.is_empty());
        assert_eq!(report.records.len(), 3);
        assert_eq!(report.records[2].name, "C");
        assert_eq!(report.records[2].metrics.whiffs, None);
        assert_eq!(report.records[2].metrics.avg_bat_speed, Some(72.0));
        assert_eq!(report.files[0].state, FileState::Done);
    }

    #[test]
    fn test_oversized_entry_is_entry_alert() {
        let big = format!("name,avg_bat_speed\n{}", "A,70\n".repeat(1_000));
        let bytes = zip_of(&[("big.csv", big.as_str()), ("small.csv", "name\nB\n")]);
        let report = pipeline()
            .with_max_entry_bytes(512)
            .ingest(&[UploadedFile::new("bomb.zip", bytes)], now());

        assert_eq!(report.records.len(), 1);
        assert_eq!(report.alerts.len(), 1);
        match &report.alerts[0] {
            IngestError::EntryFailed { entry, reason, .. } => {
                assert_eq!(entry, "big.csv");
                assert!(reason.contains("512 bytes"));
            }
            other => panic!("unexpected alert: {other:?}"),
        }
        assert_eq!(report.files[0].state, FileState::Done);
    }

    #[test]
    fn test_base_name() {
        assert_eq!(base_name("C:\\Users\\me\\stats.csv"), "stats.csv");
        assert_eq!(base_name("../../etc/swings.zip"), "swings.zip");
        assert_eq!(base_name(""), "upload");
    }

    #[test]
    fn test_invalid_window_rejected() {
        let config = FeatureConfig {
            window: 0,
            ..Default::default()
        };
        assert!(IngestPipeline::new(config, BuilderConfig::default()).is_err());
    }
}
