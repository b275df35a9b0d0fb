use std::fmt::Display;

use chrono::{DateTime, Utc};
use num_format::{Locale, ToFormattedString};
use serde::Serialize;
use tracing::warn;

use crate::principals::PrincipalImportOutcome;
use crate::stores::traits::DestStore;

#[derive(Clone, Debug, Serialize)]
pub struct RowFailure {
    pub row_index: u64,
    pub error: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct TransferRecord {
    pub table: String,
    pub source_count: u64,
    pub transferred: u64,
    pub failed_rows: Vec<RowFailure>,
}

impl TransferRecord {
    pub fn new(table: &str, source_count: u64) -> Self {
        return TransferRecord {
            table: table.to_string(),
            source_count,
            transferred: 0,
            failed_rows: Vec::new(),
        };
    }

    /// Record for a table whose transfer never reached the write stage.
    pub fn aborted(table: &str, error: String) -> Self {
        return TransferRecord {
            table: table.to_string(),
            source_count: 0,
            transferred: 0,
            failed_rows: vec![RowFailure {
                row_index: 0,
                error,
            }],
        };
    }

    pub fn is_clean(&self) -> bool {
        return self.failed_rows.is_empty();
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct ReconciliationLine {
    pub table: String,
    pub source_count: u64,
    /// None when the destination count query itself failed.
    pub destination_count: Option<u64>,
    pub matched: bool,
}

impl ReconciliationLine {
    fn new(table: String, source_count: u64, destination_count: Option<u64>) -> Self {
        let matched = destination_count == Some(source_count);
        return ReconciliationLine {
            table,
            source_count,
            destination_count,
            matched,
        };
    }
}

#[derive(Debug, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub principals: Option<PrincipalImportOutcome>,
    pub records: Vec<TransferRecord>,
    pub reconciliation: Vec<ReconciliationLine>,
}

impl RunReport {
    pub fn new() -> Self {
        return RunReport {
            started_at: Utc::now(),
            finished_at: None,
            principals: None,
            records: Vec::new(),
            reconciliation: Vec::new(),
        };
    }

    pub fn push(&mut self, record: TransferRecord) {
        self.records.push(record);
    }

    /// Re-queries each destination table's row count and compares it with the
    /// source count. A failing count query yields an unknown line rather than
    /// an error.
    pub fn reconcile(&mut self, dest: &mut dyn DestStore) {
        for record in &self.records {
            let destination_count = match dest.count_rows(&record.table) {
                Ok(count) => Some(count),
                Err(err) => {
                    warn!(
                        "Failed to count destination rows of table {}: {err:#}",
                        record.table
                    );
                    None
                }
            };
            self.reconciliation.push(ReconciliationLine::new(
                record.table.clone(),
                record.source_count,
                destination_count,
            ));
        }
        self.finished_at = Some(Utc::now());
    }

    pub fn succeeded(&self) -> bool {
        let principals_clean = self.principals.as_ref().is_none_or(|p| p.is_clean());
        return principals_clean
            && self.records.iter().all(TransferRecord::is_clean)
            && self.reconciliation.iter().all(|line| line.matched);
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        return Ok(serde_json::to_string_pretty(self)?);
    }
}

impl Default for RunReport {
    fn default() -> Self {
        return RunReport::new();
    }
}

impl Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(
            f,
            "Run started {}",
            self.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        )?;
        if let Some(principals) = &self.principals {
            writeln!(
                f,
                "Principals: {} listed, {} created, {} reused, {} failed",
                principals.listed.to_formatted_string(&Locale::en),
                principals.created.to_formatted_string(&Locale::en),
                principals.reused.to_formatted_string(&Locale::en),
                principals.failures.len().to_formatted_string(&Locale::en),
            )?;
            if let Some(reason) = &principals.aborted {
                writeln!(f, "Principal enumeration aborted: {reason}")?;
            }
        }
        for record in &self.records {
            writeln!(
                f,
                "Table {}: {} source rows, {} transferred, {} failed",
                record.table,
                record.source_count.to_formatted_string(&Locale::en),
                record.transferred.to_formatted_string(&Locale::en),
                record.failed_rows.len().to_formatted_string(&Locale::en),
            )?;
            for failure in &record.failed_rows {
                writeln!(f, "  Row {}: {}", failure.row_index, failure.error)?;
            }
        }
        writeln!(f, "Reconciliation:")?;
        for line in &self.reconciliation {
            let destination = match line.destination_count {
                Some(count) => count.to_formatted_string(&Locale::en),
                None => "unknown".to_string(),
            };
            writeln!(
                f,
                "  {}: source {} destination {} {}",
                line.table,
                line.source_count.to_formatted_string(&Locale::en),
                destination,
                if line.matched { "ok" } else { "MISMATCH" },
            )?;
        }
        if let Some(finished_at) = self.finished_at {
            writeln!(
                f,
                "Run finished {}",
                finished_at.format("%Y-%m-%d %H:%M:%S UTC")
            )?;
        }
        return Ok(());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn clean_record(table: &str, count: u64) -> TransferRecord {
        let mut record = TransferRecord::new(table, count);
        record.transferred = count;
        return record;
    }

    #[test]
    fn test_empty_report_succeeds() {
        assert!(RunReport::new().succeeded());
    }

    #[test]
    fn test_clean_records_and_matching_lines_succeed() {
        let mut report = RunReport::new();
        report.push(clean_record("people", 10));
        report
            .reconciliation
            .push(ReconciliationLine::new("people".to_string(), 10, Some(10)));
        assert!(report.succeeded());
    }

    #[test]
    fn test_failed_row_fails_the_run() {
        let mut report = RunReport::new();
        let mut record = clean_record("people", 10);
        record.transferred = 9;
        record.failed_rows.push(RowFailure {
            row_index: 4,
            error: "constraint violation".to_string(),
        });
        report.push(record);
        assert!(!report.succeeded());
    }

    #[test]
    fn test_count_mismatch_fails_the_run() {
        let mut report = RunReport::new();
        report.push(clean_record("people", 10));
        report
            .reconciliation
            .push(ReconciliationLine::new("people".to_string(), 10, Some(9)));
        assert!(!report.succeeded());
    }

    #[test]
    fn test_unknown_destination_count_fails_the_run() {
        let mut report = RunReport::new();
        report.push(clean_record("people", 10));
        report
            .reconciliation
            .push(ReconciliationLine::new("people".to_string(), 10, None));
        assert!(!report.succeeded());
        assert!(format!("{report}").contains("unknown"));
    }

    #[test]
    fn test_principal_failure_fails_the_run() {
        let mut report = RunReport::new();
        let mut outcome = PrincipalImportOutcome::default();
        outcome.failures.push(crate::principals::PrincipalFailure {
            source_id: uuid::Uuid::new_v4(),
            email: Some("a@x.com".to_string()),
            error: "create failed".to_string(),
        });
        report.principals = Some(outcome);
        assert!(!report.succeeded());
    }

    #[test]
    fn test_aborted_record_has_single_failure() {
        let record = TransferRecord::aborted("people", "fetch failed".to_string());
        assert_eq!(record.transferred, 0);
        assert_eq!(record.failed_rows.len(), 1);
        assert!(!record.is_clean());
    }

    #[test]
    fn test_display_marks_mismatches() {
        let mut report = RunReport::new();
        report.push(clean_record("people", 10));
        report
            .reconciliation
            .push(ReconciliationLine::new("people".to_string(), 10, Some(8)));
        let rendered = format!("{report}");
        assert!(rendered.contains("MISMATCH"));
        assert!(rendered.contains("people"));
    }

    #[test]
    fn test_json_rendering() {
        let mut report = RunReport::new();
        report.push(clean_record("people", 10));
        let rendered = report.to_json().unwrap();
        assert!(rendered.contains("\"source_count\": 10"));
    }
}
