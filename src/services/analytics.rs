use chrono::{DateTime, Datelike, Utc};
use serde::Serialize;

use crate::models::{FileRecord, FileStatus};

const MONTH_NAMES: [&str; 12] = ["Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec"];

/// Months covered by `monthly_data`, ending with the current one.
const MONTHS_SHOWN: i32 = 6;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyCount {
    pub month: String,
    pub year: i32,
    pub files: usize,
    /// Bar height for charts, 0 to 100.
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_files: usize,
    pub completed_files: usize,
    pub approved_files: usize,
    pub approved_without_changes: usize,
    pub modified_before_approval: usize,
    pub processing_accuracy: u32,
    pub monthly_data: Vec<MonthlyCount>,
}

impl Analytics {
    pub fn from_files(files: &[FileRecord], now: DateTime<Utc>) -> Self {
        let total_files = files.len();
        let completed_files = files.iter().filter(|f| f.status == FileStatus::Complete).count();
        let approved_files = files.iter().filter(|f| f.is_approved).count();
        let approved_without_changes = files.iter().filter(|f| f.is_approved && !f.was_edited()).count();
        let modified_before_approval = files.iter().filter(|f| f.was_edited()).count();

        // Only completed files count toward accuracy, so it stays within 0..=100.
        let accepted_as_extracted = files
            .iter()
            .filter(|f| f.status == FileStatus::Complete && f.is_approved && !f.was_edited())
            .count();
        let processing_accuracy = if completed_files > 0 {
            ((accepted_as_extracted as f64 / completed_files as f64) * 100.0).round().min(100.0) as u32
        } else {
            0
        };

        Self {
            total_files,
            completed_files,
            approved_files,
            approved_without_changes,
            modified_before_approval,
            processing_accuracy,
            monthly_data: monthly_counts(files, now),
        }
    }
}

fn monthly_counts(files: &[FileRecord], now: DateTime<Utc>) -> Vec<MonthlyCount> {
    let current = now.year() * 12 + now.month0() as i32;

    (0..MONTHS_SHOWN)
        .rev()
        .map(|back| {
            let index = current - back;
            let (year, month0) = (index.div_euclid(12), index.rem_euclid(12) as u32);
            let count = files
                .iter()
                .filter(|f| f.created_at.year() == year && f.created_at.month0() == month0)
                .count();
            let value = (count as f64 / files.len().max(1) as f64 * 100.0 * MONTHS_SHOWN as f64).min(100.0);

            MonthlyCount { month: MONTH_NAMES[month0 as usize].to_string(), year, files: count, value }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewFile, Table};
    use chrono::TimeZone;

    fn file(id: i64, created_at: DateTime<Utc>) -> FileRecord {
        FileRecord::from_new(
            id,
            NewFile {
                owner_id: 1,
                original_name: format!("{}.pdf", id),
                stored_name: format!("{}.pdf", id),
                mime_type: "application/pdf".to_string(),
                size: 1,
                webhook_url: None,
            },
            created_at,
        )
    }

    fn completed(id: i64, created_at: DateTime<Utc>) -> FileRecord {
        let mut record = file(id, created_at);
        record.complete(Table::from(vec![vec!["A"], vec!["1"]])).unwrap();
        record
    }

    #[test]
    fn test_counts_and_accuracy() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();

        let mut approved = completed(1, now);
        approved.is_approved = true;
        let mut edited = completed(2, now);
        edited.apply_edit(Table::from(vec![vec!["A"], vec!["2"]]));
        edited.is_approved = true;
        let pending = completed(3, now);
        let uploading = file(4, now);

        let analytics = Analytics::from_files(&[approved, edited, pending, uploading], now);

        assert_eq!(analytics.total_files, 4);
        assert_eq!(analytics.completed_files, 3);
        assert_eq!(analytics.approved_files, 2);
        assert_eq!(analytics.approved_without_changes, 1);
        assert_eq!(analytics.modified_before_approval, 1);
        assert_eq!(analytics.processing_accuracy, 33);
    }

    #[test]
    fn test_accuracy_ignores_unfinished_approvals() {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();

        let mut files = vec![completed(1, now)];
        files[0].is_approved = true;
        for id in 2..5 {
            let mut early = file(id, now);
            early.is_approved = true;
            files.push(early);
        }

        let analytics = Analytics::from_files(&files, now);

        assert_eq!(analytics.completed_files, 1);
        assert_eq!(analytics.approved_without_changes, 4);
        assert_eq!(analytics.processing_accuracy, 100);
    }

    #[test]
    fn test_monthly_window_crosses_year_boundary() {
        let now = Utc.with_ymd_and_hms(2026, 2, 10, 0, 0, 0).unwrap();
        let files = vec![
            file(1, Utc.with_ymd_and_hms(2025, 9, 30, 23, 0, 0).unwrap()),
            file(2, Utc.with_ymd_and_hms(2025, 12, 1, 0, 0, 0).unwrap()),
            file(3, Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()),
            file(4, Utc.with_ymd_and_hms(2025, 8, 31, 0, 0, 0).unwrap()),
        ];

        let monthly = Analytics::from_files(&files, now).monthly_data;
        let labels: Vec<_> = monthly.iter().map(|m| (m.month.as_str(), m.year, m.files)).collect();

        assert_eq!(
            labels,
            vec![
                ("Sep", 2025, 1),
                ("Oct", 2025, 0),
                ("Nov", 2025, 0),
                ("Dec", 2025, 1),
                ("Jan", 2026, 0),
                ("Feb", 2026, 1),
            ]
        );
        assert_eq!(monthly[0].value, 100.0);
        assert_eq!(monthly[1].value, 0.0);
    }

    #[test]
    fn test_empty() {
        let analytics = Analytics::from_files(&[], Utc::now());
        assert_eq!(analytics.total_files, 0);
        assert_eq!(analytics.processing_accuracy, 0);
        assert_eq!(analytics.monthly_data.len(), 6);
    }
}
