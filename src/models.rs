//! Data models for the labeling pipeline.
//!
//! This module defines the core data structures used throughout the application:
//! - [`Row`]: An input article row as loaded from the dataset CSV
//! - [`LabeledRow`]: A row after classification, carrying the model's output
//! - [`ErrorRecord`]: A per-row failure captured during a processing pass
//! - [`RetryLogEntry`]: One line of the cumulative retry audit log
//! - [`Dataset`] / [`ResultSet`]: ordered collections with the lookup and
//!   insertion behavior the batch and retry drivers rely on
//!
//! Document ids are unique within a category; the same docid may appear once
//! per category because each category is an independent classification task.

use serde::{Deserialize, Serialize};

/// An input article row prior to classification.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Row {
    /// Unique document id within a category.
    pub docid: u64,
    /// The classification task this row belongs to.
    pub category: String,
    /// Article headline.
    pub title: String,
    /// URL the article body was (or can be) scraped from.
    pub link: String,
    /// Article body text.
    pub content: String,
    /// Character count of `content`.
    pub len_content: usize,
    /// Ground-truth label for evaluation.
    pub label: String,
}

/// A row after successful classification.
///
/// Carries the original row fields plus the three fields extracted from the
/// model response: predicted label, rationale, and summary.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LabeledRow {
    pub docid: u64,
    pub category: String,
    pub title: String,
    pub link: String,
    pub content: String,
    pub len_content: usize,
    pub label: String,
    pub pred: String,
    pub reason: String,
    pub summary: String,
}

impl LabeledRow {
    /// Combine an input row with the fields parsed from a model response.
    pub fn from_row(row: &Row, pred: String, reason: String, summary: String) -> Self {
        Self {
            docid: row.docid,
            category: row.category.clone(),
            title: row.title.clone(),
            link: row.link.clone(),
            content: row.content.clone(),
            len_content: row.len_content,
            label: row.label.clone(),
            pred,
            reason,
            summary,
        }
    }
}

/// The pass in which an error was captured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum ErrorStage {
    /// First batch pass over the dataset.
    Initial,
    /// One of the bounded retry passes.
    Retry,
}

impl std::fmt::Display for ErrorStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorStage::Initial => write!(f, "Initial"),
            ErrorStage::Retry => write!(f, "Retry"),
        }
    }
}

/// A per-row failure. Regenerated on every retry attempt; only the final
/// attempt's records survive into the errors CSV.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ErrorRecord {
    pub docid: u64,
    pub category: String,
    /// Human-readable failure description. Embedded status codes (`429`,
    /// `40005`, `40006`) drive retry classification.
    pub message: String,
    pub stage: ErrorStage,
    /// `%Y%m%d %H:%M:%S` local timestamp.
    pub time: String,
}

/// Outcome of a single retry-log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
pub enum RetryStatus {
    Success,
    Error,
}

impl std::fmt::Display for RetryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RetryStatus::Success => write!(f, "Success"),
            RetryStatus::Error => write!(f, "Error"),
        }
    }
}

/// One line of the cumulative retry audit log, kept across all attempts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetryLogEntry {
    pub docid: u64,
    pub category: String,
    pub status: RetryStatus,
    pub message: String,
    pub time: String,
}

/// The input dataset: an ordered collection of rows.
#[derive(Debug, Default, Clone)]
pub struct Dataset {
    pub rows: Vec<Row>,
}

impl Dataset {
    pub fn new(rows: Vec<Row>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Look up a row by its (docid, category) key.
    pub fn find(&self, docid: u64, category: &str) -> Option<&Row> {
        self.rows
            .iter()
            .find(|r| r.docid == docid && r.category == category)
    }

    /// Iterate the rows belonging to one category, in dataset order.
    pub fn in_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a Row> {
        self.rows.iter().filter(move |r| r.category == category)
    }
}

/// Accumulated classification results, nominally sorted by docid.
///
/// Ordering is best effort: the initial batch passes append in dataset order
/// and the result set is sorted once after the passes complete; rows recovered
/// during retry are placed by a linear scan for the first position whose docid
/// exceeds theirs.
#[derive(Debug, Default, Clone)]
pub struct ResultSet {
    pub rows: Vec<LabeledRow>,
}

impl ResultSet {
    pub fn new(rows: Vec<LabeledRow>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn push(&mut self, row: LabeledRow) {
        self.rows.push(row);
    }

    /// Re-establish docid order after the per-category passes are merged.
    pub fn sort_by_docid(&mut self) {
        self.rows.sort_by_key(|r| r.docid);
    }

    /// Insert a recovered row at the first position whose docid is greater
    /// than the new row's. O(n) scan; preserves order when the set is already
    /// sorted.
    pub fn insert_sorted(&mut self, row: LabeledRow) {
        let pos = self
            .rows
            .iter()
            .position(|r| r.docid > row.docid)
            .unwrap_or(self.rows.len());
        self.rows.insert(pos, row);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(docid: u64, category: &str) -> Row {
        Row {
            docid,
            category: category.to_string(),
            title: format!("기사 {docid}"),
            link: format!("https://www.hankookilbo.com/News/Read/{docid}"),
            content: "본문".to_string(),
            len_content: 2,
            label: "중".to_string(),
        }
    }

    fn labeled(docid: u64) -> LabeledRow {
        LabeledRow::from_row(
            &row(docid, "난이도"),
            "상".to_string(),
            "근거".to_string(),
            "요약".to_string(),
        )
    }

    #[test]
    fn test_labeled_row_from_row() {
        let r = row(7, "논조");
        let l = LabeledRow::from_row(&r, "비판".into(), "이유".into(), "요약문".into());
        assert_eq!(l.docid, 7);
        assert_eq!(l.category, "논조");
        assert_eq!(l.pred, "비판");
        assert_eq!(l.len_content, r.len_content);
    }

    #[test]
    fn test_dataset_find() {
        let ds = Dataset::new(vec![row(1, "난이도"), row(1, "논조"), row(2, "난이도")]);
        assert!(ds.find(1, "논조").is_some());
        assert!(ds.find(2, "논조").is_none());
        assert_eq!(ds.find(2, "난이도").unwrap().docid, 2);
    }

    #[test]
    fn test_dataset_in_category() {
        let ds = Dataset::new(vec![row(1, "난이도"), row(1, "논조"), row(2, "난이도")]);
        let ids: Vec<u64> = ds.in_category("난이도").map(|r| r.docid).collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[test]
    fn test_insert_sorted_middle() {
        let mut rs = ResultSet::new(vec![labeled(1), labeled(5), labeled(9)]);
        rs.insert_sorted(labeled(4));
        let ids: Vec<u64> = rs.rows.iter().map(|r| r.docid).collect();
        assert_eq!(ids, vec![1, 4, 5, 9]);
    }

    #[test]
    fn test_insert_sorted_front_and_back() {
        let mut rs = ResultSet::new(vec![labeled(3)]);
        rs.insert_sorted(labeled(1));
        rs.insert_sorted(labeled(8));
        let ids: Vec<u64> = rs.rows.iter().map(|r| r.docid).collect();
        assert_eq!(ids, vec![1, 3, 8]);
    }

    #[test]
    fn test_insert_sorted_empty() {
        let mut rs = ResultSet::default();
        rs.insert_sorted(labeled(2));
        assert_eq!(rs.len(), 1);
    }

    #[test]
    fn test_error_stage_display() {
        assert_eq!(ErrorStage::Initial.to_string(), "Initial");
        assert_eq!(ErrorStage::Retry.to_string(), "Retry");
        assert_eq!(RetryStatus::Success.to_string(), "Success");
    }
}
