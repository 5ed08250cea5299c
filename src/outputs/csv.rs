//! CSV reading and writing.
//!
//! Fields are quoted RFC-4180 style when they contain commas, quotes, or
//! newlines; article bodies routinely contain all three. The reader is a
//! small state machine that accepts exactly what the writer produces (plus
//! CRLF line endings from spreadsheet tools).

use std::error::Error;
use std::fmt::Write as _;
use std::path::PathBuf;
use tokio::fs;
use tracing::{info, instrument};

use crate::models::{Dataset, ErrorRecord, ResultSet, RetryLogEntry, Row};

/// Quote a field if it contains a delimiter, quote, or newline.
pub fn escape_csv(s: &str) -> String {
    if s.contains(',') || s.contains('"') || s.contains('\n') {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

/// Parse CSV text into records of fields. Quoted fields may contain
/// delimiters, doubled quotes, and newlines.
pub fn parse_records(text: &str) -> Vec<Vec<String>> {
    let mut records = Vec::new();
    let mut record: Vec<String> = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;

    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if in_quotes {
            if c == '"' {
                if chars.peek() == Some(&'"') {
                    field.push('"');
                    chars.next();
                } else {
                    in_quotes = false;
                }
            } else {
                field.push(c);
            }
            continue;
        }
        match c {
            '"' => in_quotes = true,
            ',' => record.push(std::mem::take(&mut field)),
            '\r' => {}
            '\n' => {
                record.push(std::mem::take(&mut field));
                // skip blank lines
                if record.len() > 1 || !record[0].is_empty() {
                    records.push(std::mem::take(&mut record));
                } else {
                    record.clear();
                }
            }
            _ => field.push(c),
        }
    }
    if !field.is_empty() || !record.is_empty() {
        record.push(field);
        records.push(record);
    }
    records
}

/// Read the input dataset CSV.
///
/// Required columns: `docid`, `category`, `title`, `link`, `label`. The
/// `content` and `len_content` columns are optional; when `len_content` is
/// absent or empty it is derived from the content's character count (the
/// scraper fills both later when `--fetch-content` is used).
#[instrument(level = "info", skip_all, fields(path = %path))]
pub async fn read_dataset(path: &str) -> Result<Dataset, Box<dyn Error>> {
    let text = fs::read_to_string(path).await?;
    let mut records = parse_records(&text).into_iter();

    let header = records.next().ok_or("Dataset CSV is empty")?;
    let required = |name: &str| {
        header
            .iter()
            .position(|h| h == name)
            .ok_or_else(|| format!("Dataset CSV missing column '{name}'"))
    };
    let optional = |name: &str| header.iter().position(|h| h == name);

    let docid_i = required("docid")?;
    let category_i = required("category")?;
    let title_i = required("title")?;
    let link_i = required("link")?;
    let label_i = required("label")?;
    let content_i = optional("content");
    let len_content_i = optional("len_content");

    let mut rows = Vec::new();
    for (n, record) in records.enumerate() {
        let field = |i: usize| record.get(i).cloned().unwrap_or_default();

        let docid_raw = field(docid_i);
        let docid: u64 = docid_raw
            .parse()
            .map_err(|_| format!("Invalid docid '{docid_raw}' at record {}", n + 1))?;

        let content = content_i.map(field).unwrap_or_default();
        let len_content = match len_content_i.map(field) {
            Some(raw) if !raw.is_empty() => raw
                .parse()
                .map_err(|_| format!("Invalid len_content '{raw}' at record {}", n + 1))?,
            _ => content.chars().count(),
        };

        rows.push(Row {
            docid,
            category: field(category_i),
            title: field(title_i),
            link: field(link_i),
            content,
            len_content,
            label: field(label_i),
        });
    }

    info!(rows = rows.len(), "Loaded dataset");
    Ok(Dataset::new(rows))
}

/// Write the labeled results: `results_{ts}.csv`.
#[instrument(level = "info", skip_all)]
pub async fn write_results(
    results: &ResultSet,
    output_dir: &str,
    ts: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let mut out = String::new();
    writeln!(
        out,
        "docid,category,title,link,content,len_content,label,pred,reason,summary"
    )?;
    for row in &results.rows {
        writeln!(
            out,
            "{},{},{},{},{},{},{},{},{},{}",
            row.docid,
            escape_csv(&row.category),
            escape_csv(&row.title),
            escape_csv(&row.link),
            escape_csv(&row.content),
            row.len_content,
            escape_csv(&row.label),
            escape_csv(&row.pred),
            escape_csv(&row.reason),
            escape_csv(&row.summary),
        )?;
    }

    let path = PathBuf::from(output_dir).join(format!("results_{ts}.csv"));
    fs::write(&path, out).await?;
    info!(path = %path.display(), rows = results.len(), "Wrote results CSV");
    Ok(path)
}

/// Write the unresolved error records: `errors_{ts}.csv`.
#[instrument(level = "info", skip_all)]
pub async fn write_errors(
    errors: &[ErrorRecord],
    output_dir: &str,
    ts: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let mut out = String::new();
    writeln!(out, "docid,category,errors,error_stage,time")?;
    for e in errors {
        writeln!(
            out,
            "{},{},{},{},{}",
            e.docid,
            escape_csv(&e.category),
            escape_csv(&e.message),
            e.stage,
            escape_csv(&e.time),
        )?;
    }

    let path = PathBuf::from(output_dir).join(format!("errors_{ts}.csv"));
    fs::write(&path, out).await?;
    info!(path = %path.display(), rows = errors.len(), "Wrote errors CSV");
    Ok(path)
}

/// Write the retry audit log: `retry_log_{ts}.csv`.
#[instrument(level = "info", skip_all)]
pub async fn write_retry_log(
    log: &[RetryLogEntry],
    output_dir: &str,
    ts: &str,
) -> Result<PathBuf, Box<dyn Error>> {
    let mut out = String::new();
    writeln!(out, "docid,category,status,message,time")?;
    for entry in log {
        writeln!(
            out,
            "{},{},{},{},{}",
            entry.docid,
            escape_csv(&entry.category),
            entry.status,
            escape_csv(&entry.message),
            escape_csv(&entry.time),
        )?;
    }

    let path = PathBuf::from(output_dir).join(format!("retry_log_{ts}.csv"));
    fs::write(&path, out).await?;
    info!(path = %path.display(), rows = log.len(), "Wrote retry log CSV");
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ErrorStage, LabeledRow};

    #[test]
    fn test_escape_csv_plain() {
        assert_eq!(escape_csv("평범한 제목"), "평범한 제목");
    }

    #[test]
    fn test_escape_csv_special_chars() {
        assert_eq!(escape_csv("a,b"), "\"a,b\"");
        assert_eq!(escape_csv("말했다 \"인용\""), "\"말했다 \"\"인용\"\"\"");
        assert_eq!(escape_csv("줄1\n줄2"), "\"줄1\n줄2\"");
    }

    #[test]
    fn test_parse_records_round_trip() {
        let fields = vec!["그대로", "쉼표, 포함", "\"인용\"", "줄\n바꿈"];
        let line: Vec<String> = fields.iter().map(|f| escape_csv(f)).collect();
        let text = format!("{}\n", line.join(","));

        let records = parse_records(&text);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0], fields);
    }

    #[test]
    fn test_parse_records_crlf_and_blank_lines() {
        let text = "a,b\r\n\r\nc,d\r\n";
        let records = parse_records(text);
        assert_eq!(records, vec![vec!["a", "b"], vec!["c", "d"]]);
    }

    #[test]
    fn test_parse_records_no_trailing_newline() {
        let records = parse_records("a,b\nc,d");
        assert_eq!(records.len(), 2);
        assert_eq!(records[1], vec!["c", "d"]);
    }

    #[tokio::test]
    async fn test_read_dataset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.csv");
        let csv = "docid,category,title,link,content,len_content,label\n\
                   3,난이도,제목,https://example.com/3,\"본문, 쉼표 포함\",9,상\n\
                   7,논조,제목2,https://example.com/7,,,중\n";
        std::fs::write(&path, csv).unwrap();

        let dataset = read_dataset(path.to_str().unwrap()).await.unwrap();
        assert_eq!(dataset.len(), 2);
        assert_eq!(dataset.rows[0].docid, 3);
        assert_eq!(dataset.rows[0].content, "본문, 쉼표 포함");
        assert_eq!(dataset.rows[0].len_content, 9);
        // empty content and len_content
        assert_eq!(dataset.rows[1].content, "");
        assert_eq!(dataset.rows[1].len_content, 0);
    }

    #[tokio::test]
    async fn test_read_dataset_missing_column() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.csv");
        std::fs::write(&path, "docid,category\n1,난이도\n").unwrap();

        let err = read_dataset(path.to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("missing column"));
    }

    #[tokio::test]
    async fn test_read_dataset_invalid_docid() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dataset.csv");
        std::fs::write(
            &path,
            "docid,category,title,link,label\nabc,난이도,t,l,상\n",
        )
        .unwrap();

        let err = read_dataset(path.to_str().unwrap()).await.unwrap_err();
        assert!(err.to_string().contains("Invalid docid"));
    }

    #[tokio::test]
    async fn test_write_results_and_errors() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().to_str().unwrap();

        let row = Row {
            docid: 1,
            category: "난이도".to_string(),
            title: "제목, 쉼표".to_string(),
            link: "https://example.com/1".to_string(),
            content: "본문\n둘째 줄".to_string(),
            len_content: 7,
            label: "상".to_string(),
        };
        let results = ResultSet::new(vec![LabeledRow::from_row(
            &row,
            "중".into(),
            "근거".into(),
            "요약".into(),
        )]);
        let errors = vec![ErrorRecord {
            docid: 2,
            category: "난이도".to_string(),
            message: "API call failed: 429, Too Many Requests".to_string(),
            stage: ErrorStage::Retry,
            time: "20250101 00:00:00".to_string(),
        }];

        let results_path = write_results(&results, out, "20250101_000000").await.unwrap();
        let errors_path = write_errors(&errors, out, "20250101_000000").await.unwrap();

        let results_text = std::fs::read_to_string(&results_path).unwrap();
        let records = parse_records(&results_text);
        assert_eq!(records.len(), 2);
        assert_eq!(records[1][2], "제목, 쉼표");
        assert_eq!(records[1][4], "본문\n둘째 줄");

        let errors_text = std::fs::read_to_string(&errors_path).unwrap();
        let records = parse_records(&errors_text);
        assert_eq!(records[0], vec!["docid", "category", "errors", "error_stage", "time"]);
        assert_eq!(records[1][3], "Retry");
    }
}
