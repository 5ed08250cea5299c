//! Bounded retry driver for failed rows.
//!
//! Re-runs the per-row completion logic against the current error set, up to
//! `max_retries` attempts. Each attempt regenerates the error set; rows that
//! recover are inserted back into the result set at their docid position.
//!
//! # Error classification
//!
//! Error messages are classified by the status codes embedded in their text:
//! - `429` — rate limited; wait out the delay (with jitter) and leave the row
//!   for the next attempt
//! - `40005` / `40006` — gateway policy failure; permanent, never re-called
//! - anything else — retryable on the next attempt

use rand::{Rng, rng};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::api::Complete;
use crate::batch::build_messages;
use crate::config::Prompts;
use crate::models::{
    Dataset, ErrorRecord, ErrorStage, LabeledRow, ResultSet, RetryLogEntry, RetryStatus,
};
use crate::parse::parse_completion;
use crate::utils::timestamp;

/// How an error message should be handled by the retry driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// HTTP 429; wait before the next attempt.
    RateLimited,
    /// Gateway policy codes 40005/40006; never retried.
    Permanent,
    /// Everything else; retried until attempts are exhausted.
    Retryable,
}

/// Classify an error message by the codes embedded in its text.
pub fn classify(message: &str) -> ErrorClass {
    if message.contains("429") {
        ErrorClass::RateLimited
    } else if message.contains("40005") || message.contains("40006") {
        ErrorClass::Permanent
    } else {
        ErrorClass::Retryable
    }
}

/// Result of running the retry driver to completion.
#[derive(Debug)]
pub struct RetryOutcome {
    /// Result set including recovered rows, docid order maintained.
    pub results: ResultSet,
    /// Errors still unresolved after the final attempt.
    pub errors: Vec<ErrorRecord>,
    /// Audit log across all attempts.
    pub log: Vec<RetryLogEntry>,
}

/// Re-drive the error set against the API, up to `max_retries` attempts.
///
/// Recovered rows are inserted into `results` in docid order. Permanent
/// errors are carried through to the unresolved set without further API
/// calls. `retry_delay` is applied after every call; a rate-limited call
/// waits an additional jittered delay before the row is requeued.
#[instrument(level = "info", skip_all, fields(pending = errors.len(), max = max_retries))]
pub async fn retry_failed_rows<C: Complete>(
    client: &C,
    dataset: &Dataset,
    prompts: &Prompts,
    mut results: ResultSet,
    mut errors: Vec<ErrorRecord>,
    max_retries: usize,
    retry_delay: Duration,
) -> RetryOutcome {
    let mut log = Vec::new();
    let mut attempt = 0usize;

    while !errors.is_empty() && attempt < max_retries {
        attempt += 1;
        info!(attempt, pending = errors.len(), "Retrying failed rows");

        let mut new_errors = Vec::new();

        for err in &errors {
            if classify(&err.message) == ErrorClass::Permanent {
                let message = format!(
                    "Skipping retry for docid {} in {} due to policy issue: {}",
                    err.docid, err.category, err.message
                );
                warn!(docid = err.docid, category = %err.category, "Skipping permanent error");
                push_error(&mut log, &mut new_errors, err, err.message.clone(), message);
                continue;
            }

            let Some(row) = dataset.find(err.docid, &err.category) else {
                let message = format!(
                    "No matching row found for docid {} and category {}",
                    err.docid, err.category
                );
                warn!(docid = err.docid, category = %err.category, "No matching row");
                push_error(&mut log, &mut new_errors, err, message.clone(), message);
                continue;
            };

            let Some(prompt) = prompts.get(&row.category) else {
                let message = format!("No prompt configured for category {}", row.category);
                warn!(category = %row.category, "No prompt configured");
                push_error(&mut log, &mut new_errors, err, message.clone(), message);
                continue;
            };

            let messages = build_messages(prompt, row);
            match client.complete(&messages).await {
                Ok(content) => match parse_completion(&content) {
                    Ok(fields) => {
                        results.insert_sorted(LabeledRow::from_row(
                            row,
                            fields.pred,
                            fields.reason,
                            fields.summary,
                        ));
                        let message = format!(
                            "Success on retry: docid {} in {}",
                            row.docid, row.category
                        );
                        info!(docid = row.docid, category = %row.category, "Recovered row");
                        log.push(RetryLogEntry {
                            docid: row.docid,
                            category: row.category.clone(),
                            status: RetryStatus::Success,
                            message,
                            time: timestamp(),
                        });
                    }
                    Err(e) => {
                        let message = format!(
                            "Failed to process content for docid {} in {} - {}",
                            row.docid, row.category, e
                        );
                        warn!(docid = row.docid, error = %message, "Retry parse failed");
                        push_error(&mut log, &mut new_errors, err, message.clone(), message);
                    }
                },
                Err(e) => {
                    let class = classify(&e.0);
                    if class == ErrorClass::RateLimited {
                        let jitter_ms: u64 = rng().random_range(0..=250);
                        let wait = retry_delay + Duration::from_millis(jitter_ms);
                        warn!(docid = err.docid, ?wait, "429 Too Many Requests; waiting before next attempt");
                        sleep(wait).await;
                    } else {
                        warn!(docid = err.docid, error = %e, "Retry call failed");
                    }
                    let message = format!(
                        "Error on retry: docid {} in {} - {}",
                        err.docid, err.category, e
                    );
                    push_error(&mut log, &mut new_errors, err, e.0.clone(), message);
                }
            }

            sleep(retry_delay).await;
        }

        errors = new_errors;
    }

    info!(
        attempts = attempt,
        recovered = log
            .iter()
            .filter(|l| l.status == RetryStatus::Success)
            .count(),
        unresolved = errors.len(),
        "Retry driver finished"
    );

    RetryOutcome {
        results,
        errors,
        log,
    }
}

fn push_error(
    log: &mut Vec<RetryLogEntry>,
    new_errors: &mut Vec<ErrorRecord>,
    source: &ErrorRecord,
    error_message: String,
    log_message: String,
) {
    log.push(RetryLogEntry {
        docid: source.docid,
        category: source.category.clone(),
        status: RetryStatus::Error,
        message: log_message,
        time: timestamp(),
    });
    new_errors.push(ErrorRecord {
        docid: source.docid,
        category: source.category.clone(),
        message: error_message,
        stage: ErrorStage::Retry,
        time: timestamp(),
    });
}
