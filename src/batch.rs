//! Per-category batch processing.
//!
//! One pass over the dataset rows of a single category: truncate the article
//! content, send it to the completion client with the category's system
//! prompt, parse the response, and record either a [`LabeledRow`] or an
//! [`ErrorRecord`]. A fixed delay follows every API call, success or failure,
//! to stay under the endpoint's rate limit. A failed row never aborts the
//! pass.

use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, instrument, warn};

use crate::api::{Complete, Message};
use crate::models::{Dataset, ErrorRecord, ErrorStage, LabeledRow, Row};
use crate::parse::{ParsedFields, parse_completion};
use crate::utils::{timestamp, truncate_context};

/// Build the two-message conversation for a row: the category's system
/// prompt followed by the (truncated) article content.
pub fn build_messages(prompt: &str, row: &Row) -> Vec<Message> {
    vec![
        Message::system(prompt),
        Message::user(truncate_context(&row.content)),
    ]
}

/// Process every row of one category sequentially.
///
/// Returns the successfully labeled rows and the per-row error records, in
/// dataset order. `call_delay` is applied after each API call.
#[instrument(level = "info", skip_all, fields(category = %category))]
pub async fn process_category<C: Complete>(
    client: &C,
    dataset: &Dataset,
    category: &str,
    prompt: &str,
    call_delay: Duration,
) -> (Vec<LabeledRow>, Vec<ErrorRecord>) {
    let mut results = Vec::new();
    let mut errors = Vec::new();

    let total = dataset.in_category(category).count();
    info!(total, "Processing category rows");

    for row in dataset.in_category(category) {
        let messages = build_messages(prompt, row);

        let outcome = match client.complete(&messages).await {
            Ok(content) => parse_completion(&content).map_err(|e| {
                format!(
                    "Failed to process content for docid {} in {} - {}",
                    row.docid, category, e
                )
            }),
            Err(e) => Err(e.to_string()),
        };

        match outcome {
            Ok(fields) => {
                info!(docid = row.docid, "Processed row");
                results.push(LabeledRow::from_row(
                    row,
                    fields.pred,
                    fields.reason,
                    fields.summary,
                ));
            }
            Err(message) => {
                warn!(docid = row.docid, error = %message, "Row failed");
                errors.push(ErrorRecord {
                    docid: row.docid,
                    category: category.to_string(),
                    message,
                    stage: ErrorStage::Initial,
                    time: timestamp(),
                });
            }
        }

        sleep(call_delay).await;
    }

    info!(
        successful = results.len(),
        failed = errors.len(),
        "Category pass complete"
    );
    (results, errors)
}

/// Process a single row and return the parsed fields. Debugging aid behind
/// the `single` subcommand.
#[instrument(level = "info", skip_all, fields(docid = row.docid, category = %row.category))]
pub async fn process_single_row<C: Complete>(
    client: &C,
    row: &Row,
    prompt: &str,
) -> Result<ParsedFields, Box<dyn std::error::Error>> {
    let messages = build_messages(prompt, row);
    let content = client.complete(&messages).await?;
    let fields = parse_completion(&content)?;
    Ok(fields)
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use crate::api::{CallError, Complete, Message};

    /// A completion client that replays a fixed script of responses and
    /// records every message list it was called with.
    pub struct ScriptedClient {
        script: Mutex<VecDeque<Result<String, CallError>>>,
        pub calls: Mutex<Vec<Vec<Message>>>,
    }

    impl ScriptedClient {
        pub fn new(script: Vec<Result<String, CallError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    impl Complete for ScriptedClient {
        async fn complete(&self, messages: &[Message]) -> Result<String, CallError> {
            self.calls.lock().unwrap().push(messages.to_vec());
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(CallError("Script exhausted".to_string())))
        }
    }

    pub fn ok_json(pred: &str) -> Result<String, CallError> {
        Ok(format!(
            r#"{{"요약": "요약문", "분류": "{pred}", "근거": "근거문"}}"#
        ))
    }
}
