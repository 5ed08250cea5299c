//! # CLOVA News Labeler
//!
//! A batch pipeline that classifies and summarizes Korean news articles with
//! the CLOVA Studio HCX-003 chat-completion API and persists the labeled
//! results as CSV files, re-driving transient failures through a bounded
//! retry loop.
//!
//! ## Usage
//!
//! ```sh
//! clova_news_labeler run -i dataset.csv -p prompts.yaml -o ./out
//! ```
//!
//! ## Architecture
//!
//! The `run` subcommand is a pipeline:
//! 1. **Load**: read the dataset CSV and the per-category prompt file
//! 2. **Fetch** (optional): scrape missing article bodies from each row's link
//! 3. **Process**: for each category, send every row to the model and parse
//!    the response into predicted label, rationale, and summary
//! 4. **Retry**: re-drive failed rows up to the attempt bound, skipping
//!    permanent policy failures
//! 5. **Output**: write timestamped results, errors, and retry-log CSVs
//!
//! Processing is strictly sequential with a fixed delay after every API call;
//! the endpoint is aggressively rate limited.

use clap::Parser;
use itertools::Itertools;
use std::error::Error;
use std::time::Duration;
use tracing::{error, info, instrument};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

mod api;
mod batch;
mod cli;
mod config;
mod models;
mod outputs;
mod parse;
mod retry;
mod scrapers;
mod utils;

use api::{ClovaClient, Message};
use batch::{process_category, process_single_row};
use cli::{Cli, Command};
use config::Prompts;
use models::{ErrorRecord, ResultSet};
use outputs::csv::{read_dataset, write_errors, write_results, write_retry_log};
use retry::{ErrorClass, RetryOutcome, classify, retry_failed_rows};
use scrapers::hankookilbo;
use utils::{ensure_writable_dir, file_timestamp, truncate_context};

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let args = Cli::parse();
    let client = ClovaClient::new(args.api_key, args.apigw_api_key);

    match args.command {
        Command::Run {
            input,
            prompts,
            output_dir,
            fetch_content,
            max_retries,
            call_delay_secs,
        } => {
            run_pipeline(
                &client,
                &input,
                &prompts,
                &output_dir,
                fetch_content,
                max_retries,
                Duration::from_secs(call_delay_secs),
            )
            .await
        }
        Command::Single {
            input,
            prompts,
            docid,
            category,
        } => run_single(&client, &input, &prompts, docid, &category).await,
        Command::Tokens {
            input,
            docid,
            category,
        } => run_tokens(&client, &input, docid, &category).await,
    }
}

/// The full batch pipeline behind the `run` subcommand.
#[instrument(level = "info", skip_all)]
async fn run_pipeline(
    client: &ClovaClient,
    input: &str,
    prompts_path: &str,
    output_dir: &str,
    fetch_content: bool,
    max_retries: usize,
    call_delay: Duration,
) -> Result<(), Box<dyn Error>> {
    let start_time = std::time::Instant::now();
    info!("Pipeline starting up");

    // Early check: ensure the output dir is writable before burning API calls
    if let Err(e) = ensure_writable_dir(output_dir).await {
        error!(
            path = %output_dir,
            error = %e,
            "Output directory is not writable (fix perms or choose a different path)"
        );
        return Err(e);
    }

    let prompts = Prompts::load(prompts_path)?;
    info!(categories = prompts.len(), prompts_path, "Loaded prompts");

    let mut dataset = read_dataset(input).await?;
    if fetch_content {
        hankookilbo::fill_contents(&mut dataset).await;
    }

    // ---- Initial pass, one category at a time ----
    let mut results = ResultSet::default();
    let mut errors: Vec<ErrorRecord> = Vec::new();
    for (category, prompt) in prompts.iter() {
        info!(category, "Processing category");
        let (rows, errs) = process_category(client, &dataset, category, prompt, call_delay).await;
        results.rows.extend(rows);
        errors.extend(errs);
    }
    results.sort_by_docid();

    let failures_by_category = errors.iter().map(|e| e.category.clone()).counts();
    info!(
        successful = results.len(),
        failed = errors.len(),
        ?failures_by_category,
        "Initial passes complete"
    );

    // ---- Retry, skipping permanent policy failures ----
    let (retryable, permanent): (Vec<ErrorRecord>, Vec<ErrorRecord>) = errors
        .into_iter()
        .partition(|e| classify(&e.message) != ErrorClass::Permanent);

    let outcome = if retryable.is_empty() || max_retries == 0 {
        RetryOutcome {
            results,
            errors: retryable,
            log: Vec::new(),
        }
    } else {
        retry_failed_rows(
            client,
            &dataset,
            &prompts,
            results,
            retryable,
            max_retries,
            call_delay,
        )
        .await
    };

    let mut final_errors = outcome.errors;
    final_errors.extend(permanent);

    // ---- Output artifacts ----
    let ts = file_timestamp();
    let results_path = write_results(&outcome.results, output_dir, &ts).await?;
    let errors_path = write_errors(&final_errors, output_dir, &ts).await?;
    let log_path = write_retry_log(&outcome.log, output_dir, &ts).await?;

    let elapsed = start_time.elapsed();
    info!(
        results = %results_path.display(),
        errors = %errors_path.display(),
        retry_log = %log_path.display(),
        labeled = outcome.results.len(),
        unresolved = final_errors.len(),
        secs = elapsed.as_secs(),
        "Pipeline complete"
    );
    Ok(())
}

/// Process one row and print the parsed fields. Debugging aid.
async fn run_single(
    client: &ClovaClient,
    input: &str,
    prompts_path: &str,
    docid: u64,
    category: &str,
) -> Result<(), Box<dyn Error>> {
    let prompts = Prompts::load(prompts_path)?;
    let dataset = read_dataset(input).await?;

    let row = dataset
        .find(docid, category)
        .ok_or_else(|| format!("No row with docid {docid} in category {category}"))?;
    let prompt = prompts
        .get(category)
        .ok_or_else(|| format!("No prompt configured for category {category}"))?;

    let fields = process_single_row(client, row, prompt).await?;
    println!("Summary: {}", fields.summary);
    println!("Prediction: {}", fields.pred);
    println!("Reason: {}", fields.reason);
    Ok(())
}

/// Count the tokens a row's (truncated) content would consume.
async fn run_tokens(
    client: &ClovaClient,
    input: &str,
    docid: u64,
    category: &str,
) -> Result<(), Box<dyn Error>> {
    let dataset = read_dataset(input).await?;
    let row = dataset
        .find(docid, category)
        .ok_or_else(|| format!("No row with docid {docid} in category {category}"))?;

    let messages = vec![Message::user(truncate_context(&row.content))];
    let total = client.count_tokens(&messages).await?;
    println!("{total}");
    Ok(())
}
