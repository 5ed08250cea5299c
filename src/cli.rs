//! Command-line interface definitions.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! API credentials can be provided via flags or environment variables.

use clap::{Parser, Subcommand};

/// Command-line arguments for the labeling pipeline.
///
/// # Examples
///
/// ```sh
/// # Full pipeline
/// clova_news_labeler run -i dataset.csv -p prompts.yaml -o ./out
///
/// # Scrape missing article bodies first
/// clova_news_labeler run -i dataset.csv -p prompts.yaml -o ./out --fetch-content
///
/// # Inspect one row
/// clova_news_labeler single -i dataset.csv -p prompts.yaml --docid 122 --category 난이도
/// ```
#[derive(Parser, Debug)]
#[command(author, version, about)]
pub struct Cli {
    /// CLOVA Studio API key
    #[arg(long, env = "CLOVA_API_KEY", hide_env_values = true)]
    pub api_key: String,

    /// NCP API Gateway key
    #[arg(long, env = "CLOVA_APIGW_API_KEY", hide_env_values = true)]
    pub apigw_api_key: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run the batch pipeline: process every category, retry failures, write CSVs
    Run {
        /// Input dataset CSV
        #[arg(short, long)]
        input: String,

        /// YAML file mapping categories to system prompts
        #[arg(short, long)]
        prompts: String,

        /// Directory for the results/errors/retry-log CSVs
        #[arg(short, long, default_value = ".")]
        output_dir: String,

        /// Scrape missing article bodies from each row's link before processing
        #[arg(long)]
        fetch_content: bool,

        /// Maximum retry attempts for failed rows
        #[arg(long, default_value_t = 3)]
        max_retries: usize,

        /// Delay between API calls, in seconds
        #[arg(long, default_value_t = 6)]
        call_delay_secs: u64,
    },

    /// Process a single row and print the parsed fields
    Single {
        /// Input dataset CSV
        #[arg(short, long)]
        input: String,

        /// YAML file mapping categories to system prompts
        #[arg(short, long)]
        prompts: String,

        /// Document id of the row
        #[arg(long)]
        docid: u64,

        /// Category of the row
        #[arg(long)]
        category: String,
    },

    /// Count the tokens a row's content would consume
    Tokens {
        /// Input dataset CSV
        #[arg(short, long)]
        input: String,

        /// Document id of the row
        #[arg(long)]
        docid: u64,

        /// Category of the row
        #[arg(long)]
        category: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_run_parsing() {
        let cli = Cli::parse_from([
            "clova_news_labeler",
            "--api-key",
            "k1",
            "--apigw-api-key",
            "k2",
            "run",
            "--input",
            "dataset.csv",
            "--prompts",
            "prompts.yaml",
            "--output-dir",
            "./out",
        ]);

        assert_eq!(cli.api_key, "k1");
        match cli.command {
            Command::Run {
                input,
                prompts,
                output_dir,
                fetch_content,
                max_retries,
                call_delay_secs,
            } => {
                assert_eq!(input, "dataset.csv");
                assert_eq!(prompts, "prompts.yaml");
                assert_eq!(output_dir, "./out");
                assert!(!fetch_content);
                assert_eq!(max_retries, 3);
                assert_eq!(call_delay_secs, 6);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn test_cli_run_short_flags_and_overrides() {
        let cli = Cli::parse_from([
            "clova_news_labeler",
            "--api-key",
            "k1",
            "--apigw-api-key",
            "k2",
            "run",
            "-i",
            "d.csv",
            "-p",
            "p.yaml",
            "--fetch-content",
            "--max-retries",
            "5",
            "--call-delay-secs",
            "1",
        ]);

        match cli.command {
            Command::Run {
                fetch_content,
                max_retries,
                call_delay_secs,
                ..
            } => {
                assert!(fetch_content);
                assert_eq!(max_retries, 5);
                assert_eq!(call_delay_secs, 1);
            }
            _ => panic!("expected run subcommand"),
        }
    }

    #[test]
    fn test_cli_single_parsing() {
        let cli = Cli::parse_from([
            "clova_news_labeler",
            "--api-key",
            "k1",
            "--apigw-api-key",
            "k2",
            "single",
            "-i",
            "d.csv",
            "-p",
            "p.yaml",
            "--docid",
            "122",
            "--category",
            "난이도",
        ]);

        match cli.command {
            Command::Single {
                docid, category, ..
            } => {
                assert_eq!(docid, 122);
                assert_eq!(category, "난이도");
            }
            _ => panic!("expected single subcommand"),
        }
    }
}
