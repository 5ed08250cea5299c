//! Output generation for pipeline artifacts.
//!
//! Each `run` invocation writes three timestamped CSV files into the output
//! directory:
//!
//! ```text
//! output_dir/
//! ├── results_20250101_093000.csv
//! ├── errors_20250101_093000.csv
//! └── retry_log_20250101_093000.csv
//! ```
//!
//! The same module reads the input dataset CSV.

pub mod csv;
