use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use crate::pipeline::{DEFAULT_BATCH_SIZE, DEFAULT_QUEUE_CAPACITY};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Parser, Debug)]
#[command(
    name = "customer-importer",
    about = "Count customers per email domain in a delimited customer file",
    version,
    long_about = None
)]
pub struct Args {
    /// Customer file to read (one record per line)
    pub file: PathBuf,

    /// Number of worker threads [default: available cores minus one]
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Records handed to a worker at a time
    #[arg(short, long, default_value_t = DEFAULT_BATCH_SIZE)]
    pub batch_size: usize,

    /// Capacity of each bounded queue between stages
    #[arg(long, default_value_t = DEFAULT_QUEUE_CAPACITY)]
    pub queue_capacity: usize,

    /// Field delimiter
    #[arg(short, long, default_value_t = ',')]
    pub delimiter: char,

    /// Tally on the calling thread instead of the worker pool
    #[arg(long)]
    pub sequential: bool,

    /// Also list the N domains with the most customers
    #[arg(short, long)]
    pub top: Option<usize>,

    /// Redact domain names for privacy
    #[arg(long)]
    pub redact: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    pub format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,
}
