use std::fs::File;
use std::io::{BufReader, Write};
use std::path::Path;
use std::time::Instant;
use tracing::info;

use crate::args::{Args, OutputFormat};
use crate::domain::{redact_domain, EmailDomain, DEFAULT_DELIMITER};
use crate::error::{Result, TallyError};
use crate::pipeline::{self, PipelineConfig};
use crate::stats::Tally;
use crate::utils::format_number;

const READ_BUFFER_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportOptions {
    pub pipeline: PipelineConfig,
    pub delimiter: u8,
    pub sequential: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            pipeline: PipelineConfig::default(),
            delimiter: DEFAULT_DELIMITER,
            sequential: false,
        }
    }
}

impl From<&Args> for ImportOptions {
    fn from(args: &Args) -> Self {
        let mut pipeline = PipelineConfig::default()
            .with_batch_size(args.batch_size)
            .with_queue_capacity(args.queue_capacity);
        if let Some(workers) = args.workers {
            pipeline = pipeline.with_workers(workers);
        }

        Self {
            pipeline,
            // Non-ASCII delimiters are rejected by `validate_args`.
            delimiter: u8::try_from(args.delimiter).unwrap_or(DEFAULT_DELIMITER),
            sequential: args.sequential,
        }
    }
}

/// Tallies customers per email domain in the file at `path`.
pub fn import_customers(path: &Path, options: &ImportOptions) -> Result<Tally> {
    let start_time = Instant::now();
    info!(action = "start", component = "import", file_path = ?path, "Importing customers");

    let file = File::open(path).map_err(|source| TallyError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::with_capacity(READ_BUFFER_BYTES, file);
    let transform = EmailDomain {
        delimiter: options.delimiter,
    };

    let tally = if options.sequential {
        pipeline::tally_sequential(reader, &transform)?
    } else {
        pipeline::run(reader, &transform, &options.pipeline)?
    };

    info!(
        action = "complete",
        component = "import",
        records = tally.records,
        domains = tally.domains.len(),
        malformed = tally.malformed,
        duration_ms = start_time.elapsed().as_millis(),
        "Import completed"
    );
    Ok(tally)
}

fn display_domain(domain: &str, redact: bool) -> String {
    if redact {
        redact_domain(domain)
    } else {
        domain.to_string()
    }
}

pub fn write_results<W: Write>(out: &mut W, tally: &Tally, args: &Args) -> Result<()> {
    match args.format {
        OutputFormat::Json => {
            if args.redact {
                let mut redacted = tally.clone();
                for entry in &mut redacted.domains {
                    entry.domain = redact_domain(&entry.domain);
                }
                serde_json::to_writer_pretty(&mut *out, &redacted)?;
            } else {
                serde_json::to_writer_pretty(&mut *out, tally)?;
            }
            writeln!(out).map_err(TallyError::Write)?;
        }
        OutputFormat::Text => {
            for entry in &tally.domains {
                writeln!(
                    out,
                    "{}: {}",
                    display_domain(&entry.domain, args.redact),
                    format_number(entry.count)
                )
                .map_err(TallyError::Write)?;
            }

            writeln!(
                out,
                "\nTotal unique domains found: {}",
                format_number(tally.domains.len() as u64)
            )
            .map_err(TallyError::Write)?;
            writeln!(
                out,
                "Records without a valid email domain: {}",
                format_number(tally.malformed)
            )
            .map_err(TallyError::Write)?;

            if let Some(top_count) = args.top {
                let top = tally.top(top_count);
                writeln!(out, "\nTop {} domains by customers:", top.len()).map_err(TallyError::Write)?;
                for entry in top {
                    writeln!(
                        out,
                        "- {}: {} customers",
                        display_domain(&entry.domain, args.redact),
                        format_number(entry.count)
                    )
                    .map_err(TallyError::Write)?;
                }
            }
        }
    }
    Ok(())
}

pub fn print_results(tally: &Tally, args: &Args) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    write_results(&mut out, tally, args)
}
