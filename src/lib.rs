pub mod args;
pub mod domain;
pub mod error;
pub mod importer;
pub mod pipeline;
pub mod stats;
pub mod utils;

pub use args::Args;
pub use domain::{extract_domain, DomainKey, EmailDomain, Transform, SENTINEL};
pub use error::TallyError;
pub use importer::{import_customers, print_results, ImportOptions};
pub use pipeline::{run, tally_sequential, PipelineConfig};
pub use stats::{finalize, DomainCount, FrequencyTable, Tally};
