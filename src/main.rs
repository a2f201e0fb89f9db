use anyhow::Result;
use clap::Parser;
use customer_importer::{import_customers, print_results, utils, Args, ImportOptions};
use tracing::error;

fn main() -> Result<()> {
    let args = Args::parse();
    utils::setup_logging(args.verbose);
    utils::validate_args(&args)?;

    let options = ImportOptions::from(&args);
    match import_customers(&args.file, &options) {
        Ok(tally) => {
            print_results(&tally, &args)?;
            Ok(())
        }
        Err(e) => {
            error!(action = "fail", component = "main", error = %e, "Import failed");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
