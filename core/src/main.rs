use clap::Parser;
use dicomorg_core::cli::{build_filter, AnonymizeArgs, CatalogArgs, Cli, Command, OutputFormat};
use dicomorg_core::{DicomManager, MetadataTable, Result, TableReport};
use log::{error, info};
use std::process;

fn main() {
    let cli = Cli::parse();

    // Setup logging
    setup_logging(cli.verbose);

    let outcome = match &cli.command {
        Command::Catalog(args) => catalog(args),
        Command::Anonymize(args) => anonymize(args),
    };

    if let Err(e) = outcome {
        error!("{}", e);
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn setup_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::from_default_env()
        .filter_level(level)
        .init();
}

fn catalog(args: &CatalogArgs) -> Result<()> {
    let filter = build_filter(&args.filters)?;
    let manager = DicomManager::new(args.manager_config())?;

    let table = manager.filter(|record| filter.matches(record));
    info!(
        "{} of {} records match the filter",
        table.len(),
        manager.table().len()
    );

    output_table(&table, args.format);
    Ok(())
}

fn anonymize(args: &AnonymizeArgs) -> Result<()> {
    let filter = build_filter(&args.filters)?;
    let options = args.anonymize_options()?;

    info!("Input path: {}", args.input.display());
    info!("Output path: {}", args.output.display());
    info!("Number of workers: {}", args.workers);

    let manager = DicomManager::new(args.manager_config())?;
    let selected = manager.filter(|record| filter.matches(record));

    info!("Starting anonymization of {} files", selected.len());
    let written = manager.anonymize_table(&selected, &args.output, &options)?;
    info!("Anonymization completed");

    println!(
        "Anonymized {} of {} files into {}",
        written.len(),
        selected.len(),
        args.output.display()
    );
    Ok(())
}

fn output_table(table: &MetadataTable, format: OutputFormat) {
    match format {
        OutputFormat::Text => {
            println!("{}", TableReport::new(table));
        }
        OutputFormat::Paths => {
            for record in table {
                println!("{}", record.file_path().display());
            }
        }
        OutputFormat::Json => {
            #[cfg(feature = "json")]
            {
                match serde_json::to_string_pretty(table) {
                    Ok(json) => println!("{}", json),
                    Err(e) => {
                        error!("Failed to serialize to JSON: {}", e);
                        eprintln!("Error: Failed to serialize to JSON: {}", e);
                        process::exit(1);
                    }
                }
            }
            #[cfg(not(feature = "json"))]
            {
                eprintln!("Error: JSON output requires the 'json' feature");
                eprintln!("Rebuild with: cargo build --features json");
                process::exit(1);
            }
        }
    }
}
