/// # waitress CLI Interface (Module)
///
/// Command parsing and the orchestration of one run: load the profile, build the local
/// catalog, then diff, export, delete or publish depending on the flags.
///
/// All catalog and reconciliation logic lives in `waitress-core`; this module only wires
/// it to the [`CrmClient`] and decides exit status.
///
/// ## Exit status
/// - `Ok(())` (exit 0): publish finished, `--diff`, `--export`, a complete `--delete_only`,
///   or no descriptor files at all.
/// - `Err` (exit 1): config, catalog, authentication or listing failures, and a
///   `--delete_only` that left records behind.
use crate::crm::CrmClient;
use crate::load_config::load_config;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::ffi::OsString;
use std::path::PathBuf;
use tracing::{error, info, warn};
use waitress_core::catalog::{diff, join_all, publishable, CatalogError};
use waitress_core::categories::load_categories;
use waitress_core::config::Config;
use waitress_core::contract::RecordStore;
use waitress_core::descriptor::parse_folder;
use waitress_core::export::export_to_spreadsheet;
use waitress_core::synchronise::{delete_all, reconcile, RowOutcome};

/// ... Waitress, at your service ... Publishes the Remote Action catalog to the CRM library.
#[derive(Parser, Debug)]
#[clap(name = "waitress", version)]
pub struct Cli {
    /// Path to the JSON config file
    #[clap(short = 'c', long)]
    pub config: PathBuf,

    /// Delete the whole Remote Action library and exit
    #[clap(short = 'd', long = "delete_only")]
    pub delete_only: bool,

    /// Recreate the library from scratch instead of replacing records by name (also `-fs`)
    #[clap(long = "from_scratch", visible_alias = "fs")]
    pub from_scratch: bool,

    /// Enable debug logging
    #[clap(short = 'v', long)]
    pub verbose: bool,

    /// List names found only in the JSON folder or only in the category sheet, then exit
    #[clap(short = 'i', long)]
    pub diff: bool,

    /// Export the catalog and the current library to spreadsheets, then exit (also `-ex`)
    #[clap(long, visible_alias = "ex")]
    pub export: bool,

    /// Directory receiving this run's log file
    #[clap(long = "log-dir", default_value = "logs")]
    pub log_dir: PathBuf,
}

/// Two-letter single-dash flags clap cannot declare as shorts, with their long forms.
const SINGLE_DASH_FLAGS: [(&str, &str); 2] = [("-fs", "--from_scratch"), ("-ex", "--export")];

impl Cli {
    /// Parse `args` (program name first), also accepting the single-dash `-fs` and `-ex`.
    pub fn try_parse_args<I, T>(args: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        Cli::try_parse_from(expand_single_dash_flags(args))
    }
}

fn expand_single_dash_flags<I, T>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    args.into_iter()
        .map(|arg| {
            let arg: OsString = arg.into();
            SINGLE_DASH_FLAGS
                .iter()
                .find(|(short, _)| arg == **short)
                .map_or(arg, |(_, long)| OsString::from(long))
        })
        .collect()
}

async fn connect(config: &Config) -> Result<CrmClient> {
    CrmClient::authenticate(config.endpoints.clone(), &config.credentials)
        .await
        .context("Cannot retrieve token")
}

async fn delete_library(config: &Config) -> Result<()> {
    let client = connect(config).await?;
    let existing = client
        .list_existing()
        .await
        .context("Couldn't list existing library records")?;
    let summary = delete_all(&client, &existing).await;
    println!(
        "Deleted {} of {} library records.",
        summary.deleted, summary.requested
    );
    if !summary.all_deleted() {
        bail!(
            "{} library records could not be deleted",
            summary.failed_ids.len()
        );
    }
    Ok(())
}

/// Extracted async CLI logic entrypoint for integration tests and main()
pub async fn run(cli: Cli) -> Result<()> {
    tracing::info!("trace_initialised");

    let config = load_config(&cli.config)?;

    if cli.delete_only {
        info!(command = "delete_only", "Emptying the Remote Action library");
        return delete_library(&config).await;
    }

    let categories = load_categories(&config.paths.remote_actions_metadata)
        .context("Couldn't load categories data, check the path to the Excel file")?;
    let descriptors = match parse_folder(&config.paths.path_to_json) {
        Ok(descriptors) => descriptors,
        Err(CatalogError::NoDescriptors(path)) => {
            warn!(path = %path.display(), "No JSON files found, nothing to do");
            println!("No Remote Action JSON files found in {}.", path.display());
            return Ok(());
        }
        Err(e) => return Err(e).context("Couldn't parse JSON folder"),
    };

    if cli.diff {
        let delta = diff(&descriptors, &categories);
        for name in &delta.only_in_descriptors {
            println!("only in JSON folder: {name}");
        }
        for name in &delta.only_in_categories {
            println!("only in category sheet: {name}");
        }
        info!(
            only_in_descriptors = delta.only_in_descriptors.len(),
            only_in_categories = delta.only_in_categories.len(),
            "Catalog diff computed"
        );
        if !delta.is_empty() {
            let path =
                export_to_spreadsheet(&delta.entries(), &config.paths.export_dir, "RA_Delta")?;
            println!("Diff exported to {}", path.display());
        }
        return Ok(());
    }

    let joined = join_all(&categories, &descriptors).context("Couldn't get the full RA metadata")?;

    if cli.export {
        let path = export_to_spreadsheet(&joined, &config.paths.export_dir, "All_RA_Data")?;
        println!("Catalog exported to {}", path.display());
        let client = connect(&config).await?;
        let existing = client
            .list_existing()
            .await
            .context("Couldn't list existing library records")?;
        let path =
            export_to_spreadsheet(&existing, &config.paths.export_dir, "Library_Records")?;
        println!("Library records exported to {}", path.display());
        return Ok(());
    }

    let rows = publishable(&joined);
    info!(
        command = "publish",
        rows = rows.len(),
        internal = joined.len() - rows.len(),
        "Publishing catalog"
    );
    let client = connect(&config).await?;
    let existing = client
        .list_existing()
        .await
        .context("Couldn't list existing library records")?;
    let unnamed = existing.iter().filter(|r| r.name.is_none()).count();
    if unnamed > 0 && !cli.from_scratch {
        warn!(unnamed, "Some library records have no name and will not be replaced by name");
    }
    let report = reconcile(&client, &rows, &existing, cli.from_scratch).await;

    for row in report.failed() {
        if let RowOutcome::Failed(step) = row.outcome {
            error!(name = %row.name, ?step, "Remote Action was not published");
        }
    }
    println!(
        "Published {} of {} Remote Actions ({} library records removed).",
        report.published(),
        report.rows.len(),
        report.deleted
    );
    Ok(())
}
