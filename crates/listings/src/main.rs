use crate::prelude::*;
use clap::Parser;

mod adapters;
mod artifacts;
mod classify;
mod error;
mod prelude;
mod regions;
mod scan;
mod settings;
mod summary;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Find the numbered code listings of a scanned book and queue them for OCR"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Detection tuning file (TOML); any subset of the defaults may be overridden
    #[clap(long, env = "LISTINGS_CONFIG", global = true)]
    config: Option<std::path::PathBuf>,

    /// Whether to display additional information.
    #[clap(long, env = "LISTINGS_VERBOSE", global = true, default_value = "false")]
    verbose: bool,

    /// Suppress progress output.
    #[clap(long, short, env = "LISTINGS_QUIET", global = true, default_value = "false")]
    quiet: bool,
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Run the full pipeline over a PDF and write the OCR task list
    Scan(crate::scan::App),

    /// Show the classifier verdict for each page of a PDF
    Classify(crate::classify::App),

    /// Locate shaded code regions on a single page image
    Regions(crate::regions::App),

    /// Print a task list as a table
    Summary(crate::summary::App),
}

fn main() -> Result<()> {
    let app = App::parse();

    let default_filter = if app.global.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
    color_eyre::install()?;

    match app.command {
        SubCommands::Scan(sub_app) => crate::scan::run(sub_app, app.global),
        SubCommands::Classify(sub_app) => crate::classify::run(sub_app, app.global),
        SubCommands::Regions(sub_app) => crate::regions::run(sub_app, app.global),
        SubCommands::Summary(sub_app) => crate::summary::run(sub_app, app.global),
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
