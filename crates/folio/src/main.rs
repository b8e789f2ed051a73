use crate::prelude::*;
use clap::Parser;

mod config;
mod doc;
mod error;
mod prelude;
mod render;
mod report;
mod store;
mod template;

#[derive(Debug, clap::Parser)]
#[command(
    author,
    version,
    about,
    long_about = "Edit numbered reports and block documents, and paginate them against page templates"
)]
pub struct App {
    #[command(subcommand)]
    pub command: SubCommands,

    #[clap(flatten)]
    global: Global,
}

#[derive(Debug, Clone, clap::Args)]
pub struct Global {
    /// Path to a folio.toml configuration file
    #[clap(long, env = "FOLIO_CONFIG", global = true)]
    config: Option<std::path::PathBuf>,

    /// Whether to display additional information.
    #[clap(long, env = "FOLIO_VERBOSE", global = true, default_value = "false")]
    verbose: bool,
}

impl Global {
    /// Load the configuration this invocation points at.
    pub fn load_config(&self) -> Result<crate::config::Config> {
        crate::config::Config::load(self.config.as_deref())
    }
}

#[derive(Debug, clap::Parser)]
pub enum SubCommands {
    /// Edit the numbered section tree of a report
    Report(crate::report::App),

    /// Edit a block document and inspect its AI provenance
    Doc(crate::doc::App),

    /// Resolve and paginate reports or documents against a template
    Render(crate::render::RenderOptions),

    /// Inspect page templates
    Template(crate::template::App),
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    color_eyre::install()?;

    let app = App::parse();

    match app.command {
        SubCommands::Report(sub_app) => crate::report::run(sub_app, app.global).await,
        SubCommands::Doc(sub_app) => crate::doc::run(sub_app, app.global).await,
        SubCommands::Render(options) => crate::render::run(options, app.global).await,
        SubCommands::Template(sub_app) => crate::template::run(sub_app, app.global).await,
    }
    .map_err(|err: color_eyre::eyre::Report| eyre!(err))
}
