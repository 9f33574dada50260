//! QuickEdit CLI: render a declarative project file to MP4.
//!
//! Usage:
//!   quickedit -p project.json -o out.mp4             Render
//!   quickedit -p project.json -o out.mp4 --dry-run   Print the render plan
//!   quickedit -p project.json --check                List missing sources

use std::path::PathBuf;

use clap::Parser;

use quickedit_common::config::AppConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "quickedit",
    about = "Render a declarative video project to MP4",
    version,
    author
)]
struct Cli {
    /// Project JSON file
    #[arg(short = 'p', long, visible_alias = "project-file-url-path")]
    project_file: PathBuf,

    /// Output MP4 file
    #[arg(
        short = 'o',
        long,
        visible_alias = "output-file-url-path",
        required_unless_present = "check"
    )]
    output_file: Option<PathBuf>,

    /// Replace an existing output file
    #[arg(long)]
    overwrite: bool,

    /// Fail if any track source cannot be opened
    #[arg(long)]
    strict: bool,

    /// Build the composition and print it without encoding
    #[arg(long, conflicts_with = "check")]
    dry_run: bool,

    /// Only report referenced files that do not exist
    #[arg(long)]
    check: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/quickedit/config.json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load(),
    };
    if cli.verbose {
        config.logging.level = "debug".to_string();
    }
    quickedit_common::logging::init_logging(&config.logging);
    tracing::debug!(config = ?cli.config, level = %config.logging.level, "Configuration loaded");

    if cli.check {
        return commands::check::run(&cli.project_file, &config);
    }

    let Some(output_file) = cli.output_file else {
        anyhow::bail!("--output-file is required");
    };
    let job = quickedit_render_engine::ExportJob {
        project_path: cli.project_file,
        output_path: output_file,
        overwrite: cli.overwrite,
        strict: cli.strict,
    };

    if cli.dry_run {
        commands::plan::run(job, &config).await
    } else {
        commands::render::run(job, &config).await
    }
}
