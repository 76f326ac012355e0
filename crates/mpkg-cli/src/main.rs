use clap::{ArgGroup, Parser};
use mpkg::commands::build::{handle_build, BuildOptions};
use mpkg::commands::{convert, create, import, sync};
use mpkg::{GlobalOpts, MpkgError};
use mpkg_config::ToolPaths;
use mpkg_logger as logger;
use mpkg_manifest::ManifestFormat;
use mpkg_process::SystemRunner;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "mpkg")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(
    about = "macOS installer package builder",
    long_about = "mpkg builds signed and notarized macOS installer packages from a project directory \
                  containing payload/, scripts/ and a build-info manifest."
)]
#[command(group(ArgGroup::new("action").args(["create", "import", "sync", "convert"])))]
struct Cli {
    /// Project directory (the parent directory with --convert --all)
    project: PathBuf,

    /// Create a new project
    #[arg(long, help_heading = "Actions")]
    create: bool,

    /// Create a project from an existing package
    #[arg(long, value_name = "PKG", help_heading = "Actions")]
    import: Option<PathBuf>,

    /// Restore payload permissions from Bom.txt
    #[arg(long, help_heading = "Actions")]
    sync: bool,

    /// Convert the manifest to plist, json or yaml
    #[arg(long, value_name = "FORMAT", visible_alias = "migrate", help_heading = "Actions")]
    convert: Option<ManifestFormat>,

    /// Write the package BOM to Bom.txt after building
    #[arg(long, help_heading = "Build options")]
    export_bom_info: bool,

    /// Do not submit the package for notarization
    #[arg(long, help_heading = "Build options")]
    skip_notarization: bool,

    /// Do not staple the notarization ticket
    #[arg(long, help_heading = "Build options")]
    skip_stapling: bool,

    /// Env file with script placeholder values (default: <PROJECT>/.env)
    #[arg(long, value_name = "PATH", help_heading = "Build options")]
    env_file_path: Option<PathBuf>,

    /// Write the manifest as JSON
    #[arg(long, conflicts_with = "yaml", help_heading = "Create/import options")]
    json: bool,

    /// Write the manifest as YAML
    #[arg(long, help_heading = "Create/import options")]
    yaml: bool,

    /// Reuse an existing project directory
    #[arg(long, help_heading = "Create/import options")]
    force: bool,

    /// Convert every project below PROJECT
    #[arg(long, requires = "convert", help_heading = "Convert options")]
    all: bool,

    /// Show what would be converted without writing anything
    #[arg(long, requires = "convert", help_heading = "Convert options")]
    dry_run: bool,

    /// Also apply owners from Bom.txt (requires root)
    #[arg(long, requires = "sync", help_heading = "Sync options")]
    sync_ownership: bool,

    #[command(flatten)]
    global: GlobalOpts,
}

impl Cli {
    fn manifest_format(&self) -> ManifestFormat {
        if self.json {
            ManifestFormat::Json
        } else if self.yaml {
            ManifestFormat::Yaml
        } else {
            ManifestFormat::Plist
        }
    }

    fn build_options(&self) -> BuildOptions {
        BuildOptions {
            export_bom_info: self.export_bom_info,
            skip_notarization: self.skip_notarization,
            skip_stapling: self.skip_stapling,
            env_file_path: self.env_file_path.clone(),
        }
    }
}

/// Library crates log through `tracing`; `MPKG_LOG` overrides the level
fn init_tracing() {
    let filter = EnvFilter::try_from_env("MPKG_LOG")
        .unwrap_or_else(|_| EnvFilter::new(logger::verbosity_to_filter()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let result = if std::env::var("MPKG_LOG_FORMAT").is_ok_and(|f| f == "json") {
        builder.json().try_init()
    } else {
        builder.try_init()
    };
    if let Err(e) = result {
        eprintln!("Warning: Failed to initialize tracing: {}", e);
    }
}

async fn run(cli: Cli) -> Result<(), MpkgError> {
    let format = cli.manifest_format();

    if cli.create {
        return create::handle_create(&cli.project, format, cli.force);
    }
    if cli.sync {
        return sync::handle_sync(&cli.project, cli.sync_ownership);
    }
    if let Some(target) = cli.convert {
        return convert::handle_convert(&cli.project, target, cli.all, cli.dry_run)
            .map_err(MpkgError::from);
    }

    let tools = ToolPaths::load()?;
    let runner = SystemRunner;

    if let Some(package) = &cli.import {
        return import::handle_import(&runner, &tools, package, &cli.project, format, cli.force)
            .await;
    }

    handle_build(&runner, &tools, &cli.project, cli.build_options()).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = logger::init_with_verbosity(cli.global.verbosity_level(), cli.global.quiet) {
        eprintln!("Warning: Failed to initialize logger: {}", e);
    }
    init_tracing();

    if let Err(e) = run(cli).await {
        logger::spinner_stop();
        logger::error(&e.to_string());
        std::process::exit(e.exit_code());
    }
}
