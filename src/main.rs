use anyhow::Result;
use bpm::commands::{self, Config, InstallRequest};
use bpm::source::SearchSort;
use clap::Parser;
use std::path::PathBuf;

/// bpm - bin package manager
///
/// Install prebuilt binaries from GitHub releases, keep track of every file
/// placed, and update or remove them later.
///
/// If the GITHUB_TOKEN environment variable is set, it will be used for authentication.
/// This is useful for accessing private repositories or avoiding rate limits.
///
/// Examples:
///   bpm install eza                              # Search for eza and install it
///   bpm install https://github.com/sxyazi/yazi   # Install from a repository URL
///   bpm remove eza
#[derive(Parser, Debug)]
#[command(author, version = env!("BPM_VERSION"), about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration root holding the registry (also via BPM_ROOT)
    #[arg(
        long = "root",
        short = 'r',
        env = "BPM_ROOT",
        value_name = "PATH",
        global = true
    )]
    pub root: Option<PathBuf>,

    /// Filesystem prefix for installed files on Linux (also via BPM_PREFIX)
    #[arg(
        long = "prefix",
        env = "BPM_PREFIX",
        value_name = "PATH",
        default_value = "/",
        global = true
    )]
    pub prefix: PathBuf,

    /// GitHub API URL (defaults to https://api.github.com)
    #[arg(long = "api-url", value_name = "URL", global = true)]
    pub api_url: Option<String>,
}

#[derive(clap::Subcommand, Debug)]
enum Commands {
    /// Install packages by name or repository URL
    #[command(visible_alias = "i")]
    Install(InstallArgs),

    /// Remove installed packages
    #[command(visible_alias = "r")]
    Remove(RemoveArgs),

    /// Update installed packages (all of them when no name is given)
    #[command(visible_alias = "u")]
    Update(UpdateArgs),

    /// Show installed packages, or the details of one
    Info(InfoArgs),

    /// Rename the launchers of an installed binary
    Alias(AliasArgs),
}

#[derive(clap::Args, Debug)]
pub struct InstallArgs {
    /// Package names or https://github.com/<owner>/<repo> URLs
    #[arg(value_name = "PACKAGE", required = true)]
    pub packages: Vec<String>,

    /// Name of the main executable inside the archive
    #[arg(short = 'b', long = "bin-name", value_name = "NAME")]
    pub bin_name: Option<String>,

    /// Install from an archive on disk
    #[arg(short = 'l', long = "local", value_name = "ARCHIVE")]
    pub local: Option<PathBuf>,

    /// Never prompt; take the best search result
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Pick the asset by hand
    #[arg(short = 'i', long)]
    pub interactive: bool,

    /// Install only the main executable
    #[arg(long = "one-bin")]
    pub one_bin: bool,

    /// Prefer GNU libc builds over musl builds
    #[arg(long = "prefer-gnu")]
    pub prefer_gnu: bool,

    /// Show what would be installed without changing anything
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,

    /// Sort order of repository search results
    #[arg(long, value_enum)]
    pub sort: Option<SearchSort>,

    /// Keep only assets whose name contains one of these words
    #[arg(long = "filter", value_name = "WORD")]
    pub filters: Vec<String>,
}

#[derive(clap::Args, Debug)]
pub struct RemoveArgs {
    #[arg(value_name = "PACKAGE", required = true)]
    pub packages: Vec<String>,

    /// Forget the package but leave its files on disk
    #[arg(long)]
    pub soft: bool,

    /// Show what would be removed without changing anything
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug)]
pub struct UpdateArgs {
    #[arg(value_name = "PACKAGE")]
    pub packages: Vec<String>,

    /// Show what would be updated without changing anything
    #[arg(short = 'n', long = "dry-run")]
    pub dry_run: bool,
}

#[derive(clap::Args, Debug)]
pub struct InfoArgs {
    #[arg(value_name = "PACKAGE")]
    pub package: Option<String>,
}

#[derive(clap::Args, Debug)]
pub struct AliasArgs {
    /// Current launcher name
    pub old_name: String,
    /// New launcher name
    pub new_name: String,
}

impl Cli {
    fn quiet(&self) -> bool {
        matches!(&self.command, Commands::Install(args) if args.quiet)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let default_filter = if cli.quiet() { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let runtime = bpm::runtime::RealRuntime;
    let config = Config::new(runtime, cli.root, cli.prefix, cli.api_url)?;

    match cli.command {
        Commands::Install(args) => {
            let request = InstallRequest::builder(args.packages)
                .bin_name(args.bin_name)
                .local(args.local)
                .quiet(args.quiet)
                .interactive(args.interactive)
                .one_bin(args.one_bin)
                .prefer_gnu(args.prefer_gnu)
                .dry_run(args.dry_run)
                .sort(args.sort)
                .filters(args.filters)
                .build()?;
            commands::install(&config, &request).await?
        }
        Commands::Remove(args) => commands::remove(&config, &args.packages, args.soft, args.dry_run)?,
        Commands::Update(args) => commands::update(&config, &args.packages, args.dry_run).await?,
        Commands::Info(args) => commands::info(&config, args.package.as_deref())?,
        Commands::Alias(args) => commands::alias(&config, &args.old_name, &args.new_name)?,
    }
    Ok(())
}
