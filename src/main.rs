use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

mod cli;
mod client;
mod config;
mod envelope;
mod error;
mod fixtures;
mod listing;
mod materials;
mod payments;
mod record;
mod reference;
mod session;
mod shadow;
mod syllabus;
mod ui;
mod version;

#[cfg(test)]
mod tests;

use branchdesk_protocol::common::{MaterialSource, MaterialType, RecordStatus};

use cli::CliHandler;
use config::DataSourceMode;
use materials::MaterialKind;
use version::CURRENT_VERSION;

#[derive(Parser)]
#[command(
    name = "branchdesk",
    about = "Branch portal admin client for study materials, syllabuses and payments",
    long_about = "branchdesk - Admin client for the branch learning portal

OVERVIEW:
  Manage study materials, video classes, syllabuses and reference data, and
  review the payments dashboard, from the terminal.

DATA SOURCES:
  live      always read from the portal API
  fixture   read built-in demo data (payments, programs, courses)
  fallback  read live; use demo data only when the API is unreachable or
            answers with an unusable response (default)

QUICK START:
  branchdesk login --branch-code BR01     # Store your portal token
  branchdesk materials list               # Study materials from both collections
  branchdesk videos delete <ID>           # Delete a video class
  branchdesk catalog tree                 # Program / course / subject tree
  branchdesk payments stats               # Payments dashboard
  branchdesk browse                       # Interactive material search",
    version = CURRENT_VERSION,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Use this config file instead of the default location
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Override the configured data source for this run
    #[arg(long, global = true, value_enum)]
    pub data_source: Option<DataSourceMode>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Store a portal token and tenant codes
    Login(LoginArgs),

    /// Forget the stored token
    Logout,

    /// Show session, configuration and server status
    #[command(aliases = &["st"])]
    Status,

    /// Study materials (documents, links, paper sets)
    #[command(aliases = &["mat"])]
    Materials(MaterialsArgs),

    /// Video classes
    Videos(VideosArgs),

    /// Subjects collection (legacy materials view)
    Subjects(SubjectsArgs),

    /// Syllabus records and files
    Syllabus(SyllabusArgs),

    /// Payments dashboard and transactions
    #[command(aliases = &["pay"])]
    Payments(PaymentsArgs),

    /// Program / course / subject reference data
    Catalog(CatalogArgs),

    /// Interactive, debounced material search
    Browse(BrowseArgs),

    /// Configure settings
    #[command(aliases = &["cfg"])]
    Config(ConfigArgs),
}

fn parse_material_type(raw: &str) -> Result<MaterialType, String> {
    MaterialType::parse(raw).ok_or_else(|| {
        let known: Vec<&str> = MaterialType::ALL.iter().map(|t| t.as_str()).collect();
        format!("unknown material type '{}' (expected one of: {})", raw, known.join(", "))
    })
}

fn parse_status(raw: &str) -> Result<RecordStatus, String> {
    RecordStatus::parse(raw).ok_or_else(|| format!("unknown status '{}'", raw))
}

fn parse_source(raw: &str) -> Result<MaterialSource, String> {
    match raw.trim().to_lowercase().replace('-', "_").as_str() {
        "study_materials" | "materials" => Ok(MaterialSource::StudyMaterials),
        "subjects" => Ok(MaterialSource::Subjects),
        other => Err(format!("unknown source '{}' (study_materials or subjects)", other)),
    }
}

#[derive(Args)]
pub struct LoginArgs {
    /// Portal token; prompted for when omitted
    #[arg(long)]
    pub token: Option<String>,

    #[arg(long)]
    pub branch_code: Option<String>,

    #[arg(long)]
    pub franchise_code: Option<String>,
}

/// Program / course / subject filters
#[derive(Args, Clone, Default)]
pub struct ScopeArgs {
    #[arg(long)]
    pub program: Option<String>,

    #[arg(long)]
    pub course: Option<String>,

    #[arg(long)]
    pub subject: Option<String>,
}

#[derive(Args, Clone, Default)]
pub struct PageArgs {
    /// Free-text search
    #[arg(short, long)]
    pub search: Option<String>,

    #[arg(short, long, default_value_t = 1)]
    pub page: usize,

    /// Rows per page (defaults to the configured page size)
    #[arg(long)]
    pub page_size: Option<usize>,
}

#[derive(Args)]
pub struct MaterialsArgs {
    #[command(subcommand)]
    pub command: MaterialsCommand,
}

#[derive(Subcommand)]
pub enum MaterialsCommand {
    /// List materials from both collections
    #[command(aliases = &["ls"])]
    List {
        #[arg(long, value_enum, default_value_t = MaterialKind::NonVideo)]
        kind: MaterialKind,

        #[command(flatten)]
        scope: ScopeArgs,

        #[command(flatten)]
        page: PageArgs,
    },

    Show { id: String },

    /// Create a material without a file (links, externally hosted files)
    Create(MaterialCreateArgs),

    /// Upload a file as a new material
    Upload {
        file: PathBuf,

        #[command(flatten)]
        material: MaterialCreateArgs,
    },

    Update(MaterialUpdateArgs),

    #[command(aliases = &["rm"])]
    Delete {
        id: String,

        /// Collection the material was listed from
        #[arg(long, value_parser = parse_source, default_value = "study_materials")]
        source: MaterialSource,

        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Clone)]
pub struct MaterialCreateArgs {
    #[arg(long)]
    pub name: String,

    #[arg(long = "type", value_parser = parse_material_type, default_value = "document")]
    pub material_type: MaterialType,

    #[arg(long)]
    pub program: String,

    #[arg(long)]
    pub course: String,

    #[arg(long)]
    pub subject: String,

    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(long)]
    pub link: Option<String>,

    #[arg(long, default_value = "public")]
    pub access_level: String,
}

#[derive(Args)]
pub struct MaterialUpdateArgs {
    pub id: String,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long = "type", value_parser = parse_material_type)]
    pub material_type: Option<MaterialType>,

    #[arg(short, long)]
    pub description: Option<String>,

    #[arg(long)]
    pub link: Option<String>,

    #[arg(long)]
    pub access_level: Option<String>,

    #[arg(long, value_parser = parse_status)]
    pub status: Option<RecordStatus>,
}

#[derive(Args)]
pub struct VideosArgs {
    #[command(subcommand)]
    pub command: VideosCommand,
}

#[derive(Subcommand)]
pub enum VideosCommand {
    #[command(aliases = &["ls"])]
    List {
        #[command(flatten)]
        scope: ScopeArgs,

        #[command(flatten)]
        page: PageArgs,
    },

    /// Hide a video immediately and ask both collections to delete it
    #[command(aliases = &["rm"])]
    Delete {
        id: String,

        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
pub struct SubjectsArgs {
    #[command(subcommand)]
    pub command: SubjectsCommand,
}

#[derive(Subcommand)]
pub enum SubjectsCommand {
    #[command(aliases = &["ls"])]
    List {
        #[command(flatten)]
        scope: ScopeArgs,

        #[command(flatten)]
        page: PageArgs,
    },

    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        program: String,

        #[arg(long)]
        course: String,

        #[arg(long, value_parser = parse_status, default_value = "active")]
        status: RecordStatus,
    },

    Update {
        id: String,

        #[arg(long)]
        name: Option<String>,

        #[arg(long, value_parser = parse_status)]
        status: Option<RecordStatus>,
    },

    #[command(aliases = &["rm"])]
    Delete {
        id: String,

        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args)]
pub struct SyllabusArgs {
    #[command(subcommand)]
    pub command: SyllabusCommand,
}

#[derive(Args, Clone)]
pub struct SyllabusCreateArgs {
    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub program: String,

    #[arg(long)]
    pub course: String,

    #[arg(long)]
    pub subject: String,

    #[arg(short, long)]
    pub description: Option<String>,
}

#[derive(Subcommand)]
pub enum SyllabusCommand {
    #[command(aliases = &["ls"])]
    List {
        #[command(flatten)]
        scope: ScopeArgs,

        #[command(flatten)]
        page: PageArgs,
    },

    Show { id: String },

    Create(SyllabusCreateArgs),

    Upload {
        file: PathBuf,

        #[command(flatten)]
        syllabus: SyllabusCreateArgs,
    },

    Update {
        id: String,

        #[arg(long)]
        title: Option<String>,

        #[arg(short, long)]
        description: Option<String>,

        #[command(flatten)]
        scope: ScopeArgs,
    },

    #[command(aliases = &["rm"])]
    Delete {
        id: String,

        #[arg(short, long)]
        force: bool,
    },

    /// Save the syllabus file locally
    Download {
        id: String,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct PaymentsArgs {
    #[command(subcommand)]
    pub command: PaymentsCommand,
}

#[derive(Subcommand)]
pub enum PaymentsCommand {
    /// Headline stats and recent transactions
    Stats {
        #[command(flatten)]
        page: PageArgs,
    },

    Show { id: String },

    Update {
        id: String,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        amount_paid: Option<i64>,

        #[arg(long)]
        remarks: Option<String>,
    },
}

#[derive(Args)]
pub struct CatalogArgs {
    #[command(subcommand)]
    pub command: CatalogCommand,
}

#[derive(Subcommand)]
pub enum CatalogCommand {
    Programs,

    Courses {
        /// Program ID or name
        program: String,
    },

    Subjects {
        /// Program ID or name
        program: String,

        /// Course ID
        course: String,
    },

    /// Walk the hierarchy, optionally below one program
    Tree {
        /// Program ID or name
        #[arg(long)]
        program: Option<String>,
    },
}

#[derive(Args)]
pub struct BrowseArgs {
    #[arg(long, value_enum, default_value_t = MaterialKind::All)]
    pub kind: MaterialKind,
}

#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand)]
pub enum ConfigCommand {
    Show,
    SetEndpoint {
        url: String,
    },
    SetTimeout {
        seconds: u64,
    },
    SetDataSource {
        #[arg(value_enum)]
        mode: DataSourceMode,
    },
    SetPageSize {
        size: usize,
    },
    SetDebounce {
        millis: u64,
    },
    Reset,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose { "debug" } else { "warn" };
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(format!("branchdesk={}", log_level))
        .with_writer(std::io::stderr);
    subscriber.init();

    let mut handler = CliHandler::new(cli.config, cli.data_source);

    if let Err(e) = handler.execute(cli.command).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
