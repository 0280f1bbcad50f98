use clap::{Parser, Subcommand};
use dirproxy_core::connections::tcp::TcpBackend;
use dirproxy_core::core::FailureTracker;
use dirproxy_core::{
    AttributeStore, DirectoryConnectionService, FileAttributeStore, ProfileCatalog, ProfileStore,
    ServiceError,
};
use log::info;
use std::fmt::{self, Display};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

/// Errors that end a CLI run.
#[derive(Debug)]
pub enum CliError {
    Io(io::Error),
    Service(ServiceError),
}

impl From<io::Error> for CliError {
    fn from(err: io::Error) -> Self {
        CliError::Io(err)
    }
}

impl From<ServiceError> for CliError {
    fn from(err: ServiceError) -> Self {
        CliError::Service(err)
    }
}

impl Display for CliError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CliError::Io(e) => write!(f, "IO error: {}", e),
            CliError::Service(e) => write!(f, "{}", e),
        }
    }
}

/// Command-line arguments.
#[derive(Parser, Debug)]
#[command(name = "dirproxy", version, subcommand_required = true)]
pub struct Args {
    /// Directory holding `<profile>.json` files
    #[arg(long, global = true)]
    pub profiles_dir: Option<PathBuf>,
    /// Directory holding persisted service state
    #[arg(long, global = true)]
    pub state_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List configured directory profiles
    Profiles,
    /// Open the proxy connection for a profile and report the outcome
    Connect {
        /// Profile id (omit for the default profile)
        #[arg(long)]
        profile: Option<String>,
    },
    /// Print the last recorded failure of every profile
    Failures,
    /// Print the directory health snapshot
    Health,
}

fn profile_store(args: &Args) -> io::Result<ProfileStore> {
    match &args.profiles_dir {
        Some(dir) => ProfileStore::at(dir),
        None => ProfileStore::new(),
    }
}

fn attribute_store(args: &Args) -> io::Result<Arc<dyn AttributeStore>> {
    let store = match &args.state_dir {
        Some(dir) => FileAttributeStore::at(dir)?,
        None => FileAttributeStore::new()?,
    };
    Ok(Arc::new(store))
}

pub async fn run_cli(args: Args) -> Result<(), CliError> {
    match &args.command {
        Command::Profiles => list_profiles(&args),
        Command::Connect { profile } => connect(&args, profile.as_deref()).await,
        Command::Failures => print_failures(&args),
        Command::Health => print_health(&args).await,
    }
}

fn list_profiles(args: &Args) -> Result<(), CliError> {
    let catalog = ProfileCatalog::from_store(&profile_store(args)?)?;
    if catalog.is_empty() {
        println!("no profiles configured");
    }
    for profile in catalog.profiles() {
        println!(
            "{:<16} {} (timeout {} ms)",
            profile.id.to_string(),
            profile.urls.join(", "),
            profile.connect_timeout_ms
        );
    }
    Ok(())
}

fn open_service(args: &Args) -> Result<DirectoryConnectionService, CliError> {
    let catalog = ProfileCatalog::from_store(&profile_store(args)?)?;
    let service = DirectoryConnectionService::new(Arc::new(TcpBackend::new()));
    service.init(Arc::new(catalog), attribute_store(args)?)?;
    Ok(service)
}

async fn connect(args: &Args, profile: Option<&str>) -> Result<(), CliError> {
    let service = open_service(args)?;
    let outcome = service.get_connection(profile).await;
    let result = match outcome {
        Ok(handle) => {
            println!(
                "connected to {} for profile {} at {}",
                handle.endpoint(),
                handle.profile_id(),
                handle.opened_at().to_rfc3339()
            );
            Ok(())
        }
        Err(e) => Err(e.into()),
    };
    service.close().await;
    info!("Connection check finished.");
    result
}

fn print_failures(args: &Args) -> Result<(), CliError> {
    // read-only: no service, no connections
    let store = attribute_store(args)?;
    let mut failures: Vec<_> = FailureTracker::read_snapshot(store.as_ref())
        .into_iter()
        .collect();
    failures.sort_by(|a, b| a.0.cmp(&b.0));
    if failures.is_empty() {
        println!("no directory failures recorded");
    }
    for (id, record) in failures {
        println!("{:<16} {}", id.to_string(), record);
    }
    Ok(())
}

async fn print_health(args: &Args) -> Result<(), CliError> {
    let service = open_service(args)?;
    let health = service.health_snapshot();
    service.close().await;
    for record in health? {
        println!("[{}] {}: {}", record.status, record.topic, record.detail);
    }
    Ok(())
}
