//! CloudLink CLI - sign in and back up a file to remote storage.
//!
//! Runs the consent flow in the browser, exchanges the result for a session,
//! creates the backup folder and uploads one file into it.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use cloudlink_app::{AppConfig, UploadRequest, Workflow};
use cloudlink_auth::{IdentityBroker, LoopbackConsent, OAuthExchanger, ProviderClient};
use cloudlink_storage::{DriveStorage, MemoryStorage, RemoteStorage};

#[derive(Parser)]
#[command(name = "cloudlink")]
#[command(about = "CloudLink - Sign in and upload files to cloud storage")]
#[command(version)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Configuration file (default: platform config dir).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in, create the backup folder and upload a file into it.
    Upload {
        /// Local file to upload.
        #[arg(short, long)]
        file: PathBuf,

        /// Name for the uploaded file (default: local file name).
        #[arg(short, long)]
        name: Option<String>,

        /// Folder to create (default: from config).
        #[arg(long)]
        folder: Option<String>,

        /// Content type (default: guessed from extension).
        #[arg(short = 't', long)]
        content_type: Option<String>,

        /// Account to sign in as; the run fails if the provider signs in another.
        #[arg(short, long)]
        account: Option<String>,

        /// Print the sign-in URL instead of opening a browser.
        #[arg(long)]
        no_browser: bool,

        /// Keep uploads in memory instead of sending them to the service.
        #[arg(long)]
        memory: bool,
    },

    /// Manage the configuration file.
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Write a default configuration file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration.
    Show,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let level = if cli.verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };

    match cli.command {
        Commands::Upload {
            file,
            name,
            folder,
            content_type,
            account,
            no_browser,
            memory,
        } => {
            let options = UploadOptions {
                name,
                folder,
                content_type,
                account,
                launch_browser: !no_browser,
                in_memory: memory,
            };
            cmd_upload(&config_path, &file, options).await
        }

        Commands::Config { action } => match action {
            ConfigAction::Init { force } => cmd_config_init(&config_path, force).await,
            ConfigAction::Show => cmd_config_show(&config_path).await,
        },
    }
}

struct UploadOptions {
    name: Option<String>,
    folder: Option<String>,
    content_type: Option<String>,
    account: Option<String>,
    launch_browser: bool,
    in_memory: bool,
}

/// Run the full sign-in and upload workflow.
async fn cmd_upload(config_path: &Path, file: &Path, options: UploadOptions) -> Result<()> {
    let mut config = AppConfig::load_or_default(config_path)
        .await
        .context("Failed to load configuration")?;

    if let Some(account) = options.account {
        config.auth.login_hint = Some(account);
    }
    let scope = config.scope;

    let provider =
        ProviderClient::new(config.auth.clone()).context("Invalid identity provider settings")?;
    let surface = LoopbackConsent::new(
        options.launch_browser,
        Duration::from_secs(config.consent_timeout_secs),
    );

    let storage: Arc<dyn RemoteStorage> = if options.in_memory {
        Arc::new(MemoryStorage::new())
    } else {
        Arc::new(DriveStorage::new(config.storage.clone()).context("Invalid storage settings")?)
    };

    let workflow = Workflow::new(
        Arc::new(IdentityBroker::new(provider.clone(), scope, surface)),
        Arc::new(OAuthExchanger::new(provider, scope)),
        storage.clone(),
        scope,
    );

    let content_type = options
        .content_type
        .unwrap_or_else(|| guess_content_type(file).to_string());
    let mut request = UploadRequest::from_file(file)
        .context("Invalid source file")?
        .with_folder(options.folder.unwrap_or(config.folder_name))
        .with_content_type(content_type);
    if let Some(name) = options.name {
        request = request.with_name(name);
    }

    info!("Uploading {} via {}", file.display(), storage.name());

    let run = workflow.run(request).await;
    let receipt = run.result.context("Upload failed")?;

    println!("Upload complete!");
    println!("  Account: {}", receipt.account);
    println!("  Folder:  {} ({})", receipt.container.name, receipt.container_id());
    println!("  File:    {} ({})", receipt.object.name, receipt.object_id());
    println!("  Size:    {} bytes", receipt.object.size);

    Ok(())
}

/// Write a default configuration file.
async fn cmd_config_init(config_path: &Path, force: bool) -> Result<()> {
    if !force && tokio::fs::try_exists(config_path).await? {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            config_path.display()
        );
    }

    AppConfig::default()
        .save(config_path)
        .await
        .context("Failed to write configuration")?;

    println!("Configuration written to {}", config_path.display());
    println!("Set auth.client_id before running `cloudlink upload`.");

    Ok(())
}

/// Print the configuration that `upload` would use.
async fn cmd_config_show(config_path: &Path) -> Result<()> {
    let config = AppConfig::load_or_default(config_path)
        .await
        .context("Failed to load configuration")?;

    println!("# {}", config_path.display());
    println!("{}", serde_json::to_string_pretty(&config)?);

    Ok(())
}

/// Guess a content type from the file extension.
fn guess_content_type(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("txt") => "text/plain",
        Some("json") => "application/json",
        Some("pdf") => "application/pdf",
        _ => cloudlink_app::DEFAULT_CONTENT_TYPE,
    }
}
