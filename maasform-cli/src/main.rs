use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;

use maasform_client::sim::{DEFAULT_BOOT_SOURCE_URL, DEFAULT_KEYRING_FILENAME};
use maasform_client::{MaasApi, SimulatedMaas};
use maasform_core::resource::{Resource, ResourceId, Value};
use maasform_provider::config::client_config;
use maasform_provider::resources::boot_source;
use maasform_provider::{
    BootSourceConfig, BootSourceSelectionConfig, LifecycleVerifier, MaasProvider, TestStep,
};
use maasform_state::{BackendConfig, StateBackend, create_backend};

#[derive(Parser)]
#[command(name = "maasform")]
#[command(about = "Manage and verify MAAS boot source selections", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a selection, check it, destroy it and check the cleanup
    Verify {
        #[command(flatten)]
        connection: Connection,

        /// Run against an in-memory MAAS instead of a region controller
        #[arg(long)]
        simulate: bool,

        /// Default Ubuntu release of the simulated MAAS
        #[arg(long, default_value = "noble")]
        default_release: String,

        /// Use this existing boot source instead of creating one
        #[arg(long)]
        boot_source: Option<i64>,

        #[arg(long, default_value = "ubuntu")]
        os: String,

        #[arg(long, default_value = "oracular")]
        release: String,

        /// Architecture to select (repeatable)
        #[arg(long = "arch", default_values_t = ["amd64".to_string()])]
        arches: Vec<String>,

        /// Keep recorded state in this file instead of in memory
        #[arg(long)]
        state: Option<PathBuf>,
    },
    /// Print one boot source selection as JSON
    ShowSelection {
        #[command(flatten)]
        connection: Connection,

        #[arg(long)]
        boot_source: i64,

        #[arg(long)]
        id: i64,
    },
    /// List the selections of a boot source
    ListSelections {
        #[command(flatten)]
        connection: Connection,

        #[arg(long, default_value_t = 1)]
        boot_source: i64,
    },
    /// Print the server's default Ubuntu release
    DefaultRelease {
        #[command(flatten)]
        connection: Connection,
    },
}

/// Region controller settings; unset values fall back to MAAS_* variables
#[derive(Args)]
struct Connection {
    #[arg(long)]
    api_url: Option<String>,

    #[arg(long)]
    api_key: Option<String>,

    #[arg(long)]
    api_version: Option<String>,

    #[arg(long)]
    insecure_skip_verify: bool,
}

impl Connection {
    fn connect(&self) -> Result<Arc<dyn MaasApi>, String> {
        let mut attributes = HashMap::new();
        if let Some(url) = &self.api_url {
            attributes.insert("api_url".to_string(), Value::from(url.as_str()));
        }
        if let Some(key) = &self.api_key {
            attributes.insert("api_key".to_string(), Value::from(key.as_str()));
        }
        if let Some(version) = &self.api_version {
            attributes.insert("api_version".to_string(), Value::from(version.as_str()));
        }
        if self.insecure_skip_verify {
            attributes.insert("insecure_skip_verify".to_string(), Value::Bool(true));
        }

        let config = client_config(&attributes).map_err(|e| e.to_string())?;
        let provider = MaasProvider::from_config(&config).map_err(|e| e.to_string())?;
        Ok(provider.api())
    }
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Verify {
            connection,
            simulate,
            default_release,
            boot_source,
            os,
            release,
            arches,
            state,
        } => {
            let scenario = Scenario {
                boot_source,
                os,
                release,
                arches,
            };
            let api: Result<Arc<dyn MaasApi>, String> = if simulate {
                Ok(Arc::new(SimulatedMaas::with_default_boot_source(
                    default_release,
                )))
            } else {
                connection.connect()
            };
            match api {
                Ok(api) => run_verify(api, &scenario, state).await,
                Err(e) => Err(e),
            }
        }
        Commands::ShowSelection {
            connection,
            boot_source,
            id,
        } => run_show_selection(&connection, boot_source, id).await,
        Commands::ListSelections {
            connection,
            boot_source,
        } => run_list_selections(&connection, boot_source).await,
        Commands::DefaultRelease { connection } => run_default_release(&connection).await,
    };

    if let Err(e) = result {
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }
}

struct Scenario {
    boot_source: Option<i64>,
    os: String,
    release: String,
    arches: Vec<String>,
}

impl Scenario {
    fn resources(&self) -> Vec<Resource> {
        let selection = |boot_source: Value| {
            BootSourceSelectionConfig::new(boot_source, self.os.clone(), self.release.clone())
                .arches(self.arches.iter().cloned())
                .into_resource("test")
        };

        match self.boot_source {
            Some(id) => vec![selection(Value::Int(id))],
            None => {
                let source_id = ResourceId::new(boot_source::RESOURCE_TYPE, "test");
                vec![
                    BootSourceConfig::new(DEFAULT_BOOT_SOURCE_URL)
                        .keyring_filename(DEFAULT_KEYRING_FILENAME)
                        .into_resource("test"),
                    selection(Value::reference(&source_id, "id")),
                ]
            }
        }
    }

    fn step(&self) -> TestStep {
        let address = "maas_boot_source_selection.test";
        let mut step = TestStep::new(self.resources())
            .check_exists(address)
            .check_attr(address, "os", self.os.as_str())
            .check_attr(address, "release", self.release.as_str())
            .check_attr(address, "arches.#", self.arches.len().to_string());
        for (i, arch) in self.arches.iter().enumerate() {
            step = step.check_attr(address, format!("arches.{}", i), arch.as_str());
        }
        step
    }
}

async fn run_verify(
    api: Arc<dyn MaasApi>,
    scenario: &Scenario,
    state: Option<PathBuf>,
) -> Result<(), String> {
    let backend = create_backend(&backend_config(state.as_deref()))
        .map_err(|e| format!("Failed to set up state: {}", e))?;
    backend.init().await.map_err(|e| e.to_string())?;
    let verifier = LifecycleVerifier::with_backend(api, backend);

    println!(
        "{} {}/{} [{}]",
        "Verifying".cyan().bold(),
        scenario.os,
        scenario.release,
        scenario.arches.join(", ")
    );

    verifier
        .run(&[scenario.step()])
        .await
        .map_err(|e| e.to_string())?;

    println!("{}", "Apply, checks, destroy and destroy-check passed.".green());
    Ok(())
}

fn backend_config(state: Option<&Path>) -> BackendConfig {
    match state {
        Some(path) => BackendConfig::new("local")
            .with_attribute("path", Value::from(path.to_string_lossy().into_owned())),
        None => BackendConfig::new("memory"),
    }
}

async fn run_show_selection(
    connection: &Connection,
    boot_source: i64,
    id: i64,
) -> Result<(), String> {
    let api = connection.connect()?;
    let selection = api
        .boot_source_selection(boot_source, id)
        .await
        .map_err(|e| e.to_string())?;
    let json = serde_json::to_string_pretty(&selection).map_err(|e| e.to_string())?;
    println!("{}", json);
    Ok(())
}

async fn run_list_selections(connection: &Connection, boot_source: i64) -> Result<(), String> {
    let api = connection.connect()?;
    let selections = api
        .boot_source_selections(boot_source)
        .await
        .map_err(|e| e.to_string())?;

    if selections.is_empty() {
        println!("{}", "No selections.".yellow());
        return Ok(());
    }
    for selection in selections {
        println!(
            "{:>4}  {}/{}  arches={}  subarches={}  labels={}",
            selection.id.to_string().bold(),
            selection.os,
            selection.release.cyan(),
            selection.arches.join(","),
            selection.subarches.join(","),
            selection.labels.join(",")
        );
    }
    Ok(())
}

async fn run_default_release(connection: &Connection) -> Result<(), String> {
    let api = connection.connect()?;
    let release = api
        .default_distro_series()
        .await
        .map_err(|e| e.to_string())?;
    println!("{}", release);
    Ok(())
}
