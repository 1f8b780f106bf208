//! corectl - install and manage the Calyptia core operator and core instances

use anyhow::Result;
use clap::{Args, CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use corectl::commands::core_instance::{DeployArgs, InstanceArgs, UpdateArgs};
use corectl::commands::operator::OperatorArgs;
use corectl::config::Settings;
use corectl::utils::{Error, logger};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "corectl")]
#[command(author, version, about = "Manage the Calyptia core operator and core instances on Kubernetes", long_about = None)]
struct Cli {
    /// Verbose output (can be used multiple times: -v, -vv, -vvv)
    /// -v: INFO, -vv: DEBUG, -vvv: TRACE
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Dry-run mode: show what would be done without making changes
    #[arg(long, global = true)]
    dry_run: bool,

    /// Path to a corectl config file
    #[arg(long, global = true, env = "CORECTL_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage the core operator
    #[command(alias = "opr")]
    Operator {
        #[command(subcommand)]
        command: OperatorCommands,
    },

    /// Manage core instances
    CoreInstance {
        #[command(subcommand)]
        command: CoreInstanceCommands,
    },

    /// Print an example config file
    Config,

    /// Generate shell completion scripts
    Completion {
        /// Shell type
        #[arg(value_enum)]
        shell: Shell,
    },

    /// Show version information
    Version,
}

/// Cluster selection flags
#[derive(Args, Clone)]
struct KubeFlags {
    /// Kubeconfig context to use
    #[arg(long = "kube-context", env = "KUBE_CONTEXT")]
    context: Option<String>,

    /// Namespace to operate in (default: config file, then the context namespace)
    #[arg(short = 'n', long = "kube-namespace")]
    namespace: Option<String>,
}

#[derive(Args)]
struct WaitFlags {
    /// Wait for the deployment to be ready before returning
    #[arg(long)]
    wait: bool,

    /// Wait timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Collect pod messages when the wait times out
    #[arg(long)]
    verbose_wait: bool,
}

#[derive(Args)]
struct OperatorFlags {
    #[command(flatten)]
    kube: KubeFlags,

    #[command(flatten)]
    wait: WaitFlags,

    /// Core operator version (default: the bundled release)
    #[arg(long, default_value = "")]
    version: String,

    /// Operator image repository, without tag
    #[arg(long, hide = true)]
    image: Option<String>,

    /// Use the manifest published with the release instead of the bundled one
    #[arg(long)]
    from_release: bool,

    /// Skip confirmation prompts
    #[arg(short = 'y', long)]
    yes: bool,
}

#[derive(Subcommand)]
enum OperatorCommands {
    /// Install the core operator
    Install(OperatorFlags),

    /// Update the core operator
    Update(OperatorFlags),

    /// Uninstall the core operator
    Uninstall {
        #[command(flatten)]
        kube: KubeFlags,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show the installed operator version and components
    Status {
        #[command(flatten)]
        kube: KubeFlags,
    },
}

#[derive(Args)]
struct InstanceFlags {
    #[command(flatten)]
    kube: KubeFlags,

    /// Core instance name
    #[arg(long)]
    name: String,

    /// Environment the core instance belongs to
    #[arg(long)]
    environment: Option<String>,
}

impl From<InstanceFlags> for InstanceArgs {
    fn from(flags: InstanceFlags) -> Self {
        InstanceArgs {
            context: flags.kube.context,
            namespace: flags.kube.namespace,
            name: flags.name,
            environment: flags.environment,
        }
    }
}

#[derive(Subcommand)]
enum CoreInstanceCommands {
    /// Deploy a core instance
    Deploy {
        #[command(flatten)]
        instance: InstanceFlags,

        #[command(flatten)]
        wait: WaitFlags,

        /// Project token
        #[arg(long, env = "CALYPTIA_PROJECT_TOKEN", hide_env_values = true, default_value = "")]
        token: String,

        /// Private RSA key of the core instance
        #[arg(long)]
        private_key: Option<PathBuf>,

        /// Core instance id, added as a label
        #[arg(long)]
        id: Option<String>,

        /// Project id, added as a label
        #[arg(long)]
        project_id: Option<String>,

        /// Deploy the sync containers for an operator-managed instance
        #[arg(long)]
        sync: bool,

        /// Image tag to deploy
        #[arg(long)]
        version: Option<String>,

        /// Cloud API URL
        #[arg(long, env = "CALYPTIA_CLOUD_URL")]
        cloud_url: Option<String>,

        /// Disable TLS verification against the cloud API
        #[arg(long)]
        no_tls_verify: bool,

        /// Do not let the core instance create services
        #[arg(long)]
        skip_service_creation: bool,

        /// Grant access to OpenShift security context constraints
        #[arg(long)]
        enable_openshift: bool,

        #[arg(long, env = "HTTP_PROXY", default_value = "")]
        http_proxy: String,

        #[arg(long, env = "HTTPS_PROXY", default_value = "")]
        https_proxy: String,

        /// Remove the objects already created when a step fails
        #[arg(long)]
        rollback: bool,
    },

    /// Update a core instance to a new version
    Update {
        #[command(flatten)]
        instance: InstanceFlags,

        /// Image tag to roll out
        #[arg(long)]
        version: String,

        /// Retag the sync containers instead of the core container
        #[arg(long)]
        sync: bool,

        /// Disable TLS verification against the cloud API
        #[arg(long)]
        no_tls_verify: bool,

        /// Wait timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,

        /// Collect pod messages when the wait times out
        #[arg(long)]
        verbose_wait: bool,
    },

    /// Delete a core instance and everything it owns
    Delete {
        #[command(flatten)]
        instance: InstanceFlags,

        /// Wait until the deployment is gone
        #[arg(long)]
        wait: bool,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    logger::init(cli.verbose);

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<Error>() {
            Some(error) => error.display(),
            None => corectl::log_error!("{:#}", e),
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let settings = match &cli.config {
        Some(path) => Settings::load_from_file(path)?,
        None => Settings::load(),
    };

    if cli.dry_run {
        corectl::log_info!("DRY RUN MODE: No changes will be made");
    }

    match cli.command {
        Commands::Operator { command } => {
            handle_operator_command(command, cli.dry_run, &settings).await
        }
        Commands::CoreInstance { command } => {
            handle_core_instance_command(command, cli.dry_run, &settings).await
        }
        Commands::Config => {
            print!("{}", Settings::example_config()?);
            Ok(())
        }
        Commands::Completion { shell } => handle_completion_command(shell),
        Commands::Version => handle_version_command(),
    }
}

fn operator_args(flags: OperatorFlags, dry_run: bool) -> OperatorArgs {
    OperatorArgs {
        context: flags.kube.context,
        namespace: flags.kube.namespace,
        version: flags.version,
        image: flags.image,
        from_release: flags.from_release,
        wait: flags.wait.wait,
        timeout: flags.wait.timeout,
        verbose: flags.wait.verbose_wait,
        yes: flags.yes,
        dry_run,
    }
}

async fn handle_operator_command(
    command: OperatorCommands,
    dry_run: bool,
    settings: &Settings,
) -> Result<()> {
    use corectl::commands::operator;

    match command {
        OperatorCommands::Install(flags) => {
            operator::install(operator_args(flags, dry_run), settings).await
        }
        OperatorCommands::Update(flags) => {
            operator::update(operator_args(flags, dry_run), settings).await
        }
        OperatorCommands::Uninstall { kube, yes } => {
            operator::uninstall(kube.context, kube.namespace, yes, dry_run, settings).await
        }
        OperatorCommands::Status { kube } => {
            operator::status(kube.context, kube.namespace, settings).await
        }
    }
}

async fn handle_core_instance_command(
    command: CoreInstanceCommands,
    dry_run: bool,
    settings: &Settings,
) -> Result<()> {
    use corectl::commands::core_instance;

    match command {
        CoreInstanceCommands::Deploy {
            instance,
            wait,
            token,
            private_key,
            id,
            project_id,
            sync,
            version,
            cloud_url,
            no_tls_verify,
            skip_service_creation,
            enable_openshift,
            http_proxy,
            https_proxy,
            rollback,
        } => {
            core_instance::deploy(
                DeployArgs {
                    instance: instance.into(),
                    project_token: token,
                    private_key,
                    id,
                    project_id,
                    sync,
                    version,
                    cloud_url,
                    no_tls_verify,
                    skip_service_creation,
                    enable_openshift,
                    http_proxy,
                    https_proxy,
                    wait: wait.wait,
                    timeout: wait.timeout,
                    verbose: wait.verbose_wait,
                    rollback,
                    dry_run,
                },
                settings,
            )
            .await
        }
        CoreInstanceCommands::Update {
            instance,
            version,
            sync,
            no_tls_verify,
            timeout,
            verbose_wait,
        } => {
            core_instance::update(
                UpdateArgs {
                    instance: instance.into(),
                    version,
                    sync,
                    no_tls_verify,
                    timeout,
                    verbose: verbose_wait,
                    dry_run,
                },
                settings,
            )
            .await
        }
        CoreInstanceCommands::Delete {
            instance,
            wait,
            yes,
        } => core_instance::delete(instance.into(), wait, yes, dry_run, settings).await,
    }
}

fn handle_completion_command(shell: Shell) -> Result<()> {
    let mut cmd = Cli::command();
    generate(shell, &mut cmd, "corectl", &mut io::stdout());
    Ok(())
}

fn handle_version_command() -> Result<()> {
    println!("corectl {}", env!("CARGO_PKG_VERSION"));
    println!("Core operator {}", corectl::config::images::DEFAULT_OPERATOR_IMAGE_TAG);
    Ok(())
}
