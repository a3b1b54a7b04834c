//! `ridgeline-ctl` — the local CLI producer for the deployment pipeline.
//! Every subcommand is a thin wrapper over
//! [`ridgeline_cli::client::DaemonClient`]'s filesystem round trip to the
//! daemon; this binary owns only argument parsing and output formatting.

mod client;
mod config;
mod output;

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ridgeline_core::{ComponentName, VersionConstraint};
use ridgeline_ipc::{ComponentDetails, CreateLocalDeployment, UpdateRecipesAndArtifacts};

use client::DaemonClient;
use config::GlobalArgs;

#[derive(Debug, Parser)]
#[command(name = "ridgeline-ctl", about = "Control the ridgeline component orchestrator")]
struct Cli {
    #[command(flatten)]
    global: GlobalArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Create a local deployment adding or pinning root components.
    Install {
        /// `name=version` pairs to add or pin as root components.
        #[arg(long = "component", value_parser = parse_component_version, num_args = 1..)]
        components: Vec<(ComponentName, VersionConstraint)>,
        /// Component names to remove from the local group's roots.
        #[arg(long = "remove", num_args = 0..)]
        remove: Vec<ComponentName>,
        /// Deployment group to target; defaults to the local group.
        #[arg(long)]
        group: Option<String>,
        /// Wait for the deployment to reach a terminal status before
        /// returning.
        #[arg(long)]
        wait: bool,
    },
    /// List every non-`main` component the supervisor currently runs.
    List,
    /// Show the resolved version, state and configuration of one
    /// component.
    Status {
        name: ComponentName,
    },
    /// Ask the supervisor to restart a running component.
    Restart {
        name: ComponentName,
    },
    /// Ask the supervisor to stop a running component.
    Stop {
        name: ComponentName,
    },
    /// Preload the component store from local recipe/artifact
    /// directories.
    UpdateRecipes {
        #[arg(long)]
        recipe_dir: PathBuf,
        #[arg(long)]
        artifact_dir: PathBuf,
    },
    /// Poll the status of a previously created local deployment.
    DeploymentStatus {
        deployment_id: String,
    },
    /// List every local deployment the daemon has recorded.
    Deployments,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let client = DaemonClient::new(cli.global.resolved_incoming_dir(), cli.global.timeout());

    match cli.command {
        Command::Install {
            components,
            remove,
            group,
            wait,
        } => install(&client, &cli.global, components, remove, group, wait),
        Command::List => list(&client, &cli.global),
        Command::Status { name } => status(&client, &cli.global, name),
        Command::Restart { name } => restart(&client, &cli.global, name),
        Command::Stop { name } => stop(&client, &cli.global, name),
        Command::UpdateRecipes {
            recipe_dir,
            artifact_dir,
        } => update_recipes(&client, &cli.global, recipe_dir, artifact_dir),
        Command::DeploymentStatus { deployment_id } => {
            deployment_status(&client, &cli.global, &deployment_id)
        }
        Command::Deployments => deployments(&client, &cli.global),
    }
}

fn install(
    client: &DaemonClient,
    global: &GlobalArgs,
    components: Vec<(ComponentName, VersionConstraint)>,
    remove: Vec<ComponentName>,
    group: Option<String>,
    wait: bool,
) -> Result<()> {
    let request = CreateLocalDeployment {
        root_component_versions_to_add: components.into_iter().collect(),
        root_components_to_remove: remove,
        component_to_configuration: BTreeMap::new(),
        group_name: group,
    };
    let deployment_id = client.create_local_deployment(&request)?;
    if !global.quiet {
        output::info(&format!("queued local deployment '{deployment_id}'"));
    }
    if wait {
        let record = client.await_deployment(&deployment_id)?;
        print_deployment_record(global, &record)?;
        if !matches!(record.status, ridgeline_ipc::LocalDeploymentStatus::Succeeded) {
            anyhow::bail!("deployment '{deployment_id}' did not succeed: {:?}", record.status);
        }
    } else if global.json {
        #[derive(serde::Serialize)]
        struct Queued {
            deployment_id: String,
        }
        println!("{}", sonic_rs::to_string(&Queued { deployment_id })?);
    } else {
        println!("{deployment_id}");
    }
    Ok(())
}

fn list(client: &DaemonClient, global: &GlobalArgs) -> Result<()> {
    let components = client.list_components()?;
    print_components(global, &components)
}

fn status(client: &DaemonClient, global: &GlobalArgs, name: ComponentName) -> Result<()> {
    let details = client.component_details(name)?;
    print_components(global, std::slice::from_ref(&details))
}

fn restart(client: &DaemonClient, global: &GlobalArgs, name: ComponentName) -> Result<()> {
    let outcome = client.restart_component(name.clone())?;
    report_outcome(global, &name, outcome)
}

fn stop(client: &DaemonClient, global: &GlobalArgs, name: ComponentName) -> Result<()> {
    let outcome = client.stop_component(name.clone())?;
    report_outcome(global, &name, outcome)
}

fn update_recipes(
    client: &DaemonClient,
    global: &GlobalArgs,
    recipe_dir: PathBuf,
    artifact_dir: PathBuf,
) -> Result<()> {
    client.update_recipes_and_artifacts(&UpdateRecipesAndArtifacts { recipe_dir, artifact_dir })?;
    if !global.quiet {
        output::success("preloaded the component store");
    }
    Ok(())
}

fn deployment_status(client: &DaemonClient, global: &GlobalArgs, deployment_id: &str) -> Result<()> {
    match client.deployment_status(deployment_id)? {
        Some(record) => print_deployment_record(global, &record),
        None => anyhow::bail!("no such deployment '{deployment_id}'"),
    }
}

fn deployments(client: &DaemonClient, global: &GlobalArgs) -> Result<()> {
    let records = client.list_deployments()?;
    if global.json {
        println!("{}", sonic_rs::to_string(&records)?);
    } else {
        println!("{}", output::deployments_table(&records));
    }
    Ok(())
}

fn print_components(global: &GlobalArgs, components: &[ComponentDetails]) -> Result<()> {
    if global.json {
        println!("{}", sonic_rs::to_string(components)?);
    } else {
        println!("{}", output::components_table(components));
    }
    Ok(())
}

fn print_deployment_record(global: &GlobalArgs, record: &ridgeline_ipc::DeploymentRecord) -> Result<()> {
    if global.json {
        println!("{}", sonic_rs::to_string(record)?);
    } else {
        println!("{}", output::deployments_table(std::slice::from_ref(record)));
    }
    Ok(())
}

fn report_outcome(global: &GlobalArgs, name: &ComponentName, outcome: ridgeline_ipc::CommandOutcome) -> Result<()> {
    match outcome {
        ridgeline_ipc::CommandOutcome::Succeeded => {
            if !global.quiet {
                output::success(&format!("{name}: succeeded"));
            }
            Ok(())
        }
        ridgeline_ipc::CommandOutcome::Failed => {
            output::failure(&format!("{name}: failed"));
            anyhow::bail!("command failed for component '{name}'")
        }
    }
}

fn parse_component_version(raw: &str) -> Result<(ComponentName, VersionConstraint), String> {
    let (name, version) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VERSION, got '{raw}'"))?;
    let name = ComponentName::new(name).map_err(|e| e.to_string())?;
    let version: VersionConstraint = version.parse().map_err(|e: ridgeline_core::Error| e.to_string())?;
    Ok((name, version))
}
