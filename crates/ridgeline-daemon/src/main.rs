//! `ridgeline-daemon`: the supervisor entrypoint. Wires the component
//! store, resolver, configuration resolver, and lifecycle merge engine
//! into one long-lived [`SupervisorContext`], and drives the
//! single-writer deployment lane from whichever producer — cloud job
//! queue or local CLI — has work waiting.

mod config;
mod handlers;
mod history;
mod local_source;
mod supervisor;
mod watcher;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use config::{Args, LogFormat, SupervisorConfig};
use history::DeploymentHistory;
use parking_lot::Mutex;
use ridgeline_core::Error;
use ridgeline_ipc::LocalDeploymentStatus;
use ridgeline_lifecycle::{Cancellation, CancellationHandle};
use ridgeline_orchestrator::{DeploymentResult, DeploymentStatus, SupervisorContext};
use ridgeline_state::{group_roots_path, GroupToRootComponents};
use ridgeline_store::ComponentStore;
use supervisor::LoggingSupervisor;
use tokio::time::Instant;
use tracing::{error, info, warn, Level};
use tracing_subscriber::EnvFilter;

/// The deployment lane's in-flight cancellation handle, keyed by
/// deployment id. `None` whenever no deployment is running. The cancel
/// watcher task and the deployment lane both touch this — the lane sets
/// it for the duration of one `run_deployment`/`resume_bootstrap_deployment`
/// call, the watcher reads it to decide whether a marker file applies to
/// anything currently running.
type ActiveDeployment = Arc<Mutex<Option<(String, CancellationHandle)>>>;

fn main() -> ExitCode {
    let config = SupervisorConfig::resolve(Args::parse());
    init_tracing(&config);

    let runtime = match tokio::runtime::Builder::new_multi_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            eprintln!("failed to start async runtime: {error}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(config)) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            error!(%error, "supervisor exiting after unrecoverable startup failure");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(config: &SupervisorConfig) {
    let level = match config.verbosity {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    let filter = EnvFilter::builder().with_default_directive(level.into()).from_env_lossy();
    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Pretty => subscriber.init(),
    }
}

/// Build every subsystem, resume persisted state, and run the poll loop
/// until shutdown. Returns `Err` only for an unrecoverable startup
/// failure — a corrupt persisted store refuses to start until the
/// operator intervenes.
async fn run(config: SupervisorConfig) -> anyhow::Result<()> {
    std::fs::create_dir_all(&config.root)?;
    std::fs::create_dir_all(ridgeline_ipc::paths::iot_dir(&config.incoming_dir))?;
    std::fs::create_dir_all(ridgeline_ipc::paths::local_dir(&config.incoming_dir))?;
    std::fs::create_dir_all(ridgeline_ipc::paths::control_dir(&config.incoming_dir))?;
    std::fs::create_dir_all(ridgeline_ipc::paths::control_responses_dir(&config.incoming_dir))?;
    std::fs::create_dir_all(ridgeline_ipc::paths::cancel_dir(&config.incoming_dir))?;

    let recipe_staging = config.root.join("staging").join("recipes");
    let artifact_staging = config.root.join("staging").join("artifacts");
    std::fs::create_dir_all(&recipe_staging)?;
    std::fs::create_dir_all(&artifact_staging)?;
    let source = Arc::new(local_source::LocalFilesystemSource::new(recipe_staging, artifact_staging));

    let store = ComponentStore::new(config.root.clone(), source.clone());
    let group_roots = GroupToRootComponents::load(&group_roots_path(&config.root)).map_err(fatal_config_error)?;

    let mut ctx = SupervisorContext::new(config.root.clone(), store, source, LoggingSupervisor::new());
    ctx.group_roots = group_roots;

    let active_deployment: ActiveDeployment = Arc::new(Mutex::new(None));

    resume_in_progress_deployment(&mut ctx, &config, &active_deployment).await;

    let status_dir = ridgeline_ipc::paths::local_status_dir(&config.incoming_dir);
    std::fs::create_dir_all(&status_dir)?;
    let history = Arc::new(DeploymentHistory::new(status_dir));
    info!(root = %config.root.display(), incoming = %config.incoming_dir.display(), "supervisor ready");

    let cancel_watcher = tokio::spawn(watch_for_cancellations(
        config.incoming_dir.clone(),
        active_deployment.clone(),
        config.poll_interval,
    ));

    let mut shutdown = Box::pin(tokio::signal::ctrl_c());
    let mut ticker = tokio::time::interval(config.poll_interval);
    loop {
        tokio::select! {
            _ = ticker.tick() => {
                poll_once(&mut ctx, &config, &history, &active_deployment).await;
            }
            result = &mut shutdown => {
                if let Err(error) = result {
                    warn!(%error, "error waiting for shutdown signal");
                }
                cancel_watcher.abort();
                info!("shutdown requested, exiting cleanly");
                return Ok(());
            }
        }
    }
}

/// Polls `<incoming_dir>/cancel/` on its own cadence, independent of the
/// deployment lane's tick — the lane can be blocked for the whole poll
/// interval sleeping through a deferral reschedule, so this has to run
/// concurrently rather than share the same tick. A marker for a
/// deployment id that doesn't match whatever is currently active (or
/// matches nothing at all) is simply consumed and dropped.
async fn watch_for_cancellations(incoming_dir: std::path::PathBuf, active: ActiveDeployment, interval: std::time::Duration) {
    let mut ticker = tokio::time::interval(interval);
    loop {
        ticker.tick().await;
        for deployment_id in watcher::poll_cancel_requests(&incoming_dir) {
            let guard = active.lock();
            match guard.as_ref() {
                Some((active_id, handle)) if *active_id == deployment_id => {
                    info!(%deployment_id, "cancellation requested for in-flight deployment");
                    handle.cancel();
                }
                _ => {
                    warn!(%deployment_id, "cancellation marker did not match any in-flight deployment, ignoring");
                }
            }
        }
    }
}

/// Run one deployment under a fresh [`Cancellation`] pair, publishing the
/// handle to `active` for the duration of the call so the cancel watcher
/// can reach it, and clearing the slot again once it returns.
async fn run_cancellable<F, Fut>(deployment_id: &str, active: &ActiveDeployment, run: F) -> DeploymentResult
where
    F: FnOnce(Cancellation) -> Fut,
    Fut: std::future::Future<Output = DeploymentResult>,
{
    let (handle, cancellation) = Cancellation::new();
    *active.lock() = Some((deployment_id.to_string(), handle));
    let result = run(cancellation).await;
    *active.lock() = None;
    result
}

/// Check for a bootstrap-requiring deployment that persisted
/// `KERNEL_ACTIVATION` before requesting this restart, and finish it
/// before the poll loop starts taking new work.
async fn resume_in_progress_deployment<S: ridgeline_fetch::ArtifactSource, V: ridgeline_lifecycle::ServiceSupervisor>(
    ctx: &mut SupervisorContext<S, V>,
    config: &SupervisorConfig,
    active_deployment: &ActiveDeployment,
) {
    let deployments_root = config.root.join("deployments");
    let Some(in_progress) = ridgeline_state::find_in_progress(&deployments_root) else {
        return;
    };
    if in_progress.stage != ridgeline_core::DeploymentStage::KernelActivation {
        warn!(
            deployment_id = %in_progress.deployment_id,
            stage = ?in_progress.stage,
            "found an in-progress deployment that never reached KERNEL_ACTIVATION; resuming it anyway"
        );
    }
    let deployment_id = in_progress.deployment_id.clone();
    info!(%deployment_id, "resuming bootstrap-requiring deployment after restart");
    let deadline = Instant::now() + default_deployment_deadline(&in_progress.document);
    let result = run_cancellable(&deployment_id, active_deployment, |cancellation| async move {
        ctx.resume_bootstrap_deployment(in_progress, deadline, &cancellation).await
    })
    .await;
    report_result(&result);
}

/// One pass over both incoming-deployment directories, run strictly
/// sequentially: the single deployment lane means this loop iteration
/// runs to completion before the next begins.
async fn poll_once<S: ridgeline_fetch::ArtifactSource, V: ridgeline_lifecycle::ServiceSupervisor>(
    ctx: &mut SupervisorContext<S, V>,
    config: &SupervisorConfig,
    history: &DeploymentHistory,
    active_deployment: &ActiveDeployment,
) {
    tracing::debug!(
        running = handlers::list_components(ctx, &ridgeline_ipc::ListComponents).len(),
        "poll tick"
    );

    for incoming in watcher::poll_iot_jobs(&config.incoming_dir) {
        let deployment_id = file_stem(&incoming.path);
        let deadline = Instant::now() + default_deployment_deadline(&incoming.payload);
        let document = &incoming.payload;
        let ctx_ref = &mut *ctx;
        let inner_id = deployment_id.clone();
        let result = run_cancellable(&deployment_id, active_deployment, |cancellation| async move {
            ctx_ref.run_deployment(document, &inner_id, deadline, &cancellation).await
        })
        .await;
        report_result(&result);
        remove_processed(&incoming.path);
    }

    for incoming in watcher::poll_local_requests(&config.incoming_dir) {
        let deployment_id = file_stem(&incoming.path);
        let group_name = incoming.payload.group_name().to_string();
        history.record_queued(&deployment_id, &group_name);
        history.mark_in_progress(&deployment_id);

        let existing_roots = ctx
            .group_roots
            .groups
            .get(&group_name)
            .cloned()
            .unwrap_or_default();
        let document = watcher::build_local_document(&incoming.payload, &existing_roots, 0);
        let deadline = Instant::now() + default_deployment_deadline(&document);
        let ctx_ref = &mut *ctx;
        let inner_id = deployment_id.clone();
        let result = run_cancellable(&deployment_id, active_deployment, |cancellation| async move {
            ctx_ref.run_deployment(&document, &inner_id, deadline, &cancellation).await
        })
        .await;

        let (status, message) = match result.status {
            DeploymentStatus::Successful => (LocalDeploymentStatus::Succeeded, None),
            DeploymentStatus::RestartPending => (LocalDeploymentStatus::InProgress, result.message.clone()),
            _ => (LocalDeploymentStatus::Failed, result.message.clone()),
        };
        history.mark_terminal(&deployment_id, status, message);
        report_result(&result);
        remove_processed(&incoming.path);
    }

    for incoming in watcher::poll_control_requests(&config.incoming_dir) {
        let request_id = file_stem(&incoming.path);
        let response = handle_control_request(ctx, &config.root, incoming.payload).await;
        write_control_response(&config.incoming_dir, &request_id, &response);
        remove_processed(&incoming.path);
    }
}

async fn handle_control_request<S: ridgeline_fetch::ArtifactSource, V: ridgeline_lifecycle::ServiceSupervisor>(
    ctx: &SupervisorContext<S, V>,
    root: &std::path::Path,
    request: ridgeline_ipc::ControlRequest,
) -> ridgeline_ipc::ControlResponse {
    use ridgeline_ipc::{ControlRequest, ControlResponse};
    match request {
        ControlRequest::GetComponentDetails(request) => {
            ControlResponse::ComponentDetails(handlers::get_component_details(ctx, &request).map_err(Into::into))
        }
        ControlRequest::ListComponents(request) => {
            ControlResponse::Components(handlers::list_components(ctx, &request))
        }
        ControlRequest::RestartComponent(request) => {
            ControlResponse::Outcome(handlers::restart_component(ctx, &request).await.map_err(Into::into))
        }
        ControlRequest::StopComponent(request) => {
            ControlResponse::Outcome(handlers::stop_component(ctx, &request).await.map_err(Into::into))
        }
        ControlRequest::UpdateRecipesAndArtifacts(request) => ControlResponse::Preloaded(
            handlers::update_recipes_and_artifacts(root, &request)
                .await
                .map_err(Into::into),
        ),
    }
}

fn write_control_response(incoming_dir: &std::path::Path, request_id: &str, response: &ridgeline_ipc::ControlResponse) {
    let path = ridgeline_ipc::paths::control_responses_dir(incoming_dir).join(format!("{request_id}.json"));
    match sonic_rs::to_vec(response) {
        Ok(bytes) => {
            if let Err(error) = ridgeline_state::write_atomically(&path, &bytes) {
                warn!(%error, path = %path.display(), "failed to write control response");
            }
        }
        Err(error) => warn!(%error, "failed to serialize control response"),
    }
}

fn default_deployment_deadline(document: &ridgeline_core::DeploymentDocument) -> std::time::Duration {
    let configured = document.component_update_policy.timeout_seconds;
    std::time::Duration::from_secs(u64::from(configured.max(60)))
}

fn report_result(result: &DeploymentResult) {
    match result.status {
        DeploymentStatus::Successful => info!(deployment_id = %result.deployment_id, "deployment succeeded"),
        DeploymentStatus::RestartPending => {
            info!(deployment_id = %result.deployment_id, "deployment requested a supervisor restart; resuming next start");
        }
        _ => warn!(
            deployment_id = %result.deployment_id,
            status = ?result.status,
            message = ?result.message,
            "deployment did not succeed"
        ),
    }
}

fn file_stem(path: &std::path::Path) -> String {
    path.file_stem().and_then(|s| s.to_str()).unwrap_or("deployment").to_string()
}

fn remove_processed(path: &std::path::Path) {
    if let Err(error) = std::fs::remove_file(path) {
        warn!(path = %path.display(), %error, "failed to remove processed deployment file");
    }
}

fn fatal_config_error(error: Error) -> anyhow::Error {
    anyhow::anyhow!("persisted group-to-roots store is corrupt, refusing to start: {error}")
}
