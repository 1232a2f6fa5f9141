//! Command execution: wires the configuration, client and sync crates
//! together and renders workflow events on the terminal.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, bail};
use qcarta_client::{Session, test_connection};
use qcarta_protocol::{LayerPublish, ServerProfile, StoreDescriptor};
use qcarta_sync::{
    CreateRequest, HttpAuthenticator, StoreOrchestrator, SyncError, SyncEvent, SyncReport,
    SyncState, UpdateRequest,
};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::cli::{Cli, Command, CreateArgs, PublishArgs, ServerCommand, UpdateArgs};
use crate::config::{self, Config};

/// Runs one CLI command.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let config_path = cli.config.clone().unwrap_or_else(config::default_path);
    let mut config = Config::load(&config_path)?;
    let server_name = cli.server.as_deref();

    match cli.command {
        Command::Server(cmd) => server(cmd, &mut config, &config_path).await,
        Command::Stores => list_stores(&profile_for(&config, server_name)?).await,
        Command::Groups => list_groups(&profile_for(&config, server_name)?).await,
        Command::Basemaps => list_basemaps(&profile_for(&config, server_name)?).await,
        Command::Create(args) => create(profile_for(&config, server_name)?, args).await,
        Command::Update(args) => update(profile_for(&config, server_name)?, args).await,
        Command::Publish(args) => publish(&profile_for(&config, server_name)?, args).await,
    }
}

fn profile_for(config: &Config, name: Option<&str>) -> anyhow::Result<ServerProfile> {
    let (name, profile) = config.resolve(name)?;
    tracing::debug!(server = name, host = %profile.host, "using server profile");
    Ok(profile.clone())
}

async fn server(cmd: ServerCommand, config: &mut Config, path: &Path) -> anyhow::Result<ExitCode> {
    match cmd {
        ServerCommand::Add {
            name,
            host,
            username,
            password,
            port,
            replace,
            test,
        } => {
            let profile = ServerProfile::new(host, username, password, port);
            if test {
                test_connection(&profile)
                    .await
                    .context("connection test failed, profile not saved")?;
            }
            config.upsert(&name, profile, replace.as_deref())?;
            config.save(path)?;
            println!("Saved server '{name}'");
        }
        ServerCommand::Remove { name } => {
            if !config.remove(&name) {
                bail!("unknown server '{name}'");
            }
            config.save(path)?;
            println!("Removed server '{name}'");
        }
        ServerCommand::List => {
            for (name, profile) in &config.servers {
                let marker = if config.selected.as_deref() == Some(name.as_str()) {
                    '*'
                } else {
                    ' '
                };
                println!(
                    "{marker} {name}\t{}\t{}",
                    profile.base_url(),
                    profile.username
                );
            }
        }
        ServerCommand::Use { name } => {
            config.select(&name)?;
            config.save(path)?;
            println!("Selected server '{name}'");
        }
        ServerCommand::Test { name } => {
            let (name, profile) = config.resolve(name.as_deref())?;
            match test_connection(profile).await {
                Ok(()) => println!("Connection to '{name}' succeeded"),
                Err(e) => {
                    eprintln!("Connection to '{name}' failed: {}", e.detail());
                    return Ok(ExitCode::FAILURE);
                }
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

async fn list_stores(profile: &ServerProfile) -> anyhow::Result<ExitCode> {
    let session = Session::login(profile).await.context("login failed")?;
    for store in session.list_stores().await? {
        println!("{}\t{}", store.id, store.name);
    }
    Ok(ExitCode::SUCCESS)
}

async fn list_groups(profile: &ServerProfile) -> anyhow::Result<ExitCode> {
    let session = Session::login(profile).await.context("login failed")?;
    for group in session.access_groups().await? {
        println!("{}\t{}", group.id, group.name);
    }
    Ok(ExitCode::SUCCESS)
}

async fn list_basemaps(profile: &ServerProfile) -> anyhow::Result<ExitCode> {
    let session = Session::login(profile).await.context("login failed")?;
    for basemap in session.basemaps().await? {
        println!("{}\t{}", basemap.id, basemap.name);
    }
    Ok(ExitCode::SUCCESS)
}

async fn create(profile: ServerProfile, args: CreateArgs) -> anyhow::Result<ExitCode> {
    let store_name = match args.name {
        Some(name) => name,
        None => default_store_name(&args.project)?,
    };
    let request = CreateRequest {
        profile,
        store_name,
        project_dir: project_dir(&args.project)?,
        access_group_ids: args.groups,
    };

    let mut orch = StoreOrchestrator::new();
    let events = orch.take_events();
    let result = with_events(
        events,
        orch.cancel_token(),
        orch.create_store(&HttpAuthenticator, &request),
    )
    .await;
    Ok(exit_code(finish(result)?))
}

async fn update(profile: ServerProfile, args: UpdateArgs) -> anyhow::Result<ExitCode> {
    let request = UpdateRequest {
        profile,
        store_name: args.store,
        project_dir: project_dir(&args.project)?,
    };

    let mut orch = StoreOrchestrator::new();
    let events = orch.take_events();
    let result = with_events(
        events,
        orch.cancel_token(),
        orch.update_store(&HttpAuthenticator, &request),
    )
    .await;
    Ok(exit_code(finish(result)?))
}

async fn publish(profile: &ServerProfile, args: PublishArgs) -> anyhow::Result<ExitCode> {
    let session = Session::login(profile).await.context("login failed")?;

    let store_id = session
        .list_stores()
        .await?
        .into_iter()
        .find(|s| s.name == args.store)
        .map(|s| s.id)
        .with_context(|| format!("no store named '{}'", args.store))?;
    let store = session.store_info(&args.store).await?;

    let request = LayerPublish {
        store_id,
        name: args.name,
        description: args.description,
        layers: select_layers(&store, &args.layers)?,
        print_layout: select_layout(&store, args.layout)?,
        basemap_id: args.basemap,
        access_group_ids: args.groups,
        flags: (&args.flags).into(),
    };

    let layer = session.publish_layer(&request).await?;
    println!("Published layer {} at {}", layer.id, layer.url);
    Ok(ExitCode::SUCCESS)
}

/// Runs a workflow while printing its events, cancelling it on Ctrl-C.
async fn with_events<F>(
    events: Option<mpsc::Receiver<SyncEvent>>,
    cancel: CancellationToken,
    workflow: F,
) -> Result<SyncReport, SyncError>
where
    F: Future<Output = Result<SyncReport, SyncError>>,
{
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupted, cancelling");
            cancel.cancel();
        }
    });

    let Some(mut rx) = events else {
        let result = workflow.await;
        interrupt.abort();
        return result;
    };

    tokio::pin!(workflow);
    let result = loop {
        tokio::select! {
            result = &mut workflow => break result,
            Some(event) = rx.recv() => render(&event),
        }
    };
    while let Ok(event) = rx.try_recv() {
        render(&event);
    }

    interrupt.abort();
    result
}

fn render(event: &SyncEvent) {
    match event {
        SyncEvent::State(state) => tracing::debug!(?state, "workflow state"),
        SyncEvent::Log(line) => println!("{line}"),
        SyncEvent::Progress(p) => println!(
            "[{}/{}] {:.0}% ({} bytes sent)",
            p.completed,
            p.total,
            p.fraction() * 100.0,
            p.bytes_sent
        ),
        SyncEvent::Finished { success: true, message } => println!("{message}"),
        SyncEvent::Finished { success: false, message } => eprintln!("{message}"),
    }
}

/// Lists failed files and tells whether the workflow fully succeeded.
fn finish(result: Result<SyncReport, SyncError>) -> anyhow::Result<bool> {
    let report = result?;
    for failed in report.failed() {
        eprintln!(
            "  {}: {}",
            failed.relative_path,
            failed.error.as_deref().unwrap_or("failed")
        );
    }
    Ok(report.state != SyncState::PartialFailure)
}

fn exit_code(success: bool) -> ExitCode {
    if success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

/// Directory holding the project: the argument itself, or the parent of a
/// project file.
fn project_dir(project: &Path) -> anyhow::Result<PathBuf> {
    if project.is_dir() {
        return Ok(project.to_path_buf());
    }
    if project.is_file() {
        let parent = project
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or(Path::new("."));
        return Ok(parent.to_path_buf());
    }
    bail!("{} does not exist", project.display())
}

fn default_store_name(project: &Path) -> anyhow::Result<String> {
    let name = if project.is_dir() {
        project.canonicalize()?.file_name().map(|n| n.to_string_lossy().into_owned())
    } else {
        project.file_stem().map(|n| n.to_string_lossy().into_owned())
    };
    name.filter(|n| !n.is_empty())
        .with_context(|| format!("cannot derive a store name from {}, use --name", project.display()))
}

/// Picks the requested layers in alphabetical order. An empty request
/// selects every layer.
fn select_layers(store: &StoreDescriptor, requested: &[String]) -> anyhow::Result<Vec<String>> {
    if let Some(unknown) = requested.iter().find(|r| !store.layers.contains(r)) {
        bail!(
            "store has no layer '{unknown}' (available: {})",
            store.layers.join(", ")
        );
    }
    let mut layers: Vec<String> = store
        .layers
        .iter()
        .filter(|l| requested.is_empty() || requested.contains(l))
        .cloned()
        .collect();
    layers.sort();
    Ok(layers)
}

/// The requested print layout, or the alphabetically first one.
fn select_layout(store: &StoreDescriptor, requested: Option<String>) -> anyhow::Result<String> {
    match requested {
        Some(layout) if store.layouts.contains(&layout) => Ok(layout),
        Some(layout) => bail!(
            "store has no print layout '{layout}' (available: {})",
            store.layouts.join(", ")
        ),
        None => Ok(store.layouts.iter().min().cloned().unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(layers: &[&str], layouts: &[&str]) -> StoreDescriptor {
        StoreDescriptor {
            id: "5".into(),
            post_max_size: 65536,
            files: Vec::new(),
            layers: layers.iter().map(|s| s.to_string()).collect(),
            layouts: layouts.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn layers_are_sorted() {
        let s = store(&["roads", "rivers", "parcels"], &[]);
        let picked = select_layers(&s, &["roads".into(), "parcels".into()]).unwrap();
        assert_eq!(picked, vec!["parcels", "roads"]);
        assert_eq!(
            select_layers(&s, &[]).unwrap(),
            vec!["parcels", "rivers", "roads"]
        );
        assert!(select_layers(&s, &["lakes".into()]).is_err());
    }

    #[test]
    fn layout_defaults_to_alphabetically_first() {
        let s = store(&[], &["A4", "A3"]);
        assert_eq!(select_layout(&s, None).unwrap(), "A3");
        assert_eq!(select_layout(&s, Some("A3".into())).unwrap(), "A3");
        assert!(select_layout(&s, Some("Letter".into())).is_err());
        assert_eq!(select_layout(&store(&[], &[]), None).unwrap(), "");
    }

    #[test]
    fn project_file_resolves_to_its_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let qgs = tmp.path().join("city.qgs");
        std::fs::write(&qgs, b"<qgis/>").unwrap();

        assert_eq!(project_dir(&qgs).unwrap(), tmp.path());
        assert_eq!(project_dir(tmp.path()).unwrap(), tmp.path());
        assert!(project_dir(&tmp.path().join("missing.qgs")).is_err());
        assert_eq!(default_store_name(&qgs).unwrap(), "city");
    }

    #[test]
    fn partial_failure_exit_code() {
        let report = SyncReport {
            workflow: qcarta_sync::Workflow::Update,
            store_id: "5".into(),
            state: SyncState::PartialFailure,
            outcomes: Vec::new(),
        };
        assert!(!finish(Ok(report.clone())).unwrap());

        let done = SyncReport {
            state: SyncState::Done,
            ..report
        };
        assert!(finish(Ok(done)).unwrap());
        assert!(finish(Err(SyncError::Cancelled)).is_err());
    }
}
