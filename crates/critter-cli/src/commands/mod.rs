//! Command execution.
//!
//! Every command writes its result to the given output (stdout in the
//! binary) as pretty JSON. Logs go to stderr.

mod jobs;
mod worker;

use std::io::Write;
use std::path::Path;
use std::time::Duration;

use anyhow::Context;
use critter_camunda::{
    CamundaClient, FileTokenStore, ProcessDefinitionFilter, ProcessInstanceKey, ProcessLauncher,
    TokenSession, collect_resources,
};
use serde::Serialize;
use serde_json::json;

use crate::TRACING_TARGET_COMMAND;
use crate::config::{Cli, Command, StartArgs};

/// Runs the command selected on the command line, writing its result to `out`.
pub async fn execute<W: Write>(cli: Cli, out: &mut W) -> anyhow::Result<()> {
    let Cli {
        camunda,
        token_cache,
        command,
    } = cli;

    let client = CamundaClient::new(camunda).context("failed to create engine client")?;
    let session = TokenSession::new(client, FileTokenStore::new(token_cache));

    tracing::debug!(target: TRACING_TARGET_COMMAND, command = command.name(), "Running command");

    match command {
        Command::Token => {
            let status = session.ensure_token().await?;
            print_json(out, &json!({ "token": status }))
        }
        Command::Topology => {
            session.ensure_token().await?;
            let topology = session.client().get_cluster_topology().await?;
            print_json(out, &topology)
        }
        Command::Deploy { assets } => deploy(&session, &assets, out).await,
        Command::Start(args) => start(session, args, out).await,
        Command::Instance { key } => {
            session.ensure_token().await?;
            let instance = session
                .client()
                .get_process_instance(&ProcessInstanceKey::new(key))
                .await?;
            print_json(out, &instance)
        }
        Command::Definitions { process_id } => {
            session.ensure_token().await?;
            let filter = process_id.map(|id| ProcessDefinitionFilter {
                process_definition_id: Some(id),
                ..ProcessDefinitionFilter::default()
            });
            let definitions = session
                .client()
                .search_process_definitions(filter.as_ref())
                .await?;
            print_json(out, &definitions)
        }
        Command::Jobs(command) => jobs::execute(&session, command, out).await,
        Command::Variable { key, name } => {
            session.ensure_token().await?;
            let key = ProcessInstanceKey::new(key);
            let value = session
                .client()
                .get_variable(&key, &name)
                .await?
                .with_context(|| format!("variable '{name}' not found on process instance {key}"))?;
            print_json(out, &value)
        }
        Command::Worker(args) => worker::run(session, args).await,
    }
}

async fn deploy<W: Write>(
    session: &TokenSession,
    assets: &Path,
    out: &mut W,
) -> anyhow::Result<()> {
    session.ensure_token().await?;
    let resources = collect_resources(assets).await?;
    let deployment = session
        .client()
        .deploy_resources(&resources)
        .await
        .context("failed to deploy resources")?;
    print_json(out, &deployment)
}

async fn start<W: Write>(
    session: TokenSession,
    args: StartArgs,
    out: &mut W,
) -> anyhow::Result<()> {
    let launcher = ProcessLauncher::new(session, &args.assets);
    let launch = launcher.launch(args.animal).await?;

    if !args.wait {
        return print_json(out, &launch);
    }

    let value = launcher
        .wait_for_variable(
            &launch.process_instance.process_instance_key,
            &args.wait_variable,
            Duration::from_secs(args.wait_interval),
            args.wait_attempts,
        )
        .await?;

    print_json(
        out,
        &json!({
            "launch": launch,
            args.wait_variable: value,
        }),
    )
}

/// Writes `value` to `out` as pretty JSON followed by a newline.
fn print_json<W, T>(out: &mut W, value: &T) -> anyhow::Result<()>
where
    W: Write,
    T: Serialize + ?Sized,
{
    serde_json::to_writer_pretty(&mut *out, value).context("failed to serialize output")?;
    writeln!(out).context("failed to write output")?;
    Ok(())
}
