// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bollard-backed engine implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::Docker;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use sdv_core::LogStreamKind;

use crate::docker::{
    cli, CliOutput, ContainerEngine, ContainerSpec, ContainerState, EngineError, ExitInfo,
    LogChunk, NetworkMode, StatsSnapshot,
};

/// Live connection to the local docker daemon.
#[derive(Clone)]
pub struct LiveEngine {
    docker: Docker,
}

impl LiveEngine {
    /// Connect with the platform defaults (unix socket / npipe / env).
    pub fn connect() -> Result<Self, EngineError> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| EngineError::Unavailable(format!("docker connect: {e}")))?;
        Ok(Self { docker })
    }

    /// Probe the engine; used at boot to fail fast with a clear message.
    pub async fn ping(&self) -> Result<(), EngineError> {
        self.docker.ping().await.map_err(map_err)?;
        Ok(())
    }
}

fn map_err(err: bollard::errors::Error) -> EngineError {
    use bollard::errors::Error;
    match err {
        Error::DockerResponseServerError { status_code: 404, message } => {
            EngineError::NotFound(message)
        }
        Error::DockerResponseServerError { status_code: 409, message } => {
            EngineError::Conflict(message)
        }
        Error::DockerResponseServerError { message, .. } => EngineError::Rejected(message),
        Error::IOError { err } => EngineError::Unavailable(err.to_string()),
        other => EngineError::Rejected(other.to_string()),
    }
}

fn parse_engine_time(text: Option<&str>) -> Option<chrono::DateTime<chrono::Utc>> {
    let text = text?;
    // The engine uses "0001-01-01T00:00:00Z" for "never".
    if text.starts_with("0001-") {
        return None;
    }
    chrono::DateTime::parse_from_rfc3339(text)
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

#[async_trait]
impl ContainerEngine for LiveEngine {
    async fn create(&self, spec: &ContainerSpec) -> Result<String, EngineError> {
        let env: Vec<String> =
            spec.env.iter().map(|(k, v)| format!("{k}={v}")).collect();
        let binds: Vec<String> = spec
            .binds
            .iter()
            .map(|b| {
                let mode = if b.read_only { ":ro" } else { "" };
                format!("{}:{}{}", b.host.display(), b.container, mode)
            })
            .collect();
        let tmpfs: HashMap<String, String> =
            spec.tmpfs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();

        let host_config = bollard::models::HostConfig {
            binds: (!binds.is_empty()).then_some(binds),
            memory: spec.memory_limit_bytes,
            cpu_quota: spec.cpu_quota_us,
            network_mode: spec.network.as_ref().map(|n| match n {
                NetworkMode::Host => "host".to_string(),
                NetworkMode::Bridge(name) => name.clone(),
            }),
            readonly_rootfs: spec.read_only_root.then_some(true),
            tmpfs: (!tmpfs.is_empty()).then_some(tmpfs),
            ..Default::default()
        };

        let body = bollard::models::ContainerCreateBody {
            image: Some(spec.image.clone()),
            cmd: (!spec.command.is_empty()).then(|| spec.command.clone()),
            env: (!env.is_empty()).then_some(env),
            working_dir: spec.working_dir.clone(),
            labels: Some(spec.labels.clone().into_iter().collect()),
            host_config: Some(host_config),
            ..Default::default()
        };

        let options = spec.name.as_ref().map(|name| {
            bollard::query_parameters::CreateContainerOptionsBuilder::default()
                .name(name)
                .build()
        });

        let created =
            self.docker.create_container(options, body).await.map_err(map_err)?;
        Ok(created.id)
    }

    async fn start(&self, id: &str) -> Result<(), EngineError> {
        self.docker
            .start_container(id, None::<bollard::query_parameters::StartContainerOptions>)
            .await
            .map_err(map_err)
    }

    async fn stop(&self, id: &str, grace: Duration) -> Result<(), EngineError> {
        let options = bollard::query_parameters::StopContainerOptionsBuilder::default()
            .t(grace.as_secs() as i32)
            .build();
        self.docker.stop_container(id, Some(options)).await.map_err(map_err)
    }

    async fn remove(&self, id: &str, force: bool) -> Result<(), EngineError> {
        let options = bollard::query_parameters::RemoveContainerOptionsBuilder::default()
            .force(force)
            .build();
        self.docker.remove_container(id, Some(options)).await.map_err(map_err)
    }

    async fn inspect(&self, id: &str) -> Result<ContainerState, EngineError> {
        let response = self
            .docker
            .inspect_container(id, None::<bollard::query_parameters::InspectContainerOptions>)
            .await
            .map_err(map_err)?;

        let state = response.state.unwrap_or_default();
        Ok(ContainerState {
            id: response.id.unwrap_or_else(|| id.to_string()),
            running: state.running.unwrap_or(false),
            paused: state.paused.unwrap_or(false),
            exit_code: state.exit_code,
            pid: state.pid,
            started_at: parse_engine_time(state.started_at.as_deref()),
            finished_at: parse_engine_time(state.finished_at.as_deref()),
            labels: response
                .config
                .and_then(|c| c.labels)
                .map(|l| l.into_iter().collect())
                .unwrap_or_default(),
        })
    }

    async fn wait(&self, id: &str) -> Result<ExitInfo, EngineError> {
        let mut stream = self
            .docker
            .wait_container(id, None::<bollard::query_parameters::WaitContainerOptions>);
        match stream.next().await {
            Some(Ok(response)) => Ok(ExitInfo { exit_code: Some(response.status_code) }),
            // A wait error usually means the container was force-removed
            // under us; report an unknown exit rather than failing.
            Some(Err(bollard::errors::Error::DockerContainerWaitError { code, .. })) => {
                Ok(ExitInfo { exit_code: Some(code) })
            }
            Some(Err(e)) => Err(map_err(e)),
            None => Ok(ExitInfo { exit_code: None }),
        }
    }

    async fn pause(&self, id: &str) -> Result<(), EngineError> {
        self.docker.pause_container(id).await.map_err(map_err)
    }

    async fn unpause(&self, id: &str) -> Result<(), EngineError> {
        self.docker.unpause_container(id).await.map_err(map_err)
    }

    async fn logs(
        &self,
        id: &str,
        follow: bool,
        tail: Option<usize>,
    ) -> Result<BoxStream<'static, Result<LogChunk, EngineError>>, EngineError> {
        let mut builder = bollard::query_parameters::LogsOptionsBuilder::default()
            .follow(follow)
            .stdout(true)
            .stderr(true);
        if let Some(tail) = tail {
            builder = builder.tail(&tail.to_string());
        }

        let stream = self.docker.logs(id, Some(builder.build()));
        let mapped = stream.map(|item| match item {
            Ok(bollard::container::LogOutput::StdOut { message }) => {
                Ok(LogChunk { stream: LogStreamKind::Stdout, bytes: message.to_vec() })
            }
            Ok(bollard::container::LogOutput::StdErr { message }) => {
                Ok(LogChunk { stream: LogStreamKind::Stderr, bytes: message.to_vec() })
            }
            Ok(bollard::container::LogOutput::Console { message }) => {
                Ok(LogChunk { stream: LogStreamKind::Stdout, bytes: message.to_vec() })
            }
            Ok(bollard::container::LogOutput::StdIn { .. }) => {
                Ok(LogChunk { stream: LogStreamKind::Stdout, bytes: Vec::new() })
            }
            Err(e) => Err(map_err(e)),
        });
        Ok(mapped.boxed())
    }

    async fn stats(&self, id: &str) -> Result<StatsSnapshot, EngineError> {
        let options = bollard::query_parameters::StatsOptionsBuilder::default()
            .stream(false)
            .build();
        let mut stream = self.docker.stats(id, Some(options));
        let stats = match stream.next().await {
            Some(Ok(stats)) => stats,
            Some(Err(e)) => return Err(map_err(e)),
            None => return Err(EngineError::NotFound(id.to_string())),
        };

        let cpu = stats.cpu_stats.as_ref();
        let precpu = stats.precpu_stats.as_ref();
        let memory = stats.memory_stats.as_ref();

        let (net_rx, net_tx) = stats
            .networks
            .as_ref()
            .map(|networks| {
                networks.values().fold((0u64, 0u64), |(rx, tx), net| {
                    (
                        rx + net.rx_bytes.unwrap_or(0),
                        tx + net.tx_bytes.unwrap_or(0),
                    )
                })
            })
            .unwrap_or((0, 0));

        let (block_read, block_write) = stats
            .blkio_stats
            .as_ref()
            .and_then(|blkio| blkio.io_service_bytes_recursive.as_ref())
            .map(|entries| {
                entries.iter().fold((0u64, 0u64), |(read, write), entry| {
                    let value = entry.value.unwrap_or(0);
                    match entry.op.as_deref() {
                        Some("Read") | Some("read") => (read + value, write),
                        Some("Write") | Some("write") => (read, write + value),
                        _ => (read, write),
                    }
                })
            })
            .unwrap_or((0, 0));

        Ok(StatsSnapshot {
            cpu_total_usage: cpu
                .and_then(|c| c.cpu_usage.as_ref())
                .and_then(|u| u.total_usage)
                .unwrap_or(0),
            precpu_total_usage: precpu
                .and_then(|c| c.cpu_usage.as_ref())
                .and_then(|u| u.total_usage)
                .unwrap_or(0),
            system_cpu_usage: cpu.and_then(|c| c.system_cpu_usage).unwrap_or(0),
            pre_system_cpu_usage: precpu.and_then(|c| c.system_cpu_usage).unwrap_or(0),
            online_cpus: cpu.and_then(|c| c.online_cpus).unwrap_or(1) as u32,
            memory_usage: memory.and_then(|m| m.usage).unwrap_or(0),
            memory_limit: memory.and_then(|m| m.limit).unwrap_or(0),
            net_rx_bytes: net_rx,
            net_tx_bytes: net_tx,
            block_read_bytes: block_read,
            block_write_bytes: block_write,
            pids: stats.pids_stats.as_ref().and_then(|p| p.current),
        })
    }

    async fn list_by_label(
        &self,
        key: &str,
        value: &str,
    ) -> Result<Vec<ContainerState>, EngineError> {
        let mut filters: HashMap<String, Vec<String>> = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{key}={value}")]);
        let options = bollard::query_parameters::ListContainersOptionsBuilder::default()
            .all(true)
            .filters(&filters)
            .build();

        let summaries =
            self.docker.list_containers(Some(options)).await.map_err(map_err)?;
        let mut states = Vec::with_capacity(summaries.len());
        for summary in summaries {
            let Some(id) = summary.id else { continue };
            // Summaries lack exit codes and pids; inspect for the full state.
            match self.inspect(&id).await {
                Ok(state) => states.push(state),
                Err(EngineError::NotFound(_)) => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(states)
    }

    async fn exec(&self, id: &str, cmd: Vec<String>) -> Result<CliOutput, EngineError> {
        let created = self
            .docker
            .create_exec(
                id,
                bollard::exec::CreateExecOptions {
                    cmd: Some(cmd),
                    attach_stdout: Some(true),
                    attach_stderr: Some(true),
                    ..Default::default()
                },
            )
            .await
            .map_err(map_err)?;

        let mut stdout = String::new();
        let mut stderr = String::new();
        match self.docker.start_exec(&created.id, None).await.map_err(map_err)? {
            bollard::exec::StartExecResults::Attached { mut output, .. } => {
                while let Some(item) = output.next().await {
                    match item.map_err(map_err)? {
                        bollard::container::LogOutput::StdOut { message } => {
                            stdout.push_str(&String::from_utf8_lossy(&message));
                        }
                        bollard::container::LogOutput::StdErr { message } => {
                            stderr.push_str(&String::from_utf8_lossy(&message));
                        }
                        _ => {}
                    }
                }
            }
            bollard::exec::StartExecResults::Detached => {}
        }

        let inspected = self.docker.inspect_exec(&created.id).await.map_err(map_err)?;
        Ok(CliOutput {
            stdout,
            stderr,
            exit_code: inspected.exit_code.unwrap_or(0),
            container_id: None,
        })
    }

    async fn run_cli(&self, tokens: &[String]) -> Result<CliOutput, EngineError> {
        cli::run_docker(tokens).await
    }
}
