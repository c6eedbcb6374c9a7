//! Spawning the model-serving binary for one binding.

use crate::{BindingLog, SupervisedProcess, SupervisorError, SupervisorResult};

use std::io::ErrorKind;
use std::net::TcpListener;
use std::panic::Location;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::process::Command;
use tracing::{debug, info};
use wd_config::{Binding, ServiceConfig};

/// Starts a supervised process. Never waits for readiness.
#[async_trait]
pub trait ProcessLauncher: Send + Sync {
    async fn launch(
        &self,
        binding: &Binding,
        restart_count: u32,
        sink: &BindingLog,
    ) -> SupervisorResult<SupervisedProcess>;
}

/// Launches `service.command` detached in its own session, so the whole
/// process group (including runner children) can be killed together.
pub struct CommandLauncher {
    service: ServiceConfig,
}

impl CommandLauncher {
    pub fn new(service: ServiceConfig) -> Self {
        Self { service }
    }

    /// Resolve the command to an executable path.
    ///
    /// Search order:
    /// 1. Explicit path (contains a separator)
    /// 2. System PATH
    fn resolve_binary(&self) -> SupervisorResult<PathBuf> {
        let command = self.service.command.as_str();

        if command.contains(std::path::MAIN_SEPARATOR) {
            let path = PathBuf::from(command);
            if path.is_file() {
                return Ok(path);
            }
        } else if let Some(paths) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&paths) {
                let candidate = dir.join(command);
                if candidate.is_file() {
                    debug!("Resolved {command} to {}", candidate.display());
                    return Ok(candidate);
                }
            }
        }

        Err(SupervisorError::BinaryNotFound {
            command: command.to_string(),
            location: ErrorLocation::from(Location::caller()),
        })
    }

    /// Refuse to launch onto a port something else is already listening on.
    fn ensure_port_free(binding: &Binding) -> SupervisorResult<()> {
        match TcpListener::bind((binding.host.as_str(), binding.port)) {
            Ok(listener) => {
                drop(listener);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::AddrInUse => Err(SupervisorError::PortInUse {
                host: binding.host.clone(),
                port: binding.port,
                location: ErrorLocation::from(Location::caller()),
            }),
            Err(e) => Err(e.into()),
        }
    }

    fn build_command(
        &self,
        binary: &Path,
        binding: &Binding,
        sink: &BindingLog,
    ) -> SupervisorResult<Command> {
        let mut cmd = Command::new(binary);
        cmd.args(self.service.args.iter().map(|arg| binding.expand(arg)))
            .env(&self.service.host_env, binding.address())
            .envs(&self.service.env);

        if let Some(model_dir) = &self.service.model_dir {
            cmd.env(&self.service.model_dir_env, model_dir);
        }

        if let Some(working_dir) = &self.service.working_dir {
            cmd.current_dir(working_dir);
        }

        cmd.stdin(Stdio::null())
            .stdout(sink.stdio()?)
            .stderr(sink.stdio()?);

        // New session: the child leads its own process group.
        #[cfg(unix)]
        unsafe {
            cmd.pre_exec(|| {
                libc::setsid();
                Ok(())
            });
        }

        Ok(cmd)
    }
}

#[async_trait]
impl ProcessLauncher for CommandLauncher {
    async fn launch(
        &self,
        binding: &Binding,
        restart_count: u32,
        sink: &BindingLog,
    ) -> SupervisorResult<SupervisedProcess> {
        let binary = self.resolve_binary()?;
        Self::ensure_port_free(binding)?;

        let mut cmd = self.build_command(&binary, binding, sink)?;

        let child = cmd.spawn().map_err(|source| {
            if source.kind() == ErrorKind::NotFound {
                SupervisorError::BinaryNotFound {
                    command: binary.display().to_string(),
                    location: ErrorLocation::from(Location::caller()),
                }
            } else {
                SupervisorError::ProcessSpawn {
                    command: binary.display().to_string(),
                    source,
                    location: ErrorLocation::from(Location::caller()),
                }
            }
        })?;

        let process = SupervisedProcess::spawned(binding.clone(), child, restart_count);
        info!(
            binding = %binding,
            pid = ?process.pid(),
            restart_count,
            "Spawned {}",
            binary.display()
        );

        Ok(process)
    }
}
