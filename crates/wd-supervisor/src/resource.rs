//! Optional third probe: an external command that must confirm the
//! binding's resource (for example a GPU runner) is still attached.

use crate::{SupervisedProcess, SupervisorError, SupervisorResult};

use std::panic::Location;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use error_location::ErrorLocation;
use tokio::process::Command;
use wd_config::ResourceProbeConfig;

#[async_trait]
pub trait ResourceCheck: Send + Sync {
    async fn check(&self, process: &SupervisedProcess) -> SupervisorResult<()>;
}

pub struct CommandResourceCheck {
    command: String,
    args: Vec<String>,
    expect: Option<String>,
    timeout: Duration,
}

impl CommandResourceCheck {
    pub fn from_config(resource: &ResourceProbeConfig) -> Self {
        Self {
            command: resource.command.clone(),
            args: resource.args.clone(),
            expect: resource.expect.clone(),
            timeout: Duration::from_secs(resource.timeout_secs),
        }
    }

    #[track_caller]
    fn missing(process: &SupervisedProcess, message: String) -> SupervisorError {
        SupervisorError::ResourceMissing {
            binding: process.binding().to_string(),
            message,
            location: ErrorLocation::from(Location::caller()),
        }
    }
}

#[async_trait]
impl ResourceCheck for CommandResourceCheck {
    async fn check(&self, process: &SupervisedProcess) -> SupervisorResult<()> {
        let binding = process.binding();

        let mut cmd = Command::new(&self.command);
        cmd.args(self.args.iter().map(|arg| binding.expand(arg)))
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(Self::missing(
                    process,
                    format!("failed to run {}: {e}", self.command),
                ));
            }
            Err(_) => {
                return Err(Self::missing(
                    process,
                    format!("{} timed out after {:?}", self.command, self.timeout),
                ));
            }
        };

        if !output.status.success() {
            return Err(Self::missing(
                process,
                format!("{} exited with {}", self.command, output.status),
            ));
        }

        if let Some(expect) = &self.expect {
            let marker = binding.expand(expect);
            let stdout = String::from_utf8_lossy(&output.stdout);
            if !stdout.contains(&marker) {
                return Err(Self::missing(
                    process,
                    format!("{} output lacks {marker:?}", self.command),
                ));
            }
        }

        Ok(())
    }
}
