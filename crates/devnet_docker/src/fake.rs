//! In-memory [`ContainerRuntime`] that records every call in docker CLI form.

use std::collections::HashSet;

use anyhow::Result;
use async_trait::async_trait;
use devnet_core::DevnetError;
use parking_lot::Mutex;

use crate::docker::{ContainerRuntime, RunContainerRequest};

const KEYFILE_MOUNT: &str = "/tmp/keyfile";

#[derive(Debug, Default)]
pub(crate) struct FakeRuntime {
    calls: Mutex<Vec<String>>,
    images: Mutex<HashSet<String>>,
    containers: Mutex<HashSet<String>>,
    running: Mutex<HashSet<String>>,
    failing: Mutex<Vec<String>>,
    broken: Mutex<Vec<String>>,
    keyfiles: Mutex<Vec<String>>,
}

impl FakeRuntime {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_image(self, image: &str) -> Self {
        self.images.lock().insert(image.to_string());
        self
    }

    pub(crate) fn with_container(self, name: &str, running: bool) -> Self {
        self.containers.lock().insert(name.to_string());
        if running {
            self.running.lock().insert(name.to_string());
        }
        self
    }

    /// Fail every call whose rendered command starts with `prefix`.
    pub(crate) fn failing_on(self, prefix: &str) -> Self {
        self.failing.lock().push(prefix.to_string());
        self
    }

    /// Fail calls starting with `prefix` as if the executable could not run.
    pub(crate) fn broken_on(self, prefix: &str) -> Self {
        self.broken.lock().push(prefix.to_string());
        self
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    pub(crate) fn calls_starting_with(&self, prefix: &str) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter(|c| c.starts_with(prefix))
            .collect()
    }

    /// Index of the first call starting with `prefix`.
    pub(crate) fn position(&self, prefix: &str) -> Option<usize> {
        self.calls().iter().position(|c| c.starts_with(prefix))
    }

    /// Contents of each key file mounted into a `run`, in call order.
    pub(crate) fn keyfiles(&self) -> Vec<String> {
        self.keyfiles.lock().clone()
    }

    fn record(&self, call: String) -> Result<()> {
        let fails = self.failing.lock().iter().any(|p| call.starts_with(p));
        let broken = self.broken.lock().iter().any(|p| call.starts_with(p));
        self.calls.lock().push(call.clone());
        if broken {
            anyhow::bail!("failed to execute: docker {call}");
        }
        if fails {
            return Err(DevnetError::Docker {
                status: "exit status: 1".into(),
                stderr: format!("fake failure: {call}"),
            }
            .into());
        }
        Ok(())
    }
}

#[async_trait]
impl ContainerRuntime for FakeRuntime {
    async fn image_exists(&self, image: &str) -> Result<bool> {
        self.record(format!("images -q {image}"))?;
        Ok(self.images.lock().contains(image))
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        self.record(format!("pull {image}"))?;
        self.images.lock().insert(image.to_string());
        Ok(())
    }

    async fn tag_image(&self, source: &str, target: &str) -> Result<()> {
        self.record(format!("tag {source} {target}"))?;
        self.images.lock().insert(target.to_string());
        Ok(())
    }

    async fn container_exists(&self, name: &str) -> Result<bool> {
        self.record(format!("ps -aq -f name=^{name}$"))?;
        Ok(self.containers.lock().contains(name))
    }

    async fn container_running(&self, name: &str) -> Result<bool> {
        self.record(format!("inspect -f {{{{.State.Running}}}} {name}"))?;
        Ok(self.running.lock().contains(name))
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        self.record(format!("stop {name}"))?;
        self.running.lock().remove(name);
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        self.record(format!("rm -f {name}"))?;
        self.containers.lock().remove(name);
        self.running.lock().remove(name);
        Ok(())
    }

    async fn run_container(&self, request: &RunContainerRequest) -> Result<String> {
        for (host, container) in &request.volumes {
            if container == KEYFILE_MOUNT {
                let contents = std::fs::read_to_string(host).unwrap_or_default();
                self.keyfiles.lock().push(contents);
            }
        }
        self.record(request.to_args().join(" "))?;
        if let (true, Some(name)) = (request.detach, request.name.as_ref()) {
            self.containers.lock().insert(name.clone());
            self.running.lock().insert(name.clone());
            return Ok(format!("{name}-id"));
        }
        Ok(String::new())
    }

    async fn exec(&self, name: &str, command: &[String]) -> Result<String> {
        self.record(format!("exec {name} {}", command.join(" ")))?;
        Ok("true\n".to_string())
    }
}
