use anyhow::{Context, Result};
use async_trait::async_trait;
use devnet_core::DevnetError;
use serde::{Deserialize, Serialize};
use tracing::debug;

// ── Types ──────────────────────────────────────────────────────────

/// Arguments for one `docker run` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunContainerRequest {
    pub image: String,
    pub name: Option<String>,
    /// Run in the background (`-d`) and return the container id.
    pub detach: bool,
    /// Remove the container when it exits (`--rm`).
    pub remove: bool,
    /// `(host_port, container_port)` pairs.
    pub ports: Vec<(u16, u16)>,
    /// `(host_path, container_path)` bind mounts.
    pub volumes: Vec<(String, String)>,
    /// Arguments passed after the image name.
    pub command: Vec<String>,
}

impl RunContainerRequest {
    pub fn new(image: impl Into<String>) -> Self {
        Self {
            image: image.into(),
            ..Self::default()
        }
    }

    /// Full argument list for the docker CLI, starting with `run`.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = vec!["run".to_string()];

        if self.detach {
            args.push("-d".to_string());
        }

        if let Some(ref name) = self.name {
            args.push("--name".to_string());
            args.push(name.clone());
        }

        if self.remove {
            args.push("--rm".to_string());
        }

        for (host_path, container_path) in &self.volumes {
            args.push("-v".to_string());
            args.push(format!("{}:{}", host_path, container_path));
        }

        for (host, container) in &self.ports {
            args.push("-p".to_string());
            args.push(format!("{}:{}", host, container));
        }

        args.push(self.image.clone());
        args.extend(self.command.iter().cloned());
        args
    }
}

// ── ContainerRuntime ───────────────────────────────────────────────

/// The container operations the importer and launcher rely on.
///
/// Each call blocks until the runtime command returns. Names and tags are
/// passed through unchanged.
#[async_trait]
pub trait ContainerRuntime: Send + Sync {
    async fn image_exists(&self, image: &str) -> Result<bool>;
    async fn pull_image(&self, image: &str) -> Result<()>;
    async fn tag_image(&self, source: &str, target: &str) -> Result<()>;
    /// Whether a container with exactly this name exists, running or not.
    async fn container_exists(&self, name: &str) -> Result<bool>;
    async fn container_running(&self, name: &str) -> Result<bool>;
    async fn stop_container(&self, name: &str) -> Result<()>;
    /// Force-remove a container (`rm -f`).
    async fn remove_container(&self, name: &str) -> Result<()>;
    /// Run a container; returns trimmed stdout (the id when detached).
    async fn run_container(&self, request: &RunContainerRequest) -> Result<String>;
    /// Execute a command in a running container; returns stdout.
    async fn exec(&self, name: &str, command: &[String]) -> Result<String>;
}

// ── DockerClient ───────────────────────────────────────────────────

/// [`ContainerRuntime`] backed by the `docker` CLI.
///
/// All operations shell out using `tokio::process::Command`.
#[derive(Debug, Clone)]
pub struct DockerClient {
    /// Path to the docker executable.
    docker_path: String,
}

impl DockerClient {
    /// Create a new client using the default `docker` command.
    pub fn new() -> Self {
        Self {
            docker_path: "docker".to_string(),
        }
    }

    /// Create a new client with a custom path to the docker executable.
    pub fn with_docker_path(path: impl Into<String>) -> Self {
        Self {
            docker_path: path.into(),
        }
    }

    /// Return the configured docker executable path.
    pub fn docker_path(&self) -> &str {
        &self.docker_path
    }

    /// Check whether the Docker CLI is available on the host.
    pub async fn is_available(&self) -> bool {
        self.run_docker(&["--version".to_string()]).await.is_ok()
    }

    /// Execute a docker CLI command and return its stdout.
    async fn run_docker(&self, args: &[String]) -> Result<String> {
        debug!(docker = %self.docker_path, args = %args.join(" "), "docker");
        let output = tokio::process::Command::new(&self.docker_path)
            .args(args)
            .output()
            .await
            .with_context(|| format!("failed to execute: {} {}", self.docker_path, args.join(" ")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DevnetError::Docker {
                status: output.status.to_string(),
                stderr: stderr.trim().to_string(),
            })
            .with_context(|| format!("{} {}", self.docker_path, args.first().map_or("", |a| a.as_str())));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn run(&self, args: &[&str]) -> Result<String> {
        let owned: Vec<String> = args.iter().map(|s| s.to_string()).collect();
        self.run_docker(&owned).await
    }
}

impl Default for DockerClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Name filter matching exactly `name`, not every container containing it.
fn exact_name_filter(name: &str) -> String {
    format!("name=^{}$", name)
}

#[async_trait]
impl ContainerRuntime for DockerClient {
    async fn image_exists(&self, image: &str) -> Result<bool> {
        let output = self.run(&["images", "-q", image]).await?;
        Ok(!output.trim().is_empty())
    }

    async fn pull_image(&self, image: &str) -> Result<()> {
        self.run(&["pull", image]).await?;
        Ok(())
    }

    async fn tag_image(&self, source: &str, target: &str) -> Result<()> {
        self.run(&["tag", source, target]).await?;
        Ok(())
    }

    async fn container_exists(&self, name: &str) -> Result<bool> {
        let filter = exact_name_filter(name);
        let output = self.run(&["ps", "-aq", "-f", &filter]).await?;
        Ok(!output.trim().is_empty())
    }

    async fn container_running(&self, name: &str) -> Result<bool> {
        let output = self
            .run(&["inspect", "-f", "{{.State.Running}}", name])
            .await?;
        Ok(output.trim() == "true")
    }

    async fn stop_container(&self, name: &str) -> Result<()> {
        self.run(&["stop", name]).await?;
        Ok(())
    }

    async fn remove_container(&self, name: &str) -> Result<()> {
        self.run(&["rm", "-f", name]).await?;
        Ok(())
    }

    async fn run_container(&self, request: &RunContainerRequest) -> Result<String> {
        debug!(image = %request.image, name = ?request.name, "running docker container");
        let output = self.run_docker(&request.to_args()).await?;
        Ok(output.trim().to_string())
    }

    async fn exec(&self, name: &str, command: &[String]) -> Result<String> {
        let mut args = vec!["exec".to_string(), name.to_string()];
        args.extend(command.iter().cloned());
        self.run_docker(&args).await
    }
}
