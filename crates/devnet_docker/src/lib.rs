// Container orchestration for the devnet: image setup, key import and node launch.

pub mod docker;
pub mod importer;
pub mod launcher;

#[cfg(test)]
pub(crate) mod fake;

pub use docker::{ContainerRuntime, DockerClient, RunContainerRequest};
pub use importer::{ImportSummary, ensure_image, import_accounts};
pub use launcher::{
    LaunchOptions, LaunchOutcome, NodeProbe, NodeStatus, launch_node, node_command, node_status,
    stop_node,
};
