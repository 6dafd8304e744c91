use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use devnet_chain::{Account, clean_private_key};
use devnet_core::{DevnetError, Mode};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::docker::{ContainerRuntime, RunContainerRequest};

/// Chain-data directory inside every node container.
pub const CONTAINER_DATA_DIR: &str = "/root/.ethereum";
/// Mount point of the per-account key file.
pub const CONTAINER_KEYFILE: &str = "/tmp/keyfile";

/// Outcome counts for one import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub imported: usize,
    /// Accounts whose private key was malformed.
    pub skipped: usize,
    /// Accounts whose import container failed.
    pub failed: usize,
}

impl ImportSummary {
    pub fn total(&self) -> usize {
        self.imported + self.skipped + self.failed
    }
}

impl fmt::Display for ImportSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} imported, {} skipped, {} failed",
            self.imported, self.skipped, self.failed
        )
    }
}

/// Make sure the local `geth:<mode>` tag exists, pulling `upstream` if not.
pub async fn ensure_image(
    runtime: &dyn ContainerRuntime,
    mode: Mode,
    upstream: &str,
) -> Result<()> {
    let tag = mode.image_tag();
    if runtime.image_exists(&tag).await? {
        debug!(%tag, "image present");
        return Ok(());
    }

    info!(%tag, %upstream, "pulling image");
    runtime
        .pull_image(upstream)
        .await
        .with_context(|| format!("failed to pull {upstream}"))?;
    runtime
        .tag_image(upstream, &tag)
        .await
        .with_context(|| format!("failed to tag {upstream} as {tag}"))?;
    Ok(())
}

/// Absolute chain-data directory for `mode`, created if missing.
pub(crate) fn mode_dir(data_dir: &Path, mode: Mode) -> Result<PathBuf> {
    let dir = mode.data_dir(data_dir);
    std::fs::create_dir_all(&dir)
        .with_context(|| format!("failed to create {}", dir.display()))?;
    std::path::absolute(&dir).with_context(|| format!("failed to resolve {}", dir.display()))
}

/// Container arguments for importing the key mounted at the keyfile path.
fn import_command() -> Vec<String> {
    [
        "account",
        "import",
        "--datadir",
        CONTAINER_DATA_DIR,
        "--password",
        "/dev/null",
        CONTAINER_KEYFILE,
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Import every account key into the keystore of `mode`'s chain data.
///
/// A running node container holds the data-directory lock, so it is removed
/// first. Each account is then imported through its own one-shot container.
/// Malformed keys, unwritable key files and failed containers are counted and
/// skipped. A runtime that cannot be invoked at all aborts the run.
pub async fn import_accounts(
    runtime: &dyn ContainerRuntime,
    accounts: &[Account],
    data_dir: &Path,
    mode: Mode,
) -> Result<ImportSummary> {
    import_with_key_dir(runtime, accounts, data_dir, mode, &std::env::temp_dir()).await
}

/// Write the bare key to a fresh file under `dir`; removed on drop.
fn write_keyfile(dir: &Path, key: &str) -> Result<tempfile::NamedTempFile> {
    let mut keyfile = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("failed to create key file in {}", dir.display()))?;
    keyfile
        .write_all(key.as_bytes())
        .and_then(|_| keyfile.flush())
        .context("failed to write key file")?;
    Ok(keyfile)
}

fn is_per_item(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DevnetError>()
        .is_some_and(DevnetError::is_per_item)
}

async fn import_with_key_dir(
    runtime: &dyn ContainerRuntime,
    accounts: &[Account],
    data_dir: &Path,
    mode: Mode,
    key_dir: &Path,
) -> Result<ImportSummary> {
    let name = mode.container_name();
    if runtime.container_exists(&name).await? {
        info!(container = %name, "removing node container before import");
        runtime.remove_container(&name).await?;
    }

    let host_dir = mode_dir(data_dir, mode)?;
    let host_dir = host_dir.to_string_lossy().into_owned();
    let mut summary = ImportSummary::default();

    for account in accounts {
        let key = match clean_private_key(&account.private_key) {
            Ok(key) => key,
            Err(e) => {
                warn!(address = %account.address, error = %e, "skipping account");
                summary.skipped += 1;
                continue;
            }
        };

        let keyfile = match write_keyfile(key_dir, &key) {
            Ok(file) => file,
            Err(e) => {
                warn!(address = %account.address, error = %e, "account import failed");
                summary.failed += 1;
                continue;
            }
        };

        let request = RunContainerRequest {
            image: mode.image_tag(),
            remove: true,
            volumes: vec![
                (host_dir.clone(), CONTAINER_DATA_DIR.to_string()),
                (
                    keyfile.path().to_string_lossy().into_owned(),
                    CONTAINER_KEYFILE.to_string(),
                ),
            ],
            command: import_command(),
            ..RunContainerRequest::default()
        };

        match runtime.run_container(&request).await {
            Ok(_) => {
                debug!(address = %account.address, "account imported");
                summary.imported += 1;
            }
            Err(e) if is_per_item(&e) => {
                warn!(address = %account.address, error = %e, "account import failed");
                summary.failed += 1;
            }
            Err(e) => {
                return Err(e.context(format!("import aborted at {}", account.address)));
            }
        }
    }

    info!(%mode, %summary, "import finished");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::FakeRuntime;
    use devnet_chain::create_accounts;

    #[tokio::test]
    async fn ensure_image_skips_pull_when_tagged() {
        let runtime = FakeRuntime::new().with_image("geth:pow");
        ensure_image(&runtime, Mode::Pow, "ethereum/client-go:v1.10.26")
            .await
            .unwrap();
        assert_eq!(runtime.calls(), vec!["images -q geth:pow"]);
    }

    #[tokio::test]
    async fn ensure_image_pulls_then_tags() {
        let runtime = FakeRuntime::new();
        ensure_image(&runtime, Mode::Pos, "ethereum/client-go:v1.13.8")
            .await
            .unwrap();
        assert_eq!(
            runtime.calls(),
            vec![
                "images -q geth:pos",
                "pull ethereum/client-go:v1.13.8",
                "tag ethereum/client-go:v1.13.8 geth:pos",
            ]
        );
    }

    #[tokio::test]
    async fn ensure_image_pull_failure_is_fatal() {
        let runtime = FakeRuntime::new().failing_on("pull");
        let err = ensure_image(&runtime, Mode::Pow, "ethereum/client-go:v1.10.26")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("failed to pull"));
        assert!(runtime.calls_starting_with("tag").is_empty());
    }

    #[tokio::test]
    async fn imports_each_account_with_bare_key() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = create_accounts(3);
        let runtime = FakeRuntime::new();

        let summary = import_accounts(&runtime, &accounts, dir.path(), Mode::Pow)
            .await
            .unwrap();
        assert_eq!(
            summary,
            ImportSummary {
                imported: 3,
                skipped: 0,
                failed: 0
            }
        );

        let runs = runtime.calls_starting_with("run");
        assert_eq!(runs.len(), 3);
        let abs = std::path::absolute(dir.path().join("pow")).unwrap();
        for run in &runs {
            assert!(run.starts_with("run --rm -v "));
            assert!(run.contains(&format!("{}:/root/.ethereum", abs.display())));
            assert!(run.ends_with(
                "geth:pow account import --datadir /root/.ethereum --password /dev/null /tmp/keyfile"
            ));
        }

        let expected: Vec<String> = accounts
            .iter()
            .map(|a| a.private_key.trim_start_matches("0x").to_string())
            .collect();
        assert_eq!(runtime.keyfiles(), expected);
        assert!(dir.path().join("pow").is_dir());
    }

    #[tokio::test]
    async fn malformed_key_is_skipped_and_loop_continues() {
        let dir = tempfile::tempdir().unwrap();
        let mut accounts = create_accounts(2);
        accounts.insert(
            1,
            Account {
                address: "0x0000000000000000000000000000000000000001".into(),
                private_key: "0x1234".into(),
            },
        );
        let runtime = FakeRuntime::new();

        let summary = import_accounts(&runtime, &accounts, dir.path(), Mode::Pos)
            .await
            .unwrap();
        assert_eq!(summary.imported, 2);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.total(), 3);
        assert_eq!(runtime.calls_starting_with("run").len(), 2);
    }

    #[tokio::test]
    async fn failed_container_is_counted_and_loop_continues() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = create_accounts(2);
        let runtime = FakeRuntime::new().failing_on("run --rm");

        let summary = import_accounts(&runtime, &accounts, dir.path(), Mode::Pow)
            .await
            .unwrap();
        assert_eq!(summary.failed, 2);
        assert_eq!(summary.imported, 0);
        assert_eq!(summary.to_string(), "0 imported, 0 skipped, 2 failed");
    }

    #[tokio::test]
    async fn unwritable_key_dir_counts_failures_and_continues() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = create_accounts(3);
        let runtime = FakeRuntime::new();
        let missing = dir.path().join("no-such-dir");

        let summary =
            import_with_key_dir(&runtime, &accounts, dir.path(), Mode::Pow, &missing)
                .await
                .unwrap();
        assert_eq!(summary.failed, 3);
        assert_eq!(summary.total(), 3);
        assert!(runtime.calls_starting_with("run").is_empty());
    }

    #[tokio::test]
    async fn unusable_runtime_aborts_the_batch() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = create_accounts(3);
        let runtime = FakeRuntime::new().broken_on("run --rm");

        let err = import_accounts(&runtime, &accounts, dir.path(), Mode::Pow)
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("failed to execute"));
        assert_eq!(runtime.calls_starting_with("run").len(), 1);
    }

    #[tokio::test]
    async fn removes_node_container_before_importing() {
        let dir = tempfile::tempdir().unwrap();
        let accounts = create_accounts(1);
        let runtime = FakeRuntime::new().with_container("geth-pos", true);

        import_accounts(&runtime, &accounts, dir.path(), Mode::Pos)
            .await
            .unwrap();

        let removed = runtime.position("rm -f geth-pos").unwrap();
        let first_run = runtime.position("run").unwrap();
        assert!(removed < first_run);
    }

    #[tokio::test]
    async fn empty_account_list_imports_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let runtime = FakeRuntime::new();
        let summary = import_accounts(&runtime, &[], dir.path(), Mode::Pow)
            .await
            .unwrap();
        assert_eq!(summary.total(), 0);
        assert_eq!(runtime.calls(), vec!["ps -aq -f name=^geth-pow$"]);
    }
}
