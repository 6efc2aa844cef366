//! Solidity compiler management.
//!
//! Resolves the compiler version a source asks for, installs static solc
//! builds from binaries.soliditylang.org into a local cache, and compiles a
//! single source unit through `solc --standard-json`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::io::Write;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{Value, json};
use sha2::{Digest, Sha256};
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::error::DeployError;

/// Compiler used when the pragma is missing, unusable, or uninstallable.
pub const DEFAULT_SOLC_VERSION: &str = "0.8.20";
/// Name of the single source unit handed to the compiler.
pub const SOURCE_UNIT: &str = "<stdin>";
/// Default mirror for static solc builds.
pub const DEFAULT_BINARIES_URL: &str = "https://binaries.soliditylang.org";
/// Per-request ceiling for list and binary downloads.
pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(120);

static PRAGMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"pragma\s+solidity\s+([^;]+);").expect("valid regex"));
static ZERO_X_VERSION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^0\.\d+\.\d+$").expect("valid regex"));

/// Resolve the compiler version from the first `pragma solidity` directive.
///
/// Range qualifiers (`^`, `~`, `>=`, `<=`, `>`, `<`, `=`) are stripped and the
/// first remaining token is used. Anything that is not a `0.x.y` version
/// falls back to [`DEFAULT_SOLC_VERSION`].
pub fn detect_solc_version(source: &str) -> String {
    let Some(caps) = PRAGMA.captures(source) else {
        return DEFAULT_SOLC_VERSION.to_string();
    };
    let cleaned: String = caps[1]
        .trim()
        .chars()
        .filter(|c| !matches!(c, '^' | '~' | '>' | '<' | '='))
        .collect();
    match cleaned.split_whitespace().next() {
        Some(version) if ZERO_X_VERSION.is_match(version) => version.to_string(),
        _ => DEFAULT_SOLC_VERSION.to_string(),
    }
}

/// ABI and creation bytecode for one contract.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledContract {
    pub abi: Value,
    /// Hex, without `0x`.
    pub bytecode: String,
}

/// Compiled contracts keyed `<stdin>:<ContractName>`.
pub type Artifacts = BTreeMap<String, CompiledContract>;

pub fn artifact_key(contract_name: &str) -> String {
    format!("{SOURCE_UNIT}:{contract_name}")
}

/// The compiler seam of the deployment engine.
#[async_trait]
pub trait Compiler: Send + Sync {
    /// Make `version` available. Idempotent.
    async fn install(&self, version: &str) -> Result<(), DeployError>;
    async fn compile(&self, source: &str, version: &str) -> Result<Artifacts, DeployError>;
}

/// Which compiler was asked for and which one will actually be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilerSelection {
    pub requested: String,
    pub used: String,
}

impl CompilerSelection {
    pub fn fell_back(&self) -> bool {
        self.requested != self.used
    }
}

/// Install the requested version, or the default one if that fails.
pub async fn select_compiler(
    compiler: &dyn Compiler,
    requested: &str,
) -> Result<CompilerSelection, DeployError> {
    match compiler.install(requested).await {
        Ok(()) => {
            tracing::info!(version = %requested, "Using requested solc version");
            Ok(CompilerSelection {
                requested: requested.to_string(),
                used: requested.to_string(),
            })
        }
        Err(e) if requested != DEFAULT_SOLC_VERSION => {
            tracing::warn!(
                version = %requested,
                default = DEFAULT_SOLC_VERSION,
                error = %e,
                "Failed to install requested solc, trying default"
            );
            compiler.install(DEFAULT_SOLC_VERSION).await?;
            tracing::info!(
                requested = %requested,
                version = DEFAULT_SOLC_VERSION,
                "Using default solc version instead of requested"
            );
            Ok(CompilerSelection {
                requested: requested.to_string(),
                used: DEFAULT_SOLC_VERSION.to_string(),
            })
        }
        Err(e) => Err(e),
    }
}

/// Downloads and runs static solc builds.
pub struct SolcManager {
    cache_dir: PathBuf,
    binaries_url: String,
    platform: &'static str,
    http: reqwest::Client,
}

impl SolcManager {
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            binaries_url: DEFAULT_BINARIES_URL.to_string(),
            platform: host_platform(),
            http: download_client(DOWNLOAD_TIMEOUT),
        }
    }

    pub fn with_download_timeout(mut self, timeout: Duration) -> Self {
        self.http = download_client(timeout);
        self
    }

    /// Cache under the platform data directory (`~/.local/share/ideaforge/solc` on Linux).
    pub fn with_default_cache() -> Self {
        let dir = dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ideaforge")
            .join("solc");
        Self::new(dir)
    }

    pub fn with_binaries_url(mut self, url: &str) -> Self {
        self.binaries_url = url.trim_end_matches('/').to_string();
        self
    }

    pub fn binary_path(&self, version: &str) -> PathBuf {
        let name = if cfg!(windows) {
            format!("solc-{version}.exe")
        } else {
            format!("solc-{version}")
        };
        self.cache_dir.join(name)
    }

    async fn download(&self, version: &str, dest: &Path) -> Result<(), DeployError> {
        let fail = |reason: String| DeployError::CompilerInstall {
            version: version.to_string(),
            reason,
        };

        let list_url = format!("{}/{}/list.json", self.binaries_url, self.platform);
        let list: Value = self
            .http
            .get(&list_url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(format!("fetching {list_url}: {e}")))?
            .json()
            .await
            .map_err(|e| fail(format!("parsing {list_url}: {e}")))?;

        let file_name = list["releases"][version]
            .as_str()
            .ok_or_else(|| fail(format!("no {} release for {version}", self.platform)))?
            .to_string();
        let expected_sha = list["builds"]
            .as_array()
            .into_iter()
            .flatten()
            .find(|b| b["path"].as_str() == Some(file_name.as_str()))
            .and_then(|b| b["sha256"].as_str())
            .map(|s| s.trim_start_matches("0x").to_lowercase());

        let url = format!("{}/{}/{}", self.binaries_url, self.platform, file_name);
        tracing::info!(version = %version, url = %url, "Downloading solc");
        let bytes = self
            .http
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| fail(format!("downloading {url}: {e}")))?
            .bytes()
            .await
            .map_err(|e| fail(format!("reading {url}: {e}")))?;

        tokio::fs::create_dir_all(&self.cache_dir)
            .await
            .map_err(|e| fail(format!("creating {}: {e}", self.cache_dir.display())))?;

        let cache_dir = self.cache_dir.clone();
        let dest = dest.to_path_buf();
        let prefix = format!("solc-{version}.");
        tokio::task::spawn_blocking(move || persist_verified(&cache_dir, &prefix, &bytes, expected_sha, &dest))
            .await
            .map_err(|e| fail(format!("install task failed: {e}")))?
            .map_err(fail)
    }
}

#[async_trait]
impl Compiler for SolcManager {
    async fn install(&self, version: &str) -> Result<(), DeployError> {
        if !ZERO_X_VERSION.is_match(version) {
            return Err(DeployError::CompilerInstall {
                version: version.to_string(),
                reason: "not a 0.x.y version".into(),
            });
        }
        let path = self.binary_path(version);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(());
        }
        self.download(version, &path).await
    }

    async fn compile(&self, source: &str, version: &str) -> Result<Artifacts, DeployError> {
        self.install(version).await?;
        let input = standard_json_input(source);

        let mut child = Command::new(self.binary_path(version))
            .arg("--standard-json")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| DeployError::Compilation(format!("failed to start solc {version}: {e}")))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.to_string().as_bytes())
                .await
                .map_err(|e| DeployError::Compilation(format!("writing to solc: {e}")))?;
        }

        let output = child
            .wait_with_output()
            .await
            .map_err(|e| DeployError::Compilation(format!("waiting for solc: {e}")))?;
        if !output.status.success() && output.stdout.is_empty() {
            return Err(DeployError::Compilation(format!(
                "solc exited with {}: {}",
                output.status,
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let parsed: Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| DeployError::Compilation(format!("unreadable solc output: {e}")))?;
        parse_standard_json_output(&parsed)
    }
}

fn download_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_default()
}

/// Write `bytes` to a uniquely named temp file next to `dest`, check the
/// sha256 of what landed on disk, then move it into place.
fn persist_verified(
    cache_dir: &Path,
    prefix: &str,
    bytes: &[u8],
    expected_sha: Option<String>,
    dest: &Path,
) -> Result<(), String> {
    let mut tmp = tempfile::Builder::new()
        .prefix(prefix)
        .suffix(".partial")
        .tempfile_in(cache_dir)
        .map_err(|e| format!("creating temp file in {}: {e}", cache_dir.display()))?;
    tmp.write_all(bytes)
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| format!("writing {}: {e}", tmp.path().display()))?;

    if let Some(expected) = expected_sha {
        let written = std::fs::read(tmp.path()).map_err(|e| format!("re-reading {}: {e}", tmp.path().display()))?;
        let actual = hex::encode(Sha256::digest(&written));
        if actual != expected {
            return Err(format!("checksum mismatch: expected {expected}, got {actual}"));
        }
    }

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o755))
            .map_err(|e| format!("chmod {}: {e}", tmp.path().display()))?;
    }
    tmp.persist(dest)
        .map_err(|e| format!("installing {}: {e}", dest.display()))?;
    Ok(())
}

fn host_platform() -> &'static str {
    if cfg!(target_os = "macos") {
        "macosx-amd64"
    } else if cfg!(windows) {
        "windows-amd64"
    } else {
        "linux-amd64"
    }
}

pub fn standard_json_input(source: &str) -> Value {
    json!({
        "language": "Solidity",
        "sources": { SOURCE_UNIT: { "content": source } },
        "settings": {
            "outputSelection": { "*": { "*": ["abi", "evm.bytecode.object"] } }
        }
    })
}

/// Turn solc's standard-JSON output into artifacts, failing on any error diagnostic.
pub fn parse_standard_json_output(output: &Value) -> Result<Artifacts, DeployError> {
    let errors: Vec<String> = output["errors"]
        .as_array()
        .into_iter()
        .flatten()
        .filter(|e| e["severity"].as_str() == Some("error"))
        .map(|e| {
            e["formattedMessage"]
                .as_str()
                .or_else(|| e["message"].as_str())
                .unwrap_or("unknown compiler error")
                .trim()
                .to_string()
        })
        .collect();
    if !errors.is_empty() {
        return Err(DeployError::Compilation(errors.join("\n")));
    }

    let mut artifacts = Artifacts::new();
    if let Some(units) = output["contracts"].as_object() {
        for (unit, contracts) in units {
            let Some(contracts) = contracts.as_object() else {
                continue;
            };
            for (name, artifact) in contracts {
                let bytecode = artifact["evm"]["bytecode"]["object"]
                    .as_str()
                    .unwrap_or_default()
                    .trim_start_matches("0x")
                    .to_string();
                artifacts.insert(
                    format!("{unit}:{name}"),
                    CompiledContract {
                        abi: artifact["abi"].clone(),
                        bytecode,
                    },
                );
            }
        }
    }
    Ok(artifacts)
}
