// config.rs — Application settings stored in `<data dir>/config.toml`.
//
// Every field is optional in the file. Missing fields fall back to the
// defaults from `LndisConfig::for_data_dir`. Paths may use `~` and the
// `{username}` placeholder; relative paths are taken from the data dir.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use lndis_policy::path;

pub const CONFIG_FILE: &str = "config.toml";
const AUDIT_FILE: &str = "audit.jsonl";
const DEFAULT_WORKSPACE: &str = "~/lndis-workspace";

/// Resolved settings for one `lndis` process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LndisConfig {
    pub data_dir: PathBuf,
    /// The only directory write-class tools may touch.
    pub workspace_root: PathBuf,
    /// Policy rule document. `None` uses the compiled-in rules.
    pub policy_path: Option<PathBuf>,
    pub audit_log: PathBuf,
    /// Initial state of the session network toggle.
    pub network_enabled: bool,
}

impl LndisConfig {
    pub fn for_data_dir(data_dir: &Path) -> Self {
        Self {
            data_dir: data_dir.to_path_buf(),
            workspace_root: expand(DEFAULT_WORKSPACE, data_dir),
            policy_path: None,
            audit_log: data_dir.join(AUDIT_FILE),
            network_enabled: false,
        }
    }

    /// `dirs::data_local_dir()/lndis`, or `./.lndis` when the platform has none.
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .map(|d| d.join("lndis"))
            .unwrap_or_else(|| PathBuf::from(".lndis"))
    }

    pub fn validate(&self) -> Result<()> {
        if path::is_within(&self.audit_log, &self.workspace_root) {
            return Err(anyhow!(
                "audit_log {} must live outside the workspace {}",
                self.audit_log.display(),
                self.workspace_root.display()
            ));
        }
        if self.audit_log.is_dir() {
            return Err(anyhow!(
                "audit_log {} is a directory",
                self.audit_log.display()
            ));
        }
        Ok(())
    }
}

/// On-disk shape of `config.toml`.
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    workspace_root: Option<String>,
    policy_path: Option<String>,
    audit_log: Option<String>,
    network_enabled: Option<bool>,
}

/// Load settings for `data_dir`, reading `config` (or `<data_dir>/config.toml`).
///
/// A missing file yields the defaults.
pub fn load_config(data_dir: &Path, config: Option<&Path>) -> Result<LndisConfig> {
    let path = config
        .map(Path::to_path_buf)
        .unwrap_or_else(|| data_dir.join(CONFIG_FILE));
    let mut cfg = LndisConfig::for_data_dir(data_dir);

    if !path.exists() {
        if config.is_some() {
            return Err(anyhow!("config file not found: {}", path.display()));
        }
        return Ok(cfg);
    }

    let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
    let file: ConfigFile =
        toml::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;

    if let Some(ws) = file.workspace_root {
        cfg.workspace_root = expand(&ws, data_dir);
    }
    if let Some(policy) = file.policy_path {
        cfg.policy_path = Some(expand(&policy, data_dir));
    }
    if let Some(log) = file.audit_log {
        cfg.audit_log = expand(&log, data_dir);
    }
    if let Some(enabled) = file.network_enabled {
        cfg.network_enabled = enabled;
    }

    cfg.validate()
        .with_context(|| format!("invalid config {}", path.display()))?;
    Ok(cfg)
}

/// Expand `{username}` and `~`, then anchor relative paths at `base`.
fn expand(raw: &str, base: &Path) -> PathBuf {
    let templated = raw.replace("{username}", &current_user());
    let expanded = path::expand_home(&templated);
    if expanded.is_absolute() {
        path::normalize(&expanded)
    } else {
        path::normalize(&base.join(expanded))
    }
}

fn current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("USERNAME"))
        .ok()
        .filter(|u| !u.is_empty())
        .or_else(|| {
            dirs::home_dir()
                .and_then(|h| h.file_name().map(|n| n.to_string_lossy().into_owned()))
        })
        .unwrap_or_else(|| "user".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempdir().unwrap();
        let cfg = load_config(dir.path(), None).unwrap();
        assert_eq!(cfg, LndisConfig::for_data_dir(dir.path()));
        assert_eq!(cfg.audit_log, dir.path().join("audit.jsonl"));
        assert!(cfg.workspace_root.ends_with("lndis-workspace"));
        assert!(!cfg.network_enabled);
        assert!(cfg.policy_path.is_none());
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempdir().unwrap();
        let err = load_config(dir.path(), Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn file_overrides_defaults_and_resolves_relative_paths() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            r#"
workspace_root = "ws"
policy_path = "rules/policy.yaml"
network_enabled = true
"#,
        )
        .unwrap();

        let cfg = load_config(dir.path(), None).unwrap();
        assert_eq!(cfg.workspace_root, dir.path().join("ws"));
        assert_eq!(cfg.policy_path, Some(dir.path().join("rules/policy.yaml")));
        assert_eq!(cfg.audit_log, dir.path().join("audit.jsonl"));
        assert!(cfg.network_enabled);
    }

    #[test]
    fn username_placeholder_is_expanded() {
        let dir = tempdir().unwrap();
        let expanded = expand("home-of-{username}", dir.path());
        let name = expanded.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("home-of-"));
        assert!(!name.contains('{'));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CONFIG_FILE), "allow_everything = true\n").unwrap();
        let err = load_config(dir.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("allow_everything"));
    }

    #[test]
    fn audit_log_inside_workspace_is_rejected() {
        let dir = tempdir().unwrap();
        fs::write(
            dir.path().join(CONFIG_FILE),
            "workspace_root = \"ws\"\naudit_log = \"ws/audit.jsonl\"\n",
        )
        .unwrap();
        let err = load_config(dir.path(), None).unwrap_err();
        assert!(format!("{err:#}").contains("outside the workspace"));
    }
}
