use crate::cli::CliArgs;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_KUBECTL: &str = "kubectl";
const DEFAULT_REFRESH_SECS: u64 = 8;
const DEFAULT_METRICS_INTERVAL_MS: u64 = 2_500;
const DEFAULT_EXEC_SHELL: &str = "sh";
const DEFAULT_TOP_ROWS: usize = 6;

const MIN_REFRESH_SECS: u64 = 1;
const MIN_METRICS_INTERVAL_MS: u64 = 250;

#[derive(Debug, Clone, Deserialize, Default, Eq, PartialEq)]
struct MinipodConfigFile {
    #[serde(default)]
    kubectl: Option<String>,
    #[serde(default, alias = "refresh")]
    refresh_secs: Option<u64>,
    #[serde(default, alias = "metrics_ms")]
    metrics_interval_ms: Option<u64>,
    #[serde(default, alias = "shell")]
    exec_shell: Option<String>,
    #[serde(default)]
    top_rows: Option<usize>,
    #[serde(default)]
    namespace: Option<String>,
}

/// Resolved runtime settings: CLI flag, then config file, then built-in default.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct Settings {
    pub source: Option<String>,
    pub kubectl: String,
    pub refresh_interval: Duration,
    pub metrics_interval: Duration,
    pub exec_shell: String,
    pub top_rows: usize,
    pub namespace: Option<String>,
}

impl Settings {
    pub fn load(args: &CliArgs) -> Result<Self> {
        let path = args.config.clone().or_else(discover_config_path);
        let file = match &path {
            Some(path) => read_config_file(path)?,
            None => MinipodConfigFile::default(),
        };
        Ok(Self::resolve(
            args,
            file,
            path.map(|path| path.display().to_string()),
        ))
    }

    fn resolve(args: &CliArgs, file: MinipodConfigFile, source: Option<String>) -> Self {
        let refresh_secs = args
            .refresh_secs
            .or(file.refresh_secs)
            .unwrap_or(DEFAULT_REFRESH_SECS)
            .max(MIN_REFRESH_SECS);
        let metrics_ms = args
            .metrics_ms
            .or(file.metrics_interval_ms)
            .unwrap_or(DEFAULT_METRICS_INTERVAL_MS)
            .max(MIN_METRICS_INTERVAL_MS);

        Self {
            source,
            kubectl: non_blank(args.kubectl.clone())
                .or_else(|| non_blank(file.kubectl))
                .unwrap_or_else(|| DEFAULT_KUBECTL.to_string()),
            refresh_interval: Duration::from_secs(refresh_secs),
            metrics_interval: Duration::from_millis(metrics_ms),
            exec_shell: non_blank(args.shell.clone())
                .or_else(|| non_blank(file.exec_shell))
                .unwrap_or_else(|| DEFAULT_EXEC_SHELL.to_string()),
            top_rows: file.top_rows.unwrap_or(DEFAULT_TOP_ROWS).max(1),
            namespace: non_blank(args.namespace.clone()).or_else(|| non_blank(file.namespace)),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn read_config_file(path: &Path) -> Result<MinipodConfigFile> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read config {}", path.display()))?;
    if raw.trim().is_empty() {
        return Ok(MinipodConfigFile::default());
    }
    serde_yaml::from_str(&raw).with_context(|| format!("failed to parse config {}", path.display()))
}

fn discover_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("MINIPOD_CONFIG")
        && !path.trim().is_empty()
    {
        return Some(PathBuf::from(path));
    }

    let cwd_candidates = [
        PathBuf::from("minipod.yaml"),
        PathBuf::from("minipod.yml"),
        PathBuf::from(".minipod.yaml"),
    ];
    for candidate in cwd_candidates {
        if candidate.exists() {
            return Some(candidate);
        }
    }

    if let Ok(home) = std::env::var("HOME") {
        let user_candidates = [
            PathBuf::from(&home).join(".config/minipod/config.yaml"),
            PathBuf::from(&home).join(".config/minipod/config.yml"),
            PathBuf::from(&home).join(".minipod.yaml"),
        ];
        for candidate in user_candidates {
            if candidate.exists() {
                return Some(candidate);
            }
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::{MinipodConfigFile, Settings, read_config_file};
    use crate::cli::CliArgs;
    use std::time::Duration;

    #[test]
    fn defaults_apply_without_file_or_flags() {
        let settings = Settings::resolve(&CliArgs::default(), MinipodConfigFile::default(), None);
        assert_eq!(settings.kubectl, "kubectl");
        assert_eq!(settings.refresh_interval, Duration::from_secs(8));
        assert_eq!(settings.metrics_interval, Duration::from_millis(2_500));
        assert_eq!(settings.exec_shell, "sh");
        assert_eq!(settings.top_rows, 6);
        assert_eq!(settings.namespace, None);
    }

    #[test]
    fn cli_flags_override_file_values() {
        let file: MinipodConfigFile = serde_yaml::from_str(
            "kubectl: /opt/kubectl\nrefresh_secs: 30\nshell: bash\nnamespace: apps\ntop_rows: 10\n",
        )
        .expect("valid yaml");
        let args = CliArgs {
            refresh_secs: Some(5),
            namespace: Some("kube-system".to_string()),
            ..CliArgs::default()
        };

        let settings = Settings::resolve(&args, file, Some("minipod.yaml".to_string()));
        assert_eq!(settings.kubectl, "/opt/kubectl");
        assert_eq!(settings.refresh_interval, Duration::from_secs(5));
        assert_eq!(settings.exec_shell, "bash");
        assert_eq!(settings.top_rows, 10);
        assert_eq!(settings.namespace.as_deref(), Some("kube-system"));
    }

    #[test]
    fn intervals_are_floored() {
        let args = CliArgs {
            refresh_secs: Some(0),
            metrics_ms: Some(10),
            ..CliArgs::default()
        };
        let file = MinipodConfigFile {
            top_rows: Some(0),
            ..MinipodConfigFile::default()
        };
        let settings = Settings::resolve(&args, file, None);
        assert_eq!(settings.refresh_interval, Duration::from_secs(1));
        assert_eq!(settings.metrics_interval, Duration::from_millis(250));
        assert_eq!(settings.top_rows, 1);
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let path = std::env::temp_dir().join("minipod-missing-config-test.yaml");
        assert!(read_config_file(&path).is_err());
    }
}
