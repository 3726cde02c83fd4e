//! Watcher configuration: TOML instances plus command-line overrides
//!
//! A config file names one or more watcher instances; a process runs one:
//!
//! ```toml
//! [instances.results]
//! path = "/var/lib/pai-pipeline/results"
//! handler = "~/scripts/pai-result-notify.sh"
//! debounce_secs = 2
//! events = ["create", "close_write", "moved_to", "delete_self"]
//! ```

use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use watcher::{EventKind, WatchConfig};

/// Parsed config file
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub instances: BTreeMap<String, InstanceConfig>,
}

/// One `[instances.<name>]` table; every field can also come from flags
#[derive(Debug, Default, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InstanceConfig {
    pub path: Option<PathBuf>,
    pub handler: Option<String>,
    pub debounce_secs: Option<f64>,
    pub events: Option<Vec<EventKind>>,
    pub label: Option<String>,
}

/// Instance selection and overrides shared by `run` and `config`
#[derive(Debug, Default, Clone, clap::Args)]
pub struct WatchArgs {
    /// TOML file with named watcher instances
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Instance to use from the config file (optional when it has exactly one)
    #[arg(short, long)]
    pub instance: Option<String>,

    /// Directory to watch (absolute)
    #[arg(long)]
    pub path: Option<PathBuf>,

    /// Executable to run once per burst; a leading ~/ expands to $HOME
    #[arg(long)]
    pub handler: Option<String>,

    /// Quiet window after the first event of a burst, in seconds
    #[arg(long)]
    pub debounce_secs: Option<f64>,

    /// Event kinds to watch (create, close_write, moved_to, delete_self, watch_removed)
    #[arg(long, value_delimiter = ',')]
    pub events: Option<Vec<EventKind>>,

    /// Name used in log lines
    #[arg(long)]
    pub label: Option<String>,
}

impl ConfigFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content).with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Pick an instance by name, or the only one when no name is given
    pub fn select(&self, name: Option<&str>) -> Result<(String, InstanceConfig)> {
        match name {
            Some(name) => self
                .instances
                .get(name)
                .map(|instance| (name.to_string(), instance.clone()))
                .with_context(|| {
                    format!(
                        "Unknown instance '{}' (available: {})",
                        name,
                        self.instance_names()
                    )
                }),
            None => {
                let mut iter = self.instances.iter();
                match (iter.next(), iter.next()) {
                    (Some((name, instance)), None) => Ok((name.clone(), instance.clone())),
                    (None, _) => anyhow::bail!("Config file defines no instances"),
                    _ => anyhow::bail!(
                        "Config file defines several instances, pick one with --instance ({})",
                        self.instance_names()
                    ),
                }
            }
        }
    }

    fn instance_names(&self) -> String {
        self.instances.keys().cloned().collect::<Vec<_>>().join(", ")
    }
}

impl InstanceConfig {
    /// Values from `args` win over values from the file
    pub fn merge(self, args: &WatchArgs) -> Self {
        Self {
            path: args.path.clone().or(self.path),
            handler: args.handler.clone().or(self.handler),
            debounce_secs: args.debounce_secs.or(self.debounce_secs),
            events: args.events.clone().or(self.events),
            label: args.label.clone().or(self.label),
        }
    }
}

/// Build the final watch configuration from a config file and flags
pub fn resolve(args: &WatchArgs) -> Result<WatchConfig> {
    let (instance_name, base) = match &args.config {
        Some(path) => {
            let file = ConfigFile::load(path)?;
            let (name, instance) = file.select(args.instance.as_deref())?;
            (Some(name), instance)
        }
        None => {
            if args.instance.is_some() {
                anyhow::bail!("--instance requires --config");
            }
            (None, InstanceConfig::default())
        }
    };

    build(base.merge(args), instance_name)
}

/// Turn a fully merged instance into a validated [`WatchConfig`]
pub fn build(instance: InstanceConfig, instance_name: Option<String>) -> Result<WatchConfig> {
    let path = instance
        .path
        .context("No directory to watch: pass --path or set `path` in the config file")?;
    let handler = instance
        .handler
        .context("No handler: pass --handler or set `handler` in the config file")?;

    let mut config = WatchConfig::new(path, expand_home(&handler)?);

    if let Some(secs) = instance.debounce_secs {
        config = config.with_debounce(debounce_from_secs(secs)?);
    }
    if let Some(events) = &instance.events {
        config = config.with_mask(EventKind::fold(events));
    }
    if let Some(label) = instance.label.or(instance_name) {
        config = config.with_label(label);
    }

    config.validate()?;
    Ok(config)
}

fn debounce_from_secs(secs: f64) -> Result<Duration> {
    match Duration::try_from_secs_f64(secs) {
        Ok(debounce) if secs.is_finite() => Ok(debounce),
        _ => anyhow::bail!("debounce_secs must be a non-negative number of seconds, got {}", secs),
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(raw: &str) -> Result<PathBuf> {
    let rest = match raw.strip_prefix('~') {
        Some("") => "",
        Some(rest) if rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(PathBuf::from(raw)),
    };

    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use watcher::EventMask;

    const TWO_INSTANCES: &str = r#"
[instances.results]
path = "/var/lib/pai-pipeline/results"
handler = "/opt/scripts/pai-result-notify.sh"
debounce_secs = 2

[instances.reverse-tasks]
path = "/var/lib/pai-pipeline/reverse-tasks"
handler = "/opt/scripts/pai-reverse-handler.sh"
events = ["create", "moved_to", "delete_self"]
label = "reverse-task"
"#;

    #[test]
    fn test_select_named_instance() {
        let file = ConfigFile::parse(TWO_INSTANCES).unwrap();
        let (name, instance) = file.select(Some("reverse-tasks")).unwrap();

        assert_eq!(name, "reverse-tasks");
        assert_eq!(instance.label.as_deref(), Some("reverse-task"));

        let config = build(instance, Some(name)).unwrap();
        assert_eq!(config.mask, EventMask::CREATE | EventMask::MOVED_TO | EventMask::DELETE_SELF);
        assert_eq!(config.label, "reverse-task");
        assert_eq!(config.debounce, Duration::from_secs(2));
    }

    #[test]
    fn test_ambiguous_selection_fails() {
        let file = ConfigFile::parse(TWO_INSTANCES).unwrap();
        let err = file.select(None).unwrap_err().to_string();

        assert!(err.contains("--instance"));
        assert!(err.contains("results"));
        assert!(err.contains("reverse-tasks"));
    }

    #[test]
    fn test_unknown_instance_lists_available() {
        let file = ConfigFile::parse(TWO_INSTANCES).unwrap();
        let err = file.select(Some("inbox")).unwrap_err().to_string();
        assert!(err.contains("inbox"));
        assert!(err.contains("results, reverse-tasks"));
    }

    #[test]
    fn test_single_instance_selected_implicitly() {
        let file = ConfigFile::parse(
            "[instances.results]\npath = \"/srv/results\"\nhandler = \"/bin/true\"\n",
        )
        .unwrap();

        let (name, instance) = file.select(None).unwrap();
        assert_eq!(name, "results");

        let config = build(instance, Some(name)).unwrap();
        assert_eq!(config.label, "results");
        assert_eq!(config.mask, EventMask::default());
    }

    #[test]
    fn test_unknown_keys_rejected() {
        let err = ConfigFile::parse(
            "[instances.results]\npath = \"/srv/results\"\npattern = \"*.json\"\n",
        )
        .unwrap_err();
        assert!(format!("{:#}", err).contains("pattern"));
    }

    #[test]
    fn test_unknown_event_kind_rejected() {
        assert!(ConfigFile::parse("[instances.a]\nevents = [\"modify\"]\n").is_err());
    }

    #[test]
    fn test_flags_override_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("dropwatch.toml");
        std::fs::write(&config_path, TWO_INSTANCES).unwrap();

        let args = WatchArgs {
            config: Some(config_path),
            instance: Some("results".to_string()),
            debounce_secs: Some(0.25),
            label: Some("results-test".to_string()),
            ..Default::default()
        };

        let config = resolve(&args).unwrap();
        assert_eq!(config.path, PathBuf::from("/var/lib/pai-pipeline/results"));
        assert_eq!(config.handler, PathBuf::from("/opt/scripts/pai-result-notify.sh"));
        assert_eq!(config.debounce, Duration::from_millis(250));
        assert_eq!(config.label, "results-test");
    }

    #[test]
    fn test_flags_only() {
        let args = WatchArgs {
            path: Some(PathBuf::from("/srv/drop")),
            handler: Some("/usr/local/bin/drain".to_string()),
            events: Some(vec![EventKind::CloseWrite]),
            ..Default::default()
        };

        let config = resolve(&args).unwrap();
        assert_eq!(config.label, "drop");
        assert_eq!(config.mask, EventMask::CLOSE_WRITE);
    }

    #[test]
    fn test_missing_path_or_handler() {
        let args = WatchArgs {
            handler: Some("/bin/true".to_string()),
            ..Default::default()
        };
        assert!(resolve(&args).unwrap_err().to_string().contains("--path"));

        let args = WatchArgs {
            path: Some(PathBuf::from("/srv/drop")),
            ..Default::default()
        };
        assert!(resolve(&args).unwrap_err().to_string().contains("--handler"));
    }

    #[test]
    fn test_instance_without_config_rejected() {
        let args = WatchArgs {
            instance: Some("results".to_string()),
            ..Default::default()
        };
        assert!(resolve(&args).is_err());
    }

    #[test]
    fn test_invalid_debounce_rejected() {
        assert!(debounce_from_secs(-1.0).is_err());
        assert!(debounce_from_secs(f64::NAN).is_err());
        assert!(debounce_from_secs(f64::INFINITY).is_err());
        assert!(debounce_from_secs(1e20).is_err());
        assert_eq!(debounce_from_secs(1.5).unwrap(), Duration::from_millis(1500));
        assert_eq!(debounce_from_secs(0.0).unwrap(), Duration::ZERO);
    }

    #[test]
    fn test_relative_path_rejected() {
        let args = WatchArgs {
            path: Some(PathBuf::from("results")),
            handler: Some("/bin/true".to_string()),
            ..Default::default()
        };
        assert!(format!("{:#}", resolve(&args).unwrap_err()).contains("absolute"));
    }

    #[test]
    fn test_expand_home() {
        let home = dirs::home_dir().unwrap();

        assert_eq!(
            expand_home("~/scripts/notify.sh").unwrap(),
            home.join("scripts/notify.sh")
        );
        assert_eq!(expand_home("~").unwrap(), home);
        assert_eq!(
            expand_home("/opt/notify.sh").unwrap(),
            PathBuf::from("/opt/notify.sh")
        );
        // Other users' homes are not expanded
        assert_eq!(expand_home("~bob/x").unwrap(), PathBuf::from("~bob/x"));
    }
}
