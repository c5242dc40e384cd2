//! Hot reload of detector pattern tables.
//!
//! The config file's directory is watched rather than the file itself, so
//! editors that save by writing a temp file and renaming it are seen too.
//! Every change is loaded and validated; a config is forwarded only when its
//! `[patterns]` section differs from the last accepted one. Edits to other
//! sections are reported as needing a restart.

use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::Value;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

use crate::config::loader::load_config;
use crate::config::schema::GuardConfig;

const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// How a reloaded config differs from the one in effect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReloadDiff {
    /// Pattern overrides changed and can be applied live.
    pub patterns: bool,
    /// Changed sections that only apply after a restart.
    pub restart_required: Vec<&'static str>,
}

impl ReloadDiff {
    pub fn between(current: &GuardConfig, next: &GuardConfig) -> Self {
        let mut diff = Self::default();
        for ((name, before), (_, after)) in sections(current).into_iter().zip(sections(next)) {
            if before == after {
                continue;
            }
            if name == "patterns" {
                diff.patterns = true;
            } else {
                diff.restart_required.push(name);
            }
        }
        diff
    }

    pub fn is_empty(&self) -> bool {
        !self.patterns && self.restart_required.is_empty()
    }
}

fn sections(config: &GuardConfig) -> [(&'static str, Value); 8] {
    fn value<T: serde::Serialize>(section: &T) -> Value {
        serde_json::to_value(section).unwrap_or(Value::Null)
    }
    [
        ("listener", value(&config.listener)),
        ("environment", value(&config.environment)),
        ("pipeline", value(&config.pipeline)),
        ("ssrf", value(&config.ssrf)),
        ("csrf", value(&config.csrf)),
        ("patterns", value(&config.patterns)),
        ("auth", value(&config.auth)),
        ("observability", value(&config.observability)),
    ]
}

/// Whether a filesystem event wrote the watched file.
fn touches(event: &Event, file_name: Option<&OsStr>) -> bool {
    (event.kind.is_modify() || event.kind.is_create())
        && event.paths.iter().any(|p| p.file_name() == file_name)
}

/// Watches a config file and forwards pattern changes.
pub struct ConfigWatcher {
    path: PathBuf,
    current: GuardConfig,
    update_tx: mpsc::UnboundedSender<GuardConfig>,
}

impl ConfigWatcher {
    /// `current` is the config the server started with. Returns the watcher
    /// and the receiving end the server applies updates from.
    pub fn new(path: &Path, current: GuardConfig) -> (Self, mpsc::UnboundedReceiver<GuardConfig>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        let watcher = Self {
            path: path.to_path_buf(),
            current,
            update_tx,
        };
        (watcher, update_rx)
    }

    /// Start watching. Updates flow for as long as the returned handle lives.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let Self {
            path,
            mut current,
            update_tx,
        } = self;
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let file_name = path.file_name().map(OsStr::to_os_string);
        let reload_path = path.clone();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::error!(error = %e, "Config watch failed");
                        return;
                    }
                };
                if !touches(&event, file_name.as_deref()) {
                    return;
                }

                let next = match load_config(&reload_path) {
                    Ok(next) => next,
                    Err(e) => {
                        tracing::warn!(error = %e, "Ignoring config change, keeping current tables");
                        return;
                    }
                };

                let diff = ReloadDiff::between(&current, &next);
                if diff.is_empty() {
                    return;
                }
                if !diff.restart_required.is_empty() {
                    tracing::warn!(
                        sections = ?diff.restart_required,
                        "Config changes take effect after restart"
                    );
                }
                if diff.patterns && update_tx.send(next.clone()).is_err() {
                    tracing::debug!("Pattern update dropped, server is gone");
                }
                current = next;
            },
            Config::default().with_poll_interval(POLL_INTERVAL),
        )?;

        watcher.watch(&dir, RecursiveMode::NonRecursive)?;

        tracing::info!(path = ?path, "Watching config for pattern changes");
        Ok(watcher)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, EventKind, ModifyKind};

    #[test]
    fn test_diff_separates_live_and_restart_sections() {
        let current = GuardConfig::default();
        assert!(ReloadDiff::between(&current, &current.clone()).is_empty());

        let mut next = current.clone();
        next.patterns.sql = Some(vec!["(?i)forbidden".into()]);
        next.csrf.token_ttl_secs = 60;
        next.pipeline.max_depth = 8;

        let diff = ReloadDiff::between(&current, &next);
        assert!(diff.patterns);
        assert_eq!(diff.restart_required, vec!["pipeline", "csrf"]);
    }

    #[test]
    fn test_only_writes_to_the_config_file_count() {
        let name = Some(OsStr::new("guard.toml"));
        let event = |kind, path: &str| Event::new(kind).add_path(PathBuf::from(path));

        assert!(touches(&event(EventKind::Create(CreateKind::File), "/etc/guard/guard.toml"), name));
        assert!(touches(&event(EventKind::Modify(ModifyKind::Any), "/etc/guard/guard.toml"), name));
        assert!(!touches(&event(EventKind::Modify(ModifyKind::Any), "/etc/guard/other.toml"), name));
        assert!(!touches(&event(EventKind::Access(AccessKind::Any), "/etc/guard/guard.toml"), name));
    }
}
