/// Registry Builder and Registry
///
/// Enumerates the tools directory, invokes `list` on each executable found
/// there, validates and aggregates the tool definitions it returns, detects
/// name collisions across providers, and collects optional `instructions`
/// blurbs. The result is an immutable [`Registry`] consulted by the
/// dispatcher for `tools/list` and `tools/call`.
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use serde_json::Value;

use crate::core::config::ServerConfig;
use crate::core::error::ListingError;
use crate::core::logger::Logger;
use crate::core::runner;

/// The association between a tool name and the provider that first claimed
/// it, plus the definition JSON that provider emitted.
#[derive(Debug, Clone)]
pub struct ProviderBinding {
    pub provider_path: String,
    pub definition: Value,
}

/// Two or more providers claimed the same tool name. `providers` lists every
/// claimant, newest first.
#[derive(Debug, Clone)]
pub struct DuplicateEntry {
    pub providers: Vec<String>,
}

#[derive(Debug, Clone)]
enum Binding {
    Single(ProviderBinding),
    Duplicate(DuplicateEntry),
}

/// What a name resolves to when a caller asks the registry about it.
pub enum Resolution<'a> {
    Provider(&'a str),
    Duplicate(&'a DuplicateEntry),
}

/// The startup-built, read-only aggregate of definitions, bindings,
/// duplicates, listing errors, and instructions.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    names: Vec<String>,
    bindings: HashMap<String, Binding>,
    pub listing_errors: Vec<ListingError>,
    pub instructions: Vec<String>,
}

impl Registry {
    /// The aggregated definitions array used by `tools/list`, in discovery
    /// order of first-claimed names. Duplicated names contribute nothing.
    pub fn definitions(&self) -> Vec<Value> {
        self.names
            .iter()
            .filter_map(|name| match self.bindings.get(name) {
                Some(Binding::Single(binding)) => Some(binding.definition.clone()),
                _ => None,
            })
            .collect()
    }

    /// Every duplicated name and its claimants, in discovery order.
    pub fn duplicates(&self) -> Vec<(&str, &DuplicateEntry)> {
        self.names
            .iter()
            .filter_map(|name| match self.bindings.get(name) {
                Some(Binding::Duplicate(entry)) => Some((name.as_str(), entry)),
                _ => None,
            })
            .collect()
    }

    pub fn has_duplicates(&self) -> bool {
        self.bindings.values().any(|b| matches!(b, Binding::Duplicate(_)))
    }

    pub fn has_listing_errors(&self) -> bool {
        !self.listing_errors.is_empty()
    }

    /// Resolve a tool name to its provider or duplicate record.
    pub fn resolve(&self, name: &str) -> Option<Resolution<'_>> {
        match self.bindings.get(name) {
            Some(Binding::Single(binding)) => Some(Resolution::Provider(&binding.provider_path)),
            Some(Binding::Duplicate(entry)) => Some(Resolution::Duplicate(entry)),
            None => None,
        }
    }

    /// Submit one (name, provider, definition) triple, applying the
    /// collision policy (first-wins binding, later claims become a
    /// [`DuplicateEntry`]).
    fn submit(&mut self, name: String, provider_path: String, definition: Value) {
        match self.bindings.get_mut(&name) {
            None => {
                self.names.push(name.clone());
                self.bindings.insert(
                    name,
                    Binding::Single(ProviderBinding {
                        provider_path,
                        definition,
                    }),
                );
            }
            Some(Binding::Single(existing)) => {
                let providers = vec![provider_path, existing.provider_path.clone()];
                self.bindings
                    .insert(name, Binding::Duplicate(DuplicateEntry { providers }));
            }
            Some(Binding::Duplicate(entry)) => {
                entry.providers.insert(0, provider_path);
            }
        }
    }
}

/// Scan `cfg.tools_dir` and build a [`Registry`] from every provider
/// executable found there. A missing directory yields an empty registry
/// with no error.
pub async fn build_registry(cfg: &ServerConfig, logger: &Logger) -> Registry {
    let mut registry = Registry::default();

    let entries = match std::fs::read_dir(&cfg.tools_dir) {
        Ok(entries) => entries,
        Err(_) => return registry,
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if !is_executable_file(&path) {
            continue;
        }
        let provider_path = path.to_string_lossy().into_owned();

        listing_pass(&mut registry, &path, &provider_path, cfg.drain_window).await;
        instructions_pass(&mut registry, &path, &provider_path, cfg.drain_window, logger).await;
    }

    registry
}

async fn listing_pass(registry: &mut Registry, path: &Path, provider_path: &str, drain_window: Duration) {
    let capture = match runner::run(path, "list", None, drain_window).await {
        Ok(capture) => capture,
        Err(_) => {
            registry.listing_errors.push(ListingError {
                provider_path: provider_path.to_string(),
                reason: "parse error".to_string(),
            });
            return;
        }
    };

    if capture.exit_code != 0 {
        registry.listing_errors.push(ListingError {
            provider_path: provider_path.to_string(),
            reason: String::from_utf8_lossy(&capture.combined).into_owned(),
        });
        return;
    }

    let stdout = String::from_utf8_lossy(&capture.stdout).into_owned();
    let values = match slurp_json_values(&stdout) {
        Ok(values) => values,
        Err(_) => {
            registry.listing_errors.push(ListingError {
                provider_path: provider_path.to_string(),
                reason: "invalid JSON".to_string(),
            });
            return;
        }
    };

    for value in values {
        match extract_name(&value) {
            Some(name) => registry.submit(name, provider_path.to_string(), value),
            None => registry.listing_errors.push(ListingError {
                provider_path: provider_path.to_string(),
                reason: "missing name".to_string(),
            }),
        }
    }
}

async fn instructions_pass(
    registry: &mut Registry,
    path: &Path,
    provider_path: &str,
    drain_window: Duration,
    logger: &Logger,
) {
    match runner::run(path, "instructions", None, drain_window).await {
        Ok(capture) if capture.exit_code == 0 => {
            let text = String::from_utf8_lossy(&capture.stdout).trim().to_string();
            if !text.is_empty() {
                registry.instructions.push(text);
            }
        }
        Ok(_) => {
            logger.info(format!("{provider_path}: instructions exited non-zero, ignoring"));
        }
        Err(e) => {
            logger.info(format!("{provider_path}: instructions invocation failed: {e}"));
        }
    }
}

/// Slurp every top-level JSON value out of `s`, in order. Values may span
/// multiple lines; any non-JSON content anywhere is a hard failure.
fn slurp_json_values(s: &str) -> Result<Vec<Value>, serde_json::Error> {
    serde_json::Deserializer::from_str(s)
        .into_iter::<Value>()
        .collect()
}

fn extract_name(value: &Value) -> Option<String> {
    value
        .as_object()?
        .get("name")?
        .as_str()
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn is_executable_file(path: &Path) -> bool {
    let Ok(metadata) = std::fs::metadata(path) else {
        return false;
    };
    if !metadata.is_file() {
        return false;
    }
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        metadata.permissions().mode() & 0o111 != 0
    }
    #[cfg(not(unix))]
    {
        true
    }
}
