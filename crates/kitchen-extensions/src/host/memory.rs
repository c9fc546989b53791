//! In-memory host application.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard};

use super::{HostApplication, HostExtension, HostStatus, ListScope};
use crate::error::{Error, Result};

#[derive(Debug, Default)]
struct State {
    /// Extensions whose code is present in the extensions root.
    available: BTreeSet<String>,
    /// The host's registry, populated by `refresh`.
    registry: BTreeMap<String, HostStatus>,
    failures: HashMap<(String, String), String>,
    list_failure: Option<String>,
    calls: Vec<String>,
}

/// A host application held entirely in memory.
///
/// Mirrors the registry rules of the real host: linked code is invisible
/// until `refresh`, enabling requires a registered extension, and an enabled
/// extension must be disabled before it can be uninstalled. Failures can be
/// injected per operation and extension.
#[derive(Debug, Default)]
pub struct MemoryHost {
    state: Mutex<State>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// A host whose extensions root already contains `names`.
    pub fn with_available<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let host = Self::new();
        {
            let mut state = host.lock();
            state.available.extend(names.into_iter().map(Into::into));
        }
        host
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Make extension code visible to the next `refresh`.
    pub fn add_available(&self, name: impl Into<String>) {
        self.lock().available.insert(name.into());
    }

    /// Remove extension code from the extensions root.
    pub fn remove_available(&self, name: &str) {
        self.lock().available.remove(name);
    }

    /// Make `operation` (`enable`, `disable`, `uninstall`, `refresh`) fail
    /// for `name` with `message`. Use `*` as the name for `refresh`.
    pub fn fail_on(&self, operation: &str, name: &str, message: impl Into<String>) {
        self.lock()
            .failures
            .insert((operation.to_string(), name.to_string()), message.into());
    }

    /// Make every `list` call fail with `message`.
    pub fn fail_list(&self, message: impl Into<String>) {
        self.lock().list_failure = Some(message.into());
    }

    /// Operations performed so far, as `"<operation> <name>"` strings.
    pub fn calls(&self) -> Vec<String> {
        self.lock().calls.clone()
    }

    /// Registry status of `name`, bypassing failure injection.
    pub fn status(&self, name: &str) -> Option<HostStatus> {
        self.lock().registry.get(name).copied()
    }

    /// Force a registry status, as if changed outside this tool.
    pub fn set_status(&self, name: impl Into<String>, status: HostStatus) {
        self.lock().registry.insert(name.into(), status);
    }

    fn begin(state: &mut State, operation: &'static str, name: &str) -> Result<()> {
        state.calls.push(format!("{operation} {name}"));
        match state.failures.get(&(operation.to_string(), name.to_string())) {
            Some(message) => Err(Error::HostOperation {
                operation,
                target: name.to_string(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn registered(state: &State, operation: &'static str, name: &str) -> Result<HostStatus> {
        state
            .registry
            .get(name)
            .copied()
            .ok_or_else(|| Error::HostOperation {
                operation,
                target: name.to_string(),
                message: format!("extension '{name}' is not known to the host"),
            })
    }
}

impl HostApplication for MemoryHost {
    fn list(&self, _scope: ListScope) -> Result<Vec<HostExtension>> {
        let state = self.lock();
        if let Some(ref message) = state.list_failure {
            return Err(Error::HostOperation {
                operation: "list",
                target: "*".to_string(),
                message: message.clone(),
            });
        }
        Ok(state
            .registry
            .iter()
            .map(|(name, status)| HostExtension {
                name: name.clone(),
                status: *status,
            })
            .collect())
    }

    fn refresh(&self) -> Result<()> {
        let mut state = self.lock();
        Self::begin(&mut state, "refresh", "*")?;

        let State {
            available,
            registry,
            ..
        } = &mut *state;
        for name in available.iter() {
            registry
                .entry(name.clone())
                .and_modify(|status| {
                    if *status == HostStatus::Missing {
                        *status = HostStatus::Disabled;
                    }
                })
                .or_insert(HostStatus::Uninstalled);
        }
        for (name, status) in registry.iter_mut() {
            if available.contains(name) {
                continue;
            }
            match status {
                HostStatus::Enabled | HostStatus::Disabled => *status = HostStatus::Missing,
                _ => {}
            }
        }
        registry.retain(|name, status| available.contains(name) || *status != HostStatus::Uninstalled);
        Ok(())
    }

    fn enable(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        Self::begin(&mut state, "enable", name)?;
        match Self::registered(&state, "enable", name)? {
            HostStatus::Missing => Err(Error::HostOperation {
                operation: "enable",
                target: name.to_string(),
                message: format!("extension '{name}' has no code in the extensions root"),
            }),
            _ => {
                state.registry.insert(name.to_string(), HostStatus::Enabled);
                Ok(())
            }
        }
    }

    fn disable(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        Self::begin(&mut state, "disable", name)?;
        match Self::registered(&state, "disable", name)? {
            HostStatus::Enabled | HostStatus::Disabled => {
                state.registry.insert(name.to_string(), HostStatus::Disabled);
                Ok(())
            }
            other => Err(Error::HostOperation {
                operation: "disable",
                target: name.to_string(),
                message: format!("extension '{name}' is {other}"),
            }),
        }
    }

    fn uninstall(&self, name: &str) -> Result<()> {
        let mut state = self.lock();
        Self::begin(&mut state, "uninstall", name)?;
        match Self::registered(&state, "uninstall", name)? {
            HostStatus::Enabled => Err(Error::HostOperation {
                operation: "uninstall",
                target: name.to_string(),
                message: format!("extension '{name}' is enabled; disable it first"),
            }),
            _ if state.available.contains(name) => {
                state.registry.insert(name.to_string(), HostStatus::Uninstalled);
                Ok(())
            }
            _ => {
                state.registry.remove(name);
                Ok(())
            }
        }
    }
}
