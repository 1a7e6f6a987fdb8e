//! Printer profile registry
//!
//! Loaded once at startup and read-only afterwards. Every profile is
//! validated into a typed `TransportConfig`, every fallback must name a
//! known profile, and fallback chains must be acyclic, so print calls never
//! re-validate and can never loop.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use shared::ProfileDocument;
use thiserror::Error;
use till_printer::{ConfigError, TransportConfig, ValidationOptions};
use tracing::info;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read printer profiles from {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid printer profile document: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("printer profile `{name}`: {source}")]
    InvalidProfile {
        name: String,
        #[source]
        source: ConfigError,
    },

    #[error("printer profile `{name}` falls back to unknown profile `{fallback}`")]
    UnknownFallback { name: String, fallback: String },

    #[error("printer fallback cycle: {}", .0.join(" -> "))]
    FallbackCycle(Vec<String>),
}

pub type RegistryResult<T> = Result<T, RegistryError>;

/// A named, validated printer configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrinterProfile {
    pub name: String,
    pub transport: TransportConfig,
    pub fallback: Option<String>,
}

/// Process-wide set of configured printer profiles
#[derive(Debug, Clone, Default)]
pub struct ProfileRegistry {
    profiles: HashMap<String, PrinterProfile>,
}

impl ProfileRegistry {
    /// Read and validate a JSON profile document
    pub fn load(path: impl AsRef<Path>, options: &ValidationOptions) -> RegistryResult<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_document(&ProfileDocument::from_json(&json)?, options)?;
        info!(path = %path.display(), profiles = registry.len(), "Printer profiles loaded");
        Ok(registry)
    }

    /// Validate a profile document; fails on the first bad profile
    pub fn from_document(
        document: &ProfileDocument,
        options: &ValidationOptions,
    ) -> RegistryResult<Self> {
        let mut profiles = HashMap::with_capacity(document.profiles.len());

        for (name, raw) in &document.profiles {
            let transport = TransportConfig::from_raw(raw, options).map_err(|source| {
                RegistryError::InvalidProfile {
                    name: name.clone(),
                    source,
                }
            })?;

            let fallback = raw
                .fallback
                .as_deref()
                .map(str::trim)
                .filter(|f| !f.is_empty())
                .map(str::to_string);

            if let Some(fallback) = &fallback
                && !document.profiles.contains_key(fallback)
            {
                return Err(RegistryError::UnknownFallback {
                    name: name.clone(),
                    fallback: fallback.clone(),
                });
            }

            profiles.insert(
                name.clone(),
                PrinterProfile {
                    name: name.clone(),
                    transport,
                    fallback,
                },
            );
        }

        let registry = Self { profiles };
        registry.check_acyclic()?;
        Ok(registry)
    }

    /// Each profile has at most one fallback, so walking from every start
    /// and remembering the nodes already proven acyclic is enough.
    fn check_acyclic(&self) -> RegistryResult<()> {
        let mut names: Vec<&String> = self.profiles.keys().collect();
        names.sort();

        let mut acyclic: HashSet<&str> = HashSet::new();

        for start in names {
            let mut path: Vec<&str> = Vec::new();
            let mut current = Some(start.as_str());

            while let Some(name) = current {
                if acyclic.contains(name) {
                    break;
                }
                if let Some(pos) = path.iter().position(|n| *n == name) {
                    let mut cycle: Vec<String> =
                        path[pos..].iter().map(|n| n.to_string()).collect();
                    cycle.push(name.to_string());
                    return Err(RegistryError::FallbackCycle(cycle));
                }
                path.push(name);
                current = self
                    .profiles
                    .get(name)
                    .and_then(|p| p.fallback.as_deref());
            }

            acyclic.extend(path);
        }

        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&PrinterProfile> {
        self.profiles.get(name)
    }

    /// The profile followed by its fallbacks, in the order they are tried
    pub fn chain(&self, name: &str) -> Vec<&PrinterProfile> {
        let mut chain: Vec<&PrinterProfile> = Vec::new();
        let mut current = self.profiles.get(name);

        while let Some(profile) = current {
            if chain.iter().any(|p| p.name == profile.name) {
                break;
            }
            chain.push(profile);
            current = profile
                .fallback
                .as_deref()
                .and_then(|f| self.profiles.get(f));
        }

        chain
    }

    /// Profile names, sorted
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.profiles.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
