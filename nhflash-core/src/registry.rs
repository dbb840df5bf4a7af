//! The set of supported devices, and lookup by hardware identifier.
//!
//! Profiles are loaded once at start-up from a TOML file of `[[device]]`
//! tables and never modified afterwards. Several phone models can report the
//! same bootloader identifier (every OnePlus handset says
//! `QC_Reference_Phone`), so [`Registry::resolve`] reports ambiguity rather
//! than choosing; the caller asks the operator and commits the candidate
//! they picked.
use crate::profile::{ArtifactKind, DeviceProfile};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::Component;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read device profiles from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse device profiles: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid device profile '{name}': {reason}")]
    Invalid { name: String, reason: String },
}

/// Result of looking up a hardware identifier.
#[derive(Debug, PartialEq, Eq)]
pub enum Resolution<'a> {
    Found(&'a DeviceProfile),
    /// More than one profile reports this identifier; the operator must pick.
    Ambiguous(Vec<&'a DeviceProfile>),
    NotFound,
}

#[derive(Deserialize)]
struct RegistryFile {
    #[serde(default)]
    device: Vec<DeviceProfile>,
}

#[derive(Clone, Debug, Default)]
pub struct Registry {
    profiles: Vec<DeviceProfile>,
}

impl Registry {
    /// Builds a registry from already-loaded profiles, validating each one.
    pub fn new(profiles: Vec<DeviceProfile>) -> Result<Self, RegistryError> {
        let mut seen = HashSet::new();
        for profile in &profiles {
            validate(profile)?;
            // The operator tells profiles sharing an identifier apart by name.
            if !seen.insert((profile.product.as_str(), profile.name.as_str())) {
                return Err(RegistryError::Invalid {
                    name: profile.name.clone(),
                    reason: format!("declared twice for product '{}'", profile.product),
                });
            }
        }
        Ok(Self { profiles })
    }

    pub fn from_toml(text: &str) -> Result<Self, RegistryError> {
        let file: RegistryFile = toml::from_str(text)?;
        Self::new(file.device)
    }

    pub fn load(path: &Path) -> Result<Self, RegistryError> {
        let text = fs::read_to_string(path).map_err(|source| RegistryError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let registry = Self::from_toml(&text)?;
        tracing::debug!(
            "loaded {} device profiles from {}",
            registry.profiles.len(),
            path.display()
        );
        Ok(registry)
    }

    /// All profiles, in file order.
    pub fn profiles(&self) -> &[DeviceProfile] {
        &self.profiles
    }

    /// Exact-match lookup on the bootloader-reported identifier.
    pub fn resolve(&self, identifier: &str) -> Resolution<'_> {
        let mut matches: Vec<_> = self
            .profiles
            .iter()
            .filter(|p| p.product == identifier)
            .collect();

        match matches.len() {
            0 => Resolution::NotFound,
            1 => Resolution::Found(matches.remove(0)),
            _ => Resolution::Ambiguous(matches),
        }
    }
}

fn validate(profile: &DeviceProfile) -> Result<(), RegistryError> {
    let invalid = |reason: String| RegistryError::Invalid {
        name: profile.name.clone(),
        reason,
    };

    if profile.name.trim().is_empty() {
        return Err(invalid("missing name".into()));
    }
    if profile.product.trim().is_empty() {
        return Err(invalid("missing product identifier".into()));
    }

    for kind in [ArtifactKind::Os, ArtifactKind::Filesystem, ArtifactKind::Recovery] {
        if profile.artifact(kind).is_some_and(|a| a.file.is_empty()) {
            return Err(invalid(format!("{kind} has no file name")));
        }
    }

    let mut seen = HashSet::new();
    for (kind, artifact) in profile.artifacts() {
        if !is_plain_file_name(&artifact.file) {
            return Err(invalid(format!(
                "{kind} file '{}' must be a bare file name",
                artifact.file
            )));
        }
        if !seen.insert(artifact.file.as_str()) {
            return Err(invalid(format!(
                "{kind} reuses the file name '{}'",
                artifact.file
            )));
        }
    }

    Ok(())
}

/// Artifacts live directly in the work directory and are pushed and
/// installed by the same name, so no directory parts are allowed.
fn is_plain_file_name(file: &str) -> bool {
    let mut components = Path::new(file).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !file.contains(['/', '\\'])
}
