//! Device profiles: one supported phone and the artifacts it needs.
use serde::Deserialize;
use std::fmt;

/// The role an artifact plays in an installation.
///
/// The declaration order is the install precedence: a vendor extra (firmware
/// or baseband) must be applied before the OS payload, and so on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ArtifactKind {
    Extra,
    Os,
    Filesystem,
    Companion,
    Recovery,
    Factory,
    StockRecovery,
}

impl ArtifactKind {
    pub fn label(self) -> &'static str {
        match self {
            ArtifactKind::Extra => "extra (firmware/baseband) zip",
            ArtifactKind::Os => "NetHunter OS zip",
            ArtifactKind::Filesystem => "NetHunter filesystem zip",
            ArtifactKind::Companion => "Google Apps zip",
            ArtifactKind::Recovery => "TWRP recovery image",
            ArtifactKind::Factory => "factory image zip",
            ArtifactKind::StockRecovery => "stock recovery image",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A local file name plus where to fetch it from if it is missing.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Artifact {
    pub file: String,
    #[serde(default)]
    pub url: Option<String>,
    /// Expected SHA-256 of the file, lowercase hex.
    #[serde(default)]
    pub sha256: Option<String>,
}

impl Artifact {
    pub fn new(file: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            file: file.into(),
            url: Some(url.into()),
            sha256: None,
        }
    }
}

/// A supported hardware target, immutable once loaded.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DeviceProfile {
    /// Human-readable model name, e.g. "OnePlus 5".
    pub name: String,
    /// The identifier the bootloader reports for this hardware.
    pub product: String,
    pub os: Artifact,
    pub filesystem: Artifact,
    pub recovery: Artifact,
    #[serde(default)]
    pub companion: Option<Artifact>,
    #[serde(default)]
    pub extra: Option<Artifact>,
    #[serde(default)]
    pub factory: Option<Artifact>,
    #[serde(default)]
    pub stock_recovery: Option<Artifact>,
}

impl DeviceProfile {
    pub fn artifact(&self, kind: ArtifactKind) -> Option<&Artifact> {
        let optional = match kind {
            ArtifactKind::Os => return Some(&self.os),
            ArtifactKind::Filesystem => return Some(&self.filesystem),
            ArtifactKind::Recovery => return Some(&self.recovery),
            ArtifactKind::Extra => &self.extra,
            ArtifactKind::Companion => &self.companion,
            ArtifactKind::Factory => &self.factory,
            ArtifactKind::StockRecovery => &self.stock_recovery,
        };
        // An empty table left over in a registry counts as absent.
        optional.as_ref().filter(|a| !a.file.is_empty())
    }

    /// Every artifact the profile declares, in install precedence order.
    pub fn artifacts(&self) -> impl Iterator<Item = (ArtifactKind, &Artifact)> {
        [
            ArtifactKind::Extra,
            ArtifactKind::Os,
            ArtifactKind::Filesystem,
            ArtifactKind::Companion,
            ArtifactKind::Recovery,
            ArtifactKind::Factory,
            ArtifactKind::StockRecovery,
        ]
        .into_iter()
        .filter_map(|kind| self.artifact(kind).map(|a| (kind, a)))
    }

    pub fn has_extra(&self) -> bool {
        self.artifact(ArtifactKind::Extra).is_some()
    }
}

impl fmt::Display for DeviceProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.product)
    }
}

#[cfg(test)]
pub(crate) fn sample(name: &str, product: &str) -> DeviceProfile {
    let slug = name.to_lowercase().replace(' ', "");
    DeviceProfile {
        name: name.to_string(),
        product: product.to_string(),
        os: Artifact::new(format!("{slug}-os.zip"), "https://example.invalid/os.zip"),
        filesystem: Artifact::new(format!("{slug}-fs.zip"), "https://example.invalid/fs.zip"),
        recovery: Artifact::new(format!("{slug}-twrp.img"), "https://example.invalid/twrp.img"),
        companion: Some(Artifact::new(
            format!("{slug}-gapps.zip"),
            "https://example.invalid/gapps.zip",
        )),
        extra: None,
        factory: None,
        stock_recovery: None,
    }
}
