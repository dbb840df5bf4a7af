//! Making sure every artifact a flow needs exists on local disk.
use crate::console::Console;
use crate::fetch::{Fetcher, file_sha256};
use crate::outcome::InstallError;
use crate::profile::{ArtifactKind, DeviceProfile};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Local paths of the staged artifacts, keyed by role.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StagedArtifacts {
    paths: BTreeMap<ArtifactKind, PathBuf>,
}

impl StagedArtifacts {
    pub fn path(&self, kind: ArtifactKind) -> Option<&Path> {
        self.paths.get(&kind).map(PathBuf::as_path)
    }

    pub fn contains(&self, kind: ArtifactKind) -> bool {
        self.paths.contains_key(&kind)
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

/// Stages `kinds` from `profile` into `workdir`, downloading what is missing.
///
/// Kinds the profile does not declare are skipped; callers decide beforehand
/// which ones are mandatory. A local file whose digest does not match the
/// profile is treated as missing. Returns only once every requested artifact
/// is on disk.
pub fn stage(
    profile: &DeviceProfile,
    kinds: &[ArtifactKind],
    workdir: &Path,
    fetcher: &dyn Fetcher,
    console: &mut dyn Console,
) -> Result<StagedArtifacts, InstallError> {
    let mut staged = StagedArtifacts::default();

    for &kind in kinds {
        let Some(artifact) = profile.artifact(kind) else {
            continue;
        };
        let path = workdir.join(&artifact.file);

        if is_usable(&path, artifact.sha256.as_deref()) {
            tracing::debug!("{kind} already present at {}", path.display());
        } else {
            let url = artifact
                .url
                .as_deref()
                .ok_or(InstallError::NoSource { artifact: kind })?;

            console.say(&format!("Downloading the {kind}..."));
            let mut progress = console.transfer(&artifact.file);
            fetcher
                .fetch(url, &path, artifact.sha256.as_deref(), progress.as_mut())
                .map_err(|source| InstallError::Fetch {
                    artifact: kind,
                    source,
                })?;
            drop(progress);

            // A fetcher that reports success without producing the file is
            // still a retrieval failure.
            if !path.is_file() {
                return Err(InstallError::NoSource { artifact: kind });
            }
        }

        staged.paths.insert(kind, path);
    }

    Ok(staged)
}

fn is_usable(path: &Path, sha256: Option<&str>) -> bool {
    if !path.is_file() {
        return false;
    }
    let Some(expected) = sha256 else {
        return true;
    };
    match file_sha256(path) {
        Ok(actual) if actual.eq_ignore_ascii_case(expected.trim()) => true,
        Ok(actual) => {
            tracing::warn!(
                "{} has checksum {actual}, expected {expected}; downloading again",
                path.display()
            );
            false
        }
        Err(e) => {
            tracing::warn!("failed to hash {}: {e}", path.display());
            false
        }
    }
}
