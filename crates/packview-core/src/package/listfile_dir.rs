/// On-disk package source: archives with extracted listfile sidecars.
///
/// Every file under the group root whose extension is one of the configured
/// archive extensions is a package. Its listfile is the sidecar text file
/// `<archive>.listfile` next to it, one path per line. Archives without a
/// sidecar are still listed as packages, but with no listfile, so
/// enumerating them fails instead of silently showing an empty package.
use super::{Listfile, PackageGroup, PackageGroupId, PackageSource, SEPARATOR};
use crate::error::PackageError;
use compact_str::CompactString;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Extension appended to an archive path to find its listfile.
pub const LISTFILE_EXTENSION: &str = "listfile";

/// Reads package groups from directories of archives and listfile sidecars.
#[derive(Clone, Debug)]
pub struct ListfileDirectory {
    /// Lower-case archive extensions without the leading dot.
    archive_extensions: Vec<String>,
}

impl Default for ListfileDirectory {
    fn default() -> Self {
        Self::new(["mpq"])
    }
}

impl ListfileDirectory {
    pub fn new<I, S>(archive_extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            archive_extensions: archive_extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    fn is_archive(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
            .is_some_and(|ext| self.archive_extensions.iter().any(|e| *e == ext))
    }
}

impl PackageSource for ListfileDirectory {
    fn open_group(&self, id: PackageGroupId, root: &Path) -> Result<PackageGroup, PackageError> {
        let walker = jwalk::WalkDir::new(root)
            .skip_hidden(false)
            .follow_links(false)
            .sort(true)
            .parallelism(jwalk::Parallelism::RayonNewPool(num_cpus::get()));

        let mut archives: Vec<(CompactString, PathBuf)> = Vec::new();
        for entry_result in walker {
            let entry = match entry_result {
                Ok(e) => e,
                Err(err) => {
                    let failed_path = err.path().map(Path::to_path_buf);
                    if failed_path.as_deref().map_or(true, |p| p == root) {
                        return Err(PackageError::Walk {
                            path: root.to_path_buf(),
                            reason: err.to_string(),
                        });
                    }
                    warn!("Skipping unreadable entry under {}: {err}", root.display());
                    continue;
                }
            };

            let path = entry.path();
            if !entry.file_type().is_file() || !self.is_archive(&path) {
                continue;
            }
            archives.push((package_name(root, &path), path));
        }

        archives.sort_by(|a, b| a.0.cmp(&b.0));

        let mut group = PackageGroup::new(id, root.to_path_buf());
        for (name, path) in archives {
            let listfile = read_sidecar(&path)?;
            if listfile.is_none() {
                debug!("No listfile sidecar for {}", path.display());
            }
            group = group.with_package(&name, listfile);
        }
        Ok(group)
    }
}

/// Package name: the archive path relative to the group root, `\`-separated.
fn package_name(root: &Path, archive: &Path) -> CompactString {
    let relative = archive.strip_prefix(root).unwrap_or(archive);
    let joined = relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join(&SEPARATOR.to_string());
    CompactString::new(joined)
}

fn sidecar_path(archive: &Path) -> PathBuf {
    let mut os: OsString = archive.as_os_str().to_owned();
    os.push(".");
    os.push(LISTFILE_EXTENSION);
    PathBuf::from(os)
}

fn read_sidecar(archive: &Path) -> Result<Option<Listfile>, PackageError> {
    let path = sidecar_path(archive);
    let text = match std::fs::read_to_string(&path) {
        Ok(text) => text,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(PackageError::Io { path, source }),
    };
    let lines = text.lines().map(str::trim).filter(|l| !l.is_empty());
    Ok(Some(Listfile::new(lines)))
}
