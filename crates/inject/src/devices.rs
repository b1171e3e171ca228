//! Host device and shared-library expansion
//!
//! Helpers for turning a visible-devices environment value into
//! concrete device paths, for picking up companion control nodes, and
//! for collecting shared libraries to bind read-only into a container.

use devlease_errors::{Error, PoolError};
use regex::Regex;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// List devices under `source_path` whose name matches `name_pattern`,
/// as full paths in ascending order.
///
/// # Errors
///
/// Returns `PoolError::InvalidPattern` for a bad pattern and
/// `PoolError::Discovery` when the directory cannot be listed.
pub async fn matching_devices(
    source_path: &Path,
    name_pattern: &str,
) -> Result<Vec<PathBuf>, Error> {
    let pattern = Regex::new(name_pattern).map_err(|e| PoolError::InvalidPattern {
        pattern: name_pattern.to_string(),
        message: e.to_string(),
    })?;

    let mut entries = tokio::fs::read_dir(source_path)
        .await
        .map_err(|e| PoolError::Discovery {
            path: source_path.display().to_string(),
            message: e.to_string(),
        })?;

    let mut devices = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| PoolError::Discovery {
        path: source_path.display().to_string(),
        message: e.to_string(),
    })? {
        if let Some(name) = entry.file_name().to_str() {
            if pattern.is_match(name) {
                devices.push(entry.path());
            }
        }
    }
    devices.sort();
    Ok(devices)
}

/// Expand a visible-devices value into device paths.
///
/// `all` selects every device under `source_path` matching
/// `name_pattern`. Otherwise the value is a comma list where each item
/// is a device index (matched against the trailing digits of device
/// names), a name relative to `source_path`, or an absolute path.
/// Items that do not resolve to an existing device are dropped with a
/// warning.
///
/// # Errors
///
/// Propagates listing and pattern errors from [`matching_devices`].
pub async fn expand_visible(
    value: &str,
    source_path: &Path,
    name_pattern: &str,
) -> Result<Vec<String>, Error> {
    if value == "all" {
        let devices = matching_devices(source_path, name_pattern).await?;
        return Ok(devices
            .into_iter()
            .map(|p| p.display().to_string())
            .collect());
    }

    let by_index = matching_devices(source_path, name_pattern).await?;
    let mut selected = Vec::new();
    for item in value.split(',') {
        let item = item.trim();
        if item.is_empty() {
            continue;
        }
        let path = if item.chars().all(|c| c.is_ascii_digit()) {
            let index: u64 = match item.parse() {
                Ok(index) => index,
                Err(_) => {
                    warn!(item, "ignoring out-of-range device index");
                    continue;
                }
            };
            by_index
                .iter()
                .find(|p| {
                    p.file_name()
                        .and_then(|n| n.to_str())
                        .and_then(trailing_number)
                        == Some(index)
                })
                .cloned()
        } else if Path::new(item).is_absolute() {
            Some(PathBuf::from(item))
        } else {
            Some(source_path.join(item))
        };

        match path {
            Some(path) if path.exists() => selected.push(path.display().to_string()),
            Some(path) => {
                warn!(device = %path.display(), "visible device does not exist, skipping");
            }
            None => warn!(item, "no discovered device with this index"),
        }
    }
    Ok(selected)
}

/// Companion control nodes that exist on the host.
#[must_use]
pub fn existing_companions(companions: &[String]) -> Vec<String> {
    companions
        .iter()
        .filter(|path| {
            let exists = Path::new(path).exists();
            if !exists {
                debug!(device = %path, "companion device not present, skipping");
            }
            exists
        })
        .cloned()
        .collect()
}

/// Collect shared libraries under `paths` whose file name starts with
/// one of `prefixes`, as `src:src:ro` bind specs.
///
/// Directories that cannot be read are skipped with a warning; library
/// injection is best effort.
pub async fn library_binds(paths: &[PathBuf], prefixes: &[String]) -> Vec<String> {
    let mut binds = Vec::new();
    if prefixes.is_empty() {
        return binds;
    }

    for root in paths {
        let mut pending = vec![root.clone()];
        while let Some(dir) = pending.pop() {
            let mut entries = match tokio::fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "cannot scan library path");
                    continue;
                }
            };
            loop {
                match entries.next_entry().await {
                    Ok(Some(entry)) => {
                        let path = entry.path();
                        if path.is_dir() {
                            pending.push(path);
                        } else if entry
                            .file_name()
                            .to_str()
                            .is_some_and(|name| prefixes.iter().any(|p| name.starts_with(p.as_str())))
                        {
                            let src = path.display().to_string();
                            debug!(library = %src, "binding shared library read-only");
                            binds.push(format!("{src}:{src}:ro"));
                        }
                    }
                    Ok(None) => break,
                    Err(e) => {
                        warn!(path = %dir.display(), error = %e, "error while scanning library path");
                        break;
                    }
                }
            }
        }
    }
    binds.sort();
    binds.dedup();
    binds
}

fn trailing_number(name: &str) -> Option<u64> {
    let digits: String = name
        .chars()
        .rev()
        .take_while(char::is_ascii_digit)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;

    fn touch(dir: &Path, name: &str) {
        File::create(dir.join(name)).unwrap();
    }

    #[tokio::test]
    async fn all_expands_to_every_matching_device() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "accel1");
        touch(dir.path(), "accel0");
        touch(dir.path(), "accelctl");

        let devices = expand_visible("all", dir.path(), r"^accel\d+$")
            .await
            .unwrap();
        assert_eq!(
            devices,
            vec![
                dir.path().join("accel0").display().to_string(),
                dir.path().join("accel1").display().to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn indices_select_by_trailing_number() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "accel0");
        touch(dir.path(), "accel1");
        touch(dir.path(), "accel2");

        let devices = expand_visible("2, 0", dir.path(), r"^accel\d+$")
            .await
            .unwrap();
        assert_eq!(
            devices,
            vec![
                dir.path().join("accel2").display().to_string(),
                dir.path().join("accel0").display().to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn names_resolve_relative_to_source_path() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "accel0");

        let devices = expand_visible("accel0,missing7", dir.path(), r"^accel\d+$")
            .await
            .unwrap();
        assert_eq!(
            devices,
            vec![dir.path().join("accel0").display().to_string()]
        );
    }

    #[tokio::test]
    async fn library_scan_is_recursive_and_prefix_filtered() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        touch(dir.path(), "libaccel.so.1");
        touch(dir.path(), "libother.so");
        touch(&dir.path().join("sub"), "libaccel-rt.so");

        let binds = library_binds(
            &[dir.path().to_path_buf()],
            &["libaccel".to_string()],
        )
        .await;
        assert_eq!(binds.len(), 2);
        assert!(binds.iter().all(|b| b.ends_with(":ro")));
    }

    #[tokio::test]
    async fn unreadable_library_path_is_skipped() {
        let binds = library_binds(
            &[PathBuf::from("/no/such/libs")],
            &["lib".to_string()],
        )
        .await;
        assert!(binds.is_empty());
    }
}
