use std::fs;
use std::io::{self, Cursor};
use std::path::{Component, Path, PathBuf};

use zip::ZipArchive;

use super::manifest::{manifest_path, ThemeManifest};
use super::registry::TemplateRegistry;

const STAGING_PREFIX: &str = ".staging-";

/// Staging directory removed on drop, whichever way `install_archive` exits.
struct Staging(PathBuf);

impl Drop for Staging {
    fn drop(&mut self) {
        if self.0.exists() {
            if let Err(e) = fs::remove_dir_all(&self.0) {
                log::warn!("[theme] could not remove staging dir {}: {}", self.0.display(), e);
            }
        }
    }
}

/// A relative path made only of normal components.
fn safe_relative(name: &str) -> Option<PathBuf> {
    if name.starts_with('/') || name.starts_with('\\') || name.contains('\0') {
        return None;
    }
    let path = Path::new(name);
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(part) => out.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => return None,
        }
    }
    if out.as_os_str().is_empty() {
        None
    } else {
        Some(out)
    }
}

fn is_symlink_mode(mode: Option<u32>) -> bool {
    mode.map_or(false, |m| m & 0o170000 == 0o120000)
}

/// Every entry of the archive, checked before anything touches the disk.
/// One bad entry rejects the whole archive.
fn validate_entries<R: io::Read + io::Seek>(
    archive: &mut ZipArchive<R>,
) -> Result<Vec<(PathBuf, bool)>, String> {
    let mut entries = Vec::with_capacity(archive.len());
    for i in 0..archive.len() {
        let file = archive.by_index(i).map_err(|e| format!("Invalid zip entry: {}", e))?;
        let name = file.name().to_string();
        if is_symlink_mode(file.unix_mode()) {
            return Err(format!("Theme package contains a symlink: {}", name));
        }
        let rel = safe_relative(&name)
            .ok_or_else(|| format!("Theme package contains an unsafe path: {}", name))?;
        if file.enclosed_name().is_none() {
            return Err(format!("Theme package contains an unsafe path: {}", name));
        }
        entries.push((rel, file.is_dir()));
    }
    if entries.is_empty() {
        return Err("Theme package is empty".to_string());
    }
    Ok(entries)
}

/// Directory holding `theme.yaml`: the staging root itself or its single top-level folder.
fn locate_root(staging: &Path) -> Result<PathBuf, String> {
    if manifest_path(staging).is_some() {
        return Ok(staging.to_path_buf());
    }
    let dirs: Vec<PathBuf> = fs::read_dir(staging)
        .map_err(|e| e.to_string())?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| {
            p.is_dir()
                && p.file_name()
                    .map(|n| n != "__MACOSX")
                    .unwrap_or(false)
        })
        .collect();
    match dirs.as_slice() {
        [only] if manifest_path(only).is_some() => Ok(only.clone()),
        _ => Err("Invalid theme package: theme.yaml not found".to_string()),
    }
}

/// Unpacks a theme zip into `themes_dir/<id>`.
///
/// The archive is extracted into a `.staging-<uuid>` folder next to the
/// installed themes, validated (manifest and templates), and renamed into
/// place. `is_taken` reports ids already known to the registry.
pub fn install_archive(
    bytes: &[u8],
    themes_dir: &Path,
    is_taken: &dyn Fn(&str) -> bool,
) -> Result<ThemeManifest, String> {
    let mut archive =
        ZipArchive::new(Cursor::new(bytes)).map_err(|e| format!("Invalid zip file: {}", e))?;
    let entries = validate_entries(&mut archive)?;

    fs::create_dir_all(themes_dir).map_err(|e| e.to_string())?;
    let staging = Staging(themes_dir.join(format!("{}{}", STAGING_PREFIX, uuid::Uuid::new_v4())));
    fs::create_dir_all(&staging.0).map_err(|e| e.to_string())?;

    for (i, (rel, is_dir)) in entries.iter().enumerate() {
        let out = staging.0.join(rel);
        if *is_dir {
            fs::create_dir_all(&out).map_err(|e| e.to_string())?;
            continue;
        }
        if let Some(parent) = out.parent() {
            fs::create_dir_all(parent).map_err(|e| e.to_string())?;
        }
        let mut file = archive.by_index(i).map_err(|e| e.to_string())?;
        let mut target = fs::File::create(&out).map_err(|e| e.to_string())?;
        io::copy(&mut file, &mut target).map_err(|e| e.to_string())?;
    }

    let root = locate_root(&staging.0)?;
    let manifest = ThemeManifest::load(&root)?;
    TemplateRegistry::compile(&root)?;

    let dest = themes_dir.join(&manifest.id);
    if is_taken(&manifest.id) || dest.exists() {
        return Err(format!("Theme already exists: {}", manifest.id));
    }
    fs::rename(&root, &dest).map_err(|e| format!("Failed to move theme into place: {}", e))?;

    log::info!("[theme] installed {} into {}", manifest.id, dest.display());
    Ok(manifest)
}

/// Leftover staging folders from an interrupted install.
pub fn sweep_staging(themes_dir: &Path) {
    let Ok(entries) = fs::read_dir(themes_dir) else {
        return;
    };
    for entry in entries.filter_map(|e| e.ok()) {
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(STAGING_PREFIX) {
            let _ = fs::remove_dir_all(entry.path());
        }
    }
}
