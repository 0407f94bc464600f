use std::fs;
use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use tempfile::Builder;

use crate::domain::DsoId;
use crate::error::HipsError;
use crate::manifest::ObjectManifest;
use crate::properties::PropertyRecord;

/// Primary properties file; its presence is the legacy completion marker.
pub const PROPERTIES_FILE: &str = "properties";
pub const PROPERTIES_TXT_FILE: &str = "properties.txt";
pub const MANIFEST_FILE: &str = "manifest.json";

/// On-disk layout of provisioned pyramids under one output base.
#[derive(Debug, Clone)]
pub struct Store {
    root: Utf8PathBuf,
}

impl Store {
    pub fn new(root: Utf8PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The output base may be created, but the directory it lives in must
    /// already exist; otherwise the run was started from the wrong place.
    pub fn check_working_dir(&self) -> Result<(), HipsError> {
        match self.root.parent() {
            Some(parent) if !parent.as_str().is_empty() && !parent.as_std_path().is_dir() => {
                Err(HipsError::MissingWorkingDir(
                    parent.as_std_path().to_path_buf(),
                ))
            }
            _ => Ok(()),
        }
    }

    pub fn object_dir(&self, id: &DsoId) -> Utf8PathBuf {
        self.root.join(id.as_str())
    }

    pub fn properties_path(&self, id: &DsoId) -> Utf8PathBuf {
        self.object_dir(id).join(PROPERTIES_FILE)
    }

    pub fn properties_txt_path(&self, id: &DsoId) -> Utf8PathBuf {
        self.object_dir(id).join(PROPERTIES_TXT_FILE)
    }

    pub fn manifest_path(&self, id: &DsoId) -> Utf8PathBuf {
        self.object_dir(id).join(MANIFEST_FILE)
    }

    pub fn ensure_object_dir(&self, id: &DsoId) -> Result<Utf8PathBuf, HipsError> {
        let dir = self.object_dir(id);
        fs::create_dir_all(dir.as_std_path())
            .map_err(|err| HipsError::Filesystem(format!("create {dir}: {err}")))?;
        Ok(dir)
    }

    pub fn has_properties(&self, id: &DsoId) -> bool {
        self.properties_path(id).as_std_path().exists()
    }

    /// Writes the same bytes under both property file names.
    pub fn write_properties(&self, id: &DsoId, record: &PropertyRecord) -> Result<(), HipsError> {
        let content = record.to_text();
        write_bytes_atomic(&self.properties_path(id), content.as_bytes())?;
        write_bytes_atomic(&self.properties_txt_path(id), content.as_bytes())?;
        Ok(())
    }

    pub fn write_manifest(&self, id: &DsoId, manifest: &ObjectManifest) -> Result<(), HipsError> {
        let content = serde_json::to_vec_pretty(manifest)
            .map_err(|err| HipsError::Manifest(err.to_string()))?;
        write_bytes_atomic(&self.manifest_path(id), &content)
    }

    /// `Ok(None)` when no manifest was written yet.
    pub fn read_manifest(&self, id: &DsoId) -> Result<Option<ObjectManifest>, HipsError> {
        let path = self.manifest_path(id);
        if !path.as_std_path().exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(path.as_std_path())
            .map_err(|err| HipsError::Filesystem(format!("read {path}: {err}")))?;
        let manifest = serde_json::from_str(&content)
            .map_err(|err| HipsError::Manifest(format!("{path}: {err}")))?;
        Ok(Some(manifest))
    }
}

/// Write `content` to a temporary file next to `path`, then move it into
/// place. Parent directories are created as needed.
pub fn write_bytes_atomic(path: &Utf8Path, content: &[u8]) -> Result<(), HipsError> {
    let parent = path
        .parent()
        .ok_or_else(|| HipsError::Filesystem(format!("invalid destination path: {path}")))?;
    fs::create_dir_all(parent.as_std_path())
        .map_err(|err| HipsError::Filesystem(format!("create {parent}: {err}")))?;
    let mut temp = Builder::new()
        .prefix(".hips-part")
        .tempfile_in(parent.as_std_path())
        .map_err(|err| HipsError::Filesystem(err.to_string()))?;
    temp.write_all(content)
        .map_err(|err| HipsError::Filesystem(err.to_string()))?;
    temp.persist(path.as_std_path())
        .map_err(|err| HipsError::Filesystem(err.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths() {
        let store = Store::new(Utf8PathBuf::from("public/hips"));
        let id: DsoId = "m57".parse().unwrap();
        assert!(store.properties_path(&id).ends_with("hips/m57/properties"));
        assert!(store.properties_txt_path(&id).ends_with("m57/properties.txt"));
        assert!(store.manifest_path(&id).ends_with("m57/manifest.json"));
    }

    #[test]
    fn working_dir_must_exist() {
        let temp = tempfile::tempdir().unwrap();
        let base = Utf8PathBuf::from_path_buf(temp.path().to_path_buf()).unwrap();
        assert!(Store::new(base.join("hips")).check_working_dir().is_ok());
        assert!(matches!(
            Store::new(base.join("public").join("hips")).check_working_dir(),
            Err(HipsError::MissingWorkingDir(_))
        ));
        assert!(Store::new(Utf8PathBuf::from("hips")).check_working_dir().is_ok());
    }

    #[test]
    fn atomic_write_creates_parents() {
        let temp = tempfile::tempdir().unwrap();
        let path = Utf8PathBuf::from_path_buf(temp.path().join("a/b/c.bin")).unwrap();
        write_bytes_atomic(&path, b"tile").unwrap();
        assert_eq!(std::fs::read(path.as_std_path()).unwrap(), b"tile");
    }
}
