//! Export folder and produced files
//!
//! Every profile writes into its own folder below the output root. The
//! folder is cleared when a run starts and holds the segment files, the
//! related-data files, the optional zip archive and `run.log`.

use crate::domain::ids::{ProfileId, StoreId};
use crate::domain::{BatchportError, Result};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use zip::write::FileOptions;
use zip::ZipWriter;

/// A file written by a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProducedFile {
    pub file_name: String,
    pub path: PathBuf,
    pub store_id: StoreId,
    /// 1-based segment index (0 for the archive)
    pub segment: u32,
    pub records: u64,
    pub size_bytes: u64,
    pub sha256: String,

    /// Name of the related-data unit, `None` for main segment files
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub related_to: Option<String>,
}

/// Folder of a profile below the output root
pub fn export_dir(output_root: &Path, profile_id: &ProfileId) -> PathBuf {
    output_root.join(profile_id.as_str())
}

/// Renders the base name (without extension) of a segment file
///
/// Supported placeholders: `{profile}`, `{store}`, `{segment}` (four digits).
pub fn segment_base_name(
    pattern: &str,
    profile_id: &ProfileId,
    store_id: StoreId,
    segment: u32,
) -> String {
    pattern
        .replace("{profile}", profile_id.as_str())
        .replace("{store}", &store_id.to_string())
        .replace("{segment}", &format!("{segment:04}"))
}

/// Name of a related-data unit next to a segment file
pub fn related_file_name(base_name: &str, unit: &str, extension: &str) -> String {
    let unit: String = unit
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    format!("{base_name}-{unit}.{extension}")
}

/// Removes everything in the export folder and recreates it
pub async fn prepare_export_dir(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(e.into()),
    }
    tokio::fs::create_dir_all(dir).await?;
    Ok(())
}

/// Deletes produced files, ignoring ones that are already gone
pub async fn remove_files<'a>(files: impl IntoIterator<Item = &'a ProducedFile>) -> Result<usize> {
    let mut removed = 0;
    for file in files {
        match tokio::fs::remove_file(&file.path).await {
            Ok(()) => removed += 1,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
    }
    Ok(removed)
}

/// Packs `files` into `<export_dir>/<profile_id>.zip`
///
/// Runs on a blocking thread.
pub async fn create_zip(
    export_dir: &Path,
    profile_id: &ProfileId,
    files: &[ProducedFile],
) -> Result<ProducedFile> {
    let zip_path = export_dir.join(format!("{profile_id}.zip"));
    let sources: Vec<(String, PathBuf)> = files
        .iter()
        .map(|f| (f.file_name.clone(), f.path.clone()))
        .collect();
    let records: u64 = files.iter().filter(|f| f.related_to.is_none()).map(|f| f.records).sum();

    let target = zip_path.clone();
    let (size_bytes, sha256) = tokio::task::spawn_blocking(move || write_zip(&target, &sources))
        .await
        .map_err(|e| BatchportError::Export(format!("Zip task failed: {e}")))??;

    tracing::info!(
        path = %zip_path.display(),
        files = files.len(),
        size_bytes,
        "Created zip archive"
    );

    Ok(ProducedFile {
        file_name: format!("{profile_id}.zip"),
        path: zip_path,
        store_id: StoreId::default(),
        segment: 0,
        records,
        size_bytes,
        sha256,
        related_to: None,
    })
}

fn write_zip(zip_path: &Path, sources: &[(String, PathBuf)]) -> Result<(u64, String)> {
    let file = File::create(zip_path)?;
    let mut zip = ZipWriter::new(file);
    let options = FileOptions::default().compression_method(zip::CompressionMethod::Deflated);

    for (name, path) in sources {
        zip.start_file(name.as_str(), options)?;
        let mut source = File::open(path)?;
        std::io::copy(&mut source, &mut zip)?;
    }
    zip.finish()?;

    let mut hasher = Sha256::new();
    let mut archive = File::open(zip_path)?;
    let size_bytes = std::io::copy(&mut archive, &mut hasher)?;
    Ok((size_bytes, format!("{:x}", hasher.finalize())))
}
