//! Source acquisition: download cache, checksum verification, extraction
//!
//! Archives land in `<cache>/<recipe>/<file>` and are only trusted after
//! their SHA-256 matches the source table. Extraction always produces
//! `<work>/source_subfolder`, stripping the archive's single top-level
//! directory whatever it is called.

use crate::layout::WorkLayout;
use crucible_config::SourceEntry;
use crucible_errors::{Error, SourceError};
use crucible_net::NetClient;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncReadExt;
use tokio::task;

/// Archive formats accepted for upstream sources
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    TarGz,
    TarBz2,
    TarXz,
    Zip,
}

impl ArchiveFormat {
    /// Detect the format from the file name, falling back to magic bytes
    ///
    /// # Errors
    ///
    /// Returns `SourceError::UnsupportedArchive` when neither identifies a
    /// known format.
    pub async fn detect(path: &Path) -> Result<Self, Error> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_lowercase())
            .unwrap_or_default();

        let by_name = if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar.bz2") || name.ends_with(".tbz2") {
            Some(Self::TarBz2)
        } else if name.ends_with(".tar.xz") || name.ends_with(".txz") {
            Some(Self::TarXz)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        };
        if let Some(format) = by_name {
            return Ok(format);
        }

        let mut header = [0u8; 6];
        let read = {
            let mut file = fs::File::open(path)
                .await
                .map_err(|e| Error::io_with_path(&e, path))?;
            file.read(&mut header).await?
        };
        Self::from_magic(&header[..read]).ok_or_else(|| {
            SourceError::UnsupportedArchive {
                file: path.display().to_string(),
            }
            .into()
        })
    }

    fn from_magic(header: &[u8]) -> Option<Self> {
        if header.starts_with(&[0x1f, 0x8b]) {
            Some(Self::TarGz)
        } else if header.starts_with(b"BZh") {
            Some(Self::TarBz2)
        } else if header.starts_with(&[0xfd, b'7', b'z', b'X', b'Z', 0x00]) {
            Some(Self::TarXz)
        } else if header.starts_with(b"PK\x03\x04") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

/// Downloads source archives into the cache
#[derive(Debug, Clone)]
pub struct SourceFetcher {
    client: NetClient,
    cache_dir: PathBuf,
    network_access: bool,
}

impl SourceFetcher {
    #[must_use]
    pub fn new(client: NetClient, cache_dir: PathBuf) -> Self {
        Self {
            client,
            cache_dir,
            network_access: true,
        }
    }

    /// Allow or forbid network access; cached archives still work offline
    #[must_use]
    pub fn with_network_access(mut self, enabled: bool) -> Self {
        self.network_access = enabled;
        self
    }

    /// Cache location of a recipe's archive
    #[must_use]
    pub fn cache_path(&self, recipe: &str, entry: &SourceEntry) -> PathBuf {
        self.cache_dir.join(recipe).join(entry.file_name())
    }

    /// Return a verified archive, downloading it if the cache has none
    ///
    /// # Errors
    ///
    /// Returns `SourceError::NetworkDisabled` for an uncached archive while
    /// offline, `SourceError::ChecksumMismatch` when the download does not
    /// match (the file is deleted), or the underlying download error.
    pub async fn fetch(&self, recipe: &str, entry: &SourceEntry) -> Result<PathBuf, Error> {
        let dest = self.cache_path(recipe, entry);

        if fs::try_exists(&dest).await.unwrap_or(false) {
            let actual = sha256_file(&dest).await?;
            if actual.eq_ignore_ascii_case(&entry.sha256) {
                tracing::debug!(recipe, path = %dest.display(), "using cached source archive");
                return Ok(dest);
            }
            tracing::warn!(
                recipe,
                path = %dest.display(),
                "cached archive does not match its checksum, discarding"
            );
            fs::remove_file(&dest)
                .await
                .map_err(|e| Error::io_with_path(&e, &dest))?;
        }

        if !self.network_access {
            return Err(SourceError::NetworkDisabled {
                url: entry.url.clone(),
            }
            .into());
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io_with_path(&e, parent))?;
        }

        let partial = dest.with_extension("part");
        tracing::info!(recipe, url = %entry.url, "downloading source archive");
        let result = crucible_net::download_file(&self.client, &entry.url, &partial).await?;

        if !result.sha256.eq_ignore_ascii_case(&entry.sha256) {
            let _ = fs::remove_file(&partial).await;
            return Err(SourceError::ChecksumMismatch {
                file: entry.file_name(),
                expected: entry.sha256.clone(),
                actual: result.sha256,
            }
            .into());
        }

        fs::rename(&partial, &dest)
            .await
            .map_err(|e| Error::io_with_path(&e, &dest))?;
        tracing::debug!(recipe, size = result.size, "source archive verified");
        Ok(dest)
    }
}

/// Hex SHA-256 of a file
///
/// # Errors
///
/// Returns an I/O error if the file cannot be read.
pub async fn sha256_file(path: &Path) -> Result<String, Error> {
    let mut file = fs::File::open(path)
        .await
        .map_err(|e| Error::io_with_path(&e, path))?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buffer).await?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hex::encode(hasher.finalize()))
}

/// Extract an archive into the work directory's source tree
///
/// Any previous source tree is removed first.
///
/// # Errors
///
/// Returns `SourceError::UnsupportedArchive` or
/// `SourceError::ExtractionFailed` when the archive cannot be unpacked.
pub async fn extract_source(archive: &Path, layout: &WorkLayout) -> Result<PathBuf, Error> {
    let format = ArchiveFormat::detect(archive).await?;
    let source_dir = layout.source_dir();

    fs::create_dir_all(&layout.root)
        .await
        .map_err(|e| Error::io_with_path(&e, &layout.root))?;
    if fs::try_exists(&source_dir).await.unwrap_or(false) {
        fs::remove_dir_all(&source_dir)
            .await
            .map_err(|e| Error::io_with_path(&e, &source_dir))?;
    }

    let scratch = tempfile::Builder::new()
        .prefix(".extract-")
        .tempdir_in(&layout.root)
        .map_err(|e| Error::io_with_path(&e, &layout.root))?;
    let tree = scratch.path().join("tree");
    fs::create_dir_all(&tree).await?;

    match format {
        ArchiveFormat::Zip => extract_zip(archive.to_path_buf(), tree.clone()).await?,
        _ => {
            let tar_path = scratch.path().join("source.tar");
            decompress(archive, &tar_path, format).await?;
            extract_tar(tar_path, tree.clone()).await?;
        }
    }

    let top = single_top_level_dir(&tree).await?;
    let root = top.unwrap_or(tree);
    fs::rename(&root, &source_dir)
        .await
        .map_err(|e| Error::io_with_path(&e, &source_dir))?;

    tracing::debug!(
        archive = %archive.display(),
        path = %source_dir.display(),
        "source extracted"
    );
    Ok(source_dir)
}

/// The only entry of `dir`, if it is a directory
async fn single_top_level_dir(dir: &Path) -> Result<Option<PathBuf>, Error> {
    let mut entries = fs::read_dir(dir)
        .await
        .map_err(|e| Error::io_with_path(&e, dir))?;
    let mut found = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        found.push(entry);
        if found.len() > 1 {
            return Ok(None);
        }
    }
    match found.pop() {
        Some(entry) if entry.file_type().await?.is_dir() => Ok(Some(entry.path())),
        _ => Ok(None),
    }
}

/// Decompress a tarball to a plain tar file
async fn decompress(archive: &Path, dest: &Path, format: ArchiveFormat) -> Result<(), Error> {
    use async_compression::tokio::bufread::{BzDecoder, GzipDecoder, XzDecoder};
    use tokio::io::{AsyncWriteExt, BufReader, BufWriter};

    let input = BufReader::new(
        fs::File::open(archive)
            .await
            .map_err(|e| Error::io_with_path(&e, archive))?,
    );
    let mut writer = BufWriter::new(fs::File::create(dest).await?);

    let copied = match format {
        ArchiveFormat::TarGz => tokio::io::copy(&mut GzipDecoder::new(input), &mut writer).await,
        ArchiveFormat::TarBz2 => tokio::io::copy(&mut BzDecoder::new(input), &mut writer).await,
        ArchiveFormat::TarXz => tokio::io::copy(&mut XzDecoder::new(input), &mut writer).await,
        ArchiveFormat::Zip => return Err(Error::internal("zip archives are not decompressed")),
    };
    copied.map_err(|e| SourceError::ExtractionFailed {
        message: format!("{}: {e}", archive.display()),
    })?;
    writer.flush().await?;
    Ok(())
}

async fn extract_tar(tar_path: PathBuf, dest: PathBuf) -> Result<(), Error> {
    task::spawn_blocking(move || {
        let file = File::open(&tar_path).map_err(|e| Error::io_with_path(&e, &tar_path))?;
        let mut archive = tar::Archive::new(file);
        archive.set_preserve_permissions(true);
        archive
            .unpack(&dest)
            .map_err(|e| SourceError::ExtractionFailed {
                message: format!("failed to unpack tar: {e}"),
            })?;
        Ok(())
    })
    .await
    .map_err(|e| Error::internal(format!("extraction task failed: {e}")))?
}

async fn extract_zip(archive_path: PathBuf, dest: PathBuf) -> Result<(), Error> {
    task::spawn_blocking(move || {
        let file = File::open(&archive_path).map_err(|e| Error::io_with_path(&e, &archive_path))?;
        let mut archive = zip::ZipArchive::new(file).map_err(|e| SourceError::ExtractionFailed {
            message: format!("failed to read zip archive: {e}"),
        })?;

        for i in 0..archive.len() {
            let mut entry = archive
                .by_index(i)
                .map_err(|e| SourceError::ExtractionFailed {
                    message: format!("failed to read zip entry: {e}"),
                })?;
            let Some(relative) = entry.enclosed_name() else {
                continue;
            };
            let outpath = dest.join(relative);

            if entry.is_dir() {
                std::fs::create_dir_all(&outpath).map_err(|e| Error::io_with_path(&e, &outpath))?;
                continue;
            }
            if let Some(parent) = outpath.parent() {
                std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
            }
            let mut outfile =
                File::create(&outpath).map_err(|e| Error::io_with_path(&e, &outpath))?;
            std::io::copy(&mut entry, &mut outfile).map_err(|e| SourceError::ExtractionFailed {
                message: format!("failed to extract {}: {e}", outpath.display()),
            })?;

            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Some(mode) = entry.unix_mode() {
                    std::fs::set_permissions(&outpath, std::fs::Permissions::from_mode(mode)).ok();
                }
            }
        }
        Ok(())
    })
    .await
    .map_err(|e| Error::internal(format!("extraction task failed: {e}")))?
}
