use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::Stdio;

use async_trait::async_trait;
use flate2::read::GzDecoder;
use log::debug;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::io::SyncIoBridge;

use crate::error::{ArtifactPullError, Result};

/// Streamed archive body handed to an extractor.
pub type ArchiveStream = Pin<Box<dyn AsyncRead + Send>>;

/// Unpacks a tar stream into a directory.
///
/// Implementations must consume the stream incrementally and must not need
/// the whole archive in memory.
#[async_trait]
pub trait ArchiveExtractor: Send + Sync {
    async fn extract(&self, archive: ArchiveStream, target_dir: &Path) -> Result<()>;

    fn name(&self) -> &'static str;
}

/// Extracts by piping the archive into an external `tar` process.
///
/// Runs `tar -xPf -` (or `-xPzf -` for gzip) inside the target directory.
/// `-P` keeps leading `/` in member names.
pub struct TarCommandExtractor {
    binary_path: PathBuf,
    compressed: bool,
}

impl TarCommandExtractor {
    pub fn new(binary_path: PathBuf, compressed: bool) -> Self {
        Self {
            binary_path,
            compressed,
        }
    }

    /// Looks up `tar` in `PATH`.
    pub fn from_path(compressed: bool) -> Option<Self> {
        which::which("tar")
            .ok()
            .map(|path| Self::new(path, compressed))
    }

    fn args(&self) -> [&'static str; 2] {
        if self.compressed {
            ["-xPzf", "-"]
        } else {
            ["-xPf", "-"]
        }
    }

    fn printable_command(&self) -> String {
        format!("tar {}", self.args().join(" "))
    }
}

#[async_trait]
impl ArchiveExtractor for TarCommandExtractor {
    async fn extract(&self, mut archive: ArchiveStream, target_dir: &Path) -> Result<()> {
        let command = self.printable_command();
        let failed = |message: String| ArtifactPullError::Extraction {
            command: command.clone(),
            message,
        };

        debug!("Running `{command}` in {}", target_dir.display());

        let mut child = Command::new(&self.binary_path)
            .args(self.args())
            .current_dir(target_dir)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| failed(format!("failed to start: {e}")))?;

        let mut stdin = child
            .stdin
            .take()
            .ok_or_else(|| failed("stdin is not available".to_string()))?;
        let mut stderr = child
            .stderr
            .take()
            .ok_or_else(|| failed("stderr is not available".to_string()))?;

        // stderr is drained alongside the copy so a chatty tar cannot block.
        let feed = async {
            let copied = tokio::io::copy(&mut archive, &mut stdin).await;
            drop(stdin);
            copied
        };
        let mut diagnostics = Vec::new();
        let (copied, _) = tokio::join!(feed, stderr.read_to_end(&mut diagnostics));

        let status = child
            .wait()
            .await
            .map_err(|e| failed(format!("failed to wait for tar: {e}")))?;

        if !status.success() {
            let diagnostics = String::from_utf8_lossy(&diagnostics);
            let diagnostics = diagnostics.trim();
            return Err(failed(if diagnostics.is_empty() {
                status.to_string()
            } else {
                format!("{status}: {diagnostics}")
            }));
        }

        let bytes = copied.map_err(|e| failed(format!("failed to stream archive: {e}")))?;
        debug!("Extracted {bytes} bytes into {}", target_dir.display());

        Ok(())
    }

    fn name(&self) -> &'static str {
        "tar-command"
    }
}

/// Extracts with the `tar` crate on the blocking thread pool.
///
/// Unlike [`TarCommandExtractor`], member names are always unpacked below
/// the target directory: a leading `/` is stripped, so `/abs/x.txt` lands
/// at `<target>/abs/x.txt`.
pub struct InProcessTarExtractor {
    compressed: bool,
}

impl InProcessTarExtractor {
    pub fn new(compressed: bool) -> Self {
        Self { compressed }
    }
}

#[async_trait]
impl ArchiveExtractor for InProcessTarExtractor {
    async fn extract(&self, archive: ArchiveStream, target_dir: &Path) -> Result<()> {
        let reader = SyncIoBridge::new(archive);
        let target_dir = target_dir.to_path_buf();
        let compressed = self.compressed;

        tokio::task::spawn_blocking(move || {
            let unpacked = if compressed {
                tar::Archive::new(GzDecoder::new(reader)).unpack(&target_dir)
            } else {
                tar::Archive::new(reader).unpack(&target_dir)
            };

            unpacked.map_err(|e| ArtifactPullError::Extraction {
                command: "in-process tar".to_string(),
                message: e.to_string(),
            })
        })
        .await
        .map_err(|e| ArtifactPullError::WorkerPool(e.to_string()))?
    }

    fn name(&self) -> &'static str {
        "in-process"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::write::GzEncoder;
    use flate2::Compression;
    use std::io::Cursor;

    fn tar_bytes(files: &[(&str, &str)]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (path, content) in files {
            let mut header = tar::Header::new_gnu();
            header.set_size(content.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, path, content.as_bytes())
                .unwrap();
        }
        builder.into_inner().unwrap()
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        std::io::Write::write_all(&mut encoder, bytes).unwrap();
        encoder.finish().unwrap()
    }

    fn stream(bytes: Vec<u8>) -> ArchiveStream {
        Box::pin(Cursor::new(bytes))
    }

    #[test]
    fn test_tar_arguments() {
        let plain = TarCommandExtractor::new(PathBuf::from("tar"), false);
        let gzipped = TarCommandExtractor::new(PathBuf::from("tar"), true);

        assert_eq!(plain.printable_command(), "tar -xPf -");
        assert_eq!(gzipped.printable_command(), "tar -xPzf -");
    }

    #[tokio::test]
    async fn test_in_process_extracts_plain_tar() {
        let dir = tempfile::tempdir().unwrap();
        let archive = tar_bytes(&[("a.txt", "alpha"), ("nested/b.txt", "beta")]);

        InProcessTarExtractor::new(false)
            .extract(stream(archive), dir.path())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "alpha"
        );
        assert_eq!(
            std::fs::read_to_string(dir.path().join("nested/b.txt")).unwrap(),
            "beta"
        );
    }

    #[tokio::test]
    async fn test_in_process_extracts_gzipped_tar() {
        let dir = tempfile::tempdir().unwrap();
        let archive = gzip(&tar_bytes(&[("report.xml", "<ok/>")]));

        InProcessTarExtractor::new(true)
            .extract(stream(archive), dir.path())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("report.xml")).unwrap(),
            "<ok/>"
        );
    }

    #[tokio::test]
    async fn test_in_process_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();

        let err = InProcessTarExtractor::new(true)
            .extract(stream(b"definitely not gzip".to_vec()), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, ArtifactPullError::Extraction { .. }));
    }

    #[tokio::test]
    async fn test_in_process_keeps_absolute_members_below_target() {
        let content = b"rooted";
        let mut header = tar::Header::new_gnu();
        let name = b"/abs/x.txt";
        header.as_gnu_mut().unwrap().name[..name.len()].copy_from_slice(name);
        header.set_size(content.len() as u64);
        header.set_mode(0o644);
        header.set_entry_type(tar::EntryType::Regular);
        header.set_cksum();
        let mut builder = tar::Builder::new(Vec::new());
        builder.append(&header, &content[..]).unwrap();
        let archive = builder.into_inner().unwrap();

        let dir = tempfile::tempdir().unwrap();
        InProcessTarExtractor::new(false)
            .extract(stream(archive), dir.path())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("abs/x.txt")).unwrap(),
            "rooted"
        );
    }

    #[tokio::test]
    async fn test_tar_command_extracts_when_available() {
        let Some(extractor) = TarCommandExtractor::from_path(false) else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();
        let archive = tar_bytes(&[("logs/build.log", "done")]);

        extractor
            .extract(stream(archive), dir.path())
            .await
            .unwrap();

        assert_eq!(
            std::fs::read_to_string(dir.path().join("logs/build.log")).unwrap(),
            "done"
        );
    }

    #[tokio::test]
    async fn test_tar_command_failure_names_the_command() {
        let Some(extractor) = TarCommandExtractor::from_path(true) else {
            return;
        };
        let dir = tempfile::tempdir().unwrap();

        let err = extractor
            .extract(stream(b"not an archive".to_vec()), dir.path())
            .await
            .unwrap_err();

        assert!(err.to_string().starts_with("tar -xPzf - failed:"), "{err}");
    }

    #[tokio::test]
    async fn test_missing_binary_is_an_extraction_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor =
            TarCommandExtractor::new(PathBuf::from("/nonexistent/bin/tar-xyz"), false);

        let err = extractor
            .extract(stream(Vec::new()), dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, ArtifactPullError::Extraction { ref command, .. } if command == "tar -xPf -"));
    }
}
