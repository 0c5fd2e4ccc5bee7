// src/ttyrec.rs
use anyhow::{anyhow, Context};
use futures::future::BoxFuture;
use std::{
    fs::File,
    io,
    path::{Path, PathBuf},
    process::Stdio,
};
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::{
    config::RecordingConfig,
    error::{DashboardError, Result},
};

/// A decompressed recording on local disk.
///
/// Owns the temporary directory holding the file; dropping it deletes the
/// artifact, so keep it alive until the response body is fully sent.
#[derive(Debug)]
pub struct Recording {
    path: PathBuf,
    _dir: TempDir,
}

impl Recording {
    pub fn new(path: PathBuf, dir: TempDir) -> Self {
        Self { path, _dir: dir }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Turns a recording identifier into a readable, decompressed file.
pub trait RecordingRetriever: Send + Sync {
    fn retrieve<'a>(&'a self, name: &'a Path) -> BoxFuture<'a, Result<Recording>>;
}

/// Decompresses recordings by piping them through an external program
/// (`bzip2 -d -c <file>` unless configured otherwise).
#[derive(Debug, Clone)]
pub struct ProcessRetriever {
    program: String,
    args: Vec<String>,
}

impl ProcessRetriever {
    pub fn new(config: &RecordingConfig) -> Self {
        Self {
            program: config.program.clone(),
            args: config.args.clone(),
        }
    }

    async fn decompress(&self, source: &Path) -> Result<Recording> {
        match tokio::fs::metadata(source).await {
            Ok(m) if m.is_file() => {}
            Ok(_) => return Err(DashboardError::not_found(source)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(DashboardError::not_found(source))
            }
            Err(e) => return Err(anyhow::Error::new(e).context("inspecting recording").into()),
        }

        let dir = tempfile::tempdir().context("creating temp dir for recording")?;
        // run1.ttyrec.bz2 -> run1.ttyrec
        let file_name = source
            .file_stem()
            .map(|s| s.to_os_string())
            .unwrap_or_else(|| "recording".into());
        let target = dir.path().join(file_name);
        let out = File::create(&target)
            .with_context(|| format!("creating {}", target.display()))?;

        debug!(program = %self.program, source = %source.display(), target = %target.display(), "decompressing");
        // `output()` would re-pipe stdout; spawn so it stays on the target file
        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(source)
            .stdin(Stdio::null())
            .stdout(Stdio::from(out))
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("spawning {}", self.program))?
            .wait_with_output()
            .await
            .with_context(|| format!("waiting for {}", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(status = %output.status, stderr = %stderr.trim(), "decompression failed");
            return Err(anyhow!(
                "{} exited with {} for {}",
                self.program,
                output.status,
                source.display()
            )
            .into());
        }

        info!(path = %target.display(), "decompression complete");
        Ok(Recording::new(target, dir))
    }
}

impl RecordingRetriever for ProcessRetriever {
    fn retrieve<'a>(&'a self, name: &'a Path) -> BoxFuture<'a, Result<Recording>> {
        Box::pin(self.decompress(name))
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn retriever(program: &str) -> ProcessRetriever {
        ProcessRetriever::new(&RecordingConfig {
            program: program.to_string(),
            args: Vec::new(),
        })
    }

    #[tokio::test]
    async fn writes_program_output_to_temp_file() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("run1.ttyrec.bz2");
        fs::write(&src, b"\x00\x01recording-bytes")?;

        let rec = retriever("cat").retrieve(&src).await?;
        assert_eq!(rec.path().file_name().unwrap(), "run1.ttyrec");
        assert_eq!(fs::read(rec.path())?, b"\x00\x01recording-bytes");
        assert_eq!(fs::metadata(rec.path())?.len(), 19);

        let artifact = rec.path().to_path_buf();
        drop(rec);
        assert!(!artifact.exists());
        Ok(())
    }

    #[tokio::test]
    async fn missing_recording_is_not_found() {
        let err = retriever("cat")
            .retrieve(Path::new("/nonexistent/run.ttyrec.bz2"))
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::NotFound { .. }), "{err:?}");
    }

    #[tokio::test]
    async fn failing_program_is_internal() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("broken.ttyrec.bz2");
        fs::write(&src, b"not bzip2")?;

        let err = retriever("false").retrieve(&src).await.unwrap_err();
        assert!(matches!(err, DashboardError::Internal(_)), "{err:?}");
        Ok(())
    }

    #[tokio::test]
    async fn unknown_program_is_internal() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let src = dir.path().join("a.ttyrec.bz2");
        fs::write(&src, b"x")?;

        let err = retriever("definitely-not-a-real-decompressor")
            .retrieve(&src)
            .await
            .unwrap_err();
        assert!(matches!(err, DashboardError::Internal(_)), "{err:?}");
        Ok(())
    }
}
