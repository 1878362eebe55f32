//! Platform-tools provisioning
//!
//! Downloads and unpacks the tool archive on first use. The archive and the
//! extraction staging directory never outlive a call, and the tool directory
//! only appears once extraction fully succeeded.

use async_trait::async_trait;
use futures::StreamExt;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use zip::ZipArchive;

use super::errors::ProvisionError;
use super::reporter::Reporter;
use super::DownloadProgress;
use crate::system::ScopedPath;
use crate::workflow::state::ToolDependency;

/// Receives download progress updates
pub type ProgressSink<'a> = &'a (dyn Fn(DownloadProgress) + Send + Sync);

/// Fetches a remote archive to a local file
#[async_trait]
pub trait ArchiveFetcher: Send + Sync {
    /// Download `url` into `dest`, returning the number of bytes written.
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64, ProvisionError>;
}

/// HTTPS fetcher backed by reqwest
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(connect_timeout: Duration) -> Result<Self, ProvisionError> {
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .user_agent(concat!("flipkit/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProvisionError::NetworkFailure(error_chain(&e)))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl ArchiveFetcher for HttpFetcher {
    async fn fetch(
        &self,
        url: &str,
        dest: &Path,
        progress: ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<u64, ProvisionError> {
        tracing::info!("Downloading {}", url);

        let sent = tokio::select! {
            _ = cancel.cancelled() => return Err(ProvisionError::Cancelled),
            response = self.client.get(url).send() => response,
        };
        let response = sent
            .and_then(|r| r.error_for_status())
            .map_err(|e| ProvisionError::NetworkFailure(error_chain(&e)))?;

        let total = response.content_length();
        let mut file = tokio::fs::File::create(dest).await?;
        let mut stream = response.bytes_stream();
        let mut received: u64 = 0;
        let mut last_percent = None;

        progress(DownloadProgress { received, total });
        loop {
            let chunk = tokio::select! {
                _ = cancel.cancelled() => return Err(ProvisionError::Cancelled),
                chunk = stream.next() => chunk,
            };
            let Some(chunk) = chunk else { break };
            let bytes = chunk.map_err(|e| ProvisionError::NetworkFailure(error_chain(&e)))?;
            file.write_all(&bytes).await?;
            received += bytes.len() as u64;

            let update = DownloadProgress { received, total };
            // Without a content length every chunk is news
            if update.percent().is_none() || update.percent() != last_percent {
                last_percent = update.percent();
                progress(update);
            }
        }
        file.flush().await?;

        tracing::info!("Downloaded {} bytes from {}", received, url);
        Ok(received)
    }
}

/// Render an error with its source chain, e.g.
/// "error sending request for url (...): dns error: failed to lookup address"
fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Ensures tool dependencies are installed locally
pub struct ToolProvisioner {
    fetcher: Arc<dyn ArchiveFetcher>,
    downloads_dir: PathBuf,
    reporter: Reporter,
}

impl ToolProvisioner {
    pub fn new(
        fetcher: Arc<dyn ArchiveFetcher>,
        downloads_dir: impl Into<PathBuf>,
        reporter: Reporter,
    ) -> Self {
        Self {
            fetcher,
            downloads_dir: downloads_dir.into(),
            reporter,
        }
    }

    /// Make sure `dep` is installed, downloading it if necessary.
    ///
    /// Returns the tool directory. Performs no network access when the entry
    /// binary is already present.
    pub async fn ensure(
        &self,
        dep: &mut ToolDependency,
        progress: ProgressSink<'_>,
        cancel: &CancellationToken,
    ) -> Result<PathBuf, ProvisionError> {
        if dep.refresh() {
            tracing::debug!("{} already present at {}", dep.name, dep.local_path.display());
            return Ok(dep.local_path.clone());
        }

        self.reporter.info("Downloading Android Platform Tools...");
        self.reporter
            .status("Downloading Android Platform Tools (one-time setup)...");

        std::fs::create_dir_all(&self.downloads_dir)?;
        let archive = ScopedPath::new(self.downloads_dir.join(format!("{}.zip", dep.name)));
        self.fetcher
            .fetch(&dep.source_url, archive.path(), progress, cancel)
            .await?;

        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }

        self.reporter.info("Extracting Platform Tools...");
        self.reporter.status("Extracting Platform Tools...");
        self.install_from_archive(dep, archive.path(), cancel).await?;

        dep.installed = true;
        self.reporter.success("Platform Tools installed successfully!");
        self.reporter.status("Platform Tools ready!");
        Ok(dep.local_path.clone())
    }

    async fn install_from_archive(
        &self,
        dep: &ToolDependency,
        archive: &Path,
        cancel: &CancellationToken,
    ) -> Result<(), ProvisionError> {
        let parent = dep
            .local_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.downloads_dir.clone());
        let staging = ScopedPath::new(parent.join(format!(".{}.staging", dep.name)));
        if staging.path().exists() {
            std::fs::remove_dir_all(staging.path())?;
        }
        std::fs::create_dir_all(staging.path())?;

        let archive_path = archive.to_path_buf();
        let staging_path = staging.path().to_path_buf();
        let token = cancel.clone();
        tokio::task::spawn_blocking(move || extract_archive(&archive_path, &staging_path, &token))
            .await
            .map_err(|e| ProvisionError::ExtractFailure(e.to_string()))??;

        // Nothing is committed once cancellation was requested
        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }

        // Archives usually wrap the tools in a top-level directory named
        // after the tool; accept a flat layout too
        let dir_name = dep
            .local_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        let nested = staging.path().join(&dir_name);
        let extracted = if nested.join(&dep.marker).is_file() {
            nested
        } else if staging.path().join(&dep.marker).is_file() {
            staging.path().to_path_buf()
        } else {
            return Err(ProvisionError::ExtractFailure(format!(
                "archive does not contain {}",
                dep.marker.display()
            )));
        };

        if dep.local_path.exists() {
            std::fs::remove_dir_all(&dep.local_path)?;
        }
        std::fs::rename(&extracted, &dep.local_path)?;
        Ok(())
    }
}

/// Unpack a zip archive into `dest`, checking for cancellation between entries
fn extract_archive(
    archive: &Path,
    dest: &Path,
    cancel: &CancellationToken,
) -> Result<(), ProvisionError> {
    let file = File::open(archive)?;
    let mut zip =
        ZipArchive::new(file).map_err(|e| ProvisionError::ExtractFailure(e.to_string()))?;

    for i in 0..zip.len() {
        if cancel.is_cancelled() {
            return Err(ProvisionError::Cancelled);
        }

        let mut entry = zip
            .by_index(i)
            .map_err(|e| ProvisionError::ExtractFailure(e.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!("Skipping unsafe archive entry: {}", entry.name());
            continue;
        };
        let out_path = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&out_path)?;
            continue;
        }
        if let Some(parent) = out_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut out = File::create(&out_path)?;
        std::io::copy(&mut entry, &mut out)
            .map_err(|e| ProvisionError::ExtractFailure(format!("{}: {}", entry.name(), e)))?;

        #[cfg(unix)]
        if let Some(mode) = entry.unix_mode() {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(&out_path, std::fs::Permissions::from_mode(mode & 0o7777))?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::WorkflowEvent;
    use crate::test_support::{tools_zip, FakeFetcher, FetchBehavior};
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    struct Fixture {
        _dir: tempfile::TempDir,
        root: PathBuf,
        dep: ToolDependency,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let dep = ToolDependency::new(
            "platform-tools",
            root.join("platform-tools"),
            "https://example.invalid/platform-tools.zip",
            "adb",
        );
        Fixture {
            _dir: dir,
            root,
            dep,
        }
    }

    fn provisioner(fetcher: Arc<dyn ArchiveFetcher>, root: &Path) -> ToolProvisioner {
        ToolProvisioner::new(
            fetcher,
            root.join("downloads"),
            Reporter::detached(root.join("root_tool.log")),
        )
    }

    fn no_progress(_: DownloadProgress) {}

    #[tokio::test]
    async fn test_downloads_and_installs() {
        let mut fx = fixture();
        let fetcher = Arc::new(FakeFetcher::serving_tools("adb"));
        let prov = provisioner(fetcher.clone(), &fx.root);

        let seen = Mutex::new(Vec::new());
        let sink = |p: DownloadProgress| seen.lock().push(p.percent());
        let path = prov
            .ensure(&mut fx.dep, &sink, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(path, fx.root.join("platform-tools"));
        assert!(fx.dep.installed);
        assert!(path.join("adb").is_file());
        assert!(path.join("NOTICE.txt").is_file());
        assert_eq!(fetcher.calls(), 1);
        assert_eq!(seen.lock().last().copied().flatten(), Some(100));

        // Archive and staging area are gone
        assert!(!fx.root.join("downloads/platform-tools.zip").exists());
        assert!(!fx.root.join(".platform-tools.staging").exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(path.join("adb")).unwrap().permissions().mode();
            assert_eq!(mode & 0o111, 0o111);
        }
    }

    #[tokio::test]
    async fn test_second_ensure_skips_network() {
        let mut fx = fixture();
        let fetcher = Arc::new(FakeFetcher::serving_tools("adb"));
        let prov = provisioner(fetcher.clone(), &fx.root);
        let cancel = CancellationToken::new();

        prov.ensure(&mut fx.dep, &no_progress, &cancel).await.unwrap();
        assert_eq!(fetcher.calls(), 1);

        prov.ensure(&mut fx.dep, &no_progress, &cancel).await.unwrap();
        assert_eq!(fetcher.calls(), 1);
        assert!(fx.dep.installed);
    }

    #[tokio::test]
    async fn test_network_failure_leaves_nothing_behind() {
        let mut fx = fixture();
        let fetcher = Arc::new(FakeFetcher::new(FetchBehavior::Fail("dns error".into())));
        let prov = provisioner(fetcher, &fx.root);

        let err = prov
            .ensure(&mut fx.dep, &no_progress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::NetworkFailure(_)));
        assert!(!fx.dep.installed);
        assert!(!fx.root.join("platform-tools").exists());
        assert!(!fx.root.join("downloads/platform-tools.zip").exists());
    }

    #[tokio::test]
    async fn test_corrupt_archive_is_extract_failure() {
        let mut fx = fixture();
        let fetcher = Arc::new(FakeFetcher::new(FetchBehavior::Serve(
            b"definitely not a zip file".to_vec(),
        )));
        let prov = provisioner(fetcher, &fx.root);

        let err = prov
            .ensure(&mut fx.dep, &no_progress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::ExtractFailure(_)));
        assert!(!fx.dep.installed);
        assert!(!fx.root.join("downloads/platform-tools.zip").exists());
        assert!(!fx.root.join(".platform-tools.staging").exists());
    }

    #[tokio::test]
    async fn test_archive_without_marker_is_rejected() {
        let mut fx = fixture();
        let fetcher = Arc::new(FakeFetcher::serving_tools("fastboot"));
        let prov = provisioner(fetcher, &fx.root);

        let err = prov
            .ensure(&mut fx.dep, &no_progress, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::ExtractFailure(_)));
        assert!(!fx.root.join("platform-tools").exists());
    }

    #[tokio::test]
    async fn test_cancel_during_download_removes_partial_file() {
        let mut fx = fixture();
        let fetcher = Arc::new(FakeFetcher::new(FetchBehavior::StallUntilCancelled(
            b"partial".to_vec(),
        )));
        let prov = provisioner(fetcher, &fx.root);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let err = prov
            .ensure(&mut fx.dep, &no_progress, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Cancelled));
        assert!(!fx.dep.installed);
        assert!(!fx.root.join("downloads/platform-tools.zip").exists());
    }

    #[tokio::test]
    async fn test_cancel_during_extraction_discards_staging() {
        let mut fx = fixture();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let prov = ToolProvisioner::new(
            Arc::new(FakeFetcher::serving_tools("adb")),
            fx.root.join("downloads"),
            Reporter::new(fx.root.join("root_tool.log"), tx),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                if matches!(&event, WorkflowEvent::Status(s) if s.starts_with("Extracting")) {
                    trigger.cancel();
                }
            }
        });

        let err = prov
            .ensure(&mut fx.dep, &no_progress, &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ProvisionError::Cancelled));
        assert!(!fx.dep.installed);
        assert!(!fx.root.join("platform-tools").exists());
        assert!(!fx.root.join(".platform-tools.staging").exists());
        assert!(!fx.root.join("downloads/platform-tools.zip").exists());
    }

    #[test]
    fn test_extract_honours_cancellation() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("tools.zip");
        std::fs::write(&archive, tools_zip("adb")).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let dest = dir.path().join("out");
        let err = extract_archive(&archive, &dest, &cancel).unwrap_err();
        assert!(matches!(err, ProvisionError::Cancelled));
        assert!(!dest.join("platform-tools/adb").exists());
    }

    #[test]
    fn test_error_chain_includes_sources() {
        let inner = std::io::Error::new(std::io::ErrorKind::Other, "dns error");
        let outer = ProvisionError::Io(inner);
        let text = error_chain(&outer);
        assert!(text.contains("dns error"));
    }
}
