//! Downloading artifacts to local files.
//!
//! A download streams into a temporary file next to its destination and is
//! renamed into place only once it is complete (and, when a digest is known,
//! verified). An interrupted transfer therefore never leaves behind a file
//! that would pass the presence check on the next run.
use sha2::{Digest, Sha256};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tempfile::NamedTempFile;
use thiserror::Error;

const BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("checksum mismatch for {path}: expected {expected}, got {actual}")]
    Checksum {
        path: PathBuf,
        expected: String,
        actual: String,
    },
    #[error("download cancelled by user")]
    Cancelled,
}

/// Receives transfer progress from a [`Fetcher`].
pub trait FetchProgress {
    /// Called once before any data arrives; `total` is the size if the server
    /// announced one.
    fn start(&mut self, total: Option<u64>);

    /// Called with the cumulative number of bytes received.
    fn advance(&mut self, received: u64);
}

/// A progress sink that ignores everything.
pub struct NoProgress;

impl FetchProgress for NoProgress {
    fn start(&mut self, _total: Option<u64>) {}
    fn advance(&mut self, _received: u64) {}
}

/// Fetches a URL into a local file.
pub trait Fetcher {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        sha256: Option<&str>,
        progress: &mut dyn FetchProgress,
    ) -> Result<(), FetchError>;
}

/// A blocking HTTP(S) fetcher.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    running: Arc<AtomicBool>,
}

impl HttpFetcher {
    /// `running` is polled between chunks; clearing it cancels the transfer.
    pub fn new(running: Arc<AtomicBool>) -> Result<Self, FetchError> {
        let client = reqwest::blocking::Client::builder()
            .user_agent(concat!("nhflash/", env!("CARGO_PKG_VERSION")))
            // Artifacts are hundreds of megabytes; only bound the connect.
            .timeout(None)
            .connect_timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|source| FetchError::Request {
                url: String::new(),
                source,
            })?;
        Ok(Self { client, running })
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(
        &self,
        url: &str,
        destination: &Path,
        sha256: Option<&str>,
        progress: &mut dyn FetchProgress,
    ) -> Result<(), FetchError> {
        tracing::info!("downloading {url} to {}", destination.display());

        let request_error = |source| FetchError::Request {
            url: url.to_string(),
            source,
        };
        let mut response = self.client.get(url).send().map_err(request_error)?;
        if !response.status().is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }

        let io_error = |source| FetchError::Io {
            path: destination.to_path_buf(),
            source,
        };
        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut temp_file = NamedTempFile::new_in(dir).map_err(io_error)?;

        progress.start(response.content_length());

        let mut hasher = Sha256::new();
        let mut buffer = vec![0u8; BUFFER_SIZE];
        let mut received: u64 = 0;
        loop {
            if !self.running.load(Ordering::SeqCst) {
                // Dropping `temp_file` removes the partial download.
                return Err(FetchError::Cancelled);
            }

            let n = match response.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(io_error(e)),
            };
            temp_file.write_all(&buffer[..n]).map_err(io_error)?;
            hasher.update(&buffer[..n]);
            received += n as u64;
            progress.advance(received);
        }
        temp_file.flush().map_err(io_error)?;

        if let Some(expected) = sha256 {
            let actual = hex(&hasher.finalize());
            if !actual.eq_ignore_ascii_case(expected.trim()) {
                return Err(FetchError::Checksum {
                    path: destination.to_path_buf(),
                    expected: expected.to_string(),
                    actual,
                });
            }
        }

        temp_file
            .persist(destination)
            .map_err(|e| io_error(e.error))?;
        tracing::debug!("wrote {received} bytes to {}", destination.display());
        Ok(())
    }
}

/// Computes the SHA-256 of a file on disk as lowercase hex.
pub fn file_sha256(path: &Path) -> io::Result<String> {
    let mut file = fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0u8; BUFFER_SIZE];
    loop {
        let n = file.read(&mut buffer)?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }
    Ok(hex(&hasher.finalize()))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hashes_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("abc.bin");
        fs::write(&path, b"abc").unwrap();
        assert_eq!(
            file_sha256(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }
}
