use crate::error::{BootError, Result};
use indicatif::{ProgressBar, ProgressStyle};
use reqwest::StatusCode;
use reqwest::blocking::Client;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use url::Url;

pub const VERBOSE_ENV: &str = "BOOT_UPDATE_VERBOSE";
const MAX_DESCRIPTOR_BYTES: usize = 10 * 1024 * 1024;

fn verbose() -> bool {
    std::env::var(VERBOSE_ENV).is_ok()
}

/// Fetches repository resources over HTTP(S) or from `file:` URLs.
///
/// The HTTP client is built on first use, so a transport that only ever sees
/// local repositories never initialises one.
#[derive(Debug, Default)]
pub struct Transport {
    client: OnceLock<Client>,
}

impl Transport {
    pub fn new() -> Self {
        Self::default()
    }

    fn client(&self) -> Result<&Client> {
        if let Some(client) = self.client.get() {
            return Ok(client);
        }
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .user_agent(concat!("boot-update/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(self.client.get_or_init(|| client))
    }

    /// Reads a text resource such as a POM. `None` when the resource does not exist.
    pub fn fetch_text(&self, url: &Url) -> Result<Option<String>> {
        if let Some(path) = local_path(url) {
            if !path.is_file() {
                return Ok(None);
            }
            return Ok(Some(fs::read_to_string(path)?));
        }

        if verbose() {
            eprintln!("[VERBOSE] Fetching: {}", url);
        }

        let response = self.client()?.get(url.as_str()).send()?;
        if !check_status(response.status(), url)? {
            return Ok(None);
        }

        let text = response.text()?;
        if text.len() > MAX_DESCRIPTOR_BYTES {
            return Err(BootError::Metadata(format!(
                "{url} exceeded the 10MB descriptor limit"
            )));
        }
        Ok(Some(text))
    }

    /// Whether a resource exists, without downloading it.
    pub fn exists(&self, url: &Url) -> Result<bool> {
        if let Some(path) = local_path(url) {
            return Ok(path.is_file());
        }

        if verbose() {
            eprintln!("[VERBOSE] Checking: {}", url);
        }

        let response = self.client()?.head(url.as_str()).send()?;
        check_status(response.status(), url)
    }

    /// Copies or downloads `url` into `destination`, returning the byte count.
    ///
    /// Downloads go to a sibling `.part` file first so an interrupted transfer
    /// never leaves a truncated artifact behind.
    pub fn download(&self, url: &Url, destination: &Path) -> Result<u64> {
        if let Some(parent) = destination.parent() {
            fs::create_dir_all(parent)?;
        }

        if let Some(path) = local_path(url) {
            return Ok(fs::copy(path, destination)?);
        }

        let mut response = self.client()?.get(url.as_str()).send()?.error_for_status()?;

        let pb = match response.content_length() {
            Some(len) => ProgressBar::new(len),
            None => ProgressBar::new_spinner(),
        };
        pb.set_style(
            ProgressStyle::default_bar()
                .template("  [{bar:40}] {bytes}/{total_bytes} {msg}")
                .unwrap()
                .progress_chars("=>-"),
        );
        pb.set_message(file_name(url));

        let partial = partial_path(destination);
        let written = {
            let file = BufWriter::new(File::create(&partial)?);
            let mut writer = pb.wrap_write(file);
            let written = io::copy(&mut response, &mut writer)?;
            writer.flush()?;
            written
        };
        pb.finish_and_clear();

        fs::rename(&partial, destination)?;
        Ok(written)
    }
}

/// `Ok(false)` for a missing resource; any other failure status is an error.
fn check_status(status: StatusCode, url: &Url) -> Result<bool> {
    if status == StatusCode::NOT_FOUND {
        return Ok(false);
    }
    if !status.is_success() {
        if verbose() {
            eprintln!("[VERBOSE] HTTP {}: {}", status, url);
        }
        return Err(BootError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        });
    }
    Ok(true)
}

/// The filesystem path behind a `file:` URL.
pub fn local_path(url: &Url) -> Option<PathBuf> {
    if url.scheme() != "file" {
        return None;
    }
    url.to_file_path().ok()
}

fn file_name(url: &Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .unwrap_or_default()
        .to_string()
}

fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".part");
    destination.with_file_name(name)
}
