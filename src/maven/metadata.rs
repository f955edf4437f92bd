use crate::engine::transport::Transport;
use crate::error::{BootError, Result};
use crate::maven::revision;
use quick_xml::de::from_str;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
struct MavenMetadata {
    versioning: Versioning,
}

#[derive(Debug, Deserialize)]
struct Versioning {
    release: Option<String>,
    #[serde(default)]
    versions: Versions,
}

#[derive(Debug, Default, Deserialize)]
struct Versions {
    #[serde(default)]
    version: Vec<String>,
}

/// Revisions listed by a `maven-metadata.xml` document.
pub fn parse_versions(text: &str) -> Result<Vec<String>> {
    let metadata: MavenMetadata = from_str(text)
        .map_err(|e| BootError::Metadata(format!("Failed to parse Maven metadata: {e}")))?;

    let mut versions = metadata.versioning.versions.version;
    if let Some(release) = metadata.versioning.release {
        if !versions.contains(&release) {
            versions.push(release);
        }
    }
    Ok(versions)
}

/// Looks up published revisions across Maven-layout repository roots.
pub struct MetadataClient<'a> {
    transport: &'a Transport,
    roots: Vec<Url>,
}

impl<'a> MetadataClient<'a> {
    pub fn new(transport: &'a Transport, roots: Vec<Url>) -> Self {
        Self { transport, roots }
    }

    /// Newest revision of `group:artifact`, taken from the first repository
    /// whose metadata lists a matching revision.
    pub fn latest_revision(
        &self,
        group: &str,
        artifact: &str,
        release_only: bool,
    ) -> Result<Option<String>> {
        for root in &self.roots {
            let url = metadata_url(root, group, artifact)?;
            let Some(text) = self.transport.fetch_text(&url)? else {
                continue;
            };
            let versions = parse_versions(&text)?;
            if let Some(latest) = revision::latest(&versions, release_only) {
                return Ok(Some(latest));
            }
        }
        Ok(None)
    }
}

fn metadata_url(root: &Url, group: &str, artifact: &str) -> Result<Url> {
    let raw = format!(
        "{}/{}/{}/maven-metadata.xml",
        root.as_str().trim_end_matches('/'),
        group.replace('.', "/"),
        artifact
    );
    Url::parse(&raw).map_err(|e| BootError::Metadata(format!("Invalid metadata URL {raw}: {e}")))
}
