//! Sidecar metadata deciding whether an existing output can be reused.
//!
//! Stored next to each output as `<output>.remap.json`.

use crate::error::{Result, RewriteError};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

const METADATA_SUFFIX: &str = ".remap.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewriteMetadata {
    pub rewriter: String,
    pub input_sha256: String,
    pub layers: Vec<String>,
    pub flags: Vec<String>,
    #[serde(default)]
    pub written_at_unix_ms: u64,
}

impl RewriteMetadata {
    /// Same inputs, ignoring when the output was written
    pub fn is_same_build(&self, other: &RewriteMetadata) -> bool {
        self.rewriter == other.rewriter
            && self.input_sha256 == other.input_sha256
            && self.layers == other.layers
            && self.flags == other.flags
    }
}

pub fn metadata_path(output: &Path) -> PathBuf {
    let mut name = OsString::from(output.as_os_str());
    name.push(METADATA_SUFFIX);
    PathBuf::from(name)
}

pub fn file_sha256(path: &Path) -> Result<String> {
    let mut file = std::fs::File::open(path).map_err(|e| RewriteError::io(path, e))?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 64 * 1024];
    loop {
        let read = file.read(&mut buf).map_err(|e| RewriteError::io(path, e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

pub fn write_metadata(output: &Path, metadata: &RewriteMetadata) -> Result<()> {
    let path = metadata_path(output);
    let persisted = RewriteMetadata {
        written_at_unix_ms: unix_now_ms(),
        ..metadata.clone()
    };
    let bytes = serde_json::to_vec_pretty(&persisted)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, bytes).map_err(|e| RewriteError::io(&tmp, e))?;
    std::fs::rename(&tmp, &path).map_err(|e| RewriteError::io(&path, e))?;
    Ok(())
}

/// `None` when the sidecar is missing or unreadable
pub fn read_metadata(output: &Path) -> Option<RewriteMetadata> {
    let path = metadata_path(output);
    let bytes = std::fs::read(&path).ok()?;
    match serde_json::from_slice(&bytes) {
        Ok(metadata) => Some(metadata),
        Err(err) => {
            log::warn!("Ignoring corrupt rewrite metadata {}: {err}", path.display());
            None
        }
    }
}

pub fn remove_metadata(output: &Path) {
    let _ = std::fs::remove_file(metadata_path(output));
}

fn unix_now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn sample() -> RewriteMetadata {
        RewriteMetadata {
            rewriter: "tiny".to_string(),
            input_sha256: "00".to_string(),
            layers: vec!["aa".to_string()],
            flags: vec!["pass_through_resources".to_string()],
            written_at_unix_ms: 0,
        }
    }

    #[test]
    fn sidecar_sits_next_to_output() {
        assert_eq!(
            metadata_path(Path::new("/tmp/out/game-named.jar")),
            PathBuf::from("/tmp/out/game-named.jar.remap.json")
        );
    }

    #[test]
    fn metadata_round_trips_and_ignores_timestamp() {
        let temp = TempDir::new().expect("tempdir");
        let output = temp.path().join("out.jar");
        write_metadata(&output, &sample()).unwrap();

        let read = read_metadata(&output).unwrap();
        assert!(read.written_at_unix_ms > 0);
        assert!(read.is_same_build(&sample()));
        assert!(!temp.path().join("out.jar.remap.json.tmp").exists());

        remove_metadata(&output);
        assert!(read_metadata(&output).is_none());
    }

    #[test]
    fn corrupt_metadata_reads_as_missing() {
        let temp = TempDir::new().expect("tempdir");
        let output = temp.path().join("out.jar");
        std::fs::write(metadata_path(&output), b"{not json").unwrap();
        assert!(read_metadata(&output).is_none());
    }

    #[test]
    fn hashes_file_contents() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("a.bin");
        std::fs::write(&path, b"abc").unwrap();
        assert_eq!(
            file_sha256(&path).unwrap(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert!(file_sha256(&temp.path().join("missing")).is_err());
    }
}
