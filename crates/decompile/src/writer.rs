use crate::error::{DecompileError, Result};
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, DateTime, ZipWriter};

const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";
const MANIFEST: &[u8] = b"Manifest-Version: 1.0\r\n\r\n";

/// Directory entries already emitted, shared across everything writing one archive
pub type AddedDirectories = Arc<Mutex<HashSet<String>>>;

/// Sequential writer for one source archive.
///
/// Entries carry a fixed timestamp so identical inputs give identical entry contents.
pub struct ArchiveWriter {
    path: PathBuf,
    zip: ZipWriter<BufWriter<File>>,
    directories: AddedDirectories,
    entries: usize,
    bytes: u64,
}

impl ArchiveWriter {
    /// Create `path` and write the manifest
    pub fn create(path: &Path, directories: AddedDirectories) -> Result<Self> {
        let file = File::create(path).map_err(|e| DecompileError::io(path, e))?;
        let mut writer = Self {
            path: path.to_path_buf(),
            zip: ZipWriter::new(BufWriter::new(file)),
            directories,
            entries: 0,
            bytes: 0,
        };
        writer.write_entry(MANIFEST_PATH, MANIFEST)?;
        Ok(writer)
    }

    /// Write `data` at `name`, emitting each missing parent directory once
    pub fn write_entry(&mut self, name: &str, data: &[u8]) -> Result<()> {
        for (idx, _) in name.match_indices('/') {
            let dir = &name[..=idx];
            let added = self
                .directories
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(dir.to_string());
            if added {
                self.zip
                    .add_directory(dir, options())
                    .map_err(|e| DecompileError::archive(&self.path, e))?;
            }
        }

        self.zip
            .start_file(name, options().compression_method(CompressionMethod::Deflated))
            .map_err(|e| DecompileError::archive(&self.path, e))?;
        self.zip
            .write_all(data)
            .map_err(|e| DecompileError::io(&self.path, e))?;
        self.entries += 1;
        self.bytes += data.len() as u64;
        Ok(())
    }

    /// File entries written so far, manifest included
    pub fn entries(&self) -> usize {
        self.entries
    }

    pub fn bytes(&self) -> u64 {
        self.bytes
    }

    pub fn finish(self) -> Result<()> {
        let path = self.path;
        let mut inner = self
            .zip
            .finish()
            .map_err(|e| DecompileError::archive(&path, e))?;
        inner.flush().map_err(|e| DecompileError::io(&path, e))
    }
}

fn options() -> SimpleFileOptions {
    SimpleFileOptions::default().last_modified_time(DateTime::default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::TempDir;

    #[test]
    fn writes_manifest_and_each_directory_once() {
        let temp = TempDir::new().expect("tempdir");
        let path = temp.path().join("sources.jar");
        let dirs = AddedDirectories::default();

        let mut writer = ArchiveWriter::create(&path, dirs.clone()).unwrap();
        writer.write_entry("net/example/A.java", b"class A {}").unwrap();
        writer.write_entry("net/example/B.java", b"class B {}").unwrap();
        writer.write_entry("Top.java", b"class Top {}").unwrap();
        assert_eq!(writer.entries(), 4);
        writer.finish().unwrap();

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let names: Vec<String> = archive.file_names().map(str::to_string).collect();
        assert_eq!(
            names.iter().filter(|n| n.as_str() == "net/example/").count(),
            1
        );
        assert!(names.contains(&"META-INF/".to_string()));

        let mut manifest = String::new();
        archive
            .by_name(MANIFEST_PATH)
            .unwrap()
            .read_to_string(&mut manifest)
            .unwrap();
        assert!(manifest.starts_with("Manifest-Version: 1.0"));

        let mut guard = dirs.lock().unwrap();
        let mut seen: Vec<String> = guard.drain().collect();
        seen.sort();
        assert_eq!(seen, vec!["META-INF/", "net/", "net/example/"]);
    }
}
