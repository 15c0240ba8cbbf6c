//! # Completed File Output
//!
//! When a peer owns every segment of a file, the download worker hands the
//! file's ordered hash list to a [`CompletionSink`].
//!
//! - [`OutputDir`] writes `client<peer>_<file>` files, one hash per line
//! - [`MemorySink`] keeps completions in memory

use crate::peer::PeerId;

use anyhow::{anyhow, Context, Result};

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Receives the hash list of every file a peer completes.
pub trait CompletionSink: Send + Sync {
    /// Called once per completed file with its hashes in index order.
    fn file_completed(&self, peer: PeerId, file: &str, hashes: &[String]) -> Result<()>;
}

/// Writes completed files into a directory.
pub struct OutputDir {
    root: PathBuf,
}

impl OutputDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        OutputDir { root: root.into() }
    }

    /// Path of the artifact for `file` completed by `peer`.
    pub fn path_for(&self, peer: PeerId, file: &str) -> PathBuf {
        self.root.join(format!("client{}_{}", peer, sanitize_filename(file)))
    }
}

impl CompletionSink for OutputDir {
    fn file_completed(&self, peer: PeerId, file: &str, hashes: &[String]) -> Result<()> {
        let path = self.path_for(peer, file);
        write_hashes(&path, hashes).with_context(|| format!("could not write '{}'", path.display()))?;

        info!("Peer {} saved {:?} in \"{}\"", peer, file, path.display());

        Ok(())
    }
}

fn write_hashes(path: &Path, hashes: &[String]) -> Result<()> {
    let mut writer = BufWriter::new(File::create(path)?);
    for hash in hashes {
        writeln!(writer, "{hash}")?;
    }
    writer.flush()?;

    Ok(())
}

/// Sanitize a file name to prevent path traversal.
fn sanitize_filename(filename: &str) -> String {
    let safe_name = filename.replace(['/', '\\'], "_");

    if safe_name.trim().is_empty() {
        "download".to_string()
    } else {
        safe_name
    }
}

/// A completed file as seen by [`MemorySink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub peer: PeerId,
    pub file: String,
    pub hashes: Vec<String>,
}

/// Collects completions in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    completions: Mutex<Vec<Completion>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Default::default()
    }

    /// Every completion recorded so far, in arrival order.
    pub fn completions(&self) -> Result<Vec<Completion>> {
        let completions = self
            .completions
            .lock()
            .map_err(|_| anyhow!("completion list lock poisoned"))?;
        Ok(completions.clone())
    }

    /// Hashes of `file` as completed by `peer`, if it was.
    pub fn hashes_of(&self, peer: PeerId, file: &str) -> Result<Option<Vec<String>>> {
        Ok(self
            .completions()?
            .into_iter()
            .find(|completion| completion.peer == peer && completion.file == file)
            .map(|completion| completion.hashes))
    }
}

impl CompletionSink for MemorySink {
    fn file_completed(&self, peer: PeerId, file: &str, hashes: &[String]) -> Result<()> {
        self.completions
            .lock()
            .map_err(|_| anyhow!("completion list lock poisoned"))?
            .push(Completion {
                peer,
                file: file.to_string(),
                hashes: hashes.to_vec(),
            });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::fs;

    #[test]
    fn output_dir_writes_one_hash_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let sink = OutputDir::new(dir.path());
        let hashes = vec!["h0".to_string(), "h1".to_string()];

        sink.file_completed(PeerId::new(2), "file1", &hashes).unwrap();

        let written = fs::read_to_string(dir.path().join("client2_file1")).unwrap();
        assert_eq!(written, "h0\nh1\n");
    }

    #[test]
    fn output_paths_cannot_escape_the_directory() {
        let sink = OutputDir::new("/out");

        assert_eq!(
            sink.path_for(PeerId::new(1), "../etc"),
            PathBuf::from("/out/client1_.._etc")
        );
        assert_eq!(
            sink.path_for(PeerId::new(1), " "),
            PathBuf::from("/out/client1_download")
        );
    }

    #[test]
    fn memory_sink_keeps_completions_in_order() {
        let sink = MemorySink::new();

        sink.file_completed(PeerId::new(1), "a", &["x".to_string()]).unwrap();
        sink.file_completed(PeerId::new(2), "b", &[]).unwrap();

        let files: Vec<String> = sink
            .completions()
            .unwrap()
            .into_iter()
            .map(|completion| completion.file)
            .collect();
        assert_eq!(files, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(
            sink.hashes_of(PeerId::new(1), "a").unwrap(),
            Some(vec!["x".to_string()])
        );
        assert_eq!(sink.hashes_of(PeerId::new(1), "b").unwrap(), None);
    }
}
