//! # Peer Manifests
//!
//! Each peer starts from a manifest listing the files it owns and the files it
//! wants. On disk a manifest is the whitespace-separated text file
//! `in<N>.txt` for peer `N`:
//!
//! ```text
//! <owned count>
//! <name> <segment count>
//! <hash>
//! ...
//! <wanted count>
//! <name>
//! ...
//! ```
//!
//! An owned file holds segments `0..segment count`, hashes in index order.

use crate::error::ManifestError;
use crate::peer::PeerId;
use crate::segment::FileManifest;

use anyhow::{Context, Result};

use std::fs;
use std::path::{Path, PathBuf};
use std::str::SplitWhitespace;

/// Files a peer starts with and files it wants.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub owned: Vec<FileManifest>,
    pub wanted: Vec<String>,
}

impl Manifest {
    pub fn new(owned: Vec<FileManifest>, wanted: Vec<String>) -> Self {
        Manifest { owned, wanted }
    }

    /// Parse a manifest from its text form.
    pub fn parse(text: &str) -> Result<Manifest, ManifestError> {
        let mut tokens = Tokens(text.split_whitespace());

        let nb_owned = tokens.number("owned file count")?;
        let mut owned = Vec::new();
        for _ in 0..nb_owned {
            let name = tokens.word("owned file name")?;
            let nb_segments = tokens.number("segment count")?;
            let hashes = (0..nb_segments)
                .map(|_| tokens.word("segment hash"))
                .collect::<Result<Vec<_>, _>>()?;
            owned.push(FileManifest::complete(name, hashes));
        }

        let nb_wanted = tokens.number("wanted file count")?;
        let wanted = (0..nb_wanted)
            .map(|_| tokens.word("wanted file name"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Manifest { owned, wanted })
    }

    /// Read and parse a manifest file.
    pub fn load(path: &Path) -> Result<Manifest> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("could not read manifest '{}'", path.display()))?;

        Manifest::parse(&text).with_context(|| format!("invalid manifest '{}'", path.display()))
    }
}

/// Path of the manifest of `peer` inside `dir`.
pub fn manifest_path(dir: &Path, peer: PeerId) -> PathBuf {
    dir.join(format!("in{peer}.txt"))
}

/// Count the consecutive `in1.txt`, `in2.txt`, ... manifests in `dir`.
pub fn count_manifests(dir: &Path) -> u32 {
    (1..)
        .take_while(|id| manifest_path(dir, PeerId::new(*id)).is_file())
        .count() as u32
}

struct Tokens<'a>(SplitWhitespace<'a>);

impl Tokens<'_> {
    fn word(&mut self, what: &'static str) -> Result<String, ManifestError> {
        self.0
            .next()
            .map(str::to_string)
            .ok_or(ManifestError::UnexpectedEnd(what))
    }

    fn number(&mut self, what: &'static str) -> Result<u32, ManifestError> {
        let word = self.word(what)?;
        word.parse()
            .map_err(|_| ManifestError::InvalidNumber { what, found: word })
    }
}
