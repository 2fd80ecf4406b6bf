use crate::error::MergeError;
use std::collections::BTreeSet;
use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

pub const LEDGER_FILE: &str = "mergedfiles.txt";

/// Record of every file already part of the published artifact, one absolute
/// path per line. The artifact's own path is never recorded.
#[derive(Debug)]
pub struct MergeLedger {
    path: PathBuf,
    staging: PathBuf,
    output: PathBuf,
    merged: BTreeSet<PathBuf>,
}

impl MergeLedger {
    /// Read the ledger sitting in `root`. A missing file means a first run
    /// and yields an empty ledger, anything else wrong with the file is
    /// fatal.
    pub fn load(root: &Path, output: &Path) -> Result<Self, MergeError> {
        let path = root.join(LEDGER_FILE);

        let merged = match fs::read(&path) {
            Ok(bytes) => parse(&path, &bytes)?,
            Err(source) if source.kind() == io::ErrorKind::NotFound => BTreeSet::new(),
            Err(source) => return Err(MergeError::LedgerUnreadable { path, source }),
        };

        log::debug!("{} files already merged", merged.len());

        Ok(Self {
            staging: staging_path(root),
            path,
            output: output.to_path_buf(),
            merged,
        })
    }

    pub fn merged(&self) -> &BTreeSet<PathBuf> {
        &self.merged
    }

    /// Candidates that still need to be merged, in ascending path order. The
    /// published artifact itself is never a candidate.
    pub fn diff(&self, candidates: &BTreeSet<PathBuf>) -> Vec<PathBuf> {
        candidates
            .iter()
            .filter(|path| !self.merged.contains(*path) && **path != self.output)
            .cloned()
            .collect()
    }

    /// Write the union of the current ledger and `merged_now` to the staging
    /// file. The live ledger stays untouched until [`Self::commit_staged`]
    /// renames the staging file over it.
    pub fn stage(&self, merged_now: &[PathBuf]) -> Result<(), MergeError> {
        let union: BTreeSet<&PathBuf> = self
            .merged
            .iter()
            .chain(merged_now)
            .filter(|path| **path != self.output)
            .collect();

        self.write_staging(&union).map_err(|source| {
            self.discard_staged();
            MergeError::LedgerWrite {
                path: self.staging.clone(),
                source,
            }
        })
    }

    /// Atomically swap the staged content in as the new ledger.
    pub fn commit_staged(&self) -> Result<(), MergeError> {
        fs::rename(&self.staging, &self.path).map_err(|source| MergeError::LedgerWrite {
            path: self.path.clone(),
            source,
        })
    }

    /// Best-effort removal of a staging leftover.
    pub fn discard_staged(&self) {
        let _ = fs::remove_file(&self.staging);
    }

    fn write_staging(&self, union: &BTreeSet<&PathBuf>) -> io::Result<()> {
        let mut file = fs::File::create(&self.staging)?;

        for path in union {
            writeln!(file, "{}", path.display())?;
        }

        file.sync_all()
    }
}

/// Where a half-finished ledger rewrite lives, next to the ledger itself so
/// the final rename never crosses a filesystem boundary.
pub fn staging_path(root: &Path) -> PathBuf {
    root.join(LEDGER_FILE).with_extension("txt.tmp")
}

fn parse(path: &Path, bytes: &[u8]) -> Result<BTreeSet<PathBuf>, MergeError> {
    let corrupt = |reason: String| MergeError::LedgerCorrupt {
        path: path.to_path_buf(),
        reason,
    };

    let text =
        std::str::from_utf8(bytes).map_err(|_| corrupt("not valid UTF-8".to_string()))?;

    let mut merged = BTreeSet::new();

    for line in text.lines() {
        if line.is_empty() {
            continue;
        }

        let entry = Path::new(line);

        if !entry.is_absolute() {
            return Err(corrupt(format!("relative entry {:?}", line)));
        }

        merged.insert(entry.to_path_buf());
    }

    Ok(merged)
}
