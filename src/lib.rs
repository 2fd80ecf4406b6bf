use anyhow::Context as _;
use clap::Parser;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub mod error;
pub mod ffmpeg;
pub mod ledger;
pub mod scan;

pub use error::MergeError;
pub use ffmpeg::Ffmpeg;
pub use ledger::{MergeLedger, LEDGER_FILE};
pub use scan::{is_video_file, scan_videos, VideoFile};

pub const OUTPUT_FILE: &str = "merged_video.mp4";
pub const TEMP_FILE: &str = "temp.mp4";

#[derive(Debug, Parser)]
/// Merge every video found under a directory into a single `merged_video.mp4`,
/// skipping files that already went into it on a previous run
pub struct Args {
    /// The directory holding the videos to merge
    location: String,
}

impl Args {
    pub fn exec(&self) -> anyhow::Result<()> {
        let dir = MergeDir::resolve(Path::new(&self.location))?;
        let engine = Ffmpeg::default();

        match run(&dir, &engine)? {
            Outcome::Skipped => log::info!("no files to be merged"),
            Outcome::Recovered => {
                log::info!("finished the ledger update left over by an interrupted run")
            }
            Outcome::Merged { inputs } => {
                log::info!("merged {} files into {:?}", inputs, dir.output())
            }
        }

        Ok(())
    }
}

/// Resolved locations of everything a run touches, built once per run and
/// handed to each component. No shared globals.
#[derive(Debug, Clone)]
pub struct MergeDir {
    root: PathBuf,
    output: PathBuf,
    temp: PathBuf,
}

impl MergeDir {
    pub fn resolve(location: &Path) -> anyhow::Result<Self> {
        let root = location
            .canonicalize()
            .with_context(|| format!("cannot resolve {:?}", location))?;

        anyhow::ensure!(root.is_dir(), "{:?} is not a directory", root);

        Ok(Self {
            output: root.join(OUTPUT_FILE),
            temp: root.join(TEMP_FILE),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    pub fn temp(&self) -> &Path {
        &self.temp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing new on disk, nothing mutated.
    Skipped,
    /// A previous run published its artifact but died before swapping the
    /// ledger in. The swap was completed and nothing else was pending.
    Recovered,
    /// A merge ran, `inputs` counts the streams handed to the engine.
    Merged { inputs: usize },
}

/// One full orchestration pass: scan, diff against the ledger, merge the
/// delta behind the previously published artifact, publish atomically.
pub fn run(dir: &MergeDir, engine: &Ffmpeg) -> Result<Outcome, MergeError> {
    let recovered = recover(dir)?;

    let videos = scan_videos(dir.root())?;
    log::info!("{} video files under {:?}", videos.len(), dir.root());

    let mut candidates: BTreeSet<PathBuf> = videos.into_iter().map(|v| v.path).collect();
    // A temp output is never a merge candidate, even a stale one.
    candidates.remove(dir.temp());

    let ledger = MergeLedger::load(dir.root(), dir.output())?;
    let delta = ledger.diff(&candidates);

    if delta.is_empty() {
        return Ok(if recovered {
            Outcome::Recovered
        } else {
            Outcome::Skipped
        });
    }

    // The published artifact already carries everything merged so far, so it
    // goes in first and the new files are appended behind it in path order.
    let mut inputs = Vec::with_capacity(delta.len() + 1);
    if dir.output().exists() {
        inputs.push(dir.output().to_path_buf());
    }
    inputs.extend(delta.iter().cloned());

    for path in &delta {
        log::info!("to merge: {:?}", path);
    }

    engine.concatenate(&inputs, dir.temp())?;

    ledger.stage(&delta).map_err(|why| {
        let _ = fs::remove_file(dir.temp());
        why
    })?;

    if let Err(why) = publish(dir) {
        let _ = fs::remove_file(dir.temp());
        ledger.discard_staged();
        return Err(why);
    }

    // If this last step fails the staged file stays behind and the next run
    // completes the swap, see `recover`.
    ledger.commit_staged()?;

    Ok(Outcome::Merged {
        inputs: inputs.len(),
    })
}

/// Resolve leftovers of a crashed run before anything else looks at the
/// directory.
///
/// The success path orders its steps as: write `temp`, stage the ledger,
/// rename `temp` onto the output, rename the staged ledger onto the ledger.
/// What survived a crash tells where it stopped:
/// - staged ledger without `temp`: the artifact was published, only the
///   ledger swap is missing. Finish it.
/// - staged ledger next to a `temp`: died before publishing, the live state
///   is still consistent. Drop both leftovers and merge again.
/// - `temp` alone: died inside the engine. Drop it.
fn recover(dir: &MergeDir) -> Result<bool, MergeError> {
    let staging = ledger::staging_path(dir.root());

    match (staging.exists(), dir.temp().exists()) {
        (true, false) => {
            log::warn!("completing the ledger swap of an interrupted run");
            fs::rename(&staging, dir.root().join(LEDGER_FILE)).map_err(|source| {
                MergeError::LedgerWrite {
                    path: staging,
                    source,
                }
            })?;
            Ok(true)
        }
        (true, true) => {
            log::warn!("dropping unpublished leftovers of an interrupted run");
            let _ = fs::remove_file(&staging);
            let _ = fs::remove_file(dir.temp());
            Ok(false)
        }
        (false, true) => {
            log::warn!("dropping stale temp output {:?}", dir.temp());
            let _ = fs::remove_file(dir.temp());
            Ok(false)
        }
        (false, false) => Ok(false),
    }
}

fn publish(dir: &MergeDir) -> Result<(), MergeError> {
    fs::rename(dir.temp(), dir.output()).map_err(|source| MergeError::Publish {
        path: dir.output().to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_directory_argument_is_required() {
        assert!(Args::try_parse_from(["merge_new_videos"]).is_err());
        assert!(Args::try_parse_from(["merge_new_videos", "."]).is_ok());
    }

    #[test]
    fn resolve_rejects_a_missing_directory() {
        let dir = tempfile::tempdir().unwrap();

        assert!(MergeDir::resolve(&dir.path().join("gone")).is_err());
    }

    #[test]
    fn resolve_rejects_a_plain_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("a.mp4");
        fs::write(&file, b"a").unwrap();

        assert!(MergeDir::resolve(&file).is_err());
    }
}
