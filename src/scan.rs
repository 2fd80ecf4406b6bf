use crate::error::MergeError;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

const VIDEO_EXT: &str = "mp4";

/// A video discovered under the scan root. The path is absolute as long as
/// the root was resolved before scanning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoFile {
    pub path: PathBuf,
    pub size: u64,
}

/// Recursively collect every video file under `root`, sorted by file name
/// within each directory.
///
/// Any unreadable entry fails the whole scan, a partially walked tree would
/// make the ledger diff unsound.
pub fn scan_videos(root: &Path) -> Result<Vec<VideoFile>, MergeError> {
    let mut videos = Vec::new();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|source| scan_error(root, source))?;

        if !entry.file_type().is_file() || !is_video_file(entry.path()) {
            continue;
        }

        let size = entry
            .metadata()
            .map_err(|source| scan_error(root, source))?
            .len();

        if size == 0 {
            log::warn!("Empty video file {:?}", entry.path());
        }

        log::debug!("Video: {:?}", entry.path());

        videos.push(VideoFile {
            path: entry.into_path(),
            size,
        });
    }

    Ok(videos)
}

/// Whether the path carries the recognized video extension. Matches the
/// extension exactly and case-insensitively, `sample.mp4v.txt` is not a
/// video while `SAMPLE.MP4` is.
pub fn is_video_file(path: &Path) -> bool {
    path.extension()
        .filter(|ext| ext.eq_ignore_ascii_case(VIDEO_EXT))
        .is_some()
}

fn scan_error(root: &Path, source: walkdir::Error) -> MergeError {
    let path = source
        .path()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| root.to_path_buf());

    MergeError::Scan { path, source }
}
