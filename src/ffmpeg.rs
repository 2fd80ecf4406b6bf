use crate::error::MergeError;
use std::ffi::OsString;
use std::fs;
use std::io::{self, Read as _, Write as _};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};

/// Input list consumed by ffmpeg's concat demuxer, transient like the temp
/// output it sits next to.
const LIST_FILE: &str = "concat_list.txt";

/// Adapter around the ffmpeg binary, the only thing here that touches video
/// bytes.
#[derive(Debug, Clone)]
pub struct Ffmpeg {
    program: OsString,
}

impl Default for Ffmpeg {
    fn default() -> Self {
        Self::new("ffmpeg")
    }
}

impl Ffmpeg {
    pub fn new(program: impl Into<OsString>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Concatenate `inputs` in the given order into `output`.
    ///
    /// On failure `output` is removed again, whatever ffmpeg managed to write
    /// must never look like a finished artifact.
    pub fn concatenate(&self, inputs: &[PathBuf], output: &Path) -> Result<(), MergeError> {
        let list = output.with_file_name(LIST_FILE);

        let result = write_list(&list, inputs).and_then(|()| self.run_concat(&list, output));

        let _ = fs::remove_file(&list);

        if result.is_err() {
            let _ = fs::remove_file(output);
        }

        result
    }

    fn run_concat(&self, list: &Path, output: &Path) -> Result<(), MergeError> {
        let child = Command::new(&self.program)
            .args(["-y", "-hide_banner", "-loglevel", "error"])
            .args(["-safe", "0", "-f", "concat", "-i"])
            .arg(list)
            .args(["-c", "copy"])
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| match source.kind() {
                io::ErrorKind::NotFound => MergeError::EngineMissing {
                    program: self.program.clone(),
                    source,
                },
                _ => MergeError::EngineIo { source },
            })?;

        let mut child = KillOnDrop(Some(child));

        let mut stderr = String::new();
        if let Some(pipe) = child.stderr() {
            pipe.read_to_string(&mut stderr)
                .map_err(|source| MergeError::EngineIo { source })?;
        }

        let status = child
            .wait()
            .map_err(|source| MergeError::EngineIo { source })?;

        if !status.success() {
            return Err(MergeError::EngineFailed {
                status,
                stderr: stderr.trim().to_string(),
            });
        }

        Ok(())
    }
}

fn write_list(list: &Path, inputs: &[PathBuf]) -> Result<(), MergeError> {
    let engine_io = |source| MergeError::EngineIo { source };

    let mut file = fs::File::create(list).map_err(engine_io)?;

    for input in inputs {
        writeln!(file, "file '{}'", escape(input)).map_err(engine_io)?;
    }

    file.sync_all().map_err(engine_io)
}

/// Quote a path for a concat list entry, the demuxer reads single quoted
/// strings with `'\''` for a literal quote.
fn escape(path: &Path) -> String {
    path.display().to_string().replace('\'', r"'\''")
}

/// Kills the ffmpeg child if the adapter bails out while the process is
/// still running, an abandoned merge must not keep running in the
/// background.
struct KillOnDrop(Option<Child>);

impl KillOnDrop {
    fn stderr(&mut self) -> Option<&mut std::process::ChildStderr> {
        self.0.as_mut().and_then(|child| child.stderr.as_mut())
    }

    fn wait(mut self) -> io::Result<ExitStatus> {
        let Some(mut child) = self.0.take() else {
            return Err(io::Error::other("child already reaped"));
        };

        let status = child.wait();

        if status.is_err() {
            let _ = child.kill();
        }

        status
    }
}

impl Drop for KillOnDrop {
    fn drop(&mut self) {
        if let Some(mut child) = self.0.take() {
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
