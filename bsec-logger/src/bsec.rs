use crate::rotating_file::{RotateError, RotatingFile};
use std::io::{self, BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, info, warn};

pub const DEFAULT_COMMAND: &str = "./bsec_bme680";
pub const DEFAULT_WORKDIR: &str = "/home/pi/devel/bsec_bme680_linux";

#[derive(Debug, Error)]
pub enum BsecError {
    #[error("cannot start {command} in {workdir}: {source}")]
    Spawn {
        command: PathBuf,
        workdir: PathBuf,
        source: io::Error,
    },
    #[error("child process has no {0} pipe")]
    MissingPipe(&'static str),
    #[error("BSEC process ended: {0}")]
    Exited(ExitStatus),
    #[error(transparent)]
    Rotate(#[from] RotateError),
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Starts the BSEC binary with both output streams piped.
pub fn spawn(command: &Path, workdir: &Path) -> Result<Child, BsecError> {
    let child = Command::new(command)
        .current_dir(workdir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| BsecError::Spawn {
            command: command.to_path_buf(),
            workdir: workdir.to_path_buf(),
            source,
        })?;
    info!("Started {} (pid {})", command.display(), child.id());
    Ok(child)
}

/// Forwards every stderr line of the child to the log.
pub fn drain_stderr<R: Read + Send + 'static>(stderr: R) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut reader = BufReader::new(stderr);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => {
                    let line = String::from_utf8_lossy(&buf);
                    let line = line.trim();
                    if !line.is_empty() {
                        warn!("bsec: {}", line);
                    }
                }
                Err(err) => {
                    warn!("Reading BSEC stderr failed: {}", err);
                    break;
                }
            }
        }
    })
}

/// Copies non-empty, trimmed lines from `reader` to `log` until EOF.
/// Returns the number of lines written.
pub fn pump<R: BufRead>(mut reader: R, log: &mut RotatingFile) -> Result<usize, BsecError> {
    let mut buf = Vec::new();
    let mut written = 0;
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        log.write_line(line)?;
        written += 1;
        if written == 1 {
            debug!("First sample: {}", line);
        }
    }
    Ok(written)
}

/// Runs the child until its stdout closes. Always ends in an error: either the
/// failure that stopped the pump or the child's exit.
pub fn run(command: &Path, workdir: &Path, log: &mut RotatingFile) -> BsecError {
    let mut child = match spawn(command, workdir) {
        Ok(child) => child,
        Err(err) => return err,
    };
    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        let _ = child.kill();
        return BsecError::MissingPipe("stdout/stderr");
    };
    let stderr_thread = drain_stderr(stderr);

    let pumped = pump(BufReader::new(stdout), log);
    if pumped.is_err() {
        let _ = child.kill();
    }
    let status = child.wait();
    let _ = stderr_thread.join();

    match (pumped, status) {
        (Err(err), _) => err,
        (Ok(lines), Ok(status)) => {
            info!("Wrote {} lines before the BSEC process ended", lines);
            BsecError::Exited(status)
        }
        (Ok(_), Err(err)) => BsecError::Io(err),
    }
}
