//! # External Converter Backend
//!
//! Runs a converter program once per call. The program owns the CAD kernel;
//! this side only builds arguments, enforces a deadline, and reads results.
//!
//! ## Converter Protocol
//!
//! ```text
//! <program> svg --input IN --output OUT.svg --width W --height H \
//!               --margin-left L --margin-top T --projection X,Y,Z \
//!               [--show-axes] [--show-hidden] [--focus F]
//! <program> stl --input IN --output OUT.stl --tolerance TOL
//! ```
//!
//! Exit status 0 means `OUT` holds the artifact. Any other status is a
//! generation failure; the last line of stderr becomes the error message.

use std::ffi::OsString;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStderr, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use stp_core::Tolerance;

use crate::svg::SvgOptions;
use crate::traits::{EngineError, GeometryEngine};

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// How long stderr may stay open after the converter itself has exited.
const STDERR_GRACE: Duration = Duration::from_millis(500);

/// Geometry engine backed by an external converter process.
#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: PathBuf,
    timeout: Duration,
}

impl CommandEngine {
    pub fn new(program: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
        }
    }

    fn run(&self, args: Vec<OsString>) -> Result<(), EngineError> {
        let started = Instant::now();
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| EngineError::Spawn {
                program: self.program.display().to_string(),
                source,
            })?;

        // Drain stderr concurrently so a chatty converter cannot block on a
        // full pipe while we wait for it. Helpers the converter forks may
        // keep the pipe open after it exits, so chunks come back over a
        // channel instead of a join.
        let stderr = spawn_stderr_reader(child.stderr.take());

        let deadline = started + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(err) => {
                    reap(&mut child);
                    return Err(err.into());
                }
            }
            if Instant::now() >= deadline {
                reap(&mut child);
                tracing::warn!(
                    program = %self.program.display(),
                    timeout_secs = self.timeout.as_secs(),
                    "geometry engine killed after timeout"
                );
                return Err(EngineError::Timeout(self.timeout));
            }
            std::thread::sleep(POLL_INTERVAL);
        };

        let grace = deadline
            .saturating_duration_since(Instant::now())
            .min(STDERR_GRACE);
        let (stderr, complete) = collect_stderr(&stderr, Instant::now() + grace);
        if !complete {
            tracing::warn!(
                program = %self.program.display(),
                "converter exited with stderr still held open; output may be truncated"
            );
        }
        tracing::debug!(
            program = %self.program.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            %status,
            "geometry engine finished"
        );

        if status.success() {
            Ok(())
        } else {
            Err(EngineError::Failed(failure_message(&stderr, status)))
        }
    }
}

/// Kill the child and wait for it so it never outlives the call.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

/// Forward stderr chunks until EOF. The channel disconnects when the pipe
/// closes.
fn spawn_stderr_reader(pipe: Option<ChildStderr>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    if let Some(mut pipe) = pipe {
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match pipe.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });
    }
    rx
}

/// Gather stderr received before `deadline`. The flag reports whether the
/// pipe reached EOF.
fn collect_stderr(rx: &Receiver<Vec<u8>>, deadline: Instant) -> (String, bool) {
    let mut bytes = Vec::new();
    let complete = loop {
        match rx.recv_timeout(deadline.saturating_duration_since(Instant::now())) {
            Ok(chunk) => bytes.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break true,
            Err(RecvTimeoutError::Timeout) => {
                bytes.extend(rx.try_iter().flatten());
                break false;
            }
        }
    };
    (String::from_utf8_lossy(&bytes).into_owned(), complete)
}

/// Last non-empty stderr line, or the exit status if stderr was silent.
fn failure_message(stderr: &str, status: ExitStatus) -> String {
    stderr
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| format!("converter exited with {status}"))
}

fn svg_args(input: &Path, output: &Path, options: &SvgOptions) -> Vec<OsString> {
    let [x, y, z] = options.projection_dir;
    let mut args: Vec<OsString> = vec![
        "svg".into(),
        "--input".into(),
        input.into(),
        "--output".into(),
        output.into(),
        "--width".into(),
        options.width.to_string().into(),
        "--height".into(),
        options.height.to_string().into(),
        "--margin-left".into(),
        options.margin_left.to_string().into(),
        "--margin-top".into(),
        options.margin_top.to_string().into(),
        "--projection".into(),
        format!("{x},{y},{z}").into(),
    ];
    if options.show_axes {
        args.push("--show-axes".into());
    }
    if options.show_hidden {
        args.push("--show-hidden".into());
    }
    if let Some(focus) = options.focus {
        args.push("--focus".into());
        args.push(focus.to_string().into());
    }
    args
}

fn stl_args(input: &Path, output: &Path, tolerance: Tolerance) -> Vec<OsString> {
    vec![
        "stl".into(),
        "--input".into(),
        input.into(),
        "--output".into(),
        output.into(),
        "--tolerance".into(),
        tolerance.to_string().into(),
    ]
}

impl GeometryEngine for CommandEngine {
    fn render_svg(&self, input: &Path, options: &SvgOptions) -> Result<String, EngineError> {
        let scratch = tempfile::Builder::new()
            .prefix("stp-preview-")
            .suffix(".svg")
            .tempfile()?;
        self.run(svg_args(input, scratch.path(), options))?;

        let bytes = std::fs::read(scratch.path())?;
        if bytes.is_empty() {
            return Err(EngineError::InvalidOutput("empty SVG document".into()));
        }
        String::from_utf8(bytes)
            .map_err(|e| EngineError::InvalidOutput(format!("SVG is not UTF-8: {e}")))
    }

    fn export_stl(
        &self,
        input: &Path,
        tolerance: Tolerance,
        output: &Path,
    ) -> Result<(), EngineError> {
        self.run(stl_args(input, output, tolerance))
    }
}
