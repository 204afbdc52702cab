//! A child process polled for progress while it runs.
//!
//! Used when ktest re-executes itself to collect benchmark samples: every
//! `interval` the number of stdout lines seen so far is reported as a
//! single rewritten terminal line.

use crate::{AdapterError, CommandSpec};
use anyhow::Context;
use ktest_render::ansi::CLEAR_LINE;
use std::io::{BufRead, BufReader, Read, Write};
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WatchedRun {
    pub stdout: Vec<u8>,
    /// stdout lines, one per benchmark record.
    pub samples: usize,
}

pub fn run_watched(
    label: &str,
    spec: &CommandSpec,
    interval: Duration,
    progress: &mut dyn Write,
) -> Result<WatchedRun, AdapterError> {
    let Some((program, args)) = spec.argv.split_first() else {
        return Err(AdapterError::EmptyArgv);
    };
    tracing::debug!(command = %spec.display(), label, "exec watched");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(cwd) = &spec.cwd {
        cmd.current_dir(cwd);
    }
    for (k, v) in &spec.env {
        cmd.env(k, v);
    }
    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to spawn {:?}", spec.argv))?;

    let stdout = child.stdout.take().context("child stdout is not piped")?;
    let mut stderr = child.stderr.take().context("child stderr is not piped")?;

    let (tx, rx) = mpsc::channel::<Vec<u8>>();
    let reader = thread::spawn(move || {
        let mut lines = BufReader::new(stdout).split(b'\n');
        while let Some(Ok(line)) = lines.next() {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    let err_reader = thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = stderr.read_to_end(&mut buf);
        buf
    });

    let mut out = WatchedRun::default();
    let mut reported = 0;
    let mut ticker = Ticker::new(Instant::now(), interval);
    loop {
        let wait = ticker.next.saturating_duration_since(Instant::now());
        match rx.recv_timeout(wait) {
            Ok(line) => {
                out.stdout.extend_from_slice(&line);
                out.stdout.push(b'\n');
                out.samples += 1;
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
        if ticker.due(Instant::now()) {
            if out.samples != reported {
                reported = out.samples;
                let _ = write!(progress, "{CLEAR_LINE}running {label} benchmarks: got {reported} samples...");
                let _ = progress.flush();
            }
        }
    }

    let _ = reader.join();
    let stderr = err_reader.join().unwrap_or_default();
    let status = child.wait().context("wait for child")?;
    if !status.success() {
        let mut combined = String::from_utf8_lossy(&stderr).into_owned();
        combined.push_str(&String::from_utf8_lossy(&out.stdout));
        return Err(AdapterError::Watched {
            label: label.to_string(),
            reason: status.to_string(),
            output: combined,
        });
    }
    Ok(out)
}

/// Progress tick schedule; a late tick is not made up for.
#[derive(Debug, Clone, Copy)]
struct Ticker {
    next: Instant,
    interval: Duration,
}

impl Ticker {
    fn new(now: Instant, interval: Duration) -> Self {
        Self {
            next: now + interval,
            interval,
        }
    }

    fn due(&mut self, now: Instant) -> bool {
        if now < self.next {
            return false;
        }
        self.next = now + self.interval;
        true
    }
}


#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn sh(script: &str) -> CommandSpec {
        CommandSpec::new(["sh", "-c", script])
    }

    #[test]
    fn collects_stdout_and_counts_lines() {
        let mut progress = Vec::new();
        let run = run_watched(
            "KPHP",
            &sh("echo 'BenchmarkA 1 1 ns/op'; echo 'BenchmarkA 1 2 ns/op'; echo noise >&2"),
            Duration::from_secs(60),
            &mut progress,
        )
        .unwrap();
        assert_eq!(run.samples, 2);
        assert_eq!(run.stdout, b"BenchmarkA 1 1 ns/op\nBenchmarkA 1 2 ns/op\n");
        assert!(progress.is_empty());
    }

    #[test]
    fn reports_progress_when_count_changes() {
        let mut progress = Vec::new();
        run_watched(
            "PHP",
            &sh("echo a; echo b; sleep 0.3"),
            Duration::from_millis(50),
            &mut progress,
        )
        .unwrap();
        let text = String::from_utf8(progress).unwrap();
        assert!(text.contains("\x1b[2K\rrunning PHP benchmarks: got 2 samples..."), "{text:?}");
        assert_eq!(text.matches("got 2 samples").count(), 1, "{text:?}");
    }

    #[test]
    fn failure_carries_label_and_combined_output() {
        let mut progress = Vec::new();
        let err = run_watched("KPHP", &sh("echo partial; echo broken >&2; exit 2"), Duration::from_secs(60), &mut progress)
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.starts_with("run KPHP benchmarks: "), "{msg}");
        assert!(msg.ends_with("broken\npartial\n"), "{msg}");
    }
}
