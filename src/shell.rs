use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::config::ExplorerConfig;
use crate::error::{Error, Result};
use crate::use_flags::UseEvaluator;

// `$1` is the file to source; its own output is discarded so only the
// final echo reaches stdout.
const SOURCE_SCRIPT: &str = r#"unset USE; source "$1" >/dev/null 2>&1; echo "${USE}""#;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Evaluates `make.defaults` by sourcing it in a real shell.
///
/// The shell runs with a cleared environment (only a fixed `PATH`) and is
/// killed when it exceeds the timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellEvaluator {
    shell: String,
    timeout: Duration,
}

impl ShellEvaluator {
    /// Evaluator running `shell` with the given timeout.
    pub fn new(shell: impl Into<String>, timeout: Duration) -> Self {
        ShellEvaluator {
            shell: shell.into(),
            timeout,
        }
    }

    /// Evaluator using the shell and timeout of `config`.
    pub fn from_config(config: &ExplorerConfig) -> Self {
        Self::new(config.shell.clone(), config.shell_timeout())
    }

    fn failure(path: &Path, reason: impl Into<String>) -> Error {
        Error::ShellEval {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

impl UseEvaluator for ShellEvaluator {
    fn use_tokens(&self, make_defaults: &Path) -> Result<Vec<String>> {
        let mut child = Command::new(&self.shell)
            .arg("-c")
            .arg(SOURCE_SCRIPT)
            .arg("make.defaults")
            .arg(make_defaults)
            .env_clear()
            .env("PATH", "/usr/bin:/bin")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| Self::failure(make_defaults, format!("spawning {}: {e}", self.shell)))?;

        let mut stdout = child
            .stdout
            .take()
            .ok_or_else(|| Self::failure(make_defaults, "stdout not captured"))?;
        // Drain stdout on its own thread so a chatty child cannot block on a
        // full pipe while we poll for exit. Background jobs of the script may
        // hold the pipe open after the shell exits, so the read is bounded by
        // the same deadline.
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            let mut out = String::new();
            let _ = tx.send(stdout.read_to_string(&mut out).map(|_| out));
        });

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) if Instant::now() >= deadline => {
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(Self::failure(
                        make_defaults,
                        format!("timed out after {:?}", self.timeout),
                    ));
                }
                Ok(None) => thread::sleep(POLL_INTERVAL),
                Err(e) => return Err(Self::failure(make_defaults, e.to_string())),
            }
        };

        if !status.success() {
            return Err(Self::failure(make_defaults, format!("shell exited with {status}")));
        }

        let remaining = deadline.saturating_duration_since(Instant::now());
        let output = match rx.recv_timeout(remaining) {
            Ok(read) => read.map_err(|e| Self::failure(make_defaults, e.to_string()))?,
            Err(mpsc::RecvTimeoutError::Timeout) => {
                return Err(Self::failure(
                    make_defaults,
                    format!("output still open after {:?}", self.timeout),
                ))
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => {
                return Err(Self::failure(make_defaults, "stdout reader stopped"))
            }
        };
        debug!("{} evaluated to {:?}", make_defaults.display(), output.trim());
        Ok(output.split_whitespace().map(str::to_string).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MinusStarPolicy;
    use crate::use_flags::profile_use_flags;
    use std::fs;

    fn have_bash() -> bool {
        Path::new("/bin/bash").exists()
    }

    #[test]
    fn sources_make_defaults() {
        if !have_bash() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("make.defaults");
        fs::write(&path, "USE=\"use -flag\"\nUSE=\"${USE} -use abc\"\necho noise\n").unwrap();

        let evaluator = ShellEvaluator::new("/bin/bash", Duration::from_secs(10));
        let tokens = evaluator.use_tokens(&path).unwrap();
        assert_eq!(tokens, ["use", "-flag", "-use", "abc"]);
    }

    #[test]
    fn inherited_environment_is_ignored() {
        if !have_bash() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("make.defaults");
        fs::write(&path, "USE=\"${USE} x\"\n").unwrap();

        let evaluator = ShellEvaluator::new("/bin/bash", Duration::from_secs(10));
        assert_eq!(evaluator.use_tokens(&path).unwrap(), ["x"]);
    }

    #[test]
    fn timeout_is_an_error() {
        if !have_bash() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("make.defaults");
        fs::write(&path, "while :; do :; done\n").unwrap();

        let evaluator = ShellEvaluator::new("/bin/bash", Duration::from_millis(200));
        let err = evaluator.use_tokens(&path).unwrap_err();
        assert!(matches!(err, Error::ShellEval { ref reason, .. } if reason.contains("timed out")));
    }

    #[cfg(unix)]
    #[test]
    fn background_job_holding_stdout_times_out() {
        use std::os::unix::fs::PermissionsExt;

        if !have_bash() || !Path::new("/bin/sleep").exists() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("make.defaults");
        fs::write(&path, "USE=\"a\"\n").unwrap();
        // A shell that exits at once but leaves a child owning its stdout.
        let shell = tmp.path().join("leaky-shell");
        fs::write(&shell, "#!/bin/bash\n/bin/sleep 30 &\necho a\n").unwrap();
        fs::set_permissions(&shell, fs::Permissions::from_mode(0o755)).unwrap();

        let evaluator = ShellEvaluator::new(shell.to_string_lossy(), Duration::from_millis(500));
        let started = Instant::now();
        let err = evaluator.use_tokens(&path).unwrap_err();
        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(
            matches!(err, Error::ShellEval { ref reason, .. } if reason.contains("still open"))
        );
    }

    #[test]
    fn failing_exit_yields_no_flags() {
        if !have_bash() {
            return;
        }
        let tmp = tempfile::tempdir().unwrap();
        fs::write(tmp.path().join("make.defaults"), "USE=\"a b\"\nexit 3\n").unwrap();

        let evaluator = ShellEvaluator::new("/bin/bash", Duration::from_secs(10));
        let err = evaluator
            .use_tokens(&tmp.path().join("make.defaults"))
            .unwrap_err();
        assert!(matches!(err, Error::ShellEval { ref reason, .. } if reason.contains("exited")));
        assert!(profile_use_flags(&evaluator, tmp.path(), MinusStarPolicy::Literal).is_empty());
    }

    #[test]
    fn missing_shell_is_an_error() {
        let evaluator = ShellEvaluator::new("/nonexistent/shell", Duration::from_secs(1));
        let err = evaluator
            .use_tokens(Path::new("/nonexistent/make.defaults"))
            .unwrap_err();
        assert!(matches!(err, Error::ShellEval { .. }));
    }
}
