//! Bounded shutdown for `std::process::Child` with SIGTERM → SIGKILL escalation.

use std::io;
use std::process::{Child, ExitStatus};
#[cfg(unix)]
use std::thread;
use std::time::Duration;
#[cfg(unix)]
use std::time::Instant;

#[cfg(unix)]
use nix::errno::Errno;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

#[cfg(unix)]
const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Shut down a child process, killing it if it outlives `grace`.
///
/// # Strategy
/// 1. Return immediately if the child has already exited
/// 2. Send SIGTERM and poll for exit for up to `grace`
/// 3. If still running, SIGKILL
/// 4. Wait for reaping (required to avoid zombies)
///
/// On non-Unix platforms the child is killed straight away.
pub fn terminate_child(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    if let Some(status) = child.try_wait()? {
        return Ok(status);
    }

    #[cfg(unix)]
    {
        terminate_unix(child, grace)
    }

    #[cfg(not(unix))]
    {
        let _ = grace;
        child.kill()?;
        child.wait()
    }
}

#[cfg(unix)]
fn terminate_unix(child: &mut Child, grace: Duration) -> io::Result<ExitStatus> {
    let raw_pid = i32::try_from(child.id()).map_err(io::Error::other)?;

    // Phase 1: SIGTERM with grace period
    if let Err(e) = signal::kill(Pid::from_raw(raw_pid), Signal::SIGTERM) {
        // Process may have already exited
        if e == Errno::ESRCH {
            return child.wait();
        }
        return Err(io::Error::other(e));
    }

    if let Some(status) = wait_timeout(child, grace)? {
        return Ok(status);
    }

    // Phase 2: SIGKILL (Child::kill uses SIGKILL on Unix)
    tracing::warn!(
        pid = raw_pid,
        grace_ms = grace.as_millis(),
        "Engine ignored SIGTERM, killing"
    );
    child.kill()?;

    // Phase 3: reap
    child.wait()
}

#[cfg(unix)]
/// Poll `try_wait` until the child exits or `timeout` elapses.
fn wait_timeout(child: &mut Child, timeout: Duration) -> io::Result<Option<ExitStatus>> {
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        let now = Instant::now();
        if now >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL.min(deadline - now));
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::process::Command;

    #[test]
    fn shutdown_responds_to_sigterm() {
        let mut child = Command::new("sleep")
            .arg("30")
            .spawn()
            .expect("failed to spawn sleep");

        let started = Instant::now();
        let status = terminate_child(&mut child, Duration::from_secs(5)).unwrap();
        assert!(!status.success());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn shutdown_escalates_when_sigterm_ignored() {
        let mut child = Command::new("sh")
            .args(["-c", "trap '' TERM; exec sleep 30"])
            .spawn()
            .expect("failed to spawn sh");

        // Let the shell install the trap before signalling.
        thread::sleep(Duration::from_millis(100));

        let started = Instant::now();
        let result = terminate_child(&mut child, Duration::from_millis(200));
        assert!(result.is_ok());
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn shutdown_handles_already_exited() {
        let mut child = Command::new("true").spawn().expect("failed to spawn true");
        thread::sleep(Duration::from_millis(100));

        let status = terminate_child(&mut child, Duration::from_secs(1)).unwrap();
        assert!(status.success());
    }
}
