//! Child process session
//!
//! Owns the launched child: spawns it in its own process group with both
//! output pipes captured, surfaces output and exit as non-blocking events,
//! and exposes suspend/resume/terminate via process-group signals.
//!
//! One blocking reader thread per pipe feeds a shared channel; a monitor
//! thread joins the readers before reaping the child, so the `Exited` event
//! is always delivered after every output chunk already produced.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, warn};

#[cfg(unix)]
use nix::sys::signal::{kill, Signal};
#[cfg(unix)]
use nix::unistd::Pid;

/// Failure to start the child process. Fatal; the session never reaches
/// a running state.
#[derive(Error, Debug)]
pub enum LaunchError {
    #[error("executable not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to spawn {0}: {1}")]
    Spawn(PathBuf, #[source] std::io::Error),
}

/// Control operation requested in an invalid state. Non-fatal; callers log
/// and move on.
#[derive(Error, Debug)]
pub enum ControlError {
    #[error("process already suspended")]
    AlreadySuspended,

    #[error("process not suspended")]
    NotSuspended,

    #[error("process has already exited")]
    Exited,

    #[error("signal delivery failed: {0}")]
    Signal(String),
}

/// Which output pipe a chunk came from. The two channels are independent
/// streams; chunks are merged by arrival order only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    Stdout,
    Stderr,
}

/// How the child ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus {
    /// Exit code, if the child exited normally
    pub code: Option<i32>,
    /// Terminating signal, if it was killed
    pub signal: Option<i32>,
}

impl ExitStatus {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Session events, delivered in order on the session's channel.
#[derive(Debug)]
pub enum SessionEvent {
    /// Raw output bytes from one of the child's pipes
    Output(Channel, Vec<u8>),
    /// The child exited; sent exactly once, after all output
    Exited(ExitStatus),
}

/// Process-control capability used by the controller.
///
/// Keeps the state machine platform-agnostic and testable without a live
/// child process.
pub trait ProcessControl {
    /// Drain events already buffered; never blocks.
    fn poll_events(&mut self) -> Vec<SessionEvent>;

    fn suspend(&mut self) -> Result<(), ControlError>;
    fn resume(&mut self) -> Result<(), ControlError>;

    /// Idempotent: terminating an exited or already-terminated process is
    /// a no-op.
    fn terminate(&mut self);
}

/// A running child process and its event plumbing.
pub struct ProcessSession {
    pid: i32,
    suspended: bool,
    exited: Arc<AtomicBool>,
    events_rx: Receiver<SessionEvent>,
    monitor_thread: Option<JoinHandle<()>>,
}

impl ProcessSession {
    /// Launch `program` with `args` in its own process group, capturing
    /// stdout and stderr.
    pub fn launch(program: &Path, args: &[String]) -> Result<Self, LaunchError> {
        let mut command = Command::new(program);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        // Own process group so suspend/terminate reach grandchildren too
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            command.process_group(0);
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                LaunchError::NotFound(program.to_path_buf())
            } else {
                LaunchError::Spawn(program.to_path_buf(), e)
            }
        })?;

        let pid = child.id() as i32;
        debug!("spawned {} as pid {}", program.display(), pid);

        let (tx, rx) = mpsc::channel::<SessionEvent>();

        // Stdio handles are present: we just asked for piped()
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        let mut readers = Vec::new();
        if let Some(out) = stdout {
            readers.push(spawn_reader(Channel::Stdout, out, tx.clone()));
        }
        if let Some(err) = stderr {
            readers.push(spawn_reader(Channel::Stderr, err, tx.clone()));
        }

        let exited = Arc::new(AtomicBool::new(false));
        let exited_flag = exited.clone();

        // Join the readers first: by the time Exited goes on the channel,
        // every chunk the child produced is already queued ahead of it
        let monitor_thread = thread::spawn(move || {
            for handle in readers {
                let _ = handle.join();
            }

            let status = match child.wait() {
                Ok(status) => exit_status_of(status),
                Err(e) => {
                    warn!("wait on child failed: {}", e);
                    ExitStatus {
                        code: None,
                        signal: None,
                    }
                }
            };

            exited_flag.store(true, Ordering::SeqCst);
            let _ = tx.send(SessionEvent::Exited(status));
        });

        Ok(Self {
            pid,
            suspended: false,
            exited,
            events_rx: rx,
            monitor_thread: Some(monitor_thread),
        })
    }

    #[cfg(unix)]
    fn signal_group(&self, signal: GroupSignal) -> Result<(), ControlError> {
        let signal = match signal {
            GroupSignal::Stop => Signal::SIGSTOP,
            GroupSignal::Cont => Signal::SIGCONT,
            GroupSignal::Kill => Signal::SIGKILL,
        };

        // Negative pid addresses the whole process group
        match kill(Pid::from_raw(-self.pid), signal) {
            Ok(()) => Ok(()),
            Err(nix::errno::Errno::ESRCH) => Err(ControlError::Exited),
            Err(e) => Err(ControlError::Signal(e.to_string())),
        }
    }

    #[cfg(not(unix))]
    fn signal_group(&self, _signal: GroupSignal) -> Result<(), ControlError> {
        Err(ControlError::Signal(
            "process control is only supported on unix".to_string(),
        ))
    }
}

/// Platform-agnostic names for the three group signals the session sends.
#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Stop,
    Cont,
    Kill,
}

impl ProcessControl for ProcessSession {
    fn poll_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        loop {
            match self.events_rx.try_recv() {
                Ok(event) => events.push(event),
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => break,
            }
        }
        events
    }

    fn suspend(&mut self) -> Result<(), ControlError> {
        if self.exited.load(Ordering::SeqCst) {
            return Err(ControlError::Exited);
        }
        if self.suspended {
            return Err(ControlError::AlreadySuspended);
        }
        self.signal_group(GroupSignal::Stop)?;
        self.suspended = true;
        debug!("suspended process group {}", self.pid);
        Ok(())
    }

    fn resume(&mut self) -> Result<(), ControlError> {
        if self.exited.load(Ordering::SeqCst) {
            return Err(ControlError::Exited);
        }
        if !self.suspended {
            return Err(ControlError::NotSuspended);
        }
        self.signal_group(GroupSignal::Cont)?;
        self.suspended = false;
        debug!("resumed process group {}", self.pid);
        Ok(())
    }

    fn terminate(&mut self) {
        if self.exited.load(Ordering::SeqCst) {
            return;
        }
        // SIGKILL also wakes a stopped group; ESRCH means it beat us to it
        if let Err(e) = self.signal_group(GroupSignal::Kill) {
            debug!("terminate was a no-op: {}", e);
        }
        self.suspended = false;
    }
}

impl Drop for ProcessSession {
    fn drop(&mut self) {
        // Best-effort teardown on every exit path: kill the group and wait
        // for the monitor to reap the child
        self.terminate();

        if let Some(handle) = self.monitor_thread.take() {
            let _ = handle.join();
        }
    }
}

fn spawn_reader<R: Read + Send + 'static>(
    channel: Channel,
    mut source: R,
    tx: Sender<SessionEvent>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        let mut buffer = vec![0u8; 4096];
        loop {
            match source.read(&mut buffer) {
                Ok(0) => break, // EOF - pipe closed
                Ok(n) => {
                    if tx
                        .send(SessionEvent::Output(channel, buffer[..n].to_vec()))
                        .is_err()
                    {
                        break;
                    }
                }
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
    })
}

fn exit_status_of(status: std::process::ExitStatus) -> ExitStatus {
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        ExitStatus {
            code: status.code(),
            signal: status.signal(),
        }
    }
    #[cfg(not(unix))]
    {
        ExitStatus {
            code: status.code(),
            signal: None,
        }
    }
}
