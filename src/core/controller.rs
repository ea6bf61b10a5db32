//! Console lifecycle controller
//!
//! The policy layer between the process session and the display. Forwards
//! output through decoder and renderer, reacts to process exit, runs the
//! auto-close countdown, and interprets user commands. All state changes
//! happen on the single event-loop thread; the controller never blocks.
//!
//! Lifecycle: `Running` until the child exits, then either
//! `WaitingManualClose` (wait mode) or `CountingDown` toward an auto-close
//! deadline. `Closing` ends the run; user quit reaches it from any phase.

use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::ansi::{AnsiTextRenderer, AttrFlags, Color, Style, StyledFragment, StyledSpan};
use super::decoder::OutputDecoder;
use super::process::{Channel, ExitStatus, ProcessControl, SessionEvent};

/// What happens after the child finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseBehavior {
    /// Keep the console open until the user quits
    WaitForDismiss,
    /// Close automatically after the countdown
    AutoClose(Duration),
}

/// Lifecycle phase of the console.
///
/// The finished-ness of the child is carried by `exit_status()`; the exit
/// handler moves straight on to `CountingDown` or `WaitingManualClose`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Child is running (possibly suspended)
    Running,
    /// Child finished, auto-close countdown armed
    CountingDown,
    /// Child finished, waiting for the user to quit
    WaitingManualClose,
    /// Shutting down; the event loop should end the run
    Closing,
}

/// User commands forwarded from the presentation shim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserCommand {
    Quit,
    Minimize,
    Suspend,
    Resume,
    CancelCountdown,
}

/// Requested window visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Show,
    Minimize,
}

/// Display-side effects produced by the controller, applied in order by
/// the presentation shim.
#[derive(Debug, Clone, PartialEq)]
pub enum DisplayEffect {
    /// Styled output for the scrollback
    Fragment(StyledFragment),
    /// Plain, unstyled text (countdown ticks)
    Notice(String),
    Visibility(Visibility),
    Title(String),
}

/// Armed auto-close countdown. Exists only while an exit status is
/// recorded; destroyed on fire or cancel.
struct CountdownState {
    started: Instant,
    deadline: Instant,
    total_secs: u64,
    /// Whole-second ticks already rendered, so no second is ever
    /// announced twice
    ticks_emitted: u64,
}

/// The console state machine. Owns the session, the per-channel decoders
/// and the renderer; emits [`DisplayEffect`]s for the view.
pub struct ConsoleController<P: ProcessControl> {
    session: P,
    phase: Phase,
    suspended: bool,
    close_behavior: CloseBehavior,
    exit_status: Option<ExitStatus>,
    countdown: Option<CountdownState>,
    stdout_decoder: OutputDecoder,
    stderr_decoder: OutputDecoder,
    renderer: AnsiTextRenderer,
    title: String,
}

impl<P: ProcessControl> ConsoleController<P> {
    pub fn new(session: P, title: impl Into<String>, close_behavior: CloseBehavior) -> Self {
        Self {
            session,
            phase: Phase::Running,
            suspended: false,
            close_behavior,
            exit_status: None,
            countdown: None,
            stdout_decoder: OutputDecoder::new(),
            stderr_decoder: OutputDecoder::new(),
            renderer: AnsiTextRenderer::new(),
            title: title.into(),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    /// Initial effects for a fresh console: title and visibility.
    pub fn startup_effects(&self) -> Vec<DisplayEffect> {
        vec![
            DisplayEffect::Title(self.title.clone()),
            DisplayEffect::Visibility(Visibility::Show),
        ]
    }

    /// One turn of the event loop: drain session events, then deliver a
    /// timer tick. Never blocks.
    pub fn pump(&mut self, now: Instant) -> Vec<DisplayEffect> {
        let mut effects = Vec::new();

        for event in self.session.poll_events() {
            match event {
                SessionEvent::Output(channel, bytes) => {
                    self.handle_output(channel, &bytes, &mut effects);
                }
                SessionEvent::Exited(status) => {
                    self.handle_exit(status, now, &mut effects);
                }
            }
        }

        self.handle_tick(now, &mut effects);
        effects
    }

    /// Apply a user command. Commands that make no sense in the current
    /// phase are ignored.
    pub fn handle_command(&mut self, command: UserCommand) -> Vec<DisplayEffect> {
        let mut effects = Vec::new();

        match command {
            UserCommand::Quit => {
                // Quit wins every race: terminate is idempotent, so an
                // exit notification arriving late is harmless
                info!("user quit");
                self.session.terminate();
                self.countdown = None;
                self.phase = Phase::Closing;
            }
            UserCommand::Minimize => {
                effects.push(DisplayEffect::Visibility(Visibility::Minimize));
            }
            UserCommand::Suspend => {
                if self.phase != Phase::Running {
                    debug!("suspend ignored: child already finished");
                } else {
                    match self.session.suspend() {
                        Ok(()) => {
                            self.suspended = true;
                            effects.push(notice_fragment("\n⏸ suspending process\n", Color::Indexed(3)));
                        }
                        Err(e) => debug!("suspend rejected: {}", e),
                    }
                }
            }
            UserCommand::Resume => {
                if self.phase != Phase::Running {
                    debug!("resume ignored: child already finished");
                } else {
                    match self.session.resume() {
                        Ok(()) => {
                            self.suspended = false;
                            effects.push(notice_fragment("\n▶ resuming process\n", Color::Indexed(2)));
                        }
                        Err(e) => debug!("resume rejected: {}", e),
                    }
                }
            }
            UserCommand::CancelCountdown => {
                if self.phase == Phase::CountingDown {
                    // Disarm only the close timer; the child is already
                    // gone, nothing resumes
                    info!("countdown cancelled at user request");
                    self.countdown = None;
                    self.phase = Phase::WaitingManualClose;
                    effects.push(notice_fragment("\n[q] to close\n", Color::Indexed(6)));
                }
            }
        }

        effects
    }

    fn handle_output(&mut self, channel: Channel, bytes: &[u8], effects: &mut Vec<DisplayEffect>) {
        let decoder = match channel {
            Channel::Stdout => &mut self.stdout_decoder,
            Channel::Stderr => &mut self.stderr_decoder,
        };
        let text = decoder.decode(bytes);
        if text.is_empty() {
            return;
        }

        let fragment = self.renderer.render(&text);
        if !fragment.is_empty() {
            effects.push(DisplayEffect::Fragment(fragment));
        }
    }

    fn handle_exit(&mut self, status: ExitStatus, now: Instant, effects: &mut Vec<DisplayEffect>) {
        if self.phase != Phase::Running {
            // Quit already raced ahead of the exit notification
            debug!("exit notification ignored in phase {:?}", self.phase);
            return;
        }

        info!("child finished: {:?}", status);
        self.exit_status = Some(status);
        self.suspended = false;

        // Flush any dangling partial byte sequences before the marker
        for text in [self.stdout_decoder.finish(), self.stderr_decoder.finish()] {
            if !text.is_empty() {
                let fragment = self.renderer.render(&text);
                if !fragment.is_empty() {
                    effects.push(DisplayEffect::Fragment(fragment));
                }
            }
        }

        effects.push(DisplayEffect::Visibility(Visibility::Show));
        effects.push(DisplayEffect::Fragment(finish_marker(status)));

        match self.close_behavior {
            CloseBehavior::WaitForDismiss => {
                self.phase = Phase::WaitingManualClose;
            }
            CloseBehavior::AutoClose(timeout) => {
                effects.push(DisplayEffect::Notice("\nclosing in ".to_string()));
                self.countdown = Some(CountdownState {
                    started: now,
                    deadline: now + timeout,
                    total_secs: timeout.as_secs(),
                    ticks_emitted: 0,
                });
                self.phase = Phase::CountingDown;
                // Zero timeout closes on the next tick without a single
                // countdown notice
            }
        }
    }

    fn handle_tick(&mut self, now: Instant, effects: &mut Vec<DisplayEffect>) {
        if self.phase != Phase::CountingDown {
            return;
        }
        let Some(countdown) = self.countdown.as_mut() else {
            return;
        };

        // Announce each whole second exactly once, counting down from the
        // full timeout; a slow loop catches up without duplicates
        while countdown.ticks_emitted < countdown.total_secs
            && now >= countdown.started + Duration::from_secs(countdown.ticks_emitted)
        {
            let remaining = countdown.total_secs - countdown.ticks_emitted;
            effects.push(DisplayEffect::Notice(format!("{}..", remaining)));
            countdown.ticks_emitted += 1;
        }

        if now >= countdown.deadline {
            info!("countdown elapsed, closing");
            self.countdown = None;
            self.phase = Phase::Closing;
        }
    }
}

/// Finish marker, visually distinguished by success vs failure.
fn finish_marker(status: ExitStatus) -> StyledFragment {
    let color = if status.success() {
        Color::Indexed(2)
    } else {
        Color::Indexed(1)
    };

    let description = match (status.code, status.signal) {
        (Some(code), _) => format!("process finished with exit code {}", code),
        (None, Some(signal)) => format!("process killed by signal {}", signal),
        (None, None) => "process finished with unknown status".to_string(),
    };

    StyledFragment {
        spans: vec![
            StyledSpan {
                text: "\n● ".to_string(),
                style: Style {
                    fg: color,
                    bg: Color::Default,
                    flags: AttrFlags::BOLD,
                },
            },
            StyledSpan {
                text: format!("{}\n", description),
                style: Style::default(),
            },
        ],
    }
}

fn notice_fragment(text: &str, color: Color) -> DisplayEffect {
    DisplayEffect::Fragment(StyledFragment::styled(
        text,
        Style {
            fg: color,
            bg: Color::Default,
            flags: AttrFlags::empty(),
        },
    ))
}
