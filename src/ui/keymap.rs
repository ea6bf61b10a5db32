//! Key mapping
//!
//! Translates raw terminal key events into [`UserCommand`]s. The space bar
//! is context-sensitive: it toggles suspend/resume while the child runs and
//! cancels the countdown after it finishes.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

use crate::core::controller::{Phase, UserCommand};

/// Map a key event to a user command given the current lifecycle phase.
///
/// Returns `None` for keys with no meaning right now; those are ignored.
pub fn map_key(key: KeyEvent, phase: Phase, suspended: bool) -> Option<UserCommand> {
    // Key releases/repeats would double-fire on Windows-style backends
    if key.kind != KeyEventKind::Press {
        return None;
    }

    match key.code {
        KeyCode::Char('q') | KeyCode::Char('Q') | KeyCode::Esc => Some(UserCommand::Quit),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(UserCommand::Quit)
        }
        KeyCode::Char('h') | KeyCode::Char('m') => Some(UserCommand::Minimize),
        KeyCode::Char(' ') => match phase {
            Phase::CountingDown => Some(UserCommand::CancelCountdown),
            Phase::Running => {
                if suspended {
                    Some(UserCommand::Resume)
                } else {
                    Some(UserCommand::Suspend)
                }
            }
            _ => None,
        },
        _ => {
            tracing::debug!("ignoring key press {:?}", key.code);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn test_quit_keys() {
        for code in [KeyCode::Char('q'), KeyCode::Char('Q'), KeyCode::Esc] {
            assert_eq!(
                map_key(press(code), Phase::Running, false),
                Some(UserCommand::Quit)
            );
        }
        assert_eq!(
            map_key(
                KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL),
                Phase::WaitingManualClose,
                false
            ),
            Some(UserCommand::Quit)
        );
    }

    #[test]
    fn test_minimize_keys() {
        assert_eq!(
            map_key(press(KeyCode::Char('h')), Phase::Running, false),
            Some(UserCommand::Minimize)
        );
        assert_eq!(
            map_key(press(KeyCode::Char('m')), Phase::CountingDown, false),
            Some(UserCommand::Minimize)
        );
    }

    #[test]
    fn test_space_is_context_sensitive() {
        let space = press(KeyCode::Char(' '));

        assert_eq!(
            map_key(space, Phase::Running, false),
            Some(UserCommand::Suspend)
        );
        assert_eq!(
            map_key(space, Phase::Running, true),
            Some(UserCommand::Resume)
        );
        assert_eq!(
            map_key(space, Phase::CountingDown, false),
            Some(UserCommand::CancelCountdown)
        );
        assert_eq!(map_key(space, Phase::WaitingManualClose, false), None);
    }

    #[test]
    fn test_unmapped_keys_ignored() {
        assert_eq!(map_key(press(KeyCode::Char('x')), Phase::Running, false), None);
        assert_eq!(map_key(press(KeyCode::Enter), Phase::Running, false), None);
    }
}
