//! User interface presentation and input handling.
//!
//! - **view**: terminal scrollback view applying controller effects
//! - **keymap**: keyboard input to user command mapping

pub mod keymap;
pub mod view;

pub use view::{ConsoleSurface, TerminalView};
