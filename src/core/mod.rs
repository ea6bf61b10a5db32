//! Core process-console components.
//!
//! This module contains the capture and lifecycle logic:
//!
//! - **process**: child process session with non-blocking output events
//! - **decoder**: incremental UTF-8 decoding of raw output chunks
//! - **ansi**: SGR escape parsing into styled text spans
//! - **controller**: the finish/countdown/close state machine
//!
//! # Architecture
//!
//! ```text
//! ConsoleController
//! ├── ProcessSession (child handle + output/exit events)
//! ├── OutputDecoder (bytes → text, one per channel)
//! ├── AnsiTextRenderer (text → styled spans)
//! └── CountdownState (auto-close deadline + ticks)
//! ```

pub mod ansi;
pub mod controller;
pub mod decoder;
pub mod process;
