//! Terminal application.
//!
//! A single `App` holds all UI state. Events (keys, resizes, finished
//! turns) arrive on one channel and are handled sequentially in the main
//! loop, which redraws after each batch.
//!
//! Submodules:
//! - state: App struct
//! - selection: agent selection dialog and presets
//! - runner: terminal setup, main loop, turn dispatch
//! - input: key handling
//! - render: drawing
//! - mascot: cached mascot art

mod input;
mod mascot;
mod render;
mod runner;
mod selection;
mod state;

pub use runner::run;
