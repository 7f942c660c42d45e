#![warn(clippy::all, rust_2018_idioms)]
//! Free-hand drawing canvas whose contents are sent to a remote recognizer,
//! with the recognized expression and answer overlaid for a few seconds.

mod app;
pub mod board;
pub mod config;
pub mod input;
pub mod service;
pub mod state;
pub mod submit;
pub mod surface;
mod utils;

pub use app::App;
pub use board::Board;
pub use config::Config;
