//! # tonewave
//!
//! A sine tone generator whose frequency is changed over HTTP while a
//! background thread streams the tone to the default audio device.

#[macro_use]
extern crate slog;

pub mod config;
pub mod control;
pub mod encoding;
pub mod error;
pub mod oscillator;
pub mod output;
pub mod phase;
pub mod sink;
pub mod streamer;

pub use config::Config;
pub use control::{ControlServer, IndexPage};
pub use error::Error;
pub use oscillator::Oscillator;
pub use output::{AudioOutput, Player};
pub use sink::AudioSink;
pub use streamer::{SampleStreamer, StreamerHandle};
