//! # vgmconv CLI Library (vgmconv-cli)
//!
//! Converts audio streams to WAV through a pluggable decoding engine.
//!
//! **Purpose:** Open inputs through buffered host streams, configure looping
//! and fading, iterate over sub-streams, decode to WAV files or stdout, and
//! exercise engine seek/reset paths for testing.
//!
//! **Architecture:** `convert::Converter` drives an `audio::DecodeEngine`
//! (symphonia-backed by default) over streams from `vgmconv_common`.

pub mod audio;
pub mod config;
pub mod convert;
pub mod error;

pub use error::{Error, Result};
