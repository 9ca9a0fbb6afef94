//! Segmux - Matroska demuxing over a virtual timeline
//!
//! This library crate exposes the command line pieces for integration testing.

pub mod config;
pub mod discovery;
pub mod output;
