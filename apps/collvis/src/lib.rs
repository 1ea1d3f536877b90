//! # Collvis
//!
//! The async shell around `collvis-core`: a CLI that builds and inspects
//! timelines and an HTTP API that serves them to renderers.

pub mod api;
pub mod cli;
