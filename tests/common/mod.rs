//! Shared fixtures for the end-to-end suites
//!
//! Scripted native analyzers stand in for trained models so the suites
//! exercise the real tag schemes, adapters and arbiters without any
//! external process.

pub mod native;

pub use native::{sentence, ScriptedNative};
