//! Core library for Helmdeck, a terminal administration console for a
//! self-hosted Docker/mail/web stack.
//!
//! The two load-bearing subsystems live here:
//!
//! - [`registry`] turns the built-in module catalog into a vetted,
//!   queryable table and mediates every invocation.
//! - [`auth`] handles key-based session issuance with failed-attempt lockout.
//!
//! Everything else (configuration, capability probing, the built-in modules)
//! exists to feed those two. The display layer lives in the `helmdeck` binary
//! and only ever talks to the core through `Session` tokens and
//! `ModuleReport` values.

pub mod auth;
pub mod config;
pub mod error;
pub mod modules;
pub mod paths;
pub mod registry;

pub use error::{Error, Result};
