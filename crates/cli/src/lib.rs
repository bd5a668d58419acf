//! # sourcetrace-cli
//!
//! Shared setup for the `sourcetrace` binary.

#![cfg_attr(docsrs, feature(doc_cfg))]

#[macro_use]
extern crate tracing;

pub mod handler;
pub mod utils;
