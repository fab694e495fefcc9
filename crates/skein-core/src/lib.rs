//! Core types and trait definitions for the Skein post ingester.
//!
//! This crate is deliberately free of I/O, HTTP and database dependencies.
//! It holds the domain model, the repost-chain resolver, the throughput
//! monitor, and the traits that event sources and stores implement.

pub mod chain;
pub mod error;
pub mod post;
pub mod source;
pub mod store;
pub mod throughput;

pub use error::{BoxError, Error, ErrorKind, Result};
