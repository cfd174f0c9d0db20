//! inforequests-core library.
//!
//! Inforequests, their branches and actions, the statutory-deadline
//! workflow that decides what may be appended next, and the SQLite store
//! underneath.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` at the store boundary; typed failures are
//!   [`error::WorkflowError`] values inside the chain.
//! - **Logging**: `tracing` macros; the CLI installs the subscriber.
//! - **Time**: nothing reads ambient time; pass a [`clock::Clock`] through
//!   [`workflow::WorkflowContext`].

#![forbid(unsafe_code)]

pub mod clock;
pub mod config;
pub mod db;
pub mod error;
pub mod lock;
pub mod model;
pub mod workflow;
