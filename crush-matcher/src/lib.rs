//! Weekly crush matching: a capacitated deferred-acceptance batch that fills
//! a match ledger, and a queue consumer reconciling users' interest decisions
//! against it.

pub mod cli;
pub mod config;
pub mod queue;
pub mod repository;
pub mod services;
pub mod week;
