//! `turn-relay` coalesces bursts of conversational messages into single turns.
//!
//! The relay is a long-running HTTP service that buffers incoming messages per sender for a fixed
//! quiet window and hands each completed batch to an AI responder as one logical turn. Senders are
//! fully independent of one another, and a slow or failing responder never delays a sender's next
//! turn.
//!
//! Core modules:
//! - [`config`]: relay config (YAML)
//! - [`message`]: normalized message model
//! - [`buffer`]: per-sender quiet-window buffering + flush
//! - [`responder`]: downstream responder hand-off
//! - [`server`]: axum server wiring

pub mod buffer;
pub mod config;
pub mod message;
pub mod responder;
pub mod server;
