//! roster webhook server.
//!
//! This crate wires the conversation engine to Telegram and serves the
//! webhook and health endpoints on one listener.

pub mod config;
pub mod health;
pub mod telegram;
