//! Application layer containing the transfer orchestration.
//!
//! This module defines the `TransferEngine`, the single entry point for moving
//! funds. It owns no mutable state of its own: every coordination point between
//! concurrent transfers is pushed down to the store's row holds.

pub mod engine;
