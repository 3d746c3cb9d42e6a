//! Shared helpers for provider implementations.

pub mod openai_compat;
