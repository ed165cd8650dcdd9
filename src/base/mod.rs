//! Base types and error handling.
//!
//! Provides foundational types mirroring Chromium's `net/base/`:
//! - [`NetError`](neterror::NetError): error taxonomy with numeric codes
//! - [`LoadState`](loadstate::LoadState): progress of a request chain

pub mod context;
pub mod loadstate;
pub mod neterror;

#[cfg(test)]
mod tests;
