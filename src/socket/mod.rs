//! Socket handling mirroring Chromium's `net/socket/`:
//! - [`connectjob`]: DNS → TCP → TLS connection flow
//! - [`client`]: connected socket type and the hyper HTTP/1.1 transport

pub mod client;
pub mod connectjob;

pub use client::HyperTransport;
