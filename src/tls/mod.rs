//! TLS material: credential discovery and BoringSSL connector setup.

pub mod agent;
pub mod credentials;

pub use agent::{Agent, AgentOptions, PlainAgent, SecureAgent, TlsMaterial, TlsTuning};
pub use credentials::CredentialFiles;
