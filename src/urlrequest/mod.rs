//! Request options, normalization and the redirect-following executor.

pub mod auth;
pub mod job;
pub mod options;
pub mod redirect;
pub mod spec;

pub use auth::Auth;
pub use job::Transport;
pub use options::RequestOptions;
pub use redirect::RedirectVisitTable;
pub use spec::RequestSpec;
