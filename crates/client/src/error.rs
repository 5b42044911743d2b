//! Top-level client error.
//!
//! Connection failures never surface here: they are consumed by the
//! [`Supervisor`](crate::Supervisor) restart loop. What remains is
//! configuration rejection at build time and the cooperative shutdown path.

#[derive(thiserror::Error, Debug)]
pub enum ClientError {
    #[error("config: {0}")]
    Config(String),
    #[error("shutdown")]
    Shutdown,
}
