//! Vision-oracle boundary.
//!
//! The oracle is a vision-capable language model reached over HTTP. This
//! module provides the message-building layer ([`Exchange`],
//! [`build_content`]) and the transport layer ([`OracleTransport`],
//! [`HttpTransport`]). The engine holds one [`Exchange`] per long-lived
//! conversation (planning, iterating) so context accumulates across turns.

pub mod exchange;
pub mod transport;

pub use exchange::{build_content, Exchange, MAX_IMAGES_PER_EXCHANGE};
pub use transport::{
    check_health, ContentBlock, HttpTransport, ImageSource, OracleError, OracleRequest,
    OracleResult, OracleTransport, Turn,
};
