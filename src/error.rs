//! Error types for the simulator.
//!
//! Everything here is fatal: wiring mistakes caught at construction time and
//! payload-file problems caught before the simulation starts.  Conditions the
//! protocol recovers from on its own (damaged frames, stray bytes on the
//! wire) are *not* errors; they are logged and healed by retransmission.

use thiserror::Error;

use crate::medium::EndpointId;

/// Errors raised while wiring up or driving a simulated link.
#[derive(Error, Debug)]
pub enum LinkError {
    /// A physical layer tried to transmit on a medium it never registered
    /// with.
    #[error("unregistered sender on the medium (endpoint {0})")]
    UnregisteredSender(EndpointId),

    /// A second data link layer tried to claim an already-claimed physical
    /// layer.
    #[error("attempt to double-register a client on the physical layer")]
    DoubleRegistration,

    /// The requested medium or data link layer name matches no known
    /// implementation.
    #[error("unknown {kind} variant: {name}")]
    UnknownVariant {
        /// Which registry was consulted (`"medium"` or `"data link layer"`).
        kind: &'static str,
        /// The name that failed to resolve.
        name: String,
    },

    /// The payload file could not be read.
    #[error("cannot read transmission data: {0}")]
    Io(#[from] std::io::Error),

    /// The payload file exceeds the simulator's whole-file-in-memory limit.
    #[error("{0} is too large a file")]
    FileTooLarge(String),
}
