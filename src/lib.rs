//! `par-link` — a two-host data link layer simulator.
//!
//! A byte stream is carried between two endpoints over a shared, possibly
//! noisy bit-level medium by a Positive-Acknowledgment-with-Retransmission
//! (PAR) stop-and-wait protocol: byte-stuffed frames, a parity check, a
//! 1-bit alternating sequence number, and timeout-driven retransmission.
//!
//! # Architecture
//!
//! ```text
//!  ┌────────┐ send/retrieve  ┌────────┐
//!  │ Host A │                │ Host B │
//!  └───┬────┘                └───┬────┘
//!      │ bytes                   │ bytes
//!  ┌───▼─────────┐          ┌────▼────────┐
//!  │ DataLink    │ frames   │ DataLink    │   event loop + PAR variant
//!  │ (PAR)       │◀────────▶│ (PAR)       │   (ACKs flow the same path)
//!  └───┬─────────┘          └────┬────────┘
//!      │ bits                    │ bits
//!  ┌───▼─────────┐          ┌────▼────────┐
//!  │ Physical    │          │ Physical    │
//!  └───┬─────────┘          └────┬────────┘
//!      │        ┌────────┐       │
//!      └───────▶│ Medium │◀──────┘   broadcast bus, may flip bits
//!               └────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`medium`]    — the shared bit-level bus (perfect or low-noise)
//! - [`physical`]  — per-host bit transmission and the inbound bit queue
//! - [`datalink`]  — the event loop and the protocol-variant seam
//! - [`par`]       — framing, parity, alternating-bit PAR state machines
//! - [`host`]      — binds a stack together and runs it as a task
//! - [`simulator`] — payload loading and the transmission report
//! - [`error`]     — fatal wiring and I/O errors

pub mod datalink;
pub mod error;
pub mod host;
pub mod medium;
pub mod par;
pub mod physical;
pub mod simulator;

pub use datalink::{DataLinkLayer, LinkProtocol, MAX_FRAME_SIZE};
pub use error::LinkError;
pub use host::Host;
pub use medium::{LowNoiseMedium, Medium, PerfectMedium};
pub use par::ParDataLink;
pub use physical::PhysicalLayer;
