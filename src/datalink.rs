//! The data link layer: event loop, buffers, and the variant seam.
//!
//! [`DataLinkLayer`] owns the machinery every framing protocol needs (the
//! send buffer fed by the host, the inbound bit/byte buffers, and the event
//! loop that moves data between them), while all protocol-specific behaviour
//! (how to frame, how to check, when to hold back, when to resend) is
//! supplied through the [`LinkProtocol`] trait.
//!
//! # Event loop
//!
//! One iteration of [`DataLinkLayer::poll`]:
//!
//! 1. If the send buffer is non-empty and the protocol is clear to send,
//!    extract up to [`MAX_FRAME_SIZE`] bytes, frame them, and transmit the
//!    frame bit-by-bit (most significant bit first).
//! 2. Drain every bit currently queued in the physical layer; for each full
//!    eight bits, assemble one byte into the receive buffer.
//! 3. Offer the receive buffer to the protocol; a completed frame is handed
//!    back to it for dispatch (delivery, acknowledgment, …).
//! 4. Let the protocol act on its retransmission timer.
//!
//! [`DataLinkLayer::run`] repeats this until the stop flag is raised,
//! yielding to the scheduler once per iteration.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::error::LinkError;
use crate::physical::PhysicalLayer;

/// The maximum number of application bytes a single frame may carry.
pub const MAX_FRAME_SIZE: usize = 8;

// ---------------------------------------------------------------------------
// ByteQueue
// ---------------------------------------------------------------------------

/// A thread-safe FIFO of bytes.
///
/// Used for the two buffers that cross a thread boundary: the send buffer
/// (host pushes, event loop pops) and the delivered-data buffer (event loop
/// pushes, host drains).
#[derive(Default)]
pub struct ByteQueue {
    bytes: Mutex<VecDeque<u8>>,
}

impl ByteQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append every byte of `data`, preserving order.
    pub fn push_slice(&self, data: &[u8]) {
        self.bytes.lock().unwrap().extend(data.iter().copied());
    }

    /// Remove and return up to `max` bytes from the front.
    pub fn pop_chunk(&self, max: usize) -> Vec<u8> {
        let mut bytes = self.bytes.lock().unwrap();
        let take = max.min(bytes.len());
        bytes.drain(..take).collect()
    }

    /// Remove and return everything queued so far.
    pub fn drain_all(&self) -> Vec<u8> {
        self.bytes.lock().unwrap().drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.bytes.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.lock().unwrap().is_empty()
    }
}

// ---------------------------------------------------------------------------
// Variant seams
// ---------------------------------------------------------------------------

/// The capabilities a protocol variant needs while reacting to an event.
///
/// The production sink writes frames to the physical layer and delivered
/// data to the host's buffer; tests substitute a recording sink.
pub trait FrameSink {
    /// Write a framed byte sequence to the wire, bit by bit, MSB first.
    fn transmit(&mut self, frame: &[u8]) -> Result<(), LinkError>;

    /// Hand received application data up to the host.
    fn deliver(&mut self, data: &[u8]);
}

/// A framing protocol variant plugged into the [`DataLinkLayer`] event loop.
pub trait LinkProtocol: Send {
    /// May the event loop start transmitting a new frame right now?
    fn clear_to_send(&self) -> bool {
        true
    }

    /// Wrap up to [`MAX_FRAME_SIZE`] application bytes into a complete frame.
    fn create_frame(&mut self, data: Vec<u8>) -> Vec<u8>;

    /// Try to extract one complete frame from the receive buffer.
    ///
    /// Consumes exactly the bytes it has decided about (a recognised frame,
    /// or garbage it has ruled out) and leaves undecided bytes in place.
    /// Returns `None` when no complete frame is available yet.
    fn process_frame(&mut self, receive_buffer: &mut VecDeque<u8>) -> Option<Vec<u8>>;

    /// Bookkeeping after a frame produced by
    /// [`create_frame`](LinkProtocol::create_frame) went out on the wire.
    fn frame_sent(&mut self, frame: Vec<u8>);

    /// Dispatch a frame returned by
    /// [`process_frame`](LinkProtocol::process_frame): deliver data, react to
    /// acknowledgments, emit responses.
    fn frame_received(&mut self, frame: Vec<u8>, sink: &mut dyn FrameSink)
        -> Result<(), LinkError>;

    /// Called once per event-loop iteration; retransmit if a response is
    /// overdue.
    fn check_timeout(&mut self, sink: &mut dyn FrameSink) -> Result<(), LinkError>;
}

/// [`FrameSink`] backed by the real physical layer and host buffer.
struct WireSink<'a> {
    physical: &'a PhysicalLayer,
    delivered: &'a ByteQueue,
}

impl FrameSink for WireSink<'_> {
    fn transmit(&mut self, frame: &[u8]) -> Result<(), LinkError> {
        for &byte in frame {
            for shift in (0..8).rev() {
                self.physical.send((byte >> shift) & 1 == 1)?;
            }
        }
        Ok(())
    }

    fn deliver(&mut self, data: &[u8]) {
        self.delivered.push_slice(data);
    }
}

// ---------------------------------------------------------------------------
// DataLinkLayer
// ---------------------------------------------------------------------------

/// One endpoint's data link layer: shared event-loop state plus a protocol
/// variant.
pub struct DataLinkLayer {
    physical: Arc<PhysicalLayer>,
    protocol: Box<dyn LinkProtocol>,
    /// Application bytes waiting to be framed.  Shared with the host.
    send_buffer: Arc<ByteQueue>,
    /// Bytes delivered to the application.  Shared with the host.
    delivered: Arc<ByteQueue>,
    /// Inbound bits building up the current byte.  Loop-local.
    bit_buffer: VecDeque<bool>,
    /// Inbound bytes building up the current frame.  Loop-local.
    receive_buffer: VecDeque<u8>,
    stop_requested: Arc<AtomicBool>,
}

impl DataLinkLayer {
    /// Bind a protocol variant to a physical layer.
    ///
    /// Claims the physical layer's single client slot; fails with
    /// [`LinkError::DoubleRegistration`] if it is already taken.
    pub fn new(
        physical: Arc<PhysicalLayer>,
        protocol: Box<dyn LinkProtocol>,
        send_buffer: Arc<ByteQueue>,
        delivered: Arc<ByteQueue>,
        stop_requested: Arc<AtomicBool>,
    ) -> Result<Self, LinkError> {
        physical.register_client()?;
        Ok(Self {
            physical,
            protocol,
            send_buffer,
            delivered,
            bit_buffer: VecDeque::new(),
            receive_buffer: VecDeque::new(),
            stop_requested,
        })
    }

    /// Run the event loop until the stop flag is raised.
    ///
    /// A [`LinkError`] surfacing here means the stack was miswired (an
    /// unregistered sender, for instance); it is logged and ends the loop.
    pub async fn run(mut self) {
        while !self.stop_requested.load(Ordering::Relaxed) {
            if let Err(e) = self.poll() {
                log::error!("[link] event loop stopped: {e}");
                break;
            }
            tokio::task::yield_now().await;
        }
    }

    /// Perform one event-loop iteration.
    pub fn poll(&mut self) -> Result<(), LinkError> {
        self.send_next_frame()?;
        self.collect_bits();
        self.process_received()?;
        let mut sink = WireSink {
            physical: &self.physical,
            delivered: &self.delivered,
        };
        self.protocol.check_timeout(&mut sink)?;
        Ok(())
    }

    /// Frame and transmit the next chunk of buffered application data, if
    /// the protocol permits.
    fn send_next_frame(&mut self) -> Result<(), LinkError> {
        if self.send_buffer.is_empty() || !self.protocol.clear_to_send() {
            return Ok(());
        }
        let data = self.send_buffer.pop_chunk(MAX_FRAME_SIZE);
        if data.is_empty() {
            return Ok(());
        }
        let frame = self.protocol.create_frame(data);
        let mut sink = WireSink {
            physical: &self.physical,
            delivered: &self.delivered,
        };
        sink.transmit(&frame)?;
        self.protocol.frame_sent(frame);
        Ok(())
    }

    /// Drain the physical layer's queued bits and assemble whole bytes,
    /// most significant bit first.
    fn collect_bits(&mut self) {
        while let Some(bit) = self.physical.retrieve() {
            self.bit_buffer.push_back(bit);
        }
        while self.bit_buffer.len() >= 8 {
            let byte = self
                .bit_buffer
                .drain(..8)
                .fold(0u8, |acc, bit| (acc << 1) | bit as u8);
            self.receive_buffer.push_back(byte);
        }
    }

    /// Offer buffered bytes to the protocol and dispatch a completed frame.
    fn process_received(&mut self) -> Result<(), LinkError> {
        if self.receive_buffer.is_empty() {
            return Ok(());
        }
        if let Some(frame) = self.protocol.process_frame(&mut self.receive_buffer) {
            let mut sink = WireSink {
                physical: &self.physical,
                delivered: &self.delivered,
            };
            self.protocol.frame_received(frame, &mut sink)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Variant registry
// ---------------------------------------------------------------------------

type ProtocolCtor = fn() -> Box<dyn LinkProtocol>;

/// Known data link layer variants, by the name accepted on the command line.
const REGISTRY: &[(&str, ProtocolCtor)] =
    &[("PAR", || Box::new(crate::par::ParDataLink::new()))];

/// Build the data link protocol registered under `name`.
pub fn create(name: &str) -> Result<Box<dyn LinkProtocol>, LinkError> {
    REGISTRY
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, ctor)| ctor())
        .ok_or_else(|| LinkError::UnknownVariant {
            kind: "data link layer",
            name: name.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn byte_queue_is_fifo() {
        let q = ByteQueue::new();
        q.push_slice(b"abc");
        q.push_slice(b"de");
        assert_eq!(q.len(), 5);
        assert_eq!(q.drain_all(), b"abcde");
        assert!(q.is_empty());
    }

    #[test]
    fn pop_chunk_respects_the_limit() {
        let q = ByteQueue::new();
        q.push_slice(b"abcdefghij");
        assert_eq!(q.pop_chunk(8), b"abcdefgh");
        assert_eq!(q.pop_chunk(8), b"ij");
        assert_eq!(q.pop_chunk(8), b"");
    }

    #[test]
    fn registry_resolves_par() {
        assert!(create("PAR").is_ok());
    }

    #[test]
    fn registry_rejects_unknown_names() {
        let err = match create("GoBackN") {
            Err(e) => e,
            Ok(_) => panic!("expected unknown variant error"),
        };
        assert!(matches!(
            err,
            LinkError::UnknownVariant {
                kind: "data link layer",
                ..
            }
        ));
    }
}
