//! Positive Acknowledgment with Retransmission (PAR), stop-and-wait.
//!
//! # Wire format
//!
//! ```text
//!  data frame:  7B | escaped(d0 .. dn-1, seq) | parity | 7D     (1 <= n <= 8)
//!  ack frame:   7B | 06 | 7D
//! ```
//!
//! Payload bytes that collide with a tag (`{`, `}`, `\`) are preceded by the
//! escape tag on the wire.  The parity byte is the XOR of every bit in
//! payload-plus-sequence, packed as `0x00` or `0x01`; being 0 or 1 it never
//! needs escaping, and it is not included in its own computation.
//!
//! # Protocol contract
//!
//! - One frame in flight at a time: while a data frame is unacknowledged,
//!   no new frame is started (stop-and-wait).
//! - Frames carry a 1-bit alternating sequence number so a retransmission
//!   can be told apart from its successor.
//! - The receiver acknowledges *every* intact data frame, duplicates
//!   included: a duplicate means the peer never saw the previous
//!   acknowledgment.  Data is delivered only when the sequence number
//!   matches the one expected.
//! - A frame with bad parity is dropped silently; the sender's timeout
//!   recovers it.  Acknowledgments are never retransmitted and carry no
//!   parity of their own.
//!
//! This module only manages protocol state; the event loop and all bit I/O
//! live in [`crate::datalink`].

use std::collections::VecDeque;
use std::time::{Duration, Instant};

use crate::datalink::{FrameSink, LinkProtocol};
use crate::error::LinkError;

/// Marks the start of every frame.
pub const START_TAG: u8 = b'{';
/// Marks the end of every frame.
pub const STOP_TAG: u8 = b'}';
/// Precedes any payload byte that collides with a tag.
pub const ESCAPE_TAG: u8 = b'\\';
/// The single byte carried by an acknowledgment frame.
pub const ACK_TAG: u8 = 0x06;

/// Adjustable protocol parameters.
#[derive(Debug, Clone)]
pub struct ParConfig {
    /// How long to wait for an acknowledgment before resending.
    pub resend_timeout: Duration,
}

impl Default for ParConfig {
    fn default() -> Self {
        Self {
            resend_timeout: Duration::from_millis(100),
        }
    }
}

// ---------------------------------------------------------------------------
// Sender / receiver records
// ---------------------------------------------------------------------------

/// A transmitted frame awaiting acknowledgment.
#[derive(Debug)]
struct InFlight {
    /// The framed bytes, retained for retransmission.
    frame: Vec<u8>,
    /// When the frame was last written to the wire.
    sent_at: Instant,
}

/// Send-side state: the next sequence number and the frame in flight.
///
/// `in_flight` being `Some` *is* the awaiting-acknowledgment condition; the
/// retained frame and the running timer cannot exist without each other.
#[derive(Debug, Default)]
struct SendSide {
    seq: u8,
    in_flight: Option<InFlight>,
}

/// Receive-side state: the sequence number expected next.
#[derive(Debug, Default)]
struct ReceiveSide {
    seq: u8,
}

// ---------------------------------------------------------------------------
// ParDataLink
// ---------------------------------------------------------------------------

/// The PAR protocol variant plugged into the data link event loop.
pub struct ParDataLink {
    config: ParConfig,
    sender: SendSide,
    receiver: ReceiveSide,
}

impl ParDataLink {
    pub fn new() -> Self {
        Self::with_config(ParConfig::default())
    }

    pub fn with_config(config: ParConfig) -> Self {
        Self {
            config,
            sender: SendSide::default(),
            receiver: ReceiveSide::default(),
        }
    }
}

impl Default for ParDataLink {
    fn default() -> Self {
        Self::new()
    }
}

/// XOR of every bit in `data`, packed as a byte (0 or 1).
fn parity(data: &[u8]) -> u8 {
    (data.iter().map(|b| b.count_ones()).sum::<u32>() % 2) as u8
}

fn is_tag(byte: u8) -> bool {
    matches!(byte, START_TAG | STOP_TAG | ESCAPE_TAG)
}

/// The fixed three-byte acknowledgment frame.
fn ack_frame() -> Vec<u8> {
    vec![START_TAG, ACK_TAG, STOP_TAG]
}

impl LinkProtocol for ParDataLink {
    fn clear_to_send(&self) -> bool {
        // Stop-and-wait: nothing new goes out while a frame is unacknowledged.
        self.sender.in_flight.is_none()
    }

    fn create_frame(&mut self, mut data: Vec<u8>) -> Vec<u8> {
        // The sequence number rides at the end of the payload and is covered
        // by the parity.
        data.push(self.sender.seq);
        let parity = parity(&data);

        let mut framed = Vec::with_capacity(data.len() * 2 + 3);
        framed.push(START_TAG);
        for &byte in &data {
            if is_tag(byte) {
                framed.push(ESCAPE_TAG);
            }
            framed.push(byte);
        }
        framed.push(parity);
        framed.push(STOP_TAG);
        framed
    }

    fn process_frame(&mut self, buffer: &mut VecDeque<u8>) -> Option<Vec<u8>> {
        // Discard anything preceding a start tag.
        while buffer.front().is_some_and(|&b| b != START_TAG) {
            buffer.pop_front();
        }
        if buffer.is_empty() {
            return None;
        }

        // Walk forward from the start tag, unescaping as we go.  Nothing is
        // removed from the buffer until the frame's fate is decided.
        let mut extracted = Vec::new();
        let mut i = 1;
        let mut stop = None;
        while i < buffer.len() {
            match buffer[i] {
                ESCAPE_TAG => {
                    // The next byte is literal data.  If it has not arrived
                    // yet the frame is incomplete; leave the buffer alone.
                    let Some(&literal) = buffer.get(i + 1) else {
                        return None;
                    };
                    extracted.push(literal);
                    i += 2;
                }
                STOP_TAG => {
                    stop = Some(i);
                    break;
                }
                START_TAG => {
                    // Everything extracted so far belongs to a damaged frame.
                    // Drop it and restart from this new start tag.
                    buffer.drain(..i);
                    extracted.clear();
                    i = 1;
                }
                data => {
                    extracted.push(data);
                    i += 1;
                }
            }
        }
        let stop = stop?;
        buffer.drain(..=stop);

        match extracted.len() {
            // An empty frame carries nothing to act on.
            0 => None,
            // A lone byte is an acknowledgment frame.
            1 => Some(extracted),
            _ => {
                // The final byte is the parity; compare it to a
                // recalculation over what precedes it.
                let received_parity = extracted.pop()?;
                if received_parity != parity(&extracted) {
                    log::warn!("[par] damaged frame dropped: {extracted:02x?}");
                    return None;
                }
                // Rotate the sequence number from the back to the front so
                // dispatch sees `seq, d0 .. dn-1`.
                extracted.rotate_right(1);
                Some(extracted)
            }
        }
    }

    fn frame_sent(&mut self, frame: Vec<u8>) {
        log::debug!(
            "[par] → DATA seq={} ({} bytes on the wire)",
            self.sender.seq,
            frame.len()
        );
        self.sender.in_flight = Some(InFlight {
            frame,
            sent_at: Instant::now(),
        });
    }

    fn frame_received(
        &mut self,
        frame: Vec<u8>,
        sink: &mut dyn FrameSink,
    ) -> Result<(), LinkError> {
        if frame.len() == 1 {
            // An acknowledgment for the frame in flight.  A one-byte frame
            // whose tag got mangled on the wire is still an acknowledgment;
            // nothing else is ever that short.
            if frame[0] != ACK_TAG {
                log::debug!("[par] acknowledgment tag arrived as {:#04x}", frame[0]);
            }
            if self.sender.in_flight.take().is_none() {
                log::debug!("[par] acknowledgment with nothing in flight");
            }
            self.sender.seq ^= 1;
            log::debug!("[par] ← ACK; next seq={}", self.sender.seq);
            return Ok(());
        }

        let seq = frame[0];
        let data = &frame[1..];

        // Acknowledge every intact data frame, duplicates included: a
        // duplicate means our previous acknowledgment was lost.
        sink.transmit(&ack_frame())?;

        if seq == self.receiver.seq {
            self.receiver.seq ^= 1;
            sink.deliver(data);
            log::debug!(
                "[par] ← DATA seq={seq} len={} delivered; → ACK",
                data.len()
            );
        } else {
            log::debug!("[par] ← DATA seq={seq} duplicate, not delivered; → ACK");
        }
        Ok(())
    }

    fn check_timeout(&mut self, sink: &mut dyn FrameSink) -> Result<(), LinkError> {
        let Some(in_flight) = self.sender.in_flight.as_mut() else {
            return Ok(());
        };
        if in_flight.sent_at.elapsed() <= self.config.resend_timeout {
            return Ok(());
        }
        log::warn!("[par] timeout, resending frame seq={}", self.sender.seq);
        sink.transmit(&in_flight.frame)?;
        in_flight.sent_at = Instant::now();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
