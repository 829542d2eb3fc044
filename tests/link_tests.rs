//! Deterministic link-level tests.
//!
//! Instead of spawning tasks, each test drives both endpoints' event loops
//! by hand with [`DataLinkLayer::poll`], so frame interleavings are exact
//! and assertions can go all the way down to the bytes on the wire (via a
//! tap endpoint registered on the broadcast medium).

use std::collections::VecDeque;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use par_link::datalink::{self, ByteQueue, DataLinkLayer, LinkProtocol};
use par_link::error::LinkError;
use par_link::medium::{EndpointId, Medium, PerfectMedium};
use par_link::par::{ParConfig, ParDataLink};
use par_link::physical::{BitQueue, PhysicalLayer};

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// One endpoint with its link and the two host-facing queues kept in hand.
struct Endpoint {
    link: DataLinkLayer,
    send: Arc<ByteQueue>,
    delivered: Arc<ByteQueue>,
}

fn endpoint_with(medium: &Arc<dyn Medium>, protocol: Box<dyn LinkProtocol>) -> Endpoint {
    let send = Arc::new(ByteQueue::new());
    let delivered = Arc::new(ByteQueue::new());
    let link = DataLinkLayer::new(
        PhysicalLayer::attach(Arc::clone(medium)),
        protocol,
        send.clone(),
        delivered.clone(),
        Arc::new(AtomicBool::new(false)),
    )
    .expect("fresh physical layer");
    Endpoint {
        link,
        send,
        delivered,
    }
}

fn endpoint(medium: &Arc<dyn Medium>) -> Endpoint {
    endpoint_with(medium, datalink::create("PAR").expect("PAR is registered"))
}

/// Run both event loops for a fixed number of lockstep rounds.
fn pump(a: &mut Endpoint, b: &mut Endpoint, rounds: usize) {
    for _ in 0..rounds {
        a.link.poll().expect("poll a");
        b.link.poll().expect("poll b");
    }
}

/// Drain a wire tap and reassemble its bits into bytes, MSB first.
fn tap_bytes(tap: &BitQueue) -> Vec<u8> {
    let mut bits = Vec::new();
    while let Some(bit) = tap.pop() {
        bits.push(bit);
    }
    assert_eq!(bits.len() % 8, 0, "partial byte on the wire");
    bits.chunks(8)
        .map(|byte| byte.iter().fold(0u8, |acc, &bit| (acc << 1) | bit as u8))
        .collect()
}

// ---------------------------------------------------------------------------
// Test 1: single short payload, exact wire contents
// ---------------------------------------------------------------------------

#[test]
fn hello_crosses_as_one_frame_and_one_ack() {
    let medium: Arc<dyn Medium> = Arc::new(PerfectMedium::new());
    let mut a = endpoint(&medium);
    let mut b = endpoint(&medium);
    let tap = Arc::new(BitQueue::new());
    medium.register(tap.clone());

    a.send.push_slice(b"hello");
    pump(&mut a, &mut b, 10);

    assert_eq!(b.delivered.drain_all(), b"hello");
    assert!(a.delivered.is_empty());

    // The tap hears both directions in chronological order: exactly one
    // data frame, then exactly one acknowledgment.  Anything more would
    // mean a retransmission on a perfect medium.
    let wire = tap_bytes(&tap);
    let frame = [0x7B, 0x68, 0x65, 0x6C, 0x6C, 0x6F, 0x00, 0x01, 0x7D];
    let ack = [0x7B, 0x06, 0x7D];
    assert_eq!(wire, [&frame[..], &ack[..]].concat());
}

// ---------------------------------------------------------------------------
// Test 2: nine bytes split into two frames around an acknowledgment
// ---------------------------------------------------------------------------

#[test]
fn nine_bytes_need_two_frames() {
    let medium: Arc<dyn Medium> = Arc::new(PerfectMedium::new());
    let mut a = endpoint(&medium);
    let mut b = endpoint(&medium);

    a.send.push_slice(b"abcdefghi");

    // Round 1 transmits the first eight bytes; the ninth must wait for the
    // acknowledgment.
    pump(&mut a, &mut b, 1);
    assert_eq!(b.delivered.drain_all(), b"abcdefgh");

    pump(&mut a, &mut b, 10);
    assert_eq!(b.delivered.drain_all(), b"i");
}

// ---------------------------------------------------------------------------
// Test 3: payload made of the tag bytes themselves
// ---------------------------------------------------------------------------

#[test]
fn tag_bytes_survive_the_link() {
    let medium: Arc<dyn Medium> = Arc::new(PerfectMedium::new());
    let mut a = endpoint(&medium);
    let mut b = endpoint(&medium);

    let payload = [0x7B, 0x7D, 0x5C, 0x7B, 0x7B, 0x5C];
    a.send.push_slice(&payload);
    pump(&mut a, &mut b, 10);

    assert_eq!(b.delivered.drain_all(), payload);
}

// ---------------------------------------------------------------------------
// Test 4: both directions at once
// ---------------------------------------------------------------------------

#[test]
fn lockstep_bidirectional_transfer() {
    let medium: Arc<dyn Medium> = Arc::new(PerfectMedium::new());
    let mut a = endpoint(&medium);
    let mut b = endpoint(&medium);

    a.send.push_slice(b"ping");
    b.send.push_slice(b"pong");
    pump(&mut a, &mut b, 10);

    assert_eq!(b.delivered.drain_all(), b"ping");
    assert_eq!(a.delivered.drain_all(), b"pong");
}

// ---------------------------------------------------------------------------
// Test 5: in-order delivery of a longer stream
// ---------------------------------------------------------------------------

#[test]
fn long_payload_arrives_in_order() {
    let medium: Arc<dyn Medium> = Arc::new(PerfectMedium::new());
    let mut a = endpoint(&medium);
    let mut b = endpoint(&medium);

    let payload: Vec<u8> = (0..100u8).collect();
    a.send.push_slice(&payload);
    pump(&mut a, &mut b, 100);

    assert_eq!(b.delivered.drain_all(), payload);
}

// ---------------------------------------------------------------------------
// Test 6: a lost acknowledgment forces a retransmission, and the duplicate
// is suppressed
// ---------------------------------------------------------------------------

/// A medium that garbles the first `jam_bits` bits transmitted by one
/// endpoint and is perfect otherwise.  Used to destroy exactly the first
/// acknowledgment.
struct JammedMedium {
    inner: PerfectMedium,
    victim: EndpointId,
    jam_bits: Mutex<usize>,
}

impl Medium for JammedMedium {
    fn register(&self, tap: Arc<BitQueue>) -> EndpointId {
        self.inner.register(tap)
    }

    fn transmit(&self, sender: EndpointId, bit: bool) -> Result<(), LinkError> {
        let mut remaining = self.jam_bits.lock().unwrap();
        let bit = if sender == self.victim && *remaining > 0 {
            *remaining -= 1;
            !bit
        } else {
            bit
        };
        self.inner.transmit(sender, bit)
    }
}

#[test]
fn lost_ack_retransmits_without_duplicate_delivery() {
    let medium: Arc<dyn Medium> = Arc::new(JammedMedium {
        inner: PerfectMedium::new(),
        victim: 1, // endpoint b, whose first transmission is the ACK
        jam_bits: Mutex::new(24),
    });
    let quick = ParConfig {
        resend_timeout: Duration::from_millis(5),
    };
    let mut a = endpoint_with(&medium, Box::new(ParDataLink::with_config(quick.clone())));
    let mut b = endpoint_with(&medium, Box::new(ParDataLink::with_config(quick)));
    let tap = Arc::new(BitQueue::new());
    medium.register(tap.clone());

    a.send.push_slice(b"hello");

    // Pump until the wire has seen frame + garbled ACK + frame + ACK
    // (24 bytes), which requires a real timeout to elapse in between.
    let deadline = Instant::now() + Duration::from_secs(10);
    while tap.len() < 24 * 8 && Instant::now() < deadline {
        pump(&mut a, &mut b, 1);
    }
    // A few more rounds so the second acknowledgment is processed.
    pump(&mut a, &mut b, 10);

    assert_eq!(
        b.delivered.drain_all(),
        b"hello",
        "data must be delivered exactly once"
    );

    let frame = [0x7B, 0x68, 0x65, 0x6C, 0x6C, 0x6F, 0x00, 0x01, 0x7D];
    let wire = tap_bytes(&tap);
    let data_frames = wire.windows(frame.len()).filter(|w| *w == frame).count();
    assert!(
        data_frames >= 2,
        "expected a retransmission on the wire, saw {data_frames} frame(s)"
    );
}

// ---------------------------------------------------------------------------
// Test 7: frames survive arriving bit-by-bit across poll rounds
// ---------------------------------------------------------------------------

#[test]
fn receiver_waits_for_a_complete_frame() {
    // Feed a frame directly through the protocol seam one byte at a time:
    // no prefix of it may be mistaken for a frame.
    let mut par = ParDataLink::new();
    let mut whole = ParDataLink::new();
    let frame = whole.create_frame(b"abc".to_vec());

    let mut buffer: VecDeque<u8> = VecDeque::new();
    for (i, &byte) in frame.iter().enumerate() {
        buffer.push_back(byte);
        let result = par.process_frame(&mut buffer);
        if i + 1 < frame.len() {
            assert_eq!(result, None, "no frame before byte {}", i + 1);
        } else {
            assert_eq!(result, Some(vec![0x00, b'a', b'b', b'c']));
        }
    }
    assert!(buffer.is_empty());
}
