//! The shared transmission medium.
//!
//! A [`Medium`] is a broadcast bus at the granularity of a single bit: every
//! bit transmitted by one registered endpoint is delivered to every *other*
//! registered endpoint, in transmission order.  The medium never reorders and
//! never drops; the only fault model is corruption:
//!
//! | Variant              | Behaviour                                        |
//! |----------------------|--------------------------------------------------|
//! | [`PerfectMedium`]    | Delivers every bit unchanged.                    |
//! | [`LowNoiseMedium`]   | Flips each delivered bit with probability 0.001, |
//! |                      | rolled independently per recipient.              |
//!
//! Delivery is synchronous: `transmit` runs on the sending host's task and
//! pushes straight into each recipient's [`BitQueue`].  There is no medium
//! thread.
//!
//! Variants are chosen by name through [`create`], a compile-time registry
//! mapping CLI names to constructors.

use std::sync::{Arc, Mutex};

use rand::{rngs::StdRng, Rng, SeedableRng};

use crate::error::LinkError;
use crate::physical::BitQueue;

/// Identifies one registered endpoint on a medium.
pub type EndpointId = usize;

/// A bit-level broadcast bus connecting physical layers.
pub trait Medium: Send + Sync {
    /// Connect an endpoint's inbound bit queue to the medium and return its
    /// id.  Registering the same queue twice returns the original id.
    fn register(&self, tap: Arc<BitQueue>) -> EndpointId;

    /// Broadcast one bit from `sender` to every other registered endpoint.
    ///
    /// Fails with [`LinkError::UnregisteredSender`] when `sender` was never
    /// handed out by [`register`](Medium::register).
    fn transmit(&self, sender: EndpointId, bit: bool) -> Result<(), LinkError>;
}

// ---------------------------------------------------------------------------
// Endpoint roster (shared by all variants)
// ---------------------------------------------------------------------------

/// The set of endpoints connected to a medium, keyed by registration order.
#[derive(Default)]
struct Roster {
    taps: Mutex<Vec<Arc<BitQueue>>>,
}

impl Roster {
    fn register(&self, tap: Arc<BitQueue>) -> EndpointId {
        let mut taps = self.taps.lock().unwrap();
        // No duplicate registrations: the same queue keeps its first id.
        if let Some(id) = taps.iter().position(|t| Arc::ptr_eq(t, &tap)) {
            return id;
        }
        taps.push(tap);
        taps.len() - 1
    }

    /// Deliver `bit` to every endpoint except `sender`, passing each copy
    /// through `corrupt` first.
    fn broadcast(
        &self,
        sender: EndpointId,
        bit: bool,
        mut corrupt: impl FnMut(bool) -> bool,
    ) -> Result<(), LinkError> {
        let taps = self.taps.lock().unwrap();
        if sender >= taps.len() {
            return Err(LinkError::UnregisteredSender(sender));
        }
        for (id, tap) in taps.iter().enumerate() {
            if id != sender {
                tap.push(corrupt(bit));
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// PerfectMedium
// ---------------------------------------------------------------------------

/// An ideal medium: no noise, no errors, no loss.
#[derive(Default)]
pub struct PerfectMedium {
    roster: Roster,
}

impl PerfectMedium {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Medium for PerfectMedium {
    fn register(&self, tap: Arc<BitQueue>) -> EndpointId {
        self.roster.register(tap)
    }

    fn transmit(&self, sender: EndpointId, bit: bool) -> Result<(), LinkError> {
        self.roster.broadcast(sender, bit, |b| b)
    }
}

// ---------------------------------------------------------------------------
// LowNoiseMedium
// ---------------------------------------------------------------------------

/// A medium that occasionally flips a bit.
///
/// The coin is rolled once per recipient, so with more than two endpoints a
/// single transmitted bit can arrive flipped at one recipient and intact at
/// another.
pub struct LowNoiseMedium {
    roster: Roster,
    rng: Mutex<StdRng>,
}

impl LowNoiseMedium {
    /// The probability that any delivered bit is flipped.
    pub const ERROR_PROBABILITY: f64 = 0.001;

    pub fn new() -> Self {
        Self {
            roster: Roster::default(),
            rng: Mutex::new(StdRng::from_os_rng()),
        }
    }

    /// A deterministically seeded medium, so noisy tests are reproducible.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            roster: Roster::default(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

impl Default for LowNoiseMedium {
    fn default() -> Self {
        Self::new()
    }
}

impl Medium for LowNoiseMedium {
    fn register(&self, tap: Arc<BitQueue>) -> EndpointId {
        self.roster.register(tap)
    }

    fn transmit(&self, sender: EndpointId, bit: bool) -> Result<(), LinkError> {
        let mut rng = self.rng.lock().unwrap();
        self.roster.broadcast(sender, bit, |b| {
            if rng.random::<f64>() < Self::ERROR_PROBABILITY {
                log::trace!("[medium] flipped a bit");
                !b
            } else {
                b
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Variant registry
// ---------------------------------------------------------------------------

type MediumCtor = fn() -> Arc<dyn Medium>;

/// Known medium variants, by the name accepted on the command line.
const REGISTRY: &[(&str, MediumCtor)] = &[
    ("Perfect", || Arc::new(PerfectMedium::new())),
    ("LowNoise", || Arc::new(LowNoiseMedium::new())),
];

/// Build the medium variant registered under `name`.
pub fn create(name: &str) -> Result<Arc<dyn Medium>, LinkError> {
    REGISTRY
        .iter()
        .find(|(known, _)| *known == name)
        .map(|(_, ctor)| ctor())
        .ok_or_else(|| LinkError::UnknownVariant {
            kind: "medium",
            name: name.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
