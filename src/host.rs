//! A single host: one network stack bound to a medium.
//!
//! The host wires medium → physical layer → data link variant, then runs the
//! link's event loop as a background task.  The application-facing surface is
//! deliberately tiny: queue bytes with [`Host::send`], collect what the peer
//! delivered with [`Host::retrieve`], shut down with [`Host::stop`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::datalink::{self, ByteQueue, DataLinkLayer};
use crate::error::LinkError;
use crate::medium::Medium;
use crate::physical::PhysicalLayer;

pub struct Host {
    /// The assembled link, held until [`start`](Host::start) moves it into
    /// its task.
    link: Option<DataLinkLayer>,
    /// Application bytes queued for transmission.
    send_buffer: Arc<ByteQueue>,
    /// Bytes the link delivered, awaiting retrieval.
    delivered: Arc<ByteQueue>,
    stop_requested: Arc<AtomicBool>,
    running: Option<JoinHandle<()>>,
}

impl Host {
    /// Build a host attached to `medium`, running the data link variant
    /// registered under `link_type` (for example `"PAR"`).
    pub fn new(medium: &Arc<dyn Medium>, link_type: &str) -> Result<Self, LinkError> {
        let physical = PhysicalLayer::attach(Arc::clone(medium));
        let send_buffer = Arc::new(ByteQueue::new());
        let delivered = Arc::new(ByteQueue::new());
        let stop_requested = Arc::new(AtomicBool::new(false));

        let link = DataLinkLayer::new(
            physical,
            datalink::create(link_type)?,
            send_buffer.clone(),
            delivered.clone(),
            stop_requested.clone(),
        )?;

        Ok(Self {
            link: Some(link),
            send_buffer,
            delivered,
            stop_requested,
            running: None,
        })
    }

    /// Start the data link event loop as a background task.
    pub fn start(&mut self) {
        if let Some(link) = self.link.take() {
            self.running = Some(tokio::spawn(link.run()));
        }
    }

    /// Queue bytes for transmission to the peer.  May be called from any
    /// thread, before or after [`start`](Host::start).
    pub fn send(&self, data: &[u8]) {
        self.send_buffer.push_slice(data);
    }

    /// Drain and return every byte delivered since the last call.
    pub fn retrieve(&self) -> Vec<u8> {
        self.delivered.drain_all()
    }

    /// Ask the event loop to exit and wait for it to finish.  In-flight
    /// frames are abandoned; there is no graceful drain.
    pub async fn stop(&mut self) {
        self.stop_requested.store(true, Ordering::Relaxed);
        if let Some(running) = self.running.take() {
            let _ = running.await;
        }
    }
}
