//! Marshaling of SDK callbacks onto the coordinating context.
//!
//! The vendor SDK raises its callbacks on threads it owns. Each callback
//! kind gets its own bounded channel whose sender lives in [`CallbackPorts`]
//! (handed to the SDK) and whose receiver lives in [`EventChannels`] (owned
//! by the coordinator). Ordering is FIFO within a kind; there is no
//! cross-kind ordering guarantee. Sends never block and never panic: a full
//! channel drops the newest item (the producer outruns the consumer only
//! for frames, where dropping is the correct behavior), and a closed
//! channel means the coordinator is shutting down, so the callback becomes
//! a no-op.

use tokio::sync::mpsc;
use tracing::{trace, warn};

/// Sender half of the marshaling layer, cloned into SDK callback threads.
#[derive(Clone)]
pub struct CallbackPorts {
    progress: mpsc::Sender<u8>,
    frame: mpsc::Sender<Vec<u8>>,
    image: mpsc::Sender<Vec<u8>>,
    device_added: mpsc::Sender<()>,
    device_shutdown: mpsc::Sender<()>,
}

impl CallbackPorts {
    /// Transfer progress callback. 100 is normalized back to 0, meaning
    /// the transfer finished and the indicator should read idle.
    pub fn progress(&self, percent: u8) {
        let percent = if percent == 100 { 0 } else { percent };
        if self.progress.try_send(percent).is_err() {
            trace!("Progress update dropped");
        }
    }

    /// A raw live-view frame buffer is ready.
    pub fn frame(&self, buffer: Vec<u8>) {
        if self.frame.try_send(buffer).is_err() {
            trace!("Live-view frame dropped, consumer busy or gone");
        }
    }

    /// A captured still image finished transferring.
    pub fn image(&self, buffer: Vec<u8>) {
        if self.image.try_send(buffer).is_err() {
            warn!("Captured image dropped, coordinator not receiving");
        }
    }

    /// A device was plugged in.
    pub fn device_added(&self) {
        if self.device_added.try_send(()).is_err() {
            trace!("Device-added notification dropped");
        }
    }

    /// The connected device shut down or was unplugged.
    pub fn device_shutdown(&self) {
        if self.device_shutdown.try_send(()).is_err() {
            warn!("Device-shutdown notification dropped");
        }
    }
}

/// Receiver half of the marshaling layer, owned by the coordinator loop.
pub struct EventChannels {
    pub progress: mpsc::Receiver<u8>,
    pub frame: mpsc::Receiver<Vec<u8>>,
    pub image: mpsc::Receiver<Vec<u8>>,
    pub device_added: mpsc::Receiver<()>,
    pub device_shutdown: mpsc::Receiver<()>,
}

/// Create the five per-kind channels with the given capacity.
pub fn event_channels(capacity: usize) -> (CallbackPorts, EventChannels) {
    let (progress_tx, progress_rx) = mpsc::channel(capacity);
    let (frame_tx, frame_rx) = mpsc::channel(capacity);
    let (image_tx, image_rx) = mpsc::channel(capacity);
    let (added_tx, added_rx) = mpsc::channel(capacity);
    let (shutdown_tx, shutdown_rx) = mpsc::channel(capacity);

    (
        CallbackPorts {
            progress: progress_tx,
            frame: frame_tx,
            image: image_tx,
            device_added: added_tx,
            device_shutdown: shutdown_tx,
        },
        EventChannels {
            progress: progress_rx,
            frame: frame_rx,
            image: image_rx,
            device_added: added_rx,
            device_shutdown: shutdown_rx,
        },
    )
}
