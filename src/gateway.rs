//! Contract with a bridge to a real KNX/IP gateway.
//!
//! The core only exchanges [`Telegram`] values with the bridge. Wire
//! encoding, sequencing and acknowledgements belong to the bridge.

use crate::telegram::Telegram;
use heapless::spsc::Queue;
use std::sync::{Arc, Mutex};
use tracing::warn;

/// Usable capacity is one less than the const parameter.
const LOOPBACK_QUEUE_SIZE: usize = 64;

pub trait GatewayBridge: Send {
    /// A telegram produced inside the simulation, to be sent to the network.
    fn outbound(&mut self, telegram: &Telegram);

    /// Next telegram received from the network, if any.
    fn poll_inbound(&mut self) -> Option<Telegram>;
}

struct Queues {
    inbound: Queue<Telegram, LOOPBACK_QUEUE_SIZE>,
    outbound: Queue<Telegram, LOOPBACK_QUEUE_SIZE>,
}

impl Default for Queues {
    fn default() -> Self {
        Self {
            inbound: Queue::new(),
            outbound: Queue::new(),
        }
    }
}

/// In-memory bridge. Clones share the same queues, so a caller can keep a
/// handle after giving one to a room.
#[derive(Clone, Default)]
pub struct LoopbackGateway {
    queues: Arc<Mutex<Queues>>,
}

impl std::fmt::Debug for LoopbackGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoopbackGateway").finish_non_exhaustive()
    }
}

impl LoopbackGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a telegram as if it arrived from the network.
    ///
    /// # Errors
    ///
    /// Gives the telegram back when the inbound queue is full.
    pub fn inject(&self, telegram: Telegram) -> Result<(), Telegram> {
        match self.queues.lock() {
            Ok(mut queues) => queues.inbound.enqueue(telegram),
            Err(_) => Err(telegram),
        }
    }

    /// Take every telegram sent so far, oldest first.
    pub fn take_outbound(&self) -> Vec<Telegram> {
        let Ok(mut queues) = self.queues.lock() else {
            return Vec::new();
        };
        let mut sent = Vec::with_capacity(queues.outbound.len());
        while let Some(telegram) = queues.outbound.dequeue() {
            sent.push(telegram);
        }
        sent
    }
}

impl GatewayBridge for LoopbackGateway {
    fn outbound(&mut self, telegram: &Telegram) {
        let Ok(mut queues) = self.queues.lock() else {
            warn!("loopback gateway lock poisoned, outbound telegram dropped");
            return;
        };
        if queues.outbound.is_full() {
            // keep the most recent telegrams
            queues.outbound.dequeue();
        }
        let _ = queues.outbound.enqueue(telegram.clone());
    }

    fn poll_inbound(&mut self) -> Option<Telegram> {
        self.queues.lock().ok()?.inbound.dequeue()
    }
}
