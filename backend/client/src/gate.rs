//! Single-fire gate shared by several event subscriptions.
//!
//! Any number of [`OnceGate`] handles may call [`OnceGate::fire`]; only the
//! first call wins and its value is delivered to the [`GateReceiver`].

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;

pub struct OnceGate<T> {
    sender: Arc<Mutex<Option<oneshot::Sender<T>>>>,
}

impl<T> Clone for OnceGate<T> {
    fn clone(&self) -> Self {
        Self {
            sender: Arc::clone(&self.sender),
        }
    }
}

pub struct GateReceiver<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> OnceGate<T> {
    pub fn new() -> (Self, GateReceiver<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Arc::new(Mutex::new(Some(tx))),
            },
            GateReceiver { receiver: rx },
        )
    }

    /// Returns `true` if this call opened the gate.
    pub fn fire(&self, value: T) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        match sender {
            Some(tx) => {
                // A dropped receiver still counts as fired.
                let _ = tx.send(value);
                true
            }
            None => false,
        }
    }

    pub fn has_fired(&self) -> bool {
        match self.sender.lock() {
            Ok(slot) => slot.is_none(),
            Err(poisoned) => poisoned.into_inner().is_none(),
        }
    }
}

impl<T> GateReceiver<T> {
    /// Wait for the winning value. `None` once every gate handle is gone
    /// without firing.
    pub async fn wait(self) -> Option<T> {
        self.receiver.await.ok()
    }
}
