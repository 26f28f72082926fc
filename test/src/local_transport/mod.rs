//! In-memory transport for end-to-end testing. Routes payloads between the
//! Authority and one Dependent without any network I/O.

use std::{
    collections::VecDeque,
    sync::{Arc, Mutex},
};

use graft_shared::{MessageReceiver, MessageSender, TransportError};

type Queue = Arc<Mutex<VecDeque<Vec<u8>>>>;

/// Shared state of both directions of a link
#[derive(Clone, Default)]
pub struct LocalLink {
    to_authority: Queue,
    to_dependent: Queue,
    closed: Arc<Mutex<bool>>,
}

impl LocalLink {
    /// Closes both directions. Payloads already queued can still be read.
    pub fn disconnect(&self) {
        *self.closed.lock().unwrap() = true;
    }

    pub fn is_connected(&self) -> bool {
        !*self.closed.lock().unwrap()
    }

    /// Number of payloads queued in either direction
    pub fn pending(&self) -> usize {
        self.to_authority.lock().unwrap().len() + self.to_dependent.lock().unwrap().len()
    }
}

/// Both halves of both ends of a link
pub struct LocalTransportPair {
    pub link: LocalLink,
    pub authority_sender: Box<dyn MessageSender>,
    pub authority_receiver: Box<dyn MessageReceiver>,
    pub dependent_sender: Box<dyn MessageSender>,
    pub dependent_receiver: Box<dyn MessageReceiver>,
}

impl LocalTransportPair {
    pub fn new() -> Self {
        let link = LocalLink::default();
        Self {
            authority_sender: Box::new(LocalSender {
                queue: link.to_dependent.clone(),
                closed: link.closed.clone(),
            }),
            authority_receiver: Box::new(LocalReceiver {
                queue: link.to_authority.clone(),
                closed: link.closed.clone(),
            }),
            dependent_sender: Box::new(LocalSender {
                queue: link.to_authority.clone(),
                closed: link.closed.clone(),
            }),
            dependent_receiver: Box::new(LocalReceiver {
                queue: link.to_dependent.clone(),
                closed: link.closed.clone(),
            }),
            link,
        }
    }
}

impl Default for LocalTransportPair {
    fn default() -> Self {
        Self::new()
    }
}

struct LocalSender {
    queue: Queue,
    closed: Arc<Mutex<bool>>,
}

impl MessageSender for LocalSender {
    fn send(&mut self, payload: &[u8]) -> Result<(), TransportError> {
        if *self.closed.lock().unwrap() {
            return Err(TransportError::Closed);
        }
        self.queue.lock().unwrap().push_back(payload.to_vec());
        Ok(())
    }
}

struct LocalReceiver {
    queue: Queue,
    closed: Arc<Mutex<bool>>,
}

impl MessageReceiver for LocalReceiver {
    fn receive(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        if let Some(payload) = self.queue.lock().unwrap().pop_front() {
            return Ok(Some(payload));
        }
        if *self.closed.lock().unwrap() {
            return Err(TransportError::Closed);
        }
        Ok(None)
    }
}
