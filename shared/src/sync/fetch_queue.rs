use std::{
    collections::VecDeque,
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use futures::{channel::oneshot, FutureExt};

use crate::{Entity, EntityId, SyncError};

type FetchResult = Result<Entity, SyncError>;

/// Resolves to the requested Entity once its fetch has been processed
pub struct EntityFuture {
    id: EntityId,
    receiver: oneshot::Receiver<FetchResult>,
}

impl EntityFuture {
    pub(crate) fn ready(id: EntityId, result: FetchResult) -> Self {
        let (sender, receiver) = oneshot::channel();
        // the receiver is alive, so sending cannot fail
        let _ = sender.send(result);
        Self { id, receiver }
    }

    pub fn id(&self) -> &EntityId {
        &self.id
    }
}

impl Future for EntityFuture {
    type Output = FetchResult;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.receiver.poll_unpin(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(oneshot::Canceled)) => Poll::Ready(Err(SyncError::FetchDropped {
                id: self.id.to_string(),
            })),
            Poll::Pending => Poll::Pending,
        }
    }
}

pub(crate) struct FetchRequest {
    pub(crate) id: EntityId,
    pub(crate) depth: i32,
    waiters: Vec<oneshot::Sender<FetchResult>>,
}

impl FetchRequest {
    pub(crate) fn resolve(self, result: FetchResult) {
        for waiter in self.waiters {
            // a dropped future no longer wants the result
            let _ = waiter.send(result.clone());
        }
    }
}

/// FIFO queue of depth-limited fetches. A request for an `(id, depth)` that
/// is already queued joins the queued request.
#[derive(Default)]
pub struct FetchQueue {
    requests: VecDeque<FetchRequest>,
}

impl FetchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.requests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    pub fn is_queued(&self, id: &EntityId, depth: i32) -> bool {
        self.requests
            .iter()
            .any(|request| &request.id == id && request.depth == depth)
    }

    pub(crate) fn push(&mut self, id: EntityId, depth: i32) -> EntityFuture {
        let (sender, receiver) = oneshot::channel();
        match self
            .requests
            .iter_mut()
            .find(|request| request.id == id && request.depth == depth)
        {
            Some(request) => request.waiters.push(sender),
            None => self.requests.push_back(FetchRequest {
                id: id.clone(),
                depth,
                waiters: vec![sender],
            }),
        }
        EntityFuture { id, receiver }
    }

    pub(crate) fn front(&self) -> Option<(&EntityId, i32)> {
        self.requests
            .front()
            .map(|request| (&request.id, request.depth))
    }

    pub(crate) fn pop(&mut self) -> Option<FetchRequest> {
        self.requests.pop_front()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn coalesces_identical_requests() {
        let mut queue = FetchQueue::new();
        let first = queue.push(EntityId::new("Display-1"), 1);
        let second = queue.push(EntityId::new("Display-1"), 1);
        let _third = queue.push(EntityId::new("Display-1"), 2);
        assert_eq!(queue.len(), 2);

        let request = queue.pop().unwrap();
        let entity = Entity::new(
            EntityId::new("Display-1"),
            EntityId::new("Screen"),
            "displays".to_string(),
            "Display".to_string(),
            String::new(),
        );
        request.resolve(Ok(entity));

        assert_eq!(first.now_or_never().unwrap().unwrap().id(), "Display-1");
        assert_eq!(second.now_or_never().unwrap().unwrap().id(), "Display-1");
    }

    #[test]
    fn dropped_request_fails_its_futures() {
        let mut queue = FetchQueue::new();
        let future = queue.push(EntityId::new("Browser-1"), 0);
        drop(queue);

        assert_eq!(
            future.now_or_never().unwrap().unwrap_err(),
            SyncError::FetchDropped {
                id: "Browser-1".to_string()
            }
        );
    }
}
