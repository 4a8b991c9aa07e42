//! FIFO container for continuations waiting on a pledge.

use std::collections::VecDeque;

/// Ordered queue of pending continuations, owned one-per-pledge.
pub(crate) struct CallbackQueue<C> {
    items: VecDeque<C>,
}

impl<C> CallbackQueue<C> {
    pub(crate) fn new() -> Self {
        Self {
            items: VecDeque::new(),
        }
    }

    pub(crate) fn enqueue(&mut self, item: C) {
        self.items.push_back(item);
    }

    pub(crate) fn dequeue(&mut self) -> Option<C> {
        self.items.pop_front()
    }

    pub(crate) fn len(&self) -> usize {
        self.items.len()
    }

    #[cfg(test)]
    pub(crate) fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
