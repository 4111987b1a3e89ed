// Delta-encoded timeline over the node pool
//
// Linked slots are kept in fire order. Each node stores only the ticks
// between its predecessor and itself, so the head's delta is the time
// until the next firing and advancing time only ever touches the head.
//
// The chain ends point at themselves (head.prev == head, tail.next ==
// tail) instead of at a null index. A node that is self-linked but is
// not the head of a non-empty chain is isolated: it was detached for
// firing and is no longer part of the ordering.

use super::pool::{Node, Pool};

pub(crate) struct Timeline<T, const N: usize> {
    pub pool: Pool<T, N>,
    head: u8,
    tail: u8,
    len: u16,
}

impl<T: Copy, const N: usize> Timeline<T, N> {
    pub const fn new() -> Self {
        Self {
            pool: Pool::new(),
            head: 0,
            tail: 0,
            len: 0,
        }
    }

    /// Linked node count. A node detached for firing is not counted.
    #[cfg(test)]
    pub fn len(&self) -> u16 {
        self.len
    }

    #[inline]
    pub fn tail(&self) -> u8 {
        self.tail
    }

    #[inline]
    pub fn head_delta(&self) -> Option<u32> {
        (self.len > 0).then(|| self.pool[self.head].delta)
    }

    /// Link `idx` so that it fires `delay` ticks from now.
    ///
    /// Ties are placed after the nodes already due at the same instant,
    /// so equal deadlines fire in registration order.
    pub fn insert(&mut self, idx: u8, delay: u32) {
        if self.len == 0 {
            let node = &mut self.pool[idx];
            node.delta = delay;
            node.prev = idx;
            node.next = idx;
            self.head = idx;
            self.tail = idx;
            self.len = 1;
            return;
        }

        let mut remaining = delay;
        let mut before: Option<u8> = None;
        let mut after: Option<u8> = Some(self.head);
        while let Some(cursor) = after {
            let delta = self.pool[cursor].delta;
            if delta > remaining {
                break;
            }
            remaining -= delta;
            before = Some(cursor);
            after = (cursor != self.tail).then(|| self.pool[cursor].next);
        }

        self.pool[idx].delta = remaining;
        match (before, after) {
            (None, Some(succ)) => {
                // new head
                self.link(idx, idx, succ);
                self.pool[succ].delta -= remaining;
                self.head = idx;
            }
            (Some(pred), None) => {
                // new tail
                self.link(pred, idx, idx);
                self.tail = idx;
            }
            (Some(pred), Some(succ)) => {
                self.link(pred, idx, succ);
                self.pool[succ].delta -= remaining;
            }
            (None, None) => unreachable!("non-empty chain has a head"),
        }
        self.len += 1;
    }

    // pred <-> idx <-> succ; pred == idx or succ == idx marks an end
    fn link(&mut self, pred: u8, idx: u8, succ: u8) {
        self.pool[idx].prev = pred;
        self.pool[idx].next = succ;
        if pred != idx {
            self.pool[pred].next = idx;
        }
        if succ != idx {
            self.pool[succ].prev = idx;
        }
    }

    /// Unlink `idx`, preserving the absolute fire time of every other
    /// node. Returns false if `idx` was not part of the chain.
    pub fn remove(&mut self, idx: u8) -> bool {
        match self.len {
            0 => return false,
            1 => {
                if idx != self.head {
                    return false;
                }
                self.head = idx;
                self.tail = idx;
            }
            _ if idx == self.head => {
                let next = self.pool[idx].next;
                let left = self.pool[idx].delta;
                let succ = &mut self.pool[next];
                succ.prev = next;
                succ.delta = succ.delta.saturating_add(left);
                self.head = next;
            }
            _ if idx == self.tail => {
                let prev = self.pool[idx].prev;
                self.pool[prev].next = prev;
                self.tail = prev;
            }
            _ => {
                if is_isolated(&self.pool[idx], idx) {
                    return false;
                }
                let Node {
                    prev, next, delta, ..
                } = self.pool[idx];
                self.pool[prev].next = next;
                let succ = &mut self.pool[next];
                succ.prev = prev;
                succ.delta = succ.delta.saturating_add(delta);
            }
        }
        self.isolate(idx);
        self.len -= 1;
        true
    }

    /// Detach the head for firing. Its delta is not folded forward: the
    /// caller has already consumed it.
    pub fn pop_head(&mut self) -> Option<u8> {
        if self.len == 0 {
            return None;
        }
        let idx = self.head;
        if self.len > 1 {
            let next = self.pool[idx].next;
            self.pool[next].prev = next;
            self.head = next;
        }
        self.isolate(idx);
        self.len -= 1;
        Some(idx)
    }

    /// Charge ticks that were not enough to fire anything to the head.
    pub fn consume(&mut self, ticks: u32) {
        if self.len > 0 {
            let head = &mut self.pool[self.head];
            debug_assert!(head.delta >= ticks, "consumed past a due node");
            head.delta = head.delta.saturating_sub(ticks);
        }
    }

    pub fn reset(&mut self) {
        self.pool.reset();
        self.head = 0;
        self.tail = 0;
        self.len = 0;
    }

    /// Slot indices in fire order.
    pub fn iter(&self) -> Chain<'_, T, N> {
        Chain {
            timeline: self,
            cursor: (self.len > 0).then_some(self.head),
        }
    }

    fn isolate(&mut self, idx: u8) {
        let node = &mut self.pool[idx];
        node.prev = idx;
        node.next = idx;
    }
}

#[inline]
fn is_isolated<T>(node: &Node<T>, idx: u8) -> bool {
    node.prev == idx && node.next == idx
}

pub(crate) struct Chain<'a, T, const N: usize> {
    timeline: &'a Timeline<T, N>,
    cursor: Option<u8>,
}

impl<T, const N: usize> Iterator for Chain<'_, T, N> {
    type Item = u8;

    fn next(&mut self) -> Option<u8> {
        let idx = self.cursor?;
        // stop on the tail, not on a null link
        self.cursor = (idx != self.timeline.tail).then(|| self.timeline.pool[idx].next);
        Some(idx)
    }
}
