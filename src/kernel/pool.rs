// Fixed node pool, no heap
//
// Every scheduled action lives in one of N slots for its whole life.
// A slot is free iff `action` is None. Links are slot indices and
// belong to the timeline; the pool only hands slots out and takes
// them back.

use core::num::NonZeroU8;
use core::ops::{Index, IndexMut};

use super::handle::{ActionId, next_generation};
use super::scheduler::{Callback, Disposition};

#[derive(Clone, Copy)]
pub(crate) struct Action<T> {
    pub callback: Callback<T>,
    pub arg: T,
}

impl<T: Copy> Action<T> {
    #[inline]
    pub fn fire(self) -> Disposition {
        (self.callback)(self.arg)
    }

    #[inline]
    pub fn calls(&self, callback: Callback<T>) -> bool {
        core::ptr::fn_addr_eq(self.callback, callback)
    }
}

pub(crate) struct Node<T> {
    pub action: Option<Action<T>>,
    // 0 until the slot is first claimed, never 0 afterwards
    pub generation: u8,
    // ticks after the previous node in the chain (after "now" for the head)
    pub delta: u32,
    pub reload: u32,
    pub prev: u8,
    pub next: u8,
}

impl<T> Node<T> {
    const VACANT: Self = Self {
        action: None,
        generation: 0,
        delta: 0,
        reload: 0,
        prev: 0,
        next: 0,
    };
}

pub(crate) struct Pool<T, const N: usize> {
    nodes: [Node<T>; N],
    occupied: u16,
}

impl<T: Copy, const N: usize> Pool<T, N> {
    pub const fn new() -> Self {
        Self {
            nodes: [const { Node::VACANT }; N],
            occupied: 0,
        }
    }

    #[inline]
    pub fn occupied(&self) -> u16 {
        self.occupied
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        usize::from(self.occupied) >= N
    }

    #[inline]
    pub fn action(&self, idx: u8) -> Option<Action<T>> {
        self.nodes.get(usize::from(idx)).and_then(|n| n.action)
    }

    // First free slot scanning forward from just after `after`, wrapping
    // once around the whole pool (`after` itself is checked last).
    pub fn find_free(&self, after: u8) -> Option<u8> {
        let start = usize::from(after) + 1;
        (0..N)
            .map(|step| (start + step) % N)
            .find(|&i| self.nodes[i].action.is_none())
            .map(|i| i as u8)
    }

    // Take a free slot for a new registration. Bumps the generation so
    // handles from the slot's previous life stop matching.
    pub fn claim(&mut self, idx: u8, action: Action<T>, reload: u32) -> ActionId {
        let node = &mut self[idx];
        debug_assert!(node.action.is_none(), "claiming an occupied slot");
        let generation: NonZeroU8 = next_generation(node.generation);
        node.generation = generation.get();
        node.action = Some(action);
        node.reload = reload;
        node.delta = 0;
        node.prev = idx;
        node.next = idx;
        self.occupied += 1;
        ActionId::new(idx, generation)
    }

    pub fn release(&mut self, idx: u8) {
        if self[idx].action.take().is_some() {
            self.occupied -= 1;
        }
    }

    // Drop every action. Generations survive so handles taken before the
    // reset cannot cancel registrations made after it.
    pub fn reset(&mut self) {
        for (i, node) in self.nodes.iter_mut().enumerate() {
            node.action = None;
            node.delta = 0;
            node.reload = 0;
            node.prev = i as u8;
            node.next = i as u8;
        }
        self.occupied = 0;
    }

    pub fn iter_actions(&self) -> impl Iterator<Item = &Action<T>> {
        self.nodes.iter().filter_map(|n| n.action.as_ref())
    }
}

impl<T, const N: usize> Index<u8> for Pool<T, N> {
    type Output = Node<T>;

    #[inline]
    fn index(&self, idx: u8) -> &Node<T> {
        &self.nodes[usize::from(idx)]
    }
}

impl<T, const N: usize> IndexMut<u8> for Pool<T, N> {
    #[inline]
    fn index_mut(&mut self, idx: u8) -> &mut Node<T> {
        &mut self.nodes[usize::from(idx)]
    }
}
