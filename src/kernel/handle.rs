// Generational action handles
//
// An ActionId names one registration, not one slot. The slot index
// sits in the low byte, the slot's generation in the high byte.
// Generations skip 0, so the packed value is never 0 and raw 0 stays
// free to mean "no action" wherever a handle is stored as a plain u16
// (atomics shared with an ISR, for instance).

use core::fmt;
use core::num::{NonZeroU8, NonZeroU16};

/// Raw value that never decodes to a live handle.
pub const INVALID_RAW_ID: u16 = 0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionId(NonZeroU16);

impl ActionId {
    #[inline]
    pub(crate) const fn new(index: u8, generation: NonZeroU8) -> Self {
        let raw = (index as u16) | ((generation.get() as u16) << 8);
        // high byte is non-zero, so raw is too
        match NonZeroU16::new(raw) {
            Some(raw) => Self(raw),
            None => unreachable!(),
        }
    }

    /// Pool slot this handle refers to.
    #[inline]
    pub const fn index(self) -> u8 {
        (self.0.get() & 0xff) as u8
    }

    /// Generation the slot carried when the action was registered.
    #[inline]
    pub const fn generation(self) -> u8 {
        (self.0.get() >> 8) as u8
    }

    #[inline]
    pub const fn to_raw(self) -> u16 {
        self.0.get()
    }

    /// Decode a packed handle. `None` for [`INVALID_RAW_ID`] and for
    /// values with a zero generation byte, neither of which the
    /// scheduler ever hands out.
    pub const fn from_raw(raw: u16) -> Option<Self> {
        if raw >> 8 == 0 {
            return None;
        }
        match NonZeroU16::new(raw) {
            Some(raw) => Some(Self(raw)),
            None => None,
        }
    }
}

impl fmt::Display for ActionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}.{}", self.index(), self.generation())
    }
}

// Next generation for a slot being (re)allocated; wraps 255 -> 1.
#[inline]
pub(crate) const fn next_generation(current: u8) -> NonZeroU8 {
    match NonZeroU8::new(current.wrapping_add(1)) {
        Some(g) => g,
        None => NonZeroU8::MIN,
    }
}
