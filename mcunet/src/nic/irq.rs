use core::sync::atomic::{AtomicU8, Ordering};

use super::Interrupt;

/// Interrupt flags latched for the main loop.
///
/// The interrupt service routine only calls [`raise`] with the flags it found. The driver takes
/// the accumulated flags once per iteration of the main loop and does all the protocol work there.
/// Raising and taking are lock-free, a flag raised while the main loop is handling the previous
/// batch is kept for the next one.
///
/// [`raise`]: #method.raise
#[derive(Debug, Default)]
pub struct Pending {
    flags: AtomicU8,
}

impl Pending {
    /// A latch without pending flags.
    pub const fn new() -> Self {
        Pending { flags: AtomicU8::new(0) }
    }

    /// Latch interrupt flags, callable from interrupt context.
    pub fn raise(&self, flags: Interrupt) {
        self.flags.fetch_or(flags.bits(), Ordering::AcqRel);
    }

    /// Take all latched flags, leaving none pending.
    pub fn take(&self) -> Interrupt {
        Interrupt::from_bits_truncate(self.flags.swap(0, Ordering::AcqRel))
    }

    /// Inspect the latched flags without consuming them.
    pub fn peek(&self) -> Interrupt {
        Interrupt::from_bits_truncate(self.flags.load(Ordering::Acquire))
    }
}
