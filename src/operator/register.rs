//! Single-slot key register shared between the key reader and the controller.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

const EMPTY: u32 = 0;

/// Latest unconsumed key press, else nothing.
///
/// One producer (the key reader) stores, one consumer (the controller)
/// takes. Taking clears the slot, so each press is acted on at most once.
/// A press that lands before the previous one was taken overwrites it and
/// the earlier key is lost; that race is accepted.
#[derive(Debug, Clone, Default)]
pub struct KeyRegister {
    slot: Arc<AtomicU32>,
}

impl KeyRegister {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a key press. NUL is indistinguishable from "no key" and is ignored.
    pub fn press(&self, key: char) {
        let code = u32::from(key);
        if code != EMPTY {
            self.slot.store(code, Ordering::Release);
        }
    }

    /// Consume the latest key press, if any.
    pub fn take(&self) -> Option<char> {
        match self.slot.swap(EMPTY, Ordering::AcqRel) {
            EMPTY => None,
            code => char::from_u32(code),
        }
    }

    /// Whether a key is waiting, without consuming it.
    pub fn is_pending(&self) -> bool {
        self.slot.load(Ordering::Acquire) != EMPTY
    }
}
