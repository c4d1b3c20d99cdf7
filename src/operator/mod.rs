//! Operator input
//!
//! Single-character commands: `0`-`9` select a feeder, `p` pick/place,
//! `c` camera, `r` rotate-correct, `a` amend-correct, `h` home, `q` quit.
//! `q` is handled here by raising the channel's quit flag; every other key
//! goes into the [`KeyRegister`] for the controller to consume.

mod register;
mod source;

pub use register::KeyRegister;
pub use source::{KeyEvent, KeySource, ScriptedKeys, StdinKeys};

use crate::channel::ControllerPort;

/// Whether a key asks to shut the machine down.
pub const fn is_quit_key(key: char) -> bool {
    matches!(key, 'q' | 'Q')
}

/// Route one key press. Returns `true` if it requested quit.
pub fn deliver(key: char, register: &KeyRegister, port: &ControllerPort) -> bool {
    if is_quit_key(key) {
        port.request_quit();
        true
    } else {
        register.press(key);
        false
    }
}
