//! Chain observation: shield scanning and receipt resolution.

mod observer;

pub use observer::*;
