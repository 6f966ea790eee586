//! Address resolution for the transmit path: a small cache, a per-attempt state machine that
//! holds frames while a request is outstanding, and the link that runs it.

mod cache;
pub use self::cache::*;

mod clock;
pub use self::clock::*;

mod frames;
pub use self::frames::*;

mod resolver;
pub use self::resolver::*;

mod link;
pub use self::link::*;
