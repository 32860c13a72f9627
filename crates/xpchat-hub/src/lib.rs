//! In-process room backend: an ordered message log per room with a change
//! feed, plus an in-memory media store. Used by the terminal console and by
//! tests in place of a hosted document database.

pub mod hub;
pub mod media;

pub use hub::Hub;
pub use media::MemoryMediaStore;
