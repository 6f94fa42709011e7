//! Behaviors shipped with the runtime.

pub mod clock;

pub use clock::Clock;
