//! Synchronization primitives shared between threads and interrupt handlers.
//!
//! Every read-modify-write of shared state happens inside a
//! [`CriticalSection`]; the only exception is [`Fifo::put`], which relies on
//! single-producer/single-consumer ownership instead so handlers can call it.

pub mod critical;
pub mod fifo;
pub mod mailbox;
pub mod semaphore;

pub use critical::CriticalSection;
pub use fifo::Fifo;
pub use mailbox::Mailbox;
pub use semaphore::Semaphore;
