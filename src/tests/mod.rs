//! In-crate tests, run on the host shim architecture.

mod helpers;
mod integration;
