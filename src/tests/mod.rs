//! Crate-level scenario tests exercising the full two-context protocol.

mod integration;
