//! Application layer - services orchestrating the domain over ports.

pub mod billing;
