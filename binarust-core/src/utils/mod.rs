//! Test support: tensor comparison, the function tester and reference implementations.

pub mod reference;
pub mod testing;
