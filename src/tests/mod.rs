//! tests/mod.rs
mod lifecycle_tests;
mod support;
