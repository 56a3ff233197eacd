// ABOUTME: Library module for postgres-schema-verifier
// ABOUTME: Exports all core functionality for use in binary and tests

pub mod commands;
pub mod config;
pub mod error;
pub mod postgres;
pub mod utils;
pub mod verification;

#[cfg(test)]
pub(crate) mod test_support;
