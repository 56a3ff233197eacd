// ABOUTME: Command implementations
// ABOUTME: Exports the verify command that compares two servers' schema checksums

pub mod verify;

pub use verify::{render_report, verify, verify_with, VerifyOutcome};
