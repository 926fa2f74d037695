//! End-to-end HTTP tests for the pageant API
//!
//! This test suite validates:
//! - Registration, login and session handling
//! - Payment submission and admin review with notifications
//! - Public contestant reads and the eligibility filter
//! - Voting uniqueness over HTTP
//! - Admin reporting and export
//! - Photo uploads

pub mod test_utils;

#[cfg(test)]
mod account_flow_tests;

#[cfg(test)]
mod public_voting_tests;

#[cfg(test)]
mod admin_tests;

#[cfg(test)]
mod upload_tests;
