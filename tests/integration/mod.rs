//! Integration test suite for fray.
//!
//! These tests exercise the full pipeline from task spec to promoted
//! branches, including parallel execution and partial-failure tolerance.
//! They verify that all components work together correctly.
//!
//! # Test Categories
//!
//! - `battle_e2e`: Full battle runs against real temporary repositories
//! - `parallel_exec`: Executor timeout and partial-failure behaviour
//!
//! # CI Compatibility
//!
//! These tests use the simulated worker and temporary git repositories;
//! they make no network calls and are safe to run in CI environments.

mod fixtures;

mod battle_e2e;
mod parallel_exec;
