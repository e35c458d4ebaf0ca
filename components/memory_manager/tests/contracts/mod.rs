//! Contract tests for the memory_manager API
//!
//! These tests verify the public API matches the contract of the nursery
//! subsystem and its collaborators.
