//! Unit tests for the authentication service
//!
//! This module contains all unit tests organized by component

pub mod zerodha_service_tests;
pub mod grpc_service_tests;
pub mod token_management_tests;

// Common test utilities
pub mod test_utils;