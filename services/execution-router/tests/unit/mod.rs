//! Unit test modules for execution-router service
//!
//! Comprehensive test coverage for all service components


pub mod venue_tests;            // Venue management and failover
