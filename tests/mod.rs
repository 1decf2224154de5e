//! Test suite for eventsync
//!
//! This module organizes all tests

pub mod common;
pub mod property;
