//! Unit tests for the scheduling module.
//!
//! Tests are organised by component, covering happy paths, failure
//! injection through mocked ports, and the window and cap edge cases.
