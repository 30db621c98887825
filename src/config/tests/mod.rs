//! Unit tests for corral configuration types.
//!
//! - [`helpers`] - Shared fixtures and helper functions
//! - [`types_tests`] - Defaults and TOML parsing
//! - [`validation`] - `AppConfig::validate` and CLI parsing
//! - [`layer_precedence_tests`] - `MergeComposer` layer precedence tests

mod helpers;
