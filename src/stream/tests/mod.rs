//! Unit tests for the attach stream adapters.
//!
//! This module contains tests organised into:
//! - [`helpers`] - A scripted endpoint and frame builders
//! - [`reader_tests`] - `StreamReader` behaviour
//! - [`writer_tests`] - `StreamWriter` behaviour
//! - [`round_trip_tests`] - Reader and writer wired through `channel_pair`

mod helpers;
