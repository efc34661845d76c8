//! Unit tests - end-to-end query builds against the in-memory catalog
//!
//! Every test builds through the public API and asserts on the rendered SQL
//! or on the frozen query's parts.

mod common;
mod field_parsing_tests;
mod filter_tests;
mod injection_tests;
mod permission_tests;
mod rendering_tests;
