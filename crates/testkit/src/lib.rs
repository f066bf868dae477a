//! Cross-dialect fixture harness for `viborm-migrate`: YAML describes a
//! `(current, desired)` schema pair and the substrings the generated SQL
//! must contain; [`yaml_runner`] diffs, sorts, and generates against a
//! caller-supplied driver and checks the result.

pub mod yaml_runner;

pub use yaml_runner::{load_fixtures_from_str, run_fixture, Fixture, FixtureOutcome};
