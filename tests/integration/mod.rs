//! Integration test suite for foreman.
//!
//! These tests exercise the components together: lock arbitration across
//! independent owners, scheduling over real graphs, and the full pipeline
//! from requirements to summary driven by scripted in-process workers.
//!
//! # Test Categories
//!
//! - `locking`: cross-owner lock contention, expiry, and recovery
//! - `scheduling`: ready-set/assignment behavior over persisted graphs
//! - `pipeline_e2e`: full pipeline runs with scripted workers
//!
//! No external processes or network calls are made; everything runs
//! against temp directories, making the suite safe for CI.

mod fixtures;

mod locking;
mod pipeline_e2e;
