//! Tree-level integration tests.
//!
//! These run whole workloads through the public API of both tree variants
//! and verify the structural properties with the invariant checker.

mod annihilation_test;
mod capacity_test;
mod growth_test;
mod piggyback_test;
mod query_test;
