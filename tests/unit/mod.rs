//! Unit test modules.

mod plan_test;
mod session_test;
