//! Test suites for the server bootstrap, launch sequence and reference
//! counting lifecycle.

mod support;
