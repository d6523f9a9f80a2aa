//! Test suites for the console core.

mod console_behaviour;
mod lib_api;
pub(crate) mod support;
