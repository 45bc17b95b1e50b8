//! Integration test driver for `tests/integration/` submodule.
//!
//! Each `mod` below maps to a file that exercises one slice of the engine
//! against mock adapters.  Nothing here touches a real location provider.

mod mock_ports;
mod sink_failure_tests;
mod watch_thread_tests;
