//! Integration tests for osync-sync
//!
//! `test_session` drives the client against a wiremock server to pin down
//! the request sequence and failure handling. `test_end_to_end` runs a real
//! `osync-server` on a loopback port and syncs between two temp libraries.

mod common;

mod test_end_to_end;
mod test_session;
