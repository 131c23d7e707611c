//! Integration tests against real sockets.

mod helpers;
mod ws_test;
