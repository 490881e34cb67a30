//! Integration tests of the imbridge workspace
//!
//! The tests in `tests/` run a real [`imbridge::Core`] over socket pairs and
//! talk to it with a raw wire client, so that every message crossing the
//! bridge can be checked.
