//! Client-side modules: the session layer the rest of the UI builds on

pub mod session;
