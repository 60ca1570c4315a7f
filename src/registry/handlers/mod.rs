//! Handlers that ship with the bridge itself. Editor-facing handlers are
//! registered by the host.

pub mod diagnostics;
