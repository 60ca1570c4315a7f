//! Automation bridge between external clients and a running editor process.
//!
//! Two pieces: [`discovery`] lets a client find the port of the server for a
//! project through a per-user directory of JSON records, and [`registry`]
//! defines how handlers validate, route, gate and answer commands.

pub mod discovery;
pub mod error;
pub mod paths;
pub mod registry;
pub mod settings;
pub mod storage;
