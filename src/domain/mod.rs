//! Domain Layer
//!
//! Entities, value objects, ports, and pure provider-health logic.
//! Nothing in here performs I/O.

pub mod entities;
pub mod error;
pub mod ports;
pub mod services;
pub mod value_objects;
