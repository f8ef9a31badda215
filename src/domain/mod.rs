//! Domain layer: identity types and collaborator ports.

pub mod entities;
pub mod ports;
