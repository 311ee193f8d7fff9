//! # Domain Layer
//!
//! Value objects, entities, domain services and domain errors. Nothing in
//! this layer performs I/O.

pub mod entities;
pub mod errors;
pub mod services;
pub mod value_objects;
