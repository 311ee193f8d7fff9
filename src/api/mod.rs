//! # API Layer
//!
//! HTTP entry points.

pub mod rest;
