//! Example models for the Cascade engine.

pub mod lotka_volterra;
