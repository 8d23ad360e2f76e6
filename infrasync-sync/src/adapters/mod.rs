//! Concrete [`Adapter`](crate::adapter::Adapter) implementations.

pub mod file;
pub mod infrahub;
pub mod rest;
