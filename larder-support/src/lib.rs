//! # Larder Support
//!
//! Shared utilities for the Larder IoC container.
//!
//! This crate provides:
//! - Type-name shortening for identifier descriptions
//! - "Did you mean" hints for missing loaders

pub mod rendering;
