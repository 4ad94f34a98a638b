//! Cluster API vSphere Cleaner Library
//!
//! This library provides the core functionality of the vSphere cleaner
//! controller: the finalizer-gated deletion orchestrator, its store, session
//! and cleaner seams, and the runtime that drives it.
//!
//! ## Quick Start
//!
//! ```rust
//! use cluster_api_cleaner_vsphere::prelude::*;
//! ```
//!
//! This brings commonly used types and traits into scope. For more specific imports,
//! use the individual modules.

pub mod cancel;
pub mod cleaner;
pub mod config;
pub mod constants;
pub mod controller;
pub mod crd;
pub mod observability;
pub mod prelude;
pub mod provider;
pub mod runtime;
pub mod session;
pub mod store;
