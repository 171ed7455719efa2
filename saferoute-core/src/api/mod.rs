//! REST API client module for the SafeRoute backend.
//!
//! This module provides the [`ApiClient`] that decorates every request with
//! the stored bearer token and device identifier, plus the [`RequestOptions`]
//! callers use to describe a request.

pub mod client;
pub mod error;
pub mod request;

pub use client::{ApiClient, DEVICE_ID_HEADER};
pub use error::ApiError;
pub use request::{Method, RequestOptions, normalize_endpoint, redact_headers};
