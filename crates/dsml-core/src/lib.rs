//! # dsml-core
//!
//! Core types and utilities for talking to directory servers over DSMLv2/SOAP.
//!
//! This crate provides the error taxonomy shared by every directory operation, the table
//! of LDAP result codes, and the HTTP transport that carries SOAP envelopes.
//!
//! ## Modules
//!
//! - [`error`] - Error types and structured error summaries
//! - [`result_code`] - LDAP result codes reported in DSML responses
//! - [`config`] - HTTP transport configuration
//! - [`client`] - The [`Transport`] trait and its HTTP implementation

#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod config;
pub mod error;
pub mod result_code;

// Re-export commonly used types
pub use client::{Credentials, HttpTransport, Transport, TransportRequest};
pub use config::TransportConfig;
pub use error::{Error, Result};
pub use result_code::ResultCode;
