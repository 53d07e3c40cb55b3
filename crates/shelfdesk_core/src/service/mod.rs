//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into use-case level APIs.
//! - Publish state-change events after successful writes.
//! - Keep boundary layers decoupled from storage details.

mod kind;

pub mod catalog_service;
pub mod circulation_service;
pub mod member_service;
pub mod notification_service;

pub use kind::ErrorKind;
