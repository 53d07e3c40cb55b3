//! Request/response boundary over the Shelfdesk core.
//!
//! Transport adapters map routes onto [`LibraryApi`] and forward the
//! returned status and JSON body unchanged.

pub mod api;
pub mod requests;
pub mod response;

pub use api::LibraryApi;
pub use requests::{BorrowRequest, ReturnRequest};
pub use response::{status_for, ApiResponse};
