//! Messaging transport backed by the Zulip REST API.

mod api;
mod http;

pub use http::ZulipHttpTransport;
