//! IMS image sharing between projects
//!
//! Sharing and unsharing are asynchronous: the API returns a job id, and the job
//! is polled until it succeeds or fails.

mod api;
mod resource;
mod state;

pub use resource::ImsImageShareResource;
