//! WAF dedicated instances

mod api;
mod resource;
mod state;

pub use resource::WafDedicatedInstanceResource;
