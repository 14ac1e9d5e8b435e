//! VPC address groups: named sets of IP addresses referenced by security group rules

mod api;
mod resource;
mod state;
mod validate;

pub use resource::VpcAddressGroupResource;
