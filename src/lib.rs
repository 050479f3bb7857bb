//! Vulkan bring-up: capability negotiation, device selection and swapchain
//! creation, with every acquired handle released in dependency order.

pub mod backend;
pub mod config;
pub mod error;

pub use error::{CapabilityKind, InitError, InitResult};
