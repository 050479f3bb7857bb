// Initialization errors
//
// Every stage of context creation either fully succeeds or returns one of
// these. None of them are retried; the caller tears down and exits.

use ash::prelude::VkResult;
use ash::vk;
use std::fmt;
use thiserror::Error;

/// Which list a missing capability was looked up in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    InstanceExtension,
    Layer,
    DeviceExtension,
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::InstanceExtension => "instance extension",
            Self::Layer => "layer",
            Self::DeviceExtension => "device extension",
        })
    }
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("Failed to load Vulkan library. Is Vulkan installed? ({0})")]
    Loader(#[from] ash::LoadingError),

    #[error("Required {kind} {name} is not available")]
    MissingCapability { kind: CapabilityKind, name: String },

    #[error("No suitable GPU found ({candidates} candidate(s) checked)")]
    NoSuitableDevice { candidates: usize },

    #[error("Failed to create {resource}: {result}")]
    ResourceCreationFailed {
        resource: &'static str,
        result: vk::Result,
    },

    #[error("Vulkan query '{query}' failed: {result}")]
    QueryFailed {
        query: &'static str,
        result: vk::Result,
    },
}

pub type InitResult<T> = Result<T, InitError>;

impl InitError {
    pub fn missing(kind: CapabilityKind, name: impl Into<String>) -> Self {
        Self::MissingCapability {
            kind,
            name: name.into(),
        }
    }
}

/// Tags a raw `VkResult` with the stage that produced it.
pub(crate) trait VkResultExt<T> {
    fn or_creation_failed(self, resource: &'static str) -> InitResult<T>;
    fn or_query_failed(self, query: &'static str) -> InitResult<T>;
}

impl<T> VkResultExt<T> for VkResult<T> {
    fn or_creation_failed(self, resource: &'static str) -> InitResult<T> {
        self.map_err(|result| InitError::ResourceCreationFailed { resource, result })
    }

    fn or_query_failed(self, query: &'static str) -> InitResult<T> {
        self.map_err(|result| InitError::QueryFailed { query, result })
    }
}
