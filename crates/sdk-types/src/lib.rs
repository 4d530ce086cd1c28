//! Type definitions for the image generation SDK
//!
//! This crate provides the provider-agnostic types used to describe image
//! generation calls, their results, and provider-scoped option plumbing.

pub mod common;
pub mod image;

pub use common::{Headers, ProviderMetadata, ProviderOptions};
pub use image::{ImageData, ImageOptions, ImageWarning};
