//! Kling provider: async image generation over a submit-then-poll REST API.

pub mod error;
pub mod provider;
pub mod token;
pub mod image {
    pub mod aspect_ratio;
    pub mod image_model;
    pub mod options;
}

pub use image::image_model::{KlingImageConfig, KlingImageModel};
pub use provider::{build_kling_image, KlingSettings};
pub use token::KlingTokenIssuer;
