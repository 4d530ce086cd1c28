pub mod error;
pub mod image;
pub mod json;
pub mod options;
pub mod transport;

pub use crate::core::error::{SdkError, TransportError};
pub use crate::core::image::{ImageModel, ImageResponse, ImageResponseMeta};
pub use crate::core::transport::{HttpTransport, TransportConfig};

// Convenience re-exports of common types
pub use crate::sdk_types::common::{Headers, ProviderMetadata, ProviderOptions};
pub use crate::sdk_types::image::{ImageData, ImageOptions, ImageWarning};
