use std::sync::Arc;

use anyhow::Result;
use image_sdk_rs::core::ImageModel;
use image_sdk_rs::providers::kling::{build_kling_image, KlingSettings};
use image_sdk_rs::storage::S3ObjectStore;
use image_sdk_rs::types::image::ImageOptions;

// Run with:
//   KLING_ACCESS_KEY=ak... KLING_SECRET_KEY=sk... \
//   STORAGE_BUCKET=generated-assets STORAGE_PUBLIC_BASE_URL=https://cdn.example.com \
//   cargo run -p generate-image -- "a watercolor fox in the snow"
// Optional:
//   KLING_MODEL=kling-v1          (default)
//   KLING_API_BASE_URL=https://api.klingai.com
//   IMAGE_SIZE=1024x1024          (default)

#[tokio::main]
async fn main() -> Result<()> {
    let prompt = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "a watercolor fox in the snow".to_string());
    let model_id = std::env::var("KLING_MODEL").unwrap_or_else(|_| "kling-v1".to_string());
    let size = std::env::var("IMAGE_SIZE").unwrap_or_else(|_| "1024x1024".to_string());

    let settings = KlingSettings::from_env();
    if settings.access_key.is_none() || settings.secret_key.is_none() {
        eprintln!("KLING_ACCESS_KEY / KLING_SECRET_KEY are not set. Set them in your environment.");
        std::process::exit(1);
    }

    let store = S3ObjectStore::from_env().await?;
    let model = build_kling_image(&settings, &model_id, Arc::new(store))?;

    let options = ImageOptions {
        prompt: Some(prompt),
        size: Some(size),
        ..Default::default()
    };
    let result = model.do_generate(options).await?;

    for image in &result.images {
        match image.as_url() {
            Some(url) => println!("{url}"),
            None => println!("[inline image bytes]"),
        }
    }
    for warning in &result.warnings {
        eprintln!("[warning] {warning:?}");
    }

    Ok(())
}
