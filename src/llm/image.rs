// 影像预处理 - 读取、按需缩小并编码为 base64

use std::path::Path;

use anyhow::{anyhow, Result};
use base64::{engine::general_purpose, Engine as _};
use image::codecs::jpeg::JpegEncoder;
use image::GenericImageView;
use tracing::{debug, info};

use super::plugin::ImageAttachment;
use crate::models::ImageSettings;

/// 支持上传的扩展名
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

fn mime_for_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "png" => Some("image/png"),
        "jpg" | "jpeg" => Some("image/jpeg"),
        _ => None,
    }
}

/// 把影像文件转换为可发送的附件
///
/// PNG/JPEG 且尺寸不超过上限时原样发送；过大的图片和 BMP 会被缩小并重新编码为 JPEG
pub fn prepare_image(path: &Path, settings: &ImageSettings) -> Result<ImageAttachment> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(anyhow!(
            "不支持的影像格式: {:?}（支持: {}）",
            path,
            SUPPORTED_EXTENSIONS.join(", ")
        ));
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();

    let img = image::open(path).map_err(|e| anyhow!("读取影像文件失败 {:?}: {}", path, e))?;
    let (width, height) = img.dimensions();
    let max_dimension = settings.max_dimension.max(1);

    if let Some(mime) = mime_for_extension(&ext) {
        if width <= max_dimension && height <= max_dimension {
            let bytes = std::fs::read(path)?;
            debug!("影像 {} ({}x{}) 原样发送", file_name, width, height);
            return Ok(ImageAttachment {
                file_name,
                mime_type: mime.to_string(),
                data_base64: general_purpose::STANDARD.encode(&bytes),
            });
        }
    }

    let resized = if width > max_dimension || height > max_dimension {
        img.resize(max_dimension, max_dimension, image::imageops::FilterType::Lanczos3)
    } else {
        img
    };

    // 使用 JpegEncoder 来指定质量参数
    let rgb = resized.to_rgb8();
    let mut buffer = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buffer, settings.jpeg_quality.clamp(1, 100));
    encoder.encode(rgb.as_raw(), rgb.width(), rgb.height(), image::ColorType::Rgb8)?;

    info!(
        "影像 {} 已重新编码: {}x{} -> {}x{}, {} 字节",
        file_name,
        width,
        height,
        rgb.width(),
        rgb.height(),
        buffer.len()
    );

    Ok(ImageAttachment {
        file_name,
        mime_type: "image/jpeg".to_string(),
        data_base64: general_purpose::STANDARD.encode(&buffer),
    })
}
