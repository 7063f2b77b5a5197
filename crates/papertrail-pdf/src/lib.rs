//! Papertrail PDF: first-page rasterization for OCR.
//!
//! Scanned invoices arrive as PDFs; the OCR service wants a raster image.
//! This crate sniffs PDF bytes, renders the first page to a bounded-resolution
//! JPEG, and enforces a hard wall-clock timeout so a hostile or broken file
//! cannot stall the pipeline. On timeout or renderer failure the caller gets
//! a typed error and routes into the body-extraction fallback, never a
//! silent no-op.
//!
//! The actual renderer (pdfium) links a system library, so it sits behind the
//! `render` feature; without it, conversion returns
//! `PdfError::FeatureNotEnabled` and sniffing still works.

use std::time::Duration;

use thiserror::Error;
use tracing::{debug, warn};

/// Longest edge of the rendered page, in pixels. Bounded so OCR cost and
/// payload size stay predictable.
pub const MAX_RENDER_EDGE_PX: u32 = 1600;

/// JPEG quality for the rendered page.
pub const RENDER_JPEG_QUALITY: u8 = 80;

/// Hard wall-clock limit for one conversion.
pub const DEFAULT_CONVERT_TIMEOUT: Duration = Duration::from_secs(12);

#[derive(Debug, Error)]
pub enum PdfError {
    #[error("not a PDF: missing %PDF header")]
    NotAPdf,

    #[error("PDF conversion timed out after {0:?}")]
    Timeout(Duration),

    #[error("PDF rendering failed: {0}")]
    Rendering(String),

    #[error("PDF has no pages")]
    EmptyDocument,

    #[error("JPEG encoding failed: {0}")]
    Encoding(String),

    #[error("PDF rendering not enabled. Compile with --features render")]
    FeatureNotEnabled,
}

/// PDF by byte signature: the file starts with the literal `%PDF-` header.
pub fn is_pdf_bytes(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF-")
}

/// Rasterizes the first page of a PDF to a bounded-resolution JPEG.
#[derive(Debug, Clone)]
pub struct PdfConverter {
    timeout: Duration,
    max_edge_px: u32,
}

impl PdfConverter {
    pub fn new() -> Self {
        Self {
            timeout: DEFAULT_CONVERT_TIMEOUT,
            max_edge_px: MAX_RENDER_EDGE_PX,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Convert the first page to JPEG bytes.
    ///
    /// Rendering runs on the blocking pool under a hard timeout; a timeout is
    /// reported as `PdfError::Timeout` and the renderer is abandoned.
    pub async fn convert_first_page(&self, bytes: Vec<u8>) -> Result<Vec<u8>, PdfError> {
        if !is_pdf_bytes(&bytes) {
            return Err(PdfError::NotAPdf);
        }

        let max_edge = self.max_edge_px;
        let render = tokio::task::spawn_blocking(move || backend::render_first_page(&bytes, max_edge));

        match tokio::time::timeout(self.timeout, render).await {
            Ok(Ok(result)) => {
                if let Ok(jpeg) = &result {
                    debug!(bytes = jpeg.len(), "pdf page rendered");
                }
                result
            }
            Ok(Err(join_err)) => Err(PdfError::Rendering(join_err.to_string())),
            Err(_) => {
                warn!(timeout = ?self.timeout, "pdf conversion timed out");
                Err(PdfError::Timeout(self.timeout))
            }
        }
    }
}

impl Default for PdfConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(feature = "render")]
mod backend {
    use super::{PdfError, RENDER_JPEG_QUALITY};
    use image::codecs::jpeg::JpegEncoder;
    use pdfium_render::prelude::*;
    use std::io::Cursor;

    pub fn render_first_page(bytes: &[u8], max_edge_px: u32) -> Result<Vec<u8>, PdfError> {
        let bindings = Pdfium::bind_to_system_library()
            .map_err(|e| PdfError::Rendering(format!("pdfium bindings: {e}")))?;
        let pdfium = Pdfium::new(bindings);

        let document = pdfium
            .load_pdf_from_byte_slice(bytes, None)
            .map_err(|e| PdfError::Rendering(e.to_string()))?;

        let page = document
            .pages()
            .first()
            .map_err(|_| PdfError::EmptyDocument)?;

        let config = PdfRenderConfig::new()
            .set_target_width(max_edge_px as i32)
            .set_maximum_height(max_edge_px as i32);

        let bitmap = page
            .render_with_config(&config)
            .map_err(|e| PdfError::Rendering(e.to_string()))?;

        // Re-wrap the raw pixels rather than passing the renderer's own image
        // types across the crate boundary.
        let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
        let rgba = bitmap.as_rgba_bytes();
        let buffer = image::RgbaImage::from_raw(width, height, rgba)
            .ok_or_else(|| PdfError::Rendering("bitmap size mismatch".to_string()))?;
        let rgb = image::DynamicImage::ImageRgba8(buffer).to_rgb8();

        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, RENDER_JPEG_QUALITY)
            .encode_image(&rgb)
            .map_err(|e| PdfError::Encoding(e.to_string()))?;
        Ok(out.into_inner())
    }
}

#[cfg(not(feature = "render"))]
mod backend {
    use super::PdfError;

    pub fn render_first_page(_bytes: &[u8], _max_edge_px: u32) -> Result<Vec<u8>, PdfError> {
        Err(PdfError::FeatureNotEnabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffing_requires_literal_header() {
        assert!(is_pdf_bytes(b"%PDF-1.7\n..."));
        assert!(!is_pdf_bytes(b" %PDF-1.7"));
        assert!(!is_pdf_bytes(b"PDF-1.7"));
        assert!(!is_pdf_bytes(b""));
    }

    #[tokio::test]
    async fn non_pdf_bytes_rejected_before_rendering() {
        let converter = PdfConverter::new();
        let err = converter.convert_first_page(b"GIF89a".to_vec()).await.unwrap_err();
        assert!(matches!(err, PdfError::NotAPdf));
    }

    #[cfg(not(feature = "render"))]
    #[tokio::test]
    async fn disabled_backend_reports_feature_error() {
        let converter = PdfConverter::new();
        let err = converter
            .convert_first_page(b"%PDF-1.4 minimal".to_vec())
            .await
            .unwrap_err();
        assert!(matches!(err, PdfError::FeatureNotEnabled));
    }
}
