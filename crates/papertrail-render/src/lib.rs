//! Papertrail Render: synthesized receipt previews.
//!
//! A receipt extracted from email body text has no scanned image behind it,
//! but the receipt entity promises *some* viewable image on every record.
//! This crate renders a deterministic fixed-layout raster (label/value rows
//! for merchant, total, date and subject, then up to 18 extracted line
//! items) with an embedded bitmap font, and encodes it as JPEG. Long fields
//! are truncated to a safe character width rather than overflowing.

mod font;

use image::codecs::jpeg::JpegEncoder;
use image::{Rgb, RgbImage};
use papertrail_core::ExtractionResult;
use std::io::Cursor;
use thiserror::Error;

/// At most this many line items make it onto the preview.
pub const MAX_PREVIEW_ITEMS: usize = 18;

/// Characters per row before truncation.
pub const MAX_ROW_CHARS: usize = 42;

const SCALE: u32 = 2;
const MARGIN: u32 = 16;
const LINE_HEIGHT: u32 = (font::GLYPH_HEIGHT + 2) * SCALE;
const CHAR_ADVANCE: u32 = (font::GLYPH_WIDTH + 1) * SCALE;
const JPEG_QUALITY: u8 = 85;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const INK: Rgb<u8> = Rgb([24, 24, 24]);
const RULE: Rgb<u8> = Rgb([176, 176, 176]);

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("JPEG encoding failed: {0}")]
    Encoding(String),
}

/// Renders the fixed-layout preview for one extraction.
#[derive(Debug, Clone, Default)]
pub struct PreviewSynthesizer;

impl PreviewSynthesizer {
    pub fn new() -> Self {
        Self
    }

    /// Render to JPEG bytes. Same extraction + subject always produces the
    /// same bytes.
    pub fn synthesize(
        &self,
        extraction: &ExtractionResult,
        subject: &str,
    ) -> Result<Vec<u8>, RenderError> {
        let total = match &extraction.currency {
            Some(currency) => format!("{currency} {}", extraction.total),
            None => extraction.total.clone(),
        };

        let mut rows: Vec<Row> = vec![
            Row::text("MERCHANT", &extraction.store_name),
            Row::text("TOTAL", &total),
            Row::text("DATE", &extraction.date.format("%Y-%m-%d").to_string()),
            Row::text("SUBJECT", subject),
            Row::Rule,
        ];
        for item in extraction.items.iter().take(MAX_PREVIEW_ITEMS) {
            rows.push(Row::Item(truncate_row(item)));
        }

        let width = MARGIN * 2 + MAX_ROW_CHARS as u32 * CHAR_ADVANCE;
        let height = MARGIN * 2 + rows.len() as u32 * LINE_HEIGHT;
        let mut canvas = RgbImage::from_pixel(width, height, BACKGROUND);

        for (i, row) in rows.iter().enumerate() {
            let y = MARGIN + i as u32 * LINE_HEIGHT;
            match row {
                Row::Labeled(line) | Row::Item(line) => {
                    draw_line(&mut canvas, MARGIN, y, line);
                }
                Row::Rule => {
                    let mid = y + LINE_HEIGHT / 2;
                    for x in MARGIN..(width - MARGIN) {
                        canvas.put_pixel(x, mid, RULE);
                    }
                }
            }
        }

        let mut out = Cursor::new(Vec::new());
        JpegEncoder::new_with_quality(&mut out, JPEG_QUALITY)
            .encode_image(&canvas)
            .map_err(|e| RenderError::Encoding(e.to_string()))?;
        Ok(out.into_inner())
    }
}

enum Row {
    Labeled(String),
    Item(String),
    Rule,
}

impl Row {
    fn text(label: &str, value: &str) -> Self {
        Self::Labeled(truncate_row(&format!("{label}: {value}")))
    }
}

fn truncate_row(s: &str) -> String {
    s.chars().take(MAX_ROW_CHARS).collect()
}

fn draw_line(canvas: &mut RgbImage, x0: u32, y0: u32, line: &str) {
    for (i, c) in line.chars().enumerate() {
        draw_glyph(canvas, x0 + i as u32 * CHAR_ADVANCE, y0, c);
    }
}

fn draw_glyph(canvas: &mut RgbImage, x0: u32, y0: u32, c: char) {
    let rows = font::glyph(c);
    for (row_idx, row) in rows.iter().enumerate() {
        for col in 0..font::GLYPH_WIDTH {
            if row & (1 << (font::GLYPH_WIDTH - 1 - col)) != 0 {
                for dy in 0..SCALE {
                    for dx in 0..SCALE {
                        let x = x0 + col * SCALE + dx;
                        let y = y0 + row_idx as u32 * SCALE + dy;
                        if x < canvas.width() && y < canvas.height() {
                            canvas.put_pixel(x, y, INK);
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use papertrail_core::Provenance;

    fn extraction(items: Vec<String>) -> ExtractionResult {
        ExtractionResult {
            store_name: "Spar".to_string(),
            total: "450.00".to_string(),
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            items,
            currency: Some("ZAR".to_string()),
            confidence: Some(0.9),
            provenance: Provenance::EmailBodyAi,
        }
    }

    #[test]
    fn output_is_jpeg() {
        let bytes = PreviewSynthesizer::new()
            .synthesize(&extraction(vec!["Milk 2L".into()]), "Your invoice")
            .unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn rendering_is_deterministic() {
        let s = PreviewSynthesizer::new();
        let e = extraction(vec!["Milk 2L".into(), "Bread".into()]);
        assert_eq!(
            s.synthesize(&e, "subject").unwrap(),
            s.synthesize(&e, "subject").unwrap()
        );
    }

    #[test]
    fn item_count_is_capped() {
        let s = PreviewSynthesizer::new();
        let few = s.synthesize(&extraction((0..MAX_PREVIEW_ITEMS).map(|i| format!("item {i}")).collect()), "s").unwrap();
        let many = s.synthesize(&extraction((0..60).map(|i| format!("item {i}")).collect()), "s").unwrap();
        // The 19th..60th items add no rows, so the canvas height is identical
        let dims = |b: &[u8]| image::load_from_memory(b).unwrap().to_rgb8().dimensions();
        assert_eq!(dims(&few), dims(&many));
    }

    #[test]
    fn absurdly_long_fields_do_not_overflow() {
        let s = PreviewSynthesizer::new();
        let e = extraction(vec!["x".repeat(5000)]);
        let subject = "y".repeat(5000);
        let bytes = s.synthesize(&e, &subject).unwrap();
        assert_eq!(&bytes[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn non_ascii_input_renders() {
        let s = PreviewSynthesizer::new();
        let mut e = extraction(vec!["Crème brûlée".into()]);
        e.store_name = "Café Müller".into();
        assert!(s.synthesize(&e, "déjeuner").is_ok());
    }
}
