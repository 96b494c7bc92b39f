use image::Rgba;

use crate::{EngineError, RgbaImage};

/// Produces the background raster for one page.
///
/// Implementations receive the original document bytes so they can keep no
/// per-document state; the caller decides the pixel size.
pub trait Rasterizer: Send + Sync {
    fn name(&self) -> &'static str;

    fn rasterize(
        &self,
        bytes: &[u8],
        page_index: u32,
        width_px: u32,
        height_px: u32,
    ) -> Result<RgbaImage, EngineError>;
}

/// Opaque page-coloured canvas with a thin frame.
///
/// Used when no native renderer is linked. Text is still composited from the
/// extracted words, so pages remain editable. The document bytes are not
/// inspected.
#[derive(Debug, Clone, Copy)]
pub struct PlaceholderRasterizer {
    pub background: Rgba<u8>,
    pub frame: Option<Rgba<u8>>,
}

impl Default for PlaceholderRasterizer {
    fn default() -> Self {
        Self { background: Rgba([255, 255, 255, 255]), frame: Some(Rgba([220, 220, 220, 255])) }
    }
}

impl Rasterizer for PlaceholderRasterizer {
    fn name(&self) -> &'static str {
        "placeholder"
    }

    fn rasterize(
        &self,
        _bytes: &[u8],
        _page_index: u32,
        width_px: u32,
        height_px: u32,
    ) -> Result<RgbaImage, EngineError> {
        let (width, height) = (width_px.max(1), height_px.max(1));
        let mut image = RgbaImage::from_pixel(width, height, self.background);

        if let Some(frame) = self.frame {
            if width >= 4 && height >= 4 {
                for x in 0..width {
                    image.put_pixel(x, 0, frame);
                    image.put_pixel(x, height - 1, frame);
                }
                for y in 0..height {
                    image.put_pixel(0, y, frame);
                    image.put_pixel(width - 1, y, frame);
                }
            }
        }

        Ok(image)
    }
}

#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    /// Renders pages with a dynamically bound PDFium library.
    pub struct PdfiumRasterizer {
        pdfium: Pdfium,
    }

    impl PdfiumRasterizer {
        pub fn from_system_library() -> Result<Self, EngineError> {
            let bindings = Pdfium::bind_to_system_library().map_err(|err| {
                EngineError::Rasterize {
                    page: 0,
                    reason: format!("failed to bind pdfium system library: {err}"),
                }
            })?;

            Ok(Self { pdfium: Pdfium::new(bindings) })
        }
    }

    impl Rasterizer for PdfiumRasterizer {
        fn name(&self) -> &'static str {
            "pdfium"
        }

        fn rasterize(
            &self,
            bytes: &[u8],
            page_index: u32,
            width_px: u32,
            height_px: u32,
        ) -> Result<RgbaImage, EngineError> {
            let fail = |reason: String| EngineError::Rasterize { page: page_index, reason };

            let document =
                self.pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| fail(e.to_string()))?;
            let page = document.pages().get(page_index as u16).map_err(|e| fail(e.to_string()))?;

            let config = PdfRenderConfig::new()
                .set_target_width(width_px.max(1) as i32)
                .set_target_height(height_px.max(1) as i32);
            let bitmap = page.render_with_config(&config).map_err(|e| fail(e.to_string()))?;

            let (width, height) = (bitmap.width() as u32, bitmap.height() as u32);
            RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes().to_vec())
                .ok_or_else(|| fail("bitmap size mismatch".to_string()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::text_pdf;

    #[test]
    fn placeholder_is_opaque_and_sized() {
        let bytes = text_pdf(&[&["Hello"]]);
        let image = PlaceholderRasterizer::default().rasterize(&bytes, 0, 100, 50).unwrap();

        assert_eq!(image.dimensions(), (100, 50));
        assert_eq!(image.get_pixel(50, 25), &Rgba([255, 255, 255, 255]));
        assert_eq!(image.get_pixel(0, 0), &Rgba([220, 220, 220, 255]));
        assert!(image.pixels().all(|p| p.0[3] == 255));
    }

    #[test]
    fn zero_sized_request_yields_single_pixel() {
        let image = PlaceholderRasterizer::default().rasterize(&[], 0, 0, 0).unwrap();
        assert_eq!(image.dimensions(), (1, 1));
    }

    #[test]
    fn frame_can_be_disabled() {
        let bytes = text_pdf(&[&["Hello"]]);
        let rasterizer = PlaceholderRasterizer { frame: None, ..Default::default() };
        let image = rasterizer.rasterize(&bytes, 0, 8, 8).unwrap();
        assert_eq!(image.get_pixel(0, 0), &Rgba([255, 255, 255, 255]));
    }
}
