//! Plan page rendering
//!
//! Turns uploaded plan bytes into bitmaps. PDFs go through a [`PlanRenderer`]
//! (page count, page size, rasterization at a requested DPI); raster images are
//! decoded directly with [`decode_image`].

use image::{ImageBuffer, Rgba};
use lopdf::Document;
use tracing::debug;

pub type RgbaImage = ImageBuffer<Rgba<u8>, Vec<u8>>;

/// PDF user space units per inch
pub const POINTS_PER_INCH: f32 = 72.0;

/// Largest bitmap a page may be rasterized to (about 1 GiB of RGBA)
pub const MAX_BITMAP_PIXELS: u64 = 1 << 28;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width_pt: f32,
    pub height_pt: f32,
}

impl PageSize {
    /// Bitmap dimensions for this page rasterized at `dpi`, never smaller than 1x1.
    ///
    /// Fails for non-positive or non-finite DPI, and when the bitmap would
    /// exceed [`MAX_BITMAP_PIXELS`].
    pub fn pixel_dimensions(&self, dpi: f32) -> Result<(u32, u32), RenderError> {
        if !dpi.is_finite() || dpi <= 0.0 {
            return Err(RenderError::InvalidDpi(dpi));
        }

        let scale = f64::from(dpi) / f64::from(POINTS_PER_INCH);
        let width = (f64::from(self.width_pt) * scale).round().max(1.0);
        let height = (f64::from(self.height_pt) * scale).round().max(1.0);

        if width * height > MAX_BITMAP_PIXELS as f64 {
            return Err(RenderError::BitmapTooLarge {
                width: width as u64,
                height: height as u64,
            });
        }

        // Both sides are within the budget, so they fit in u32
        Ok((width as u32, height as u32))
    }
}

impl Default for PageSize {
    fn default() -> Self {
        // US Letter
        Self { width_pt: 612.0, height_pt: 792.0 }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("PDF parse error")]
    Parse(#[from] lopdf::Error),
    #[error("image decode error")]
    Image(#[from] image::ImageError),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("DPI must be positive and finite, got {0}")]
    InvalidDpi(f32),
    #[error("page bitmap of {width}x{height} pixels is too large")]
    BitmapTooLarge { width: u64, height: u64 },
    #[error("encrypted PDFs are not supported in the default backend")]
    EncryptedUnsupported,
    #[error("backend error: {0}")]
    Backend(String),
}

/// Rasterizes PDF pages for measurement.
///
/// Implementations are stateless with respect to the document: every call
/// receives the full PDF bytes.
pub trait PlanRenderer {
    fn page_count(&self, pdf: &[u8]) -> Result<u32, RenderError>;
    fn page_size(&self, pdf: &[u8], page_index: u32) -> Result<PageSize, RenderError>;
    fn render_page(&self, pdf: &[u8], page_index: u32, dpi: f32)
        -> Result<RgbaImage, RenderError>;
}

/// Returns true when the bytes carry the PDF header magic
pub fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

/// Decode a raster image (PNG, JPEG, ...) into an RGBA bitmap
pub fn decode_image(bytes: &[u8]) -> Result<RgbaImage, RenderError> {
    let image = image::load_from_memory(bytes)?;
    Ok(image.into_rgba8())
}

/// Pure-Rust renderer: reads page geometry with lopdf and produces a blank
/// page-sized bitmap. Enough for measuring in pixel space; use the `pdfium`
/// feature for real page content.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfRenderer;

impl LopdfRenderer {
    pub fn new() -> Self {
        Self
    }

    fn parse_sizes(bytes: &[u8]) -> Result<Vec<PageSize>, RenderError> {
        if bytes.windows("/Encrypt".len()).any(|window| window == b"/Encrypt") {
            return Err(RenderError::EncryptedUnsupported);
        }

        let doc = Document::load_mem(bytes)?;
        let pages = doc.get_pages();
        let mut sizes = Vec::with_capacity(pages.len());

        for (_, object_id) in pages {
            let dict = doc.get_dictionary(object_id)?;
            let size = dict
                .get(b"MediaBox")
                .ok()
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| {
                    if array.len() != 4 {
                        return None;
                    }
                    let x0 = array[0].as_float().ok()?;
                    let y0 = array[1].as_float().ok()?;
                    let x1 = array[2].as_float().ok()?;
                    let y1 = array[3].as_float().ok()?;
                    Some(PageSize { width_pt: (x1 - x0).abs(), height_pt: (y1 - y0).abs() })
                })
                .unwrap_or_default();

            sizes.push(size);
        }

        if sizes.is_empty() {
            return Err(RenderError::Backend("document has no pages".to_owned()));
        }

        Ok(sizes)
    }
}

impl PlanRenderer for LopdfRenderer {
    fn page_count(&self, pdf: &[u8]) -> Result<u32, RenderError> {
        Ok(Self::parse_sizes(pdf)?.len() as u32)
    }

    fn page_size(&self, pdf: &[u8], page_index: u32) -> Result<PageSize, RenderError> {
        let sizes = Self::parse_sizes(pdf)?;
        sizes.get(page_index as usize).copied().ok_or(RenderError::PageOutOfRange {
            page: page_index,
            page_count: sizes.len() as u32,
        })
    }

    fn render_page(
        &self,
        pdf: &[u8],
        page_index: u32,
        dpi: f32,
    ) -> Result<RgbaImage, RenderError> {
        let page_size = self.page_size(pdf, page_index)?;
        let (width, height) = page_size.pixel_dimensions(dpi)?;
        debug!(page_index, dpi, width, height, "rendering blank page bitmap");

        let mut image = RgbaImage::from_pixel(width, height, Rgba([255, 255, 255, 255]));

        // Light page border so the sheet edge is visible on a white canvas
        if width >= 4 && height >= 4 {
            for x in 0..width {
                image.put_pixel(x, 0, Rgba([220, 220, 220, 255]));
                image.put_pixel(x, height - 1, Rgba([220, 220, 220, 255]));
            }
            for y in 0..height {
                image.put_pixel(0, y, Rgba([220, 220, 220, 255]));
                image.put_pixel(width - 1, y, Rgba([220, 220, 220, 255]));
            }
        }

        Ok(image)
    }
}

/// Full-content rendering through a system pdfium library.
///
/// Library-only: hosts construct [`pdfium_backend::PdfiumRenderer`] themselves
/// and pass it to plan loading. [`default_renderer`] always returns the lopdf
/// renderer.
#[cfg(feature = "pdfium")]
pub mod pdfium_backend {
    use super::*;
    use pdfium_render::prelude::*;

    fn backend(err: PdfiumError) -> RenderError {
        RenderError::Backend(err.to_string())
    }

    pub struct PdfiumRenderer {
        pdfium: Pdfium,
    }

    impl PdfiumRenderer {
        pub fn from_system_library() -> Result<Self, RenderError> {
            let bindings = Pdfium::bind_to_system_library().map_err(|err| {
                RenderError::Backend(format!("failed to bind pdfium system library: {err}"))
            })?;

            Ok(Self { pdfium: Pdfium::new(bindings) })
        }

        fn page_index(doc: &PdfDocument<'_>, page_index: u32) -> Result<u16, RenderError> {
            let page_count = doc.pages().len() as u32;
            if page_index >= page_count {
                return Err(RenderError::PageOutOfRange { page: page_index, page_count });
            }
            Ok(page_index as u16)
        }
    }

    impl PlanRenderer for PdfiumRenderer {
        fn page_count(&self, pdf: &[u8]) -> Result<u32, RenderError> {
            let doc = self.pdfium.load_pdf_from_byte_slice(pdf, None).map_err(backend)?;
            Ok(doc.pages().len() as u32)
        }

        fn page_size(&self, pdf: &[u8], page_index: u32) -> Result<PageSize, RenderError> {
            let doc = self.pdfium.load_pdf_from_byte_slice(pdf, None).map_err(backend)?;
            let page = doc.pages().get(Self::page_index(&doc, page_index)?).map_err(backend)?;
            Ok(PageSize { width_pt: page.width().value, height_pt: page.height().value })
        }

        fn render_page(
            &self,
            pdf: &[u8],
            page_index: u32,
            dpi: f32,
        ) -> Result<RgbaImage, RenderError> {
            let doc = self.pdfium.load_pdf_from_byte_slice(pdf, None).map_err(backend)?;
            let page = doc.pages().get(Self::page_index(&doc, page_index)?).map_err(backend)?;
            let size = PageSize { width_pt: page.width().value, height_pt: page.height().value };
            let (width, height) = size.pixel_dimensions(dpi)?;

            let config = PdfRenderConfig::new()
                .set_target_width(width as i32)
                .set_target_height(height as i32);
            let bitmap = page.render_with_config(&config).map_err(backend)?;

            Ok(bitmap.as_image().into_rgba8())
        }
    }
}

/// Renderer used by the CLI. Needs no native library.
pub fn default_renderer() -> LopdfRenderer {
    LopdfRenderer::new()
}
