//! Plan loading
//!
//! Turns uploaded bytes into the bitmap measurements are drawn over. Image
//! bytes are decoded directly; PDF pages are rasterized by a
//! [`PlanRenderer`].

use plan_render::{decode_image, is_pdf, PlanRenderer, RenderError, RgbaImage};
use tracing::{info, warn};

#[derive(Debug, thiserror::Error)]
pub enum PlanError {
    #[error("could not decode plan")]
    Decode(#[source] RenderError),
    #[error("could not render plan page")]
    Render(#[source] RenderError),
    #[error("page {page} out of range (page_count={page_count})")]
    PageOutOfRange { page: u32, page_count: u32 },
    #[error("plan bitmap is empty")]
    EmptyBitmap,
}

/// Kind of uploaded plan file
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanKind {
    Image,
    Pdf,
}

/// Uploaded plan bytes plus page selection
#[derive(Debug, Clone)]
pub enum PlanSource {
    Image(Vec<u8>),
    Pdf { bytes: Vec<u8>, page_index: u32, dpi: f32 },
}

impl PlanSource {
    /// Pick image or PDF handling from the file header
    pub fn sniff(bytes: Vec<u8>, page_index: u32, dpi: f32) -> Self {
        if is_pdf(&bytes) {
            PlanSource::Pdf { bytes, page_index, dpi }
        } else {
            PlanSource::Image(bytes)
        }
    }

    pub fn kind(&self) -> PlanKind {
        match self {
            PlanSource::Image(_) => PlanKind::Image,
            PlanSource::Pdf { .. } => PlanKind::Pdf,
        }
    }
}

/// A decoded plan page ready for measuring
#[derive(Debug, Clone)]
pub struct Plan {
    kind: PlanKind,
    page_index: u32,
    page_count: u32,
    bitmap: RgbaImage,
}

impl Plan {
    pub fn kind(&self) -> PlanKind {
        self.kind
    }

    /// Page shown (0-based); always 0 for images
    pub fn page_index(&self) -> u32 {
        self.page_index
    }

    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    pub fn width(&self) -> u32 {
        self.bitmap.width()
    }

    pub fn height(&self) -> u32 {
        self.bitmap.height()
    }

    pub fn bitmap(&self) -> &RgbaImage {
        &self.bitmap
    }
}

/// Decode or render `source` into a [`Plan`]
pub fn load_plan<R: PlanRenderer + ?Sized>(
    renderer: &R,
    source: &PlanSource,
) -> Result<Plan, PlanError> {
    let plan = match source {
        PlanSource::Image(bytes) => {
            let bitmap = decode_image(bytes).map_err(|err| {
                warn!(error = &err as &dyn std::error::Error, "plan image decode failed");
                PlanError::Decode(err)
            })?;
            Plan { kind: PlanKind::Image, page_index: 0, page_count: 1, bitmap }
        }
        PlanSource::Pdf { bytes, page_index, dpi } => {
            let page_count = renderer.page_count(bytes).map_err(|err| {
                warn!(error = &err as &dyn std::error::Error, "plan PDF could not be read");
                PlanError::Decode(err)
            })?;
            if *page_index >= page_count {
                return Err(PlanError::PageOutOfRange { page: *page_index, page_count });
            }

            let bitmap = renderer.render_page(bytes, *page_index, *dpi).map_err(|err| {
                warn!(
                    error = &err as &dyn std::error::Error,
                    page_index,
                    "plan page render failed"
                );
                PlanError::Render(err)
            })?;
            Plan { kind: PlanKind::Pdf, page_index: *page_index, page_count, bitmap }
        }
    };

    if plan.width() == 0 || plan.height() == 0 {
        return Err(PlanError::EmptyBitmap);
    }

    info!(
        kind = ?plan.kind,
        page_index = plan.page_index,
        page_count = plan.page_count,
        width = plan.width(),
        height = plan.height(),
        "plan loaded"
    );
    Ok(plan)
}
