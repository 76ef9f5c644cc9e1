//! Page layout: fit an image rectangle into the printable area of a page.
//!
//! All values share one unit (the page's). Placement offsets are measured
//! from the top-left corner of the page.

use serde::Serialize;

/// Millimetres per PDF point.
const MM_PER_PT: f64 = 25.4 / 72.0;

/// Page size in millimetres.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    /// ISO A4 portrait
    pub const A4: PageSize = PageSize {
        width: 210.0,
        height: 297.0,
    };
}

/// Where the image is drawn on its page.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Placement {
    pub width: f64,
    pub height: f64,
    pub x: f64,
    pub y: f64,
}

/// Fit a `width`×`height` image inside `page` minus `margin` on every side.
///
/// Images that already fit keep their size. Larger ones are scaled down,
/// preserving aspect ratio, until the overflowing dimension touches the
/// printable area. The result is always centered on the page.
pub fn fit_to_page(width: f64, height: f64, page: PageSize, margin: f64) -> Placement {
    let available_width = page.width - 2.0 * margin;
    let available_height = page.height - 2.0 * margin;

    let (w, h) = if width <= available_width && height <= available_height {
        (width, height)
    } else if width / height > available_width / available_height {
        (available_width, available_width * height / width)
    } else {
        (available_height * width / height, available_height)
    };

    Placement {
        width: w,
        height: h,
        x: (page.width - w) / 2.0,
        y: (page.height - h) / 2.0,
    }
}

/// Page-filling placement used when the page takes the image's own size.
pub fn native_placement(width: f64, height: f64) -> Placement {
    Placement {
        width,
        height,
        x: 0.0,
        y: 0.0,
    }
}

pub fn mm_to_pt(mm: f64) -> f64 {
    mm / MM_PER_PT
}
