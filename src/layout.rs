//! Tiled page geometry: grid blocks and per-block pixel offsets.

/// An H x V tiling of the template's preview image into record blocks.
///
/// Coordinates are preview pixels; the overlay compositor converts them into
/// page points using the template's actual page size.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridSpec {
    h_count: usize,
    v_count: usize,
    image_width: f64,
    image_height: f64,
}

impl GridSpec {
    /// Creates a grid; counts below one are clamped to one.
    pub fn new(h_count: usize, v_count: usize, image_width: f64, image_height: f64) -> Self {
        Self {
            h_count: h_count.max(1),
            v_count: v_count.max(1),
            image_width,
            image_height,
        }
    }

    /// Returns the number of horizontal blocks.
    pub fn h_count(&self) -> usize {
        self.h_count
    }

    /// Returns the number of vertical blocks.
    pub fn v_count(&self) -> usize {
        self.v_count
    }

    /// Returns the preview image width in pixels.
    pub fn image_width(&self) -> f64 {
        self.image_width
    }

    /// Returns the preview image height in pixels.
    pub fn image_height(&self) -> f64 {
        self.image_height
    }

    /// Returns how many record blocks fit on one page.
    pub fn blocks_per_page(&self) -> usize {
        self.h_count * self.v_count
    }

    /// Returns the width of one block in pixels.
    pub fn block_width(&self) -> f64 {
        self.image_width / self.h_count as f64
    }

    /// Returns the height of one block in pixels.
    pub fn block_height(&self) -> f64 {
        self.image_height / self.v_count as f64
    }

    /// Returns how many pages `record_count` records occupy.
    pub fn pages_for(&self, record_count: usize) -> usize {
        let blocks = self.blocks_per_page();
        (record_count + blocks - 1) / blocks
    }
}

/// Strategy mapping a block index to the pixel translation applied to every
/// label anchor in that block.
///
/// Injected into the compositor so alternate traversal orders stay possible
/// without touching it; closures taking `(index, &GridSpec)` implement the
/// trait directly.
pub trait BlockOffset {
    /// Returns the `(dx, dy)` pixel offset for the given block index.
    fn offset(&self, index: usize, grid: &GridSpec) -> (f64, f64);
}

impl<F> BlockOffset for F
where
    F: Fn(usize, &GridSpec) -> (f64, f64),
{
    fn offset(&self, index: usize, grid: &GridSpec) -> (f64, f64) {
        self(index, grid)
    }
}

/// Default traversal: block 0 sits unshifted at the top right; later blocks
/// tile leftward, then downward, matching the print layout of the template
/// family.
#[derive(Clone, Copy, Debug, Default)]
pub struct RightToLeftTiling;

impl BlockOffset for RightToLeftTiling {
    fn offset(&self, index: usize, grid: &GridSpec) -> (f64, f64) {
        let local = index % grid.blocks_per_page();
        let column = local % grid.h_count();
        let row = local / grid.h_count();
        (
            -grid.block_width() * column as f64,
            grid.block_height() * row as f64,
        )
    }
}
