//! Shelf packing over a fixed-size texture.

use crate::device::Region;

/// Bump allocator placing rectangles left to right on horizontal shelves.
///
/// Nothing is ever freed. When a rectangle does not fit on the current shelf
/// a new shelf starts below the tallest rectangle placed so far; when that
/// does not fit either, the packer is full for good.
#[derive(Clone, Debug)]
pub struct ShelfPacker {
    width: u32,
    height: u32,
    column: u32,
    min_row: u32,
    max_row: u32,
}

impl ShelfPacker {
    /// An empty packer for a `width`×`height` texture.
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            column: 0,
            min_row: 0,
            max_row: 0,
        }
    }

    /// Texture size this packer covers.
    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Reserve a `width`×`height` rectangle, or `None` if there is no room.
    ///
    /// The comparisons are strict, so the last column and row of the texture
    /// are never handed out. Both cases also check the other axis, so a tall
    /// glyph on the current shelf cannot run off the bottom of the texture.
    pub fn find_location(&mut self, width: u32, height: u32) -> Option<Region> {
        if self.column.saturating_add(width) < self.width
            && self.min_row.saturating_add(height) < self.height
        {
            let region = Region {
                x: self.column,
                y: self.min_row,
                width,
                height,
            };
            self.column += width;
            self.max_row = self.max_row.max(self.min_row + height);
            return Some(region);
        }
        // Start a new shelf under everything placed so far.
        if self.max_row.saturating_add(height) < self.height && width < self.width {
            let region = Region {
                x: 0,
                y: self.max_row,
                width,
                height,
            };
            self.column = width;
            self.min_row = self.max_row;
            self.max_row = self.min_row + height;
            return Some(region);
        }
        None
    }

    /// Rows in use, from the top of the texture.
    #[must_use]
    pub fn used_rows(&self) -> u32 {
        self.max_row
    }
}
