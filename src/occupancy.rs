use image::RgbaImage;

/// Row-major boolean raster.
///
/// Used both for the per-orientation piece mask and for the whole-sheet
/// occupancy map of a search run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OccupancyGrid {
    width: u32,
    height: u32,
    cells: Vec<bool>,
}

impl OccupancyGrid {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            cells: vec![false; width as usize * height as usize],
        }
    }

    /// Occupied wherever the texture's alpha channel is non-zero.
    pub fn from_alpha(texture: &RgbaImage) -> Self {
        Self {
            width: texture.width(),
            height: texture.height(),
            cells: texture.pixels().map(|p| p.0[3] > 0).collect(),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    fn index(&self, x: u32, y: u32) -> usize {
        y as usize * self.width as usize + x as usize
    }

    pub fn get(&self, x: u32, y: u32) -> bool {
        x < self.width && y < self.height && self.cells[self.index(x, y)]
    }

    pub fn set(&mut self, x: u32, y: u32) {
        if x < self.width && y < self.height {
            let i = self.index(x, y);
            self.cells[i] = true;
        }
    }

    pub fn count(&self) -> usize {
        self.cells.iter().filter(|&&c| c).count()
    }

    /// True if `mask` placed with its top-left corner at `(x, y)` does not
    /// fit inside this grid.
    pub fn out_of_bounds(&self, mask: &OccupancyGrid, x: u32, y: u32) -> bool {
        x as u64 + mask.width as u64 > self.width as u64
            || y as u64 + mask.height as u64 > self.height as u64
    }

    /// True if any occupied cell of `mask` at `(x, y)` lands on an occupied
    /// cell of this grid. A mask that does not fit counts as overlapping.
    pub fn overlaps(&self, mask: &OccupancyGrid, x: u32, y: u32) -> bool {
        if self.out_of_bounds(mask, x, y) {
            return true;
        }
        (0..mask.height).any(|my| {
            let row = self.index(x, y + my);
            let mrow = mask.index(0, my);
            (0..mask.width as usize).any(|mx| mask.cells[mrow + mx] && self.cells[row + mx])
        })
    }

    /// Mark every occupied cell of `mask` at `(x, y)`; cells outside the grid are ignored.
    pub fn stamp(&mut self, mask: &OccupancyGrid, x: u32, y: u32) {
        for my in 0..mask.height {
            for mx in 0..mask.width {
                if mask.cells[mask.index(mx, my)] {
                    self.set(x + mx, y + my);
                }
            }
        }
    }
}
