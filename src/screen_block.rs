use std::iter::FusedIterator;
use std::num::NonZeroU32;

use crate::geometry::{ScreenBlock, ScreenPoint, ScreenSize};

impl ScreenBlock {
    /// Block covering a whole image of the given size, starting at the origin.
    pub fn from_size(size: ScreenSize) -> ScreenBlock {
        ScreenBlock::new(ScreenPoint::origin(), ScreenPoint::from(size))
    }

    pub fn is_empty(&self) -> bool {
        self.min.x >= self.max.x || self.min.y >= self.max.y
    }

    pub fn area(&self) -> u32 {
        if self.is_empty() {
            0
        } else {
            self.width() * self.height()
        }
    }

    pub fn contains(&self, p: &ScreenPoint) -> bool {
        p.x >= self.min.x && p.x < self.max.x && p.y >= self.min.y && p.y < self.max.y
    }

    /// Create an iterator over coordinates (x, y) pairs inside the block,
    /// in C order (x changes first, then y)
    pub fn internal_points(&self) -> InternalPoints {
        if self.is_empty() {
            InternalPoints::empty()
        } else {
            InternalPoints {
                min_x: self.min.x,
                max: self.max,

                cursor: self.min,
            }
        }
    }

    /// Splits the block into tiles of `tile_size` * `tile_size` pixels, ordered by distance
    /// of the tile center from the center of the block, nearest first.
    /// Tiles on the bottom and right side are clipped if the tile size doesn't evenly divide
    /// the block size.
    pub fn tile_ordering(&self, tile_size: NonZeroU32) -> Vec<ScreenBlock> {
        if self.is_empty() {
            return Vec::new();
        }

        let tile_size = tile_size.get();
        let mut tiles = Vec::new();
        for y in (self.min.y..self.max.y).step_by(tile_size as usize) {
            for x in (self.min.x..self.max.x).step_by(tile_size as usize) {
                tiles.push(ScreenBlock::new(
                    ScreenPoint::new(x, y),
                    ScreenPoint::new(
                        x.saturating_add(tile_size).min(self.max.x),
                        y.saturating_add(tile_size).min(self.max.y),
                    ),
                ));
            }
        }

        // Doubled coordinates keep the centers integral
        let center = doubled_center(self);
        tiles.sort_by_key(|tile| {
            let tile_center = doubled_center(tile);
            let dx = tile_center[0] - center[0];
            let dy = tile_center[1] - center[1];
            (dx * dx + dy * dy, tile.min.y, tile.min.x)
        });

        tiles
    }
}

fn doubled_center(block: &ScreenBlock) -> [i64; 2] {
    [
        block.min.x as i64 + block.max.x as i64,
        block.min.y as i64 + block.max.y as i64,
    ]
}

#[derive(Copy, Clone, Debug)]
pub struct InternalPoints {
    min_x: u32,
    max: ScreenPoint,

    cursor: ScreenPoint,
}

impl InternalPoints {
    // Construct an iterator over internal points that returns no points
    fn empty() -> Self {
        InternalPoints {
            min_x: 1,
            max: ScreenPoint::origin(),

            cursor: ScreenPoint::origin(),
        }
    }
}

impl Iterator for InternalPoints {
    type Item = ScreenPoint;

    fn size_hint(&self) -> (usize, Option<usize>) {
        let len = self.len();
        (len, Some(len))
    }

    fn next(&mut self) -> Option<Self::Item> {
        if self.cursor.y >= self.max.y {
            return None;
        }

        let ret = self.cursor;

        debug_assert!(self.cursor.x < self.max.x);
        self.cursor.x += 1;
        if self.cursor.x >= self.max.x {
            self.cursor.x = self.min_x;
            self.cursor.y += 1;
        }

        Some(ret)
    }
}

impl ExactSizeIterator for InternalPoints {
    fn len(&self) -> usize {
        if self.cursor.y >= self.max.y {
            0
        } else {
            let whole_rows = ScreenBlock::new(ScreenPoint::new(self.min_x, self.cursor.y + 1), self.max);
            let current_row =
                ScreenBlock::new(self.cursor, ScreenPoint::new(self.max.x, self.cursor.y + 1));
            (whole_rows.area() + current_row.area()) as usize
        }
    }
}

impl FusedIterator for InternalPoints {}
