//! Rectangle and vector primitives
//!
//! Integer pixel-space geometry shared by the spatial index, collision
//! pipeline, chunk streaming and trigger zones. Rectangles are half-open:
//! a rect covers `[left, right) x [top, bottom)`, so two rects that merely
//! share an edge do not intersect. Zero-area rects never intersect anything.

use serde::{Deserialize, Serialize};

/// A 2D integer vector (pixel offsets, velocities).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Vec2i {
    pub x: i32,
    pub y: i32,
}

impl Vec2i {
    pub const ZERO: Vec2i = Vec2i { x: 0, y: 0 };

    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0 && self.y == 0
    }
}

impl std::ops::Add for Vec2i {
    type Output = Vec2i;

    fn add(self, rhs: Vec2i) -> Vec2i {
        Vec2i::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl std::ops::Sub for Vec2i {
    type Output = Vec2i;

    fn sub(self, rhs: Vec2i) -> Vec2i {
        Vec2i::new(self.x - rhs.x, self.y - rhs.y)
    }
}

/// An axis-aligned rectangle defined by its top-left corner and size.
///
/// Width and height are never negative; constructors clamp them to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

impl Rect {
    pub const fn new(x: i32, y: i32, w: i32, h: i32) -> Self {
        Self {
            x,
            y,
            w: if w < 0 { 0 } else { w },
            h: if h < 0 { 0 } else { h },
        }
    }

    /// Build from two opposite corners (in any order).
    pub fn from_corners(a: Vec2i, b: Vec2i) -> Self {
        let left = a.x.min(b.x);
        let top = a.y.min(b.y);
        Self::new(left, top, (a.x - b.x).abs(), (a.y - b.y).abs())
    }

    pub fn left(&self) -> i32 {
        self.x
    }

    pub fn top(&self) -> i32 {
        self.y
    }

    /// Right edge (exclusive)
    pub fn right(&self) -> i32 {
        self.x + self.w
    }

    /// Bottom edge (exclusive)
    pub fn bottom(&self) -> i32 {
        self.y + self.h
    }

    pub fn top_left(&self) -> Vec2i {
        Vec2i::new(self.x, self.y)
    }

    pub fn center(&self) -> Vec2i {
        Vec2i::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    /// Corners in order: top-left, top-right, bottom-left, bottom-right.
    pub fn corners(&self) -> [Vec2i; 4] {
        [
            Vec2i::new(self.x, self.y),
            Vec2i::new(self.right(), self.y),
            Vec2i::new(self.x, self.bottom()),
            Vec2i::new(self.right(), self.bottom()),
        ]
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }

    /// Copy of this rect moved by an offset
    pub fn translate(&self, dx: i32, dy: i32) -> Self {
        Self { x: self.x + dx, y: self.y + dy, ..*self }
    }

    /// Same size, new top-left corner
    pub fn with_position(&self, x: i32, y: i32) -> Self {
        Self { x, y, ..*self }
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        !self.is_empty()
            && !other.is_empty()
            && self.x < other.right()
            && other.x < self.right()
            && self.y < other.bottom()
            && other.y < self.bottom()
    }

    /// Smallest rect covering both. An empty rect contributes nothing.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let left = self.x.min(other.x);
        let top = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        Rect::new(left, top, right - left, bottom - top)
    }

    /// Union of every rect in the slice, or `None` for an empty slice.
    pub fn union_all(rects: &[Rect]) -> Option<Rect> {
        let (first, rest) = rects.split_first()?;
        Some(rest.iter().fold(*first, |acc, r| acc.union(r)))
    }

    /// True if `other` lies entirely inside this rect.
    pub fn contains(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    pub fn contains_point(&self, x: i32, y: i32) -> bool {
        x >= self.x && x < self.right() && y >= self.y && y < self.bottom()
    }

    /// Move this rect so it lies inside `bounds`.
    ///
    /// A rect larger than the bounds on an axis is centered on that axis.
    pub fn clamp_into(&self, bounds: &Rect) -> Rect {
        let x = if self.w >= bounds.w {
            bounds.x + bounds.w / 2 - self.w / 2
        } else {
            self.x.clamp(bounds.x, bounds.right() - self.w)
        };
        let y = if self.h >= bounds.h {
            bounds.y + bounds.h / 2 - self.h / 2
        } else {
            self.y.clamp(bounds.y, bounds.bottom() - self.h)
        };
        self.with_position(x, y)
    }

    /// Index of the first rect in `rects` that intersects this one.
    pub fn collide_index(&self, rects: &[Rect]) -> Option<usize> {
        rects.iter().position(|r| self.intersects(r))
    }
}
