// Copyright 2020 @TwoCookingMice

use super::constants::{ Float, Vector3f, FLOAT_MAX };

/// A ray with a mutable `[min_t, max_t]` interval. Closest-hit queries
/// shrink `max_t` through `update` so later candidates are culled for free.
pub struct Ray3f {
    origin: Vector3f,
    dir: Vector3f,
    pub min_t: Float,
    pub max_t: Float
}

impl Ray3f {
    pub fn new(o: Vector3f, d: Vector3f,
               min_t: Option<Float>, max_t: Option<Float>) -> Self {
        Self { origin: o, dir: d.normalize(),
               min_t: min_t.unwrap_or(0.0),
               max_t: max_t.unwrap_or(FLOAT_MAX) }
    }

    pub fn origin(&self) -> Vector3f {
        self.origin
    }

    pub fn dir(&self) -> Vector3f {
        self.dir
    }

    pub fn at(&self, t: Float) -> Vector3f {
        self.origin + self.dir * t
    }

    /// Shrink the far bound to `t` if `t` lies inside the active interval.
    /// Returns false (and leaves the interval untouched) otherwise.
    pub fn update(&mut self, t: Float) -> bool {
        if t < self.min_t || t > self.max_t {
            false
        } else {
            self.max_t = t;
            true
        }
    }

    pub fn test_segment(&self, t: Float) -> bool {
        t >= self.min_t && t <= self.max_t
    }

    /// Same geometry, fresh interval. Used when re-probing a candidate set
    /// that must not observe another query's shrunken far bound.
    pub fn with_range(&self, min_t: Float, max_t: Float) -> Self {
        Self { origin: self.origin, dir: self.dir, min_t, max_t }
    }
}

/* Tests for Ray */
