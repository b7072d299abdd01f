//! The opaque numeric payload the scheduler shuttles between actors.
//!
//! Real array storage/arithmetic (whatever a host geospatial framework uses —
//! `ndarray`, a GPU buffer, a memory-mapped tile cache) is out of scope here
//! (`spec.md` §1); `Array` is a minimal row-major buffer with a shape, enough
//! to let `Merger`, `Resampler` and the cache store move real bytes around
//! and for tests to assert on produced content.
#[derive(Clone, Debug, PartialEq)]
pub struct Array {
    /// `(rows, cols, bands)`.
    pub shape: (u32, u32, u32),
    pub data: Vec<f32>,
}

impl Array {
    pub fn filled(shape: (u32, u32, u32), value: f32) -> Self {
        let len = shape.0 as usize * shape.1 as usize * shape.2 as usize;
        Self {
            shape,
            data: vec![value; len],
        }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
