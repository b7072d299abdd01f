//! Resampling interpolation modes, mirroring the set a typical GDAL-backed
//! data source framework exposes to callers of `get_data`.

/// How a `Resampler` fills pixels that don't land exactly on a source pixel
/// center when reprojecting/rescaling between footprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Interpolation {
    /// Area-weighted averaging. The default for downsampling.
    Area,
    Nearest,
    Linear,
    Cubic,
    Lanczos4,
    /// No resampling: the source and destination footprints must already be
    /// pixel-aligned. Requesting this across misaligned footprints is a
    /// validation error, not a silent fallback.
    None,
}

impl Interpolation {
    pub fn is_none(&self) -> bool {
        matches!(self, Interpolation::None)
    }
}
