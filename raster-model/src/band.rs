//! Band identifiers, per the bit-exact contract in `spec.md` §6.

use crate::error::{ModelError, Result};

/// A client-facing band selector.
///
/// | kind    | value           | meaning          |
/// |---------|-----------------|------------------|
/// | int     | -1              | all bands        |
/// | int     | i ≥ 1           | band `i`         |
/// | complex | -1j             | masks of all bands |
/// | complex | 0j              | shared dataset mask |
/// | complex | ij (i≥1)        | mask of band `i` |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BandId {
    AllBands,
    Band(u32),
    AllMasks,
    SharedMask,
    BandMask(u32),
}

impl BandId {
    /// Parses the `{int, complex}` wire encoding described above.
    pub fn parse(real: i64, imag: i64) -> Result<Self> {
        match (real, imag) {
            (-1, 0) => Ok(BandId::AllBands),
            (i, 0) if i >= 1 => Ok(BandId::Band(i as u32)),
            (0, -1) => Ok(BandId::AllMasks),
            (0, 0) => Ok(BandId::SharedMask),
            (0, i) if i >= 1 => Ok(BandId::BandMask(i as u32)),
            _ => Err(ModelError::InvalidBand(format!("{real}+{imag}j"))),
        }
    }

    /// Flattens this selector against a raster's band count and (optional)
    /// shared-mask band index, mirroring `_tools.normalize_band_parameter`
    /// from the original implementation: returns the concrete list of band
    /// indices (1-based) this selector resolves to, and whether the result
    /// should be returned "flat" (2-D, single band) or stacked (3-D).
    pub fn normalize(&self, band_count: u32, shared_band_id: Option<u32>) -> Result<(Vec<u32>, bool)> {
        match *self {
            BandId::AllBands => Ok(((1..=band_count).collect(), false)),
            BandId::Band(i) => {
                if i == 0 || i > band_count {
                    return Err(ModelError::InvalidBand(format!("band {i} out of range")));
                }
                Ok((vec![i], true))
            }
            BandId::AllMasks => Ok(((1..=band_count).collect(), false)),
            BandId::SharedMask => match shared_band_id {
                Some(i) => Ok((vec![i], true)),
                None => Err(ModelError::InvalidBand(
                    "raster has no shared mask band".to_string(),
                )),
            },
            BandId::BandMask(i) => {
                if i == 0 || i > band_count {
                    return Err(ModelError::InvalidBand(format!("band {i} out of range")));
                }
                Ok((vec![i], true))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_wire_table() {
        assert_eq!(BandId::parse(-1, 0).unwrap(), BandId::AllBands);
        assert_eq!(BandId::parse(3, 0).unwrap(), BandId::Band(3));
        assert_eq!(BandId::parse(0, -1).unwrap(), BandId::AllMasks);
        assert_eq!(BandId::parse(0, 0).unwrap(), BandId::SharedMask);
        assert_eq!(BandId::parse(0, 2).unwrap(), BandId::BandMask(2));
        assert!(BandId::parse(-2, 0).is_err());
    }

    #[test]
    fn normalize_rejects_out_of_range_band() {
        let result = BandId::Band(5).normalize(3, None);
        assert!(result.is_err());
    }

    #[test]
    fn normalize_shared_mask_requires_schema_support() {
        assert!(BandId::SharedMask.normalize(3, None).is_err());
        assert_eq!(
            BandId::SharedMask.normalize(3, Some(1)).unwrap(),
            (vec![1], true)
        );
    }
}
