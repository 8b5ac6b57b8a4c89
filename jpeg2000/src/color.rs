//! Resolution of the photometric interpretation of decoded pixel data.

use std::fmt;

use snafu::ensure;

use crate::codestream::{
    CodestreamHeader, WaveletTransform, JP2_COLOURSPACE_SRGB, JP2_COLOURSPACE_SYCC,
};
use crate::error::{Result, UnsupportedComponentCountSnafu};

/// The color model of pixel data after JPEG 2000 decompression.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ColorModel {
    Monochrome1,
    Monochrome2,
    PaletteColor,
    Rgb,
    YbrFull,
}

impl ColorModel {
    /// The DICOM _Photometric Interpretation_ of this color model.
    pub fn as_str(self) -> &'static str {
        match self {
            ColorModel::Monochrome1 => "MONOCHROME1",
            ColorModel::Monochrome2 => "MONOCHROME2",
            ColorModel::PaletteColor => "PALETTE COLOR",
            ColorModel::Rgb => "RGB",
            ColorModel::YbrFull => "YBR_FULL",
        }
    }

    /// Whether the color model has a single sample per pixel.
    pub fn is_monochrome(self) -> bool {
        !matches!(self, ColorModel::Rgb | ColorModel::YbrFull)
    }
}

impl fmt::Display for ColorModel {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Determine the color model of the samples
/// produced by decoding a codestream with the given main header.
///
/// Only the components kept in the output are considered:
/// with `samples_per_pixel` given,
/// components past that number are not part of the decoded pixel data.
///
/// The codestream's own signalling takes precedence.
/// The object's photometric interpretation
/// is only used where the codestream says nothing.
pub fn resolve(
    header: &CodestreamHeader,
    samples_per_pixel: Option<u16>,
    photometric_interpretation: Option<&str>,
) -> Result<ColorModel> {
    let mut count = header.components.len() as u32;
    if let Some(samples_per_pixel) = samples_per_pixel {
        count = count.min(u32::from(samples_per_pixel));
    }
    let pi = photometric_interpretation.map(str::trim);

    if count == 1 {
        return Ok(match pi {
            Some("MONOCHROME1") => ColorModel::Monochrome1,
            Some("PALETTE COLOR") => ColorModel::PaletteColor,
            _ => ColorModel::Monochrome2,
        });
    }
    ensure!(count == 3, UnsupportedComponentCountSnafu { count });

    // the decoder reverses both RCT and ICT
    if header.coding_style.multi_component_transform {
        return Ok(ColorModel::Rgb);
    }

    match header.jp2_colourspace {
        Some(JP2_COLOURSPACE_SRGB) => return Ok(ColorModel::Rgb),
        Some(JP2_COLOURSPACE_SYCC) => return Ok(ColorModel::YbrFull),
        _ => {}
    }

    let ybr = pi.map(|pi| pi.starts_with("YBR")).unwrap_or(false);
    Ok(match header.coding_style.transform {
        // irreversible coding without a component transform keeps YCbCr samples
        WaveletTransform::Irreversible97 if pi == Some("RGB") => ColorModel::Rgb,
        WaveletTransform::Irreversible97 => ColorModel::YbrFull,
        WaveletTransform::Reversible53 if matches!(pi, Some("YBR_RCT") | Some("YBR_ICT")) => {
            ColorModel::Rgb
        }
        _ if ybr => ColorModel::YbrFull,
        _ => ColorModel::Rgb,
    })
}
