//! The JPEG 2000 codestream codec capability.
//!
//! This crate does not implement the JPEG 2000 transforms itself.
//! The orchestration layer only needs
//! something which turns one contiguous codestream into component samples
//! and back, as described by [`CodestreamCodec`].
//!
//! - [`openjpeg`](openjpeg) provides an implementation
//!   backed by [OpenJPEG].
//!   Requires the `openjpeg-sys` feature.
//!
//! [OpenJPEG]: https://github.com/uclouvain/openjpeg

use snafu::Snafu;

use crate::params::ProgressionOrder;

#[cfg(feature = "openjpeg-sys")]
pub mod openjpeg;

/// **Note:** This module is a stub.
/// Enable the `openjpeg-sys` feature to use this module.
#[cfg(not(feature = "openjpeg-sys"))]
pub mod openjpeg {}

/// An error reported by a codestream codec.
///
/// The [`whatever!`](snafu::whatever) macro can be used
/// to easily create an error of this kind.
#[derive(Debug, Snafu)]
#[snafu(whatever, display("{}", message))]
pub struct CodecError {
    /// The error message.
    message: String,
    /// The underlying error cause, if any.
    #[snafu(source(from(Box<dyn std::error::Error + Send + Sync + 'static>, Some)))]
    source: Option<Box<dyn std::error::Error + Send + Sync + 'static>>,
}

/// A single image component (color channel) in raster order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Component {
    /// Bit depth of each sample
    pub precision: u32,
    /// Whether samples are signed
    pub signed: bool,
    /// The component's samples, row by row
    pub data: Vec<i32>,
}

/// An uncompressed image as exchanged with the codestream codec.
///
/// Components are never subsampled:
/// each holds exactly `width * height` samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    pub width: u32,
    pub height: u32,
    pub components: Vec<Component>,
}

/// The coding mode requested from the codec.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CodingMode {
    /// Reversible 5/3 wavelet, no quantization
    Lossless,
    /// Irreversible 9/7 wavelet
    /// with rate allocation targeting the given compression ratio
    Lossy { ratio: f32 },
}

/// Settings for encoding a single codestream.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeSettings {
    pub mode: CodingMode,
    /// Number of resolution levels (decomposition levels + 1)
    pub num_resolutions: u8,
    /// Code-block width and height, as powers of two
    pub code_block_size: (u8, u8),
    pub progression_order: ProgressionOrder,
    /// Whether to apply the multi-component transform
    /// (only meaningful for 3 components)
    pub use_mct: bool,
    /// Whether to relay the codec's informational messages
    pub verbose: bool,
}

/// A codec turning JPEG 2000 codestreams into images and back.
///
/// Implementations are expected to apply the inverse
/// multi-component transform while decoding,
/// so that colour images signalled with one
/// come out in the RGB color space.
pub trait CodestreamCodec {
    /// Decode a complete JPEG 2000 codestream
    /// (optionally in a JP2 file format wrapper).
    fn decode(&self, codestream: &[u8]) -> Result<Image, CodecError>;

    /// Encode an image into a raw JPEG 2000 codestream
    /// (without a JP2 file format wrapper).
    fn encode(&self, image: &Image, settings: &EncodeSettings) -> Result<Vec<u8>, CodecError>;
}

impl<T: CodestreamCodec + ?Sized> CodestreamCodec for &T {
    fn decode(&self, codestream: &[u8]) -> Result<Image, CodecError> {
        (**self).decode(codestream)
    }

    fn encode(&self, image: &Image, settings: &EncodeSettings) -> Result<Vec<u8>, CodecError> {
        (**self).encode(image, settings)
    }
}
