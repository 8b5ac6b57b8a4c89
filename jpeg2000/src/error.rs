//! Error types for JPEG 2000 pixel data handling.

use snafu::Snafu;

use crate::codec::CodecError;

/// The possible error conditions when decoding, encoding
/// or transcoding JPEG 2000 pixel data.
///
/// Users of this type are free to handle errors based on their variant,
/// but should not make decisions based on the display message,
/// since that is not considered part of the API
/// and may change on any new release.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// A required attribute is missing
    /// from the DICOM object representing the image.
    #[snafu(display("Missing required attribute `{}`", name))]
    MissingAttribute { name: &'static str },

    /// The input pixel data is not encapsulated,
    /// or the pixel data sequence has no fragments.
    #[snafu(display("Pixel data is not encapsulated"))]
    NotEncapsulated,

    /// The requested frame is outside the object's frame range.
    #[snafu(display("Frame #{} is out of bounds ({} frames)", frame, frames))]
    FrameRangeOutOfBounds { frame: u32, frames: u32 },

    /// The basic offset table does not point at fragment boundaries.
    #[snafu(display("Basic offset table entry #{} ({}) is not a fragment boundary", index, offset))]
    InvalidOffsetTable { index: usize, offset: u32 },

    /// The fragments of the requested frame cannot be determined
    /// without an offset table and without sequential access.
    #[snafu(display(
        "Cannot determine the fragments of frame #{} (cursor at frame #{}, fragment #{})",
        frame,
        cursor_frame,
        cursor_fragment
    ))]
    FrameLocationAmbiguous {
        frame: u32,
        cursor_frame: u32,
        cursor_fragment: usize,
    },

    /// The codestream of a frame is malformed
    /// or could not be decoded.
    #[snafu(display("Corrupt JPEG 2000 codestream in frame #{}", frame))]
    CorruptCodestream { frame: u32, source: CodecError },

    /// The destination buffer cannot hold a full frame.
    #[snafu(display(
        "Buffer too small for frame: {} bytes required, {} available",
        required,
        available
    ))]
    BufferTooSmall { required: usize, available: usize },

    /// The sample layout is not supported by this codec.
    #[snafu(display("Unsupported sample layout: {}", reason))]
    UnsupportedSampleLayout { reason: String },

    /// The number of components in the codestream
    /// is not supported or does not match the object.
    #[snafu(display("Unsupported number of components: {}", count))]
    UnsupportedComponentCount { count: u32 },

    /// The decoded image does not match the image geometry of the object.
    #[snafu(display(
        "Frame #{} is {}x{}, but the object declares {}x{}",
        frame,
        width,
        height,
        columns,
        rows
    ))]
    GeometryMismatch {
        frame: u32,
        width: u32,
        height: u32,
        columns: u16,
        rows: u16,
    },

    /// The size of the native pixel data does not match the image geometry.
    #[snafu(display(
        "Pixel data length mismatch: expected {} bytes, got {}",
        expected,
        actual
    ))]
    PixelDataLengthMismatch { expected: u64, actual: u64 },

    /// The requested representation parameter is invalid.
    #[snafu(display("Invalid compression ratio {}", ratio))]
    InvalidRepresentation { ratio: f32 },

    /// The codestream codec failed to encode a frame.
    #[snafu(display("Could not encode frame #{}", frame))]
    EncodeFailure { frame: u32, source: CodecError },

    /// The compression ratio cannot be computed
    /// because either side of the ratio is empty.
    #[snafu(display(
        "Degenerate compression ratio ({} uncompressed bytes, {} compressed bytes)",
        uncompressed,
        compressed
    ))]
    RatioComputationDegenerate { uncompressed: u64, compressed: u64 },

    /// The decoded pixel data would exceed the configured size limit.
    #[snafu(display("Decoded pixel data of {} bytes exceeds the limit of {}", size, limit))]
    ResourceLimitExceeded { size: u64, limit: u64 },

    /// The transfer syntax pair is not served by this codec.
    #[snafu(display("Cannot change coding from `{}` to `{}`", from, to))]
    UnsupportedTransferSyntaxPair { from: String, to: String },

    /// The host data set rejected an attribute update.
    #[snafu(display("Could not update data set attribute {}", tag))]
    UpdateDataset {
        tag: dicom_core::Tag,
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },
}

/// Alias for the result of JPEG 2000 pixel data operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
