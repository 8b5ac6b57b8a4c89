//! The view of the host DICOM object needed by this crate.
//!
//! The host data set model is not part of this crate.
//! Any type holding the image pixel module attributes
//! and an encapsulated pixel data element
//! can be used by implementing [`PixelDataObject`].
//! Types which can also receive attribute changes
//! (such as any implementor of [`ApplyOp`])
//! automatically implement [`PixelDataObjectMut`].

use std::borrow::Cow;

use dicom_core::ops::{ApplyOp, AttributeOp};
use snafu::{ensure, OptionExt};

use crate::error::{MissingAttributeSnafu, Result, UnsupportedSampleLayoutSnafu};

/// A DICOM object trait to be interpreted as pixel data.
pub trait PixelDataObject {
    /// Return the _Rows_, or `None` if it is not found
    fn rows(&self) -> Option<u16>;

    /// Return the _Columns_, or `None` if it is not found
    fn cols(&self) -> Option<u16>;

    /// Return the _Samples Per Pixel_, or `None` if it is not found
    fn samples_per_pixel(&self) -> Option<u16>;

    /// Return the _Bits Allocated_, or `None` if it is not defined
    fn bits_allocated(&self) -> Option<u16>;

    /// Return the _Bits Stored_, or `None` if it is not defined
    fn bits_stored(&self) -> Option<u16>;

    /// Return the _Pixel Representation_, or `None` if it is not defined
    fn pixel_representation(&self) -> Option<u16>;

    /// Return the _Planar Configuration_, or `None` if it is not defined
    fn planar_configuration(&self) -> Option<u16>;

    /// Return the _Photometric Interpretation_,
    /// with trailing whitespace removed,
    /// or `None` if it is not defined
    fn photometric_interpretation(&self) -> Option<&str>;

    /// Return the _Number Of Frames_, or `None` if it is not defined
    fn number_of_frames(&self) -> Option<u32>;

    /// Return the _Derivation Description_, or `None` if it is not defined
    fn derivation_description(&self) -> Option<Cow<str>>;

    /// Returns the _Number of Fragments_, or `None` for native pixel data
    fn number_of_fragments(&self) -> Option<u32>;

    /// Return a specific encoded pixel fragment by index
    /// (where 0 is the first fragment after the basic offset table)
    /// as a [`Cow<[u8]>`][1],
    /// or `None` if no such fragment is available.
    ///
    /// [1]: std::borrow::Cow
    fn fragment(&self, fragment: usize) -> Option<Cow<[u8]>>;

    /// Return the object's basic offset table,
    /// or `None` if no offset table is available.
    fn offset_table(&self) -> Option<Cow<[u32]>>;
}

/// A DICOM object which can also receive attribute changes.
pub trait PixelDataObjectMut: PixelDataObject {
    /// Apply the given attribute operation on the object.
    fn apply_op(
        &mut self,
        op: AttributeOp,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync + 'static>>;
}

impl<T> PixelDataObjectMut for T
where
    T: PixelDataObject + ApplyOp,
    T::Err: Send + Sync,
{
    fn apply_op(
        &mut self,
        op: AttributeOp,
    ) -> std::result::Result<(), Box<dyn std::error::Error + Send + Sync + 'static>> {
        self.apply(op)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync + 'static>)
    }
}

/// The layout of the native pixel data of an image.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ImageGeometry {
    pub rows: u16,
    pub columns: u16,
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    /// 0 for unsigned samples, 1 for two's complement
    pub pixel_representation: u16,
    /// 0 for interleaved samples, 1 for separate color planes
    pub planar_configuration: u16,
    pub number_of_frames: u32,
}

impl ImageGeometry {
    /// Collect the image geometry from a DICOM object.
    ///
    /// Only 8 or 16 bits allocated are supported.
    pub fn from_object(src: &(impl PixelDataObject + ?Sized)) -> Result<Self> {
        let columns = src
            .cols()
            .context(MissingAttributeSnafu { name: "Columns" })?;
        let rows = src.rows().context(MissingAttributeSnafu { name: "Rows" })?;
        let samples_per_pixel = src.samples_per_pixel().context(MissingAttributeSnafu {
            name: "SamplesPerPixel",
        })?;
        let bits_allocated = src.bits_allocated().context(MissingAttributeSnafu {
            name: "BitsAllocated",
        })?;
        let bits_stored = src.bits_stored().unwrap_or(bits_allocated);

        ensure!(
            rows > 0 && columns > 0 && samples_per_pixel > 0,
            UnsupportedSampleLayoutSnafu {
                reason: format!(
                    "empty image area {}x{} with {} samples per pixel",
                    columns, rows, samples_per_pixel
                ),
            }
        );
        ensure!(
            bits_allocated == 8 || bits_allocated == 16,
            UnsupportedSampleLayoutSnafu {
                reason: format!("BitsAllocated {} (expected 8 or 16)", bits_allocated),
            }
        );
        ensure!(
            bits_stored >= 1 && bits_stored <= bits_allocated,
            UnsupportedSampleLayoutSnafu {
                reason: format!(
                    "BitsStored {} with BitsAllocated {}",
                    bits_stored, bits_allocated
                ),
            }
        );

        Ok(ImageGeometry {
            rows,
            columns,
            samples_per_pixel,
            bits_allocated,
            bits_stored,
            pixel_representation: src.pixel_representation().unwrap_or(0),
            planar_configuration: src.planar_configuration().unwrap_or(0),
            number_of_frames: src.number_of_frames().unwrap_or(1).max(1),
        })
    }

    /// The number of bytes of each sample.
    pub fn bytes_per_sample(&self) -> usize {
        (self.bits_allocated / 8) as usize
    }

    /// The number of samples in a single component plane of a frame.
    pub fn pixels_per_frame(&self) -> usize {
        self.rows as usize * self.columns as usize
    }

    /// The number of bytes of a single frame.
    pub fn frame_size(&self) -> usize {
        self.pixels_per_frame() * self.samples_per_pixel as usize * self.bytes_per_sample()
    }

    /// The number of bytes of all frames.
    pub fn total_size(&self) -> u64 {
        self.frame_size() as u64 * u64::from(self.number_of_frames)
    }
}
