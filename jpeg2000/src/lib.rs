//! JPEG 2000 pixel data decoding, encoding and transcoding for DICOM.
//!
//! This crate turns encapsulated pixel data
//! in one of the JPEG 2000 transfer syntaxes
//! into native pixel data and back.
//! It can also convert pixel data between two JPEG 2000 transfer syntaxes,
//! copying the existing fragments
//! when the codestreams already fit the target.
//!
//! The host DICOM object is seen through [`PixelDataObject`]
//! (and [`PixelDataObjectMut`] when attributes need to be updated).
//! The JPEG 2000 transforms themselves are delegated
//! to a [`CodestreamCodec`](codec::CodestreamCodec).
//! With the `openjpeg-sys` feature,
//! [`OpenJpegCodec`](codec::openjpeg::OpenJpegCodec)
//! provides one backed by OpenJPEG.
//!
//! # Example
//!
//! ```no_run
//! # #[cfg(feature = "openjpeg-sys")]
//! # fn run(obj: &dyn dicom_jpeg2000::PixelDataObject) -> dicom_jpeg2000::Result<()> {
//! use dicom_jpeg2000::{CodecParameters, Jpeg2000Adapter, Jpeg2000Syntax, PixelDataCodec};
//!
//! let adapter = Jpeg2000Adapter::openjpeg(Jpeg2000Syntax::LosslessOnly);
//! let decoded = adapter.decode(obj, &CodecParameters::default())?;
//! println!("{} bytes of {}", decoded.data.len(), decoded.color_model);
//! # Ok(())
//! # }
//! ```
//!
//! Without a basic offset table,
//! frames with multiple fragments can only be decoded one by one in order,
//! passing along the [`FragmentCursor`] returned by each call
//! to [`decode_frame`](PixelDataCodec::decode_frame).

pub mod adapter;
pub mod codec;
pub mod codestream;
pub mod color;
pub mod decode;
pub mod encapsulation;
pub mod encode;
pub mod entries;
pub mod error;
pub mod fragments;
pub mod locator;
pub mod object;
pub mod params;
pub mod transcode;

pub use adapter::{Jpeg2000Adapter, PixelDataCodec};
pub use color::ColorModel;
pub use decode::{DecodedFrame, DecodedPixelData};
pub use encode::{update_derivation_description, EncodedPixelData};
pub use entries::{can_change_coding, Jpeg2000Syntax};
pub use error::{Error, Result};
pub use locator::{FragmentCursor, Located};
pub use object::{ImageGeometry, PixelDataObject, PixelDataObjectMut};
pub use params::{CodecParameters, ProgressionOrder, RepresentationParameter};

// re-export the snafu crate, used by codec implementations
pub use snafu;
