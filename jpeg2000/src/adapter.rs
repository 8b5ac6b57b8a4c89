//! The pixel data codec interface exposed to a transfer syntax registry.

use crate::codec::CodestreamCodec;
use crate::color::ColorModel;
use crate::decode::{self, DecodedFrame, DecodedPixelData};
use crate::encode::{self, EncodedPixelData};
use crate::entries::{self, Jpeg2000Syntax};
use crate::error::Result;
use crate::locator::FragmentCursor;
use crate::object::{PixelDataObject, PixelDataObjectMut};
use crate::params::{CodecParameters, RepresentationParameter};
use crate::transcode;

/// Trait object responsible for decoding, encoding and transcoding
/// pixel data of a given transfer syntax.
pub trait PixelDataCodec {
    /// Decode all frames of an encapsulated pixel data element.
    fn decode(&self, src: &dyn PixelDataObject, params: &CodecParameters)
        -> Result<DecodedPixelData>;

    /// Decode a single frame into `dst`.
    ///
    /// The returned cursor should be passed
    /// when decoding the following frame.
    fn decode_frame(
        &self,
        src: &dyn PixelDataObject,
        frame: u32,
        cursor: FragmentCursor,
        dst: &mut [u8],
        params: &CodecParameters,
    ) -> Result<DecodedFrame>;

    /// Encode native pixel data into this codec's transfer syntax,
    /// recording the necessary attribute changes in `dst`.
    fn encode(
        &self,
        samples: &[u8],
        rep: Option<RepresentationParameter>,
        params: &CodecParameters,
        dst: &mut dyn PixelDataObjectMut,
    ) -> Result<EncodedPixelData>;

    /// Convert the encapsulated pixel data of `obj`
    /// from the transfer syntax `from` into this codec's transfer syntax.
    fn transcode(
        &self,
        from: &str,
        from_rep: Option<RepresentationParameter>,
        to_rep: Option<RepresentationParameter>,
        params: &CodecParameters,
        obj: &mut dyn PixelDataObjectMut,
    ) -> Result<EncodedPixelData>;

    /// Check whether this codec can convert between the two transfer syntaxes.
    fn can_change_coding(&self, from: &str, to: &str) -> bool;

    /// Determine the color model of the pixel data once decoded.
    fn determine_decompressed_color_model(&self, src: &dyn PixelDataObject) -> Result<ColorModel>;
}

/// Pixel data codec for one of the JPEG 2000 transfer syntaxes,
/// backed by a codestream codec.
#[derive(Debug, Clone)]
pub struct Jpeg2000Adapter<C> {
    syntax: Jpeg2000Syntax,
    codec: C,
}

impl<C> Jpeg2000Adapter<C> {
    pub fn new(syntax: Jpeg2000Syntax, codec: C) -> Self {
        Jpeg2000Adapter { syntax, codec }
    }

    /// The transfer syntax produced by this adapter.
    pub fn syntax(&self) -> Jpeg2000Syntax {
        self.syntax
    }

    pub fn codec(&self) -> &C {
        &self.codec
    }
}

#[cfg(feature = "openjpeg-sys")]
impl Jpeg2000Adapter<crate::codec::openjpeg::OpenJpegCodec> {
    /// Create an adapter backed by OpenJPEG.
    pub fn openjpeg(syntax: Jpeg2000Syntax) -> Self {
        Jpeg2000Adapter::new(syntax, crate::codec::openjpeg::OpenJpegCodec)
    }
}

impl<C> PixelDataCodec for Jpeg2000Adapter<C>
where
    C: CodestreamCodec,
{
    fn decode(
        &self,
        src: &dyn PixelDataObject,
        params: &CodecParameters,
    ) -> Result<DecodedPixelData> {
        decode::decode(&self.codec, src, params)
    }

    fn decode_frame(
        &self,
        src: &dyn PixelDataObject,
        frame: u32,
        cursor: FragmentCursor,
        dst: &mut [u8],
        params: &CodecParameters,
    ) -> Result<DecodedFrame> {
        decode::decode_frame(&self.codec, src, frame, cursor, dst, params)
    }

    fn encode(
        &self,
        samples: &[u8],
        rep: Option<RepresentationParameter>,
        params: &CodecParameters,
        dst: &mut dyn PixelDataObjectMut,
    ) -> Result<EncodedPixelData> {
        encode::encode(&self.codec, self.syntax, samples, rep, params, dst)
    }

    fn transcode(
        &self,
        from: &str,
        from_rep: Option<RepresentationParameter>,
        to_rep: Option<RepresentationParameter>,
        params: &CodecParameters,
        obj: &mut dyn PixelDataObjectMut,
    ) -> Result<EncodedPixelData> {
        transcode::transcode(
            &self.codec,
            from,
            from_rep,
            self.syntax.uid(),
            to_rep,
            params,
            obj,
        )
    }

    fn can_change_coding(&self, from: &str, to: &str) -> bool {
        entries::can_change_coding(from, to)
    }

    fn determine_decompressed_color_model(&self, src: &dyn PixelDataObject) -> Result<ColorModel> {
        decode::determine_decompressed_color_model(src)
    }
}
