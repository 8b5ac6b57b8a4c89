//! Utility module for testing the JPEG 2000 pixel data codec.
#![allow(dead_code)]

use std::borrow::Cow;
use std::fmt;

use dicom_core::ops::{ApplyOp, AttributeAction, AttributeOp, AttributeSelectorStep};
use dicom_core::value::PixelFragmentSequence;
use dicom_core::{PrimitiveValue, Tag};
use dicom_dictionary_std::tags;
use dicom_jpeg2000::codec::{
    CodecError, CodestreamCodec, CodingMode, Component, EncodeSettings, Image,
};
use dicom_jpeg2000::codestream::CodestreamHeader;
use dicom_jpeg2000::snafu::{ensure_whatever, ResultExt};
use dicom_jpeg2000::PixelDataObject;

/// A test data object.
///
/// Can be used to test the pixel data codec
/// without having to open a real DICOM file.
/// Attribute operations are recorded,
/// and the ones affecting the image pixel module are applied.
#[derive(Debug, Clone)]
pub(crate) struct TestDataObject {
    pub rows: u16,
    pub columns: u16,
    pub samples_per_pixel: u16,
    pub bits_allocated: u16,
    pub bits_stored: u16,
    pub pixel_representation: u16,
    pub planar_configuration: u16,
    pub photometric_interpretation: String,
    pub number_of_frames: u32,
    pub derivation_description: Option<String>,
    pub pixel_data_sequence: Option<PixelFragmentSequence<Vec<u8>>>,
    pub ops: Vec<AttributeOp>,
    /// An attribute which cannot be updated
    pub reject: Option<Tag>,
}

/// The error of updating a rejected attribute.
#[derive(Debug)]
pub(crate) struct Rejected(pub Tag);

impl fmt::Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "attribute {} is read only", self.0)
    }
}

impl std::error::Error for Rejected {}

impl TestDataObject {
    pub fn new(
        rows: u16,
        columns: u16,
        samples_per_pixel: u16,
        bits: u16,
        photometric_interpretation: &str,
    ) -> Self {
        TestDataObject {
            rows,
            columns,
            samples_per_pixel,
            bits_allocated: if bits > 8 { 16 } else { 8 },
            bits_stored: bits,
            pixel_representation: 0,
            planar_configuration: 0,
            photometric_interpretation: photometric_interpretation.to_string(),
            number_of_frames: 1,
            derivation_description: None,
            pixel_data_sequence: None,
            ops: Vec::new(),
            reject: None,
        }
    }

    pub fn frames(mut self, number_of_frames: u32) -> Self {
        self.number_of_frames = number_of_frames;
        self
    }

    pub fn with_fragments(mut self, offset_table: Vec<u32>, fragments: Vec<Vec<u8>>) -> Self {
        self.pixel_data_sequence = Some(PixelFragmentSequence::new(offset_table, fragments));
        self
    }

    pub fn with_sequence(mut self, sequence: PixelFragmentSequence<Vec<u8>>) -> Self {
        self.pixel_data_sequence = Some(sequence);
        self
    }

    /// The size of one frame of native pixel data.
    pub fn frame_size(&self) -> usize {
        self.rows as usize
            * self.columns as usize
            * self.samples_per_pixel as usize
            * (self.bits_allocated as usize / 8)
    }

    /// The recorded actions on the given attribute.
    pub fn actions_on(&self, tag: Tag) -> Vec<&AttributeAction> {
        self.ops
            .iter()
            .filter(|op| selected_tag(op) == Some(tag))
            .map(|op| &op.action)
            .collect()
    }
}

fn selected_tag(op: &AttributeOp) -> Option<Tag> {
    match (&op.selector).into_iter().last() {
        Some(AttributeSelectorStep::Tag(tag)) => Some(*tag),
        _ => None,
    }
}

impl PixelDataObject for TestDataObject {
    fn rows(&self) -> Option<u16> {
        Some(self.rows)
    }

    fn cols(&self) -> Option<u16> {
        Some(self.columns)
    }

    fn samples_per_pixel(&self) -> Option<u16> {
        Some(self.samples_per_pixel)
    }

    fn bits_allocated(&self) -> Option<u16> {
        Some(self.bits_allocated)
    }

    fn bits_stored(&self) -> Option<u16> {
        Some(self.bits_stored)
    }

    fn pixel_representation(&self) -> Option<u16> {
        Some(self.pixel_representation)
    }

    fn planar_configuration(&self) -> Option<u16> {
        Some(self.planar_configuration)
    }

    fn photometric_interpretation(&self) -> Option<&str> {
        Some(&self.photometric_interpretation)
    }

    fn number_of_frames(&self) -> Option<u32> {
        Some(self.number_of_frames)
    }

    fn derivation_description(&self) -> Option<Cow<str>> {
        self.derivation_description.as_deref().map(Cow::Borrowed)
    }

    fn number_of_fragments(&self) -> Option<u32> {
        self.pixel_data_sequence
            .as_ref()
            .map(|v| v.fragments().len() as u32)
    }

    fn fragment(&self, fragment: usize) -> Option<Cow<[u8]>> {
        self.pixel_data_sequence
            .as_ref()?
            .fragments()
            .get(fragment)
            .map(|f| Cow::Borrowed(f.as_slice()))
    }

    fn offset_table(&self) -> Option<Cow<[u32]>> {
        self.pixel_data_sequence
            .as_ref()
            .map(|v| Cow::Borrowed(v.offset_table()))
    }
}

impl ApplyOp for TestDataObject {
    type Err = Rejected;

    fn apply(&mut self, op: AttributeOp) -> Result<(), Self::Err> {
        if let Some(tag) = self.reject.filter(|&tag| selected_tag(&op) == Some(tag)) {
            return Err(Rejected(tag));
        }
        match (selected_tag(&op), &op.action) {
            (Some(tags::DERIVATION_DESCRIPTION), AttributeAction::SetStr(text)) => {
                self.derivation_description = Some(text.to_string());
            }
            (Some(tags::PHOTOMETRIC_INTERPRETATION), AttributeAction::SetStr(text)) => {
                self.photometric_interpretation = text.to_string();
            }
            (Some(tags::PLANAR_CONFIGURATION), AttributeAction::Set(PrimitiveValue::U16(v))) => {
                self.planar_configuration = v[0];
            }
            _ => {}
        }
        self.ops.push(op);
        Ok(())
    }
}

/// The size of the main header and tile-part header
/// written by [`build_codestream`].
fn data_offset(components: usize) -> usize {
    2 + (2 + 38 + 3 * components) + 14 + 6 + 12
}

/// Write a codestream with a real JPEG 2000 main header
/// followed by the raw samples of each component.
pub fn build_codestream(image: &Image, capabilities: u16, mct: bool, reversible: bool) -> Vec<u8> {
    let (width, height) = (image.width, image.height);
    let mut out = vec![0xFF, 0x4F, 0xFF, 0x51];
    let lsiz = 38 + 3 * image.components.len() as u16;
    out.extend_from_slice(&lsiz.to_be_bytes());
    out.extend_from_slice(&capabilities.to_be_bytes());
    for v in [width, height, 0, 0, width, height, 0, 0] {
        out.extend_from_slice(&v.to_be_bytes());
    }
    out.extend_from_slice(&(image.components.len() as u16).to_be_bytes());
    for component in &image.components {
        out.push((component.precision as u8 - 1) | if component.signed { 0x80 } else { 0 });
        out.extend_from_slice(&[1, 1]);
    }
    // COD: LRCP, 1 layer, 5 decomposition levels, 64x64 code-blocks
    out.extend_from_slice(&[0xFF, 0x52, 0x00, 0x0C, 0x00, 0x00, 0x00, 0x01]);
    out.extend_from_slice(&[mct as u8, 0x05, 0x04, 0x04, 0x00, reversible as u8]);
    // QCD
    if reversible {
        out.extend_from_slice(&[0xFF, 0x5C, 0x00, 0x04, 0x40, 0x48]);
    } else {
        out.extend_from_slice(&[0xFF, 0x5C, 0x00, 0x04, 0x42, 0x48]);
    }
    // SOT
    out.extend_from_slice(&[0xFF, 0x90, 0x00, 0x0A, 0, 0, 0, 0, 0, 0, 0, 1]);
    debug_assert_eq!(out.len(), data_offset(image.components.len()));
    for component in &image.components {
        for &sample in &component.data {
            out.extend_from_slice(&(sample as u16).to_le_bytes());
        }
    }
    out.extend_from_slice(&[0xFF, 0xD9]);
    if out.len() % 2 != 0 {
        out.push(0);
    }
    out
}

/// A codestream codec storing raw samples behind real main headers.
///
/// Deterministic and independent of any native JPEG 2000 library.
#[derive(Debug, Default, Copy, Clone)]
pub struct RawCodec;

impl CodestreamCodec for RawCodec {
    fn decode(&self, codestream: &[u8]) -> Result<Image, CodecError> {
        let header = CodestreamHeader::parse(codestream).whatever_context("invalid header")?;
        let pixels = header.width as usize * header.height as usize;
        let start = data_offset(header.components.len());
        let end = start + pixels * 2 * header.components.len();
        ensure_whatever!(codestream.len() >= end + 2, "truncated codestream");

        let components = header
            .components
            .iter()
            .enumerate()
            .map(|(c, info)| {
                let plane = &codestream[start + c * pixels * 2..start + (c + 1) * pixels * 2];
                let data = plane
                    .chunks_exact(2)
                    .map(|b| {
                        let v = u16::from_le_bytes([b[0], b[1]]);
                        if info.signed {
                            v as i16 as i32
                        } else {
                            v as i32
                        }
                    })
                    .collect();
                Component {
                    precision: u32::from(info.precision),
                    signed: info.signed,
                    data,
                }
            })
            .collect();

        Ok(Image {
            width: header.width,
            height: header.height,
            components,
        })
    }

    fn encode(&self, image: &Image, settings: &EncodeSettings) -> Result<Vec<u8>, CodecError> {
        let mct = settings.use_mct && image.components.len() == 3;
        let reversible = settings.mode == CodingMode::Lossless;
        Ok(build_codestream(image, 0, mct, reversible))
    }
}

/// Create a single component image with the given samples.
pub fn gray_image(width: u32, height: u32, precision: u32, data: Vec<i32>) -> Image {
    Image {
        width,
        height,
        components: vec![Component {
            precision,
            signed: false,
            data,
        }],
    }
}

/// Native 8-bit samples following a simple gradient, `frames` times.
pub fn gradient_u8(len: usize, frames: usize) -> Vec<u8> {
    (0..frames)
        .flat_map(|f| (0..len).map(move |i| ((i * 3 + f * 17) % 251) as u8))
        .collect()
}
