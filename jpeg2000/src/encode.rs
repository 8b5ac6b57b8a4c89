//! Encoding of native pixel data into encapsulated JPEG 2000 pixel data.

use std::borrow::Cow;

use byteorder::{ByteOrder, LittleEndian};
use dicom_core::ops::{AttributeAction, AttributeOp};
use dicom_core::value::PixelFragmentSequence;
use dicom_core::PrimitiveValue;
use dicom_dictionary_std::tags;
use snafu::{ensure, ResultExt};
use tracing::{debug, warn};

use crate::codec::{CodestreamCodec, CodingMode, Component, EncodeSettings, Image};
use crate::encapsulation::{encapsulate_frames, split_codestream};
use crate::entries::Jpeg2000Syntax;
use crate::error::{
    EncodeFailureSnafu, InvalidRepresentationSnafu, PixelDataLengthMismatchSnafu,
    RatioComputationDegenerateSnafu, Result, UnsupportedSampleLayoutSnafu, UpdateDatasetSnafu,
};
use crate::object::{ImageGeometry, PixelDataObject, PixelDataObjectMut};
use crate::params::{CodecParameters, RepresentationParameter};

/// The maximum length of a value of VR ST.
const MAX_DERIVATION_DESCRIPTION_LENGTH: usize = 1024;

/// Encapsulated JPEG 2000 pixel data produced by this crate.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedPixelData {
    /// The fragments and basic offset table of the new pixel data element
    pub pixel_sequence: PixelFragmentSequence<Vec<u8>>,
    /// The index of each frame's first fragment
    pub frame_starts: Vec<usize>,
    /// Uncompressed size divided by compressed size
    pub compression_ratio: f64,
    /// Whether lossy compression was applied
    pub lossy: bool,
}

/// Encode the native pixel data of all frames.
///
/// The image geometry is read from `dst`,
/// which then receives the attribute changes
/// describing the new compressed representation.
pub fn encode<C, D>(
    codec: &C,
    syntax: Jpeg2000Syntax,
    samples: &[u8],
    rep: Option<RepresentationParameter>,
    params: &CodecParameters,
    dst: &mut D,
) -> Result<EncodedPixelData>
where
    C: CodestreamCodec + ?Sized,
    D: PixelDataObjectMut + ?Sized,
{
    let geometry = ImageGeometry::from_object(&*dst)?;
    let photometric_interpretation = dst
        .photometric_interpretation()
        .map(|pi| pi.trim().to_string());
    encode_native(
        codec,
        syntax,
        samples,
        &geometry,
        photometric_interpretation.as_deref(),
        rep,
        params,
        dst,
    )
}

/// Encode native pixel data of a known geometry and photometric interpretation,
/// recording the changes in `dst`.
///
/// `dst` is only changed once every frame is encoded.
/// The changes are then applied in this order:
/// _Derivation Description_,
/// _Lossy Image Compression_ with its ratio and method,
/// _Planar Configuration_,
/// and _Photometric Interpretation_.
/// Should `dst` reject one of them,
/// the error names its tag and the changes before it remain applied.
#[allow(clippy::too_many_arguments)]
pub(crate) fn encode_native<C, D>(
    codec: &C,
    syntax: Jpeg2000Syntax,
    samples: &[u8],
    geometry: &ImageGeometry,
    photometric_interpretation: Option<&str>,
    rep: Option<RepresentationParameter>,
    params: &CodecParameters,
    dst: &mut D,
) -> Result<EncodedPixelData>
where
    C: CodestreamCodec + ?Sized,
    D: PixelDataObjectMut + ?Sized,
{
    ensure!(
        geometry.samples_per_pixel == 1 || geometry.samples_per_pixel == 3,
        UnsupportedSampleLayoutSnafu {
            reason: format!("SamplesPerPixel {}", geometry.samples_per_pixel),
        }
    );
    ensure!(
        !samples.is_empty(),
        RatioComputationDegenerateSnafu {
            uncompressed: 0_u64,
            compressed: 0_u64,
        }
    );
    ensure!(
        samples.len() as u64 == geometry.total_size(),
        PixelDataLengthMismatchSnafu {
            expected: geometry.total_size(),
            actual: samples.len() as u64,
        }
    );

    let mode = coding_mode(syntax, rep, params)?;
    let is_rgb = geometry.samples_per_pixel == 3 && photometric_interpretation == Some("RGB");
    let use_mct = params.use_mct && is_rgb;
    let settings = EncodeSettings {
        mode,
        num_resolutions: params.num_resolutions,
        code_block_size: params.code_block_size,
        progression_order: params.progression_order,
        use_mct,
        verbose: params.verbose,
    };

    let frames = samples
        .chunks_exact(geometry.frame_size())
        .enumerate()
        .map(|(frame, data)| {
            let frame = frame as u32;
            let image = read_samples(data, geometry);
            let codestream = codec
                .encode(&image, &settings)
                .context(EncodeFailureSnafu { frame })?;
            debug!("Encoded frame #{} into {} bytes", frame, codestream.len());
            Ok(split_codestream(codestream, params.max_fragment_size))
        })
        .collect::<Result<Vec<_>>>()?;

    let (pixel_sequence, frame_starts) = encapsulate_frames(frames);

    let uncompressed = samples.len() as u64;
    let compressed: u64 = pixel_sequence
        .fragments()
        .iter()
        .map(|fragment| fragment.len() as u64)
        .sum();
    ensure!(
        compressed > 0,
        RatioComputationDegenerateSnafu {
            uncompressed,
            compressed,
        }
    );
    let compression_ratio = uncompressed as f64 / compressed as f64;
    let lossy = matches!(mode, CodingMode::Lossy { .. });

    let mut ops = vec![derivation_description_op(&*dst, lossy, compression_ratio)];
    if lossy {
        ops.push(AttributeOp::new(
            tags::LOSSY_IMAGE_COMPRESSION,
            AttributeAction::SetStr("01".into()),
        ));
        ops.push(AttributeOp::new(
            tags::LOSSY_IMAGE_COMPRESSION_RATIO,
            AttributeAction::PushStr(format!("{:.6}", compression_ratio).into()),
        ));
        ops.push(AttributeOp::new(
            tags::LOSSY_IMAGE_COMPRESSION_METHOD,
            AttributeAction::PushStr("ISO_15444_1".into()),
        ));
    } else {
        ops.push(AttributeOp::new(
            tags::LOSSY_IMAGE_COMPRESSION,
            AttributeAction::SetIfMissing(PrimitiveValue::from("00")),
        ));
    }

    if geometry.samples_per_pixel == 3 {
        ops.push(AttributeOp::new(
            tags::PLANAR_CONFIGURATION,
            AttributeAction::Set(PrimitiveValue::from(0_u16)),
        ));
    }

    let new_photometric_interpretation = match (use_mct, lossy) {
        (true, false) => Some("YBR_RCT"),
        (true, true) => Some("YBR_ICT"),
        (false, _) => photometric_interpretation,
    };
    if let Some(pi) = new_photometric_interpretation {
        let current = dst.photometric_interpretation().map(str::trim);
        if current != Some(pi) {
            ops.push(AttributeOp::new(
                tags::PHOTOMETRIC_INTERPRETATION,
                AttributeAction::SetStr(pi.to_string().into()),
            ));
        }
    }

    for op in ops {
        apply(dst, op)?;
    }

    Ok(EncodedPixelData {
        pixel_sequence,
        frame_starts,
        compression_ratio,
        lossy,
    })
}

/// Append a note on the applied compression
/// to the object's _Derivation Description_.
///
/// Existing text is always kept.
pub fn update_derivation_description<D>(dst: &mut D, lossy: bool, ratio: f64) -> Result<()>
where
    D: PixelDataObjectMut + ?Sized,
{
    let op = derivation_description_op(&*dst, lossy, ratio);
    apply(dst, op)
}

fn derivation_description_op<D>(src: &D, lossy: bool, ratio: f64) -> AttributeOp
where
    D: PixelDataObject + ?Sized,
{
    let note = format!(
        "{} compression with JPEG 2000, compression ratio {:.5}",
        if lossy { "Lossy" } else { "Lossless" },
        ratio
    );
    let text = match src.derivation_description() {
        Some(current) if !current.trim().is_empty() => {
            format!("{}; {}", current.trim_end(), note)
        }
        _ => note,
    };
    if text.len() > MAX_DERIVATION_DESCRIPTION_LENGTH {
        warn!(
            "Derivation Description is {} characters long, over the limit of {}",
            text.len(),
            MAX_DERIVATION_DESCRIPTION_LENGTH
        );
    }
    AttributeOp::new(
        tags::DERIVATION_DESCRIPTION,
        AttributeAction::SetStr(Cow::Owned(text)),
    )
}

/// Resolve the coding mode from the requested representation
/// and the target transfer syntax.
fn coding_mode(
    syntax: Jpeg2000Syntax,
    rep: Option<RepresentationParameter>,
    params: &CodecParameters,
) -> Result<CodingMode> {
    let ratio = match rep {
        Some(RepresentationParameter::Lossless) => return Ok(CodingMode::Lossless),
        None if syntax.is_lossless_only() => return Ok(CodingMode::Lossless),
        None => params.default_lossy_ratio,
        Some(RepresentationParameter::Lossy { ratio }) => ratio,
    };
    ensure!(
        ratio.is_finite() && ratio >= 1.,
        InvalidRepresentationSnafu { ratio }
    );
    if syntax.is_lossless_only() {
        warn!(
            "Lossy compression requested for {}, encoding losslessly",
            syntax
        );
        return Ok(CodingMode::Lossless);
    }
    Ok(CodingMode::Lossy { ratio })
}

/// Read one frame of native pixel data into component planes.
fn read_samples(data: &[u8], geometry: &ImageGeometry) -> Image {
    let pixels = geometry.pixels_per_frame();
    let samples_per_pixel = geometry.samples_per_pixel as usize;
    let bytes_per_sample = geometry.bytes_per_sample();
    let signed = geometry.pixel_representation == 1;
    let precision = u32::from(geometry.bits_stored);
    let shift = 32 - precision;

    let components = (0..samples_per_pixel)
        .map(|c| {
            let data = (0..pixels)
                .map(|i| {
                    let index = if geometry.planar_configuration == 0 {
                        i * samples_per_pixel + c
                    } else {
                        c * pixels + i
                    };
                    let offset = index * bytes_per_sample;
                    let raw = if bytes_per_sample == 1 {
                        u32::from(data[offset])
                    } else {
                        u32::from(LittleEndian::read_u16(&data[offset..offset + 2]))
                    };
                    // keep the stored bits only, sign extended if needed
                    if signed {
                        ((raw << shift) as i32) >> shift
                    } else {
                        ((raw << shift) >> shift) as i32
                    }
                })
                .collect();
            Component {
                precision,
                signed,
                data,
            }
        })
        .collect();

    Image {
        width: u32::from(geometry.columns),
        height: u32::from(geometry.rows),
        components,
    }
}

fn apply<D>(dst: &mut D, op: AttributeOp) -> Result<()>
where
    D: PixelDataObjectMut + ?Sized,
{
    let tag = op.selector.last_tag();
    dst.apply_op(op).context(UpdateDatasetSnafu { tag })
}
