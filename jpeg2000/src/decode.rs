//! Decoding of encapsulated JPEG 2000 pixel data into native pixel data.

use byteorder::{ByteOrder, LittleEndian};
use snafu::{ensure, ResultExt};
use tracing::{debug, warn};

use crate::codec::{CodestreamCodec, Image};
use crate::codestream::CodestreamHeader;
use crate::color::{self, ColorModel};
use crate::error::{
    BufferTooSmallSnafu, CorruptCodestreamSnafu, GeometryMismatchSnafu, ResourceLimitExceededSnafu,
    Result, UnsupportedComponentCountSnafu, UnsupportedSampleLayoutSnafu,
};
use crate::fragments::FragmentStore;
use crate::locator::{FragmentCursor, FrameLocator, Located};
use crate::object::{ImageGeometry, PixelDataObject};
use crate::params::CodecParameters;

/// The native pixel data of a whole element.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedPixelData {
    /// The samples of all frames, little endian
    pub data: Vec<u8>,
    /// The color model of the samples
    pub color_model: ColorModel,
    /// The planar configuration of the samples
    pub planar_configuration: u16,
    /// The layout of the samples
    pub geometry: ImageGeometry,
}

/// The outcome of decoding a single frame.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    pub color_model: ColorModel,
    /// The cursor pointing at the following frame
    pub next_cursor: FragmentCursor,
    /// The number of bytes written to the destination buffer
    pub len: usize,
}

/// Decode all frames of an encapsulated pixel data element.
pub fn decode<C, D>(codec: &C, src: &D, params: &CodecParameters) -> Result<DecodedPixelData>
where
    C: CodestreamCodec + ?Sized,
    D: PixelDataObject + ?Sized,
{
    let geometry = ImageGeometry::from_object(src)?;
    let size = geometry.total_size();
    ensure!(
        size <= params.max_decoded_size,
        ResourceLimitExceededSnafu {
            size,
            limit: params.max_decoded_size,
        }
    );

    let locator = FrameLocator::new(FragmentStore::new(src)?, geometry.number_of_frames)?;
    let mut data = vec![0; size as usize];
    let mut cursor = FragmentCursor::default();
    let mut color_model = None;

    for (frame, dst) in data.chunks_exact_mut(geometry.frame_size()).enumerate() {
        let frame = frame as u32;
        let located = locator.locate(frame, cursor)?;
        let frame_color = decode_located(codec, src, &locator, frame, &located, &geometry, dst)?;
        color_model.get_or_insert(frame_color);
        cursor = located.next;
    }

    Ok(DecodedPixelData {
        data,
        color_model: color_model.unwrap_or(ColorModel::Monochrome2),
        planar_configuration: geometry.planar_configuration,
        geometry,
    })
}

/// Decode a single frame into the given buffer.
///
/// Without a basic offset table,
/// frames after the first may only be decoded in order,
/// passing the cursor returned by the previous call.
/// With one, only the entries of this frame and the next are resolved.
pub fn decode_frame<C, D>(
    codec: &C,
    src: &D,
    frame: u32,
    cursor: FragmentCursor,
    dst: &mut [u8],
    params: &CodecParameters,
) -> Result<DecodedFrame>
where
    C: CodestreamCodec + ?Sized,
    D: PixelDataObject + ?Sized,
{
    let geometry = ImageGeometry::from_object(src)?;
    let frame_size = geometry.frame_size();
    ensure!(
        frame_size as u64 <= params.max_decoded_size,
        ResourceLimitExceededSnafu {
            size: frame_size as u64,
            limit: params.max_decoded_size,
        }
    );
    ensure!(
        dst.len() >= frame_size,
        BufferTooSmallSnafu {
            required: frame_size,
            available: dst.len(),
        }
    );

    let locator =
        FrameLocator::for_frame(FragmentStore::new(src)?, geometry.number_of_frames, frame)?;
    let located = locator.locate(frame, cursor)?;
    let color_model = decode_located(
        codec,
        src,
        &locator,
        frame,
        &located,
        &geometry,
        &mut dst[..frame_size],
    )?;

    Ok(DecodedFrame {
        color_model,
        next_cursor: located.next,
        len: frame_size,
    })
}

/// Determine the color model of the decoded pixel data
/// from the main header of the first frame.
pub fn determine_decompressed_color_model<D>(src: &D) -> Result<ColorModel>
where
    D: PixelDataObject + ?Sized,
{
    let frames = src.number_of_frames().unwrap_or(1);
    let locator = FrameLocator::for_frame(FragmentStore::new(src)?, frames, 0)?;
    let located = locator.locate(0, FragmentCursor::default())?;
    let codestream = locator.store().concat(located.range)?;
    let header = CodestreamHeader::parse(&codestream).context(CorruptCodestreamSnafu { frame: 0_u32 })?;
    color::resolve(
        &header,
        src.samples_per_pixel(),
        src.photometric_interpretation(),
    )
}

fn decode_located<C, D>(
    codec: &C,
    src: &D,
    locator: &FrameLocator<'_, D>,
    frame: u32,
    located: &Located,
    geometry: &ImageGeometry,
    dst: &mut [u8],
) -> Result<ColorModel>
where
    C: CodestreamCodec + ?Sized,
    D: PixelDataObject + ?Sized,
{
    let codestream = locator.store().concat(located.range.clone())?;
    let header = CodestreamHeader::parse(&codestream).context(CorruptCodestreamSnafu { frame })?;
    ensure!(
        !header.is_subsampled(),
        UnsupportedSampleLayoutSnafu {
            reason: "subsampled components",
        }
    );
    let color_model = color::resolve(
        &header,
        Some(geometry.samples_per_pixel),
        src.photometric_interpretation(),
    )?;

    debug!(
        "Decoding frame #{} ({} bytes, {} components)",
        frame,
        codestream.len(),
        header.components.len()
    );
    let image = codec
        .decode(&codestream)
        .context(CorruptCodestreamSnafu { frame })?;

    ensure!(
        image.width == u32::from(geometry.columns) && image.height == u32::from(geometry.rows),
        GeometryMismatchSnafu {
            frame,
            width: image.width,
            height: image.height,
            columns: geometry.columns,
            rows: geometry.rows,
        }
    );
    let samples_per_pixel = geometry.samples_per_pixel as usize;
    ensure!(
        image.components.len() >= samples_per_pixel,
        UnsupportedComponentCountSnafu {
            count: image.components.len() as u32,
        }
    );
    if image.components.len() > samples_per_pixel {
        warn!(
            "Frame #{} has {} components, only the first {} are kept",
            frame,
            image.components.len(),
            samples_per_pixel
        );
    }

    write_samples(&image, geometry, dst)?;
    Ok(color_model)
}

/// Write the samples of a decoded image into native pixel data,
/// following the image geometry's sample layout.
fn write_samples(image: &Image, geometry: &ImageGeometry, dst: &mut [u8]) -> Result<()> {
    let pixels = geometry.pixels_per_frame();
    let samples_per_pixel = geometry.samples_per_pixel as usize;
    let bytes_per_sample = geometry.bytes_per_sample();

    for (c, component) in image.components.iter().take(samples_per_pixel).enumerate() {
        ensure!(
            component.precision <= u32::from(geometry.bits_allocated),
            UnsupportedSampleLayoutSnafu {
                reason: format!(
                    "component precision {} exceeds BitsAllocated {}",
                    component.precision, geometry.bits_allocated
                ),
            }
        );
        ensure!(
            component.data.len() >= pixels,
            UnsupportedSampleLayoutSnafu {
                reason: format!(
                    "component #{} has {} samples, expected {}",
                    c,
                    component.data.len(),
                    pixels
                ),
            }
        );

        for (i, &sample) in component.data[..pixels].iter().enumerate() {
            let index = if geometry.planar_configuration == 0 {
                i * samples_per_pixel + c
            } else {
                c * pixels + i
            };
            let offset = index * bytes_per_sample;
            // two's complement for signed samples
            if bytes_per_sample == 1 {
                dst[offset] = sample as u8;
            } else {
                LittleEndian::write_u16(&mut dst[offset..offset + 2], sample as u16);
            }
        }
    }
    Ok(())
}
