//! Conversion between JPEG 2000 transfer syntaxes.
//!
//! Codestreams are carried over without decoding whenever they
//! are verified to satisfy the target transfer syntax and representation.
//! Otherwise the pixel data is decoded and encoded again.
//!
//! A lossless target only accepts codestreams
//! which are reversible and were never subject to lossy compression,
//! as told by the source transfer syntax or representation.

use snafu::{ensure, OptionExt, ResultExt};
use tracing::debug;

use crate::codec::CodestreamCodec;
use crate::codestream::CodestreamHeader;
use crate::decode::decode;
use crate::encapsulation::{encapsulate_frames, split_codestream};
use crate::encode::{encode_native, EncodedPixelData};
use crate::entries::Jpeg2000Syntax;
use crate::error::{
    CorruptCodestreamSnafu, RatioComputationDegenerateSnafu, Result,
    UnsupportedTransferSyntaxPairSnafu,
};
use crate::fragments::FragmentStore;
use crate::locator::{FragmentCursor, FrameLocator};
use crate::object::{ImageGeometry, PixelDataObject, PixelDataObjectMut};
use crate::params::{CodecParameters, RepresentationParameter};

/// Transcode the pixel data of `obj`
/// from one JPEG 2000 transfer syntax to another.
///
/// `obj` receives the attribute changes of the new representation
/// when the pixel data is encoded again.
///
/// When the codestreams are copied,
/// the source fragments are kept as they are
/// unless `params` sets a maximum fragment size,
/// in which case each frame is split again to that size.
#[allow(clippy::too_many_arguments)]
pub fn transcode<C, D>(
    codec: &C,
    from: &str,
    from_rep: Option<RepresentationParameter>,
    to: &str,
    to_rep: Option<RepresentationParameter>,
    params: &CodecParameters,
    obj: &mut D,
) -> Result<EncodedPixelData>
where
    C: CodestreamCodec + ?Sized,
    D: PixelDataObjectMut + ?Sized,
{
    let unsupported = || UnsupportedTransferSyntaxPairSnafu { from, to };
    let from_syntax = Jpeg2000Syntax::from_uid(from).with_context(unsupported)?;
    let to_syntax = Jpeg2000Syntax::from_uid(to).with_context(unsupported)?;

    if let Some(encoded) = passthrough(&*obj, from_syntax, from_rep, to_syntax, to_rep, params)? {
        debug!(
            "Copying fragments from {} to {} without re-encoding",
            from_syntax, to_syntax
        );
        return Ok(encoded);
    }

    debug!("Re-encoding pixel data from {} to {}", from_syntax, to_syntax);
    let decoded = decode(codec, &*obj, params)?;
    encode_native(
        codec,
        to_syntax,
        &decoded.data,
        &decoded.geometry,
        Some(decoded.color_model.as_str()),
        to_rep,
        params,
        obj,
    )
}

/// Copy the fragments of every frame
/// if their coding is compatible with the target,
/// or return `None` otherwise.
fn passthrough<D>(
    src: &D,
    from_syntax: Jpeg2000Syntax,
    from_rep: Option<RepresentationParameter>,
    to_syntax: Jpeg2000Syntax,
    to_rep: Option<RepresentationParameter>,
    params: &CodecParameters,
) -> Result<Option<EncodedPixelData>>
where
    D: PixelDataObject + ?Sized,
{
    let geometry = ImageGeometry::from_object(src)?;
    let locator = FrameLocator::new(FragmentStore::new(src)?, geometry.number_of_frames)?;

    let mut cursor = FragmentCursor::default();
    let mut first_header: Option<CodestreamHeader> = None;
    let mut reversible = true;
    let mut part2 = false;
    let mut frames = Vec::with_capacity(geometry.number_of_frames as usize);

    for frame in 0..geometry.number_of_frames {
        let located = locator.locate(frame, cursor)?;
        let codestream = locator.store().concat(located.range.clone())?;
        let header =
            CodestreamHeader::parse(&codestream).context(CorruptCodestreamSnafu { frame })?;

        if let Some(first) = &first_header {
            if first.coding_parameters() != header.coding_parameters() {
                debug!("Frame #{} differs in coding parameters", frame);
                return Ok(None);
            }
        }
        reversible &= header.is_reversible();
        part2 |= header.uses_part2();
        first_header.get_or_insert(header);

        let fragments = match params.max_fragment_size {
            Some(size) => split_codestream(codestream.into_owned(), Some(size)),
            None => located
                .range
                .clone()
                .map(|index| locator.store().fragment(index).map(|f| f.into_owned()))
                .collect::<Result<Vec<_>>>()?,
        };
        frames.push(fragments);
        cursor = located.next;
    }

    // a reversible codestream may still hold samples of an earlier lossy compression
    let source_lossless = from_syntax.is_lossless_only()
        || from_rep == Some(RepresentationParameter::Lossless);
    let lossless = reversible && source_lossless;
    let lossless_target =
        to_syntax.is_lossless_only() || to_rep == Some(RepresentationParameter::Lossless);
    if lossless_target && !lossless {
        debug!("Source is not known to be lossless");
        return Ok(None);
    }
    if !to_syntax.is_multi_component() && part2 {
        return Ok(None);
    }
    let representation_ok = match to_rep {
        None | Some(RepresentationParameter::Lossless) => true,
        Some(rep) => from_rep == Some(rep),
    };
    if !representation_ok {
        return Ok(None);
    }

    let (pixel_sequence, frame_starts) = encapsulate_frames(frames);
    let uncompressed = geometry.total_size();
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

    Ok(Some(EncodedPixelData {
        pixel_sequence,
        frame_starts,
        compression_ratio: uncompressed as f64 / compressed as f64,
        lossy: !lossless,
    }))
}
