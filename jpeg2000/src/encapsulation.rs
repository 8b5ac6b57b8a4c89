//! Encapsulation of encoded frames into a pixel data fragment sequence.

use std::convert::TryFrom;

use dicom_core::value::PixelFragmentSequence;
use tracing::warn;

use crate::fragments::ITEM_HEADER_LENGTH;

/// Split the codestream of one frame into fragments
/// of at most `max_fragment_size` bytes each.
///
/// The codestream is first padded to an even length.
/// The fragment size is rounded up to an even number.
/// Without a size limit the frame is kept in a single fragment.
pub fn split_codestream(mut codestream: Vec<u8>, max_fragment_size: Option<u32>) -> Vec<Vec<u8>> {
    if codestream.len() % 2 != 0 {
        codestream.push(0);
    }
    match max_fragment_size {
        Some(size) if size > 0 && (size as usize) < codestream.len() => {
            let size = (size as usize + 1) & !1;
            codestream.chunks(size).map(|chunk| chunk.to_vec()).collect()
        }
        _ => vec![codestream],
    }
}

/// Assemble the fragments of each frame into a pixel data fragment sequence.
///
/// Returns the sequence, with a basic offset table pointing at
/// each frame's first fragment item,
/// and the index of each frame's first fragment.
/// The offset table is left empty
/// if the offsets cannot be represented in 32 bits.
pub fn encapsulate_frames(
    frames: Vec<Vec<Vec<u8>>>,
) -> (PixelFragmentSequence<Vec<u8>>, Vec<usize>) {
    let mut offset_table: Vec<u32> = Vec::with_capacity(frames.len());
    let mut frame_starts = Vec::with_capacity(frames.len());
    let mut fragments = Vec::new();
    let mut offset = 0_u64;
    let mut table_overflow = false;

    for frame in frames {
        frame_starts.push(fragments.len());
        match u32::try_from(offset) {
            Ok(offset) => offset_table.push(offset),
            Err(_) => table_overflow = true,
        }
        for mut fragment in frame {
            if fragment.len() % 2 != 0 {
                fragment.push(0);
            }
            offset += ITEM_HEADER_LENGTH + fragment.len() as u64;
            fragments.push(fragment);
        }
    }

    if table_overflow {
        warn!("Encapsulated pixel data exceeds 4 GiB, basic offset table left empty");
        offset_table.clear();
    }

    (PixelFragmentSequence::new(offset_table, fragments), frame_starts)
}
