//! Mapping of frames to runs of fragments.
//!
//! With a basic offset table, any frame can be located directly.
//! Without one, the fragments of a frame can only be known
//! in a few unambiguous layouts,
//! or by walking the frames in order
//! with a [`FragmentCursor`] returned by the previous lookup.

use std::borrow::Cow;
use std::ops::RangeInclusive;

use snafu::{ensure, OptionExt};
use tracing::{debug, warn};

use crate::error::{
    FrameLocationAmbiguousSnafu, FrameRangeOutOfBoundsSnafu, InvalidOffsetTableSnafu, Result,
};
use crate::fragments::FragmentStore;
use crate::object::PixelDataObject;

/// The best known position of the first fragment of a frame.
///
/// The default cursor points at the first fragment of the first frame.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct FragmentCursor {
    /// The frame index
    pub frame: u32,
    /// The index of the frame's first fragment
    pub start_fragment: usize,
}

impl FragmentCursor {
    pub fn new(frame: u32, start_fragment: usize) -> Self {
        FragmentCursor {
            frame,
            start_fragment,
        }
    }
}

/// The outcome of locating a frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    /// The inclusive range of fragment indices of the frame
    pub range: RangeInclusive<usize>,
    /// The cursor pointing at the frame after this one
    pub next: FragmentCursor,
}

/// Locates the fragments of each frame
/// in an encapsulated pixel data element.
#[derive(Debug)]
pub struct FrameLocator<'a, D: ?Sized> {
    store: FragmentStore<'a, D>,
    number_of_frames: u32,
    frame_starts: FrameStarts,
}

/// First fragments known from the basic offset table.
#[derive(Debug)]
enum FrameStarts {
    /// no usable offset table
    Unknown,
    /// the first fragment of every frame
    All(Vec<usize>),
    /// the first fragment of one frame and of the frame after it
    One {
        frame: u32,
        start: usize,
        next: Option<usize>,
    },
}

impl<'a, D> FrameLocator<'a, D>
where
    D: PixelDataObject + ?Sized,
{
    /// Prepare a locator over the given fragments.
    ///
    /// The basic offset table, if any, is resolved here for all frames.
    pub fn new(store: FragmentStore<'a, D>, number_of_frames: u32) -> Result<Self> {
        let number_of_frames = number_of_frames.max(1);
        let frame_starts = match usable_offset_table(&store, number_of_frames) {
            Some(table) => FrameStarts::All(resolve_offset_table(&store, &table)?),
            None => FrameStarts::Unknown,
        };

        Ok(FrameLocator {
            store,
            number_of_frames,
            frame_starts,
        })
    }

    /// Prepare a locator for a single frame.
    ///
    /// Only the offset table entries of `frame` and the frame after it
    /// are resolved, reading fragment lengths up to the end of that frame.
    /// Other frames are located as if there was no offset table.
    pub fn for_frame(store: FragmentStore<'a, D>, number_of_frames: u32, frame: u32) -> Result<Self> {
        let number_of_frames = number_of_frames.max(1);
        let frame_starts = match usable_offset_table(&store, number_of_frames) {
            Some(table) if frame < number_of_frames => {
                resolve_offset_entries(&store, &table, frame)?
            }
            _ => FrameStarts::Unknown,
        };

        Ok(FrameLocator {
            store,
            number_of_frames,
            frame_starts,
        })
    }

    /// The underlying fragment store.
    pub fn store(&self) -> &FragmentStore<'a, D> {
        &self.store
    }

    pub fn number_of_frames(&self) -> u32 {
        self.number_of_frames
    }

    /// Determine the fragments of the given frame.
    ///
    /// The cursor is only consulted when no other information
    /// on the frame's start is available.
    pub fn locate(&self, frame: u32, cursor: FragmentCursor) -> Result<Located> {
        ensure!(
            frame < self.number_of_frames,
            FrameRangeOutOfBoundsSnafu {
                frame,
                frames: self.number_of_frames,
            }
        );
        let last_fragment = self.store.len() - 1;

        let range = if let Some(range) = self.table_range(frame) {
            range
        } else if self.number_of_frames == 1 {
            0..=last_fragment
        } else if self.store.len() == self.number_of_frames as usize {
            frame as usize..=frame as usize
        } else {
            let start = self.start_from_cursor(frame, cursor)?;
            let end = self.find_end(frame, start, cursor)?;
            start..=end
        };

        debug!(
            "Frame #{} spans fragments {} to {}",
            frame,
            range.start(),
            range.end()
        );
        let next = FragmentCursor::new(frame + 1, range.end() + 1);
        Ok(Located { range, next })
    }

    fn table_range(&self, frame: u32) -> Option<RangeInclusive<usize>> {
        let last_fragment = self.store.len() - 1;
        match &self.frame_starts {
            FrameStarts::All(starts) => {
                let start = starts[frame as usize];
                let end = starts
                    .get(frame as usize + 1)
                    .map(|next| next - 1)
                    .unwrap_or(last_fragment);
                Some(start..=end)
            }
            FrameStarts::One {
                frame: known,
                start,
                next,
            } if *known == frame => {
                let end = next.map(|next| next - 1).unwrap_or(last_fragment);
                Some(*start..=end)
            }
            _ => None,
        }
    }

    fn start_from_cursor(&self, frame: u32, cursor: FragmentCursor) -> Result<usize> {
        if frame == 0 {
            return Ok(0);
        }
        let ambiguous = FrameLocationAmbiguousSnafu {
            frame,
            cursor_frame: cursor.frame,
            cursor_fragment: cursor.start_fragment,
        };
        ensure!(
            cursor.frame == frame
                && cursor.start_fragment < self.store.len()
                && self.store.starts_codestream(cursor.start_fragment),
            ambiguous
        );
        Ok(cursor.start_fragment)
    }

    fn find_end(&self, frame: u32, start: usize, cursor: FragmentCursor) -> Result<usize> {
        let last_fragment = self.store.len() - 1;
        if frame + 1 == self.number_of_frames {
            return Ok(last_fragment);
        }
        let next_start = (start + 1..self.store.len())
            .find(|&index| self.store.starts_codestream(index))
            .context(FrameLocationAmbiguousSnafu {
                frame,
                cursor_frame: cursor.frame,
                cursor_fragment: cursor.start_fragment,
            })?;
        Ok(next_start - 1)
    }
}

/// The basic offset table, if it has one entry per frame.
fn usable_offset_table<'a, D>(
    store: &FragmentStore<'a, D>,
    number_of_frames: u32,
) -> Option<Cow<'a, [u32]>>
where
    D: PixelDataObject + ?Sized,
{
    let table = store.offset_table()?;
    if table.len() != number_of_frames as usize {
        warn!(
            "Ignoring basic offset table with {} entries for {} frames",
            table.len(),
            number_of_frames
        );
        return None;
    }
    Some(table)
}

/// Resolve the offset table entries of `frame` and the frame after it,
/// reading item lengths no further than needed.
fn resolve_offset_entries<D>(
    store: &FragmentStore<'_, D>,
    table: &[u32],
    frame: u32,
) -> Result<FrameStarts>
where
    D: PixelDataObject + ?Sized,
{
    let index = frame as usize;
    let start_offset = u64::from(table[index]);
    let next_offset = table.get(index + 1).map(|&offset| u64::from(offset));
    let target = next_offset.map_or(start_offset, |next| next.max(start_offset));

    let mut start = None;
    let mut next = None;
    let mut offset = 0;
    for fragment in 0..store.len() {
        if offset == start_offset {
            start = Some(fragment);
        }
        if Some(offset) == next_offset {
            next = Some(fragment);
        }
        if offset >= target {
            break;
        }
        offset += store.item_length(fragment)?;
    }

    let start = start.context(InvalidOffsetTableSnafu {
        index,
        offset: table[index],
    })?;
    let next = match next_offset {
        Some(_) => Some(next.filter(|&next| next > start).context(
            InvalidOffsetTableSnafu {
                index: index + 1,
                offset: table[index + 1],
            },
        )?),
        None => None,
    };
    Ok(FrameStarts::One { frame, start, next })
}

/// Turn the byte offsets of a basic offset table
/// into the index of each frame's first fragment.
fn resolve_offset_table<D>(store: &FragmentStore<'_, D>, table: &[u32]) -> Result<Vec<usize>>
where
    D: PixelDataObject + ?Sized,
{
    let item_offsets = store.item_offsets()?;
    let mut starts: Vec<usize> = Vec::with_capacity(table.len());
    for (index, &offset) in table.iter().enumerate() {
        let fragment = item_offsets
            .binary_search(&u64::from(offset))
            .ok()
            .context(InvalidOffsetTableSnafu { index, offset })?;
        // frames must start at strictly increasing fragments
        if let Some(&previous) = starts.last() {
            ensure!(
                fragment > previous,
                InvalidOffsetTableSnafu { index, offset }
            );
        }
        starts.push(fragment);
    }
    Ok(starts)
}
