//! Read-only view over the fragments of an encapsulated pixel data element.

use std::borrow::Cow;
use std::ops::RangeInclusive;

use snafu::{ensure, OptionExt};

use crate::codestream::starts_codestream;
use crate::error::{NotEncapsulatedSnafu, Result};
use crate::object::PixelDataObject;

/// The number of bytes of an item header in a pixel data sequence.
pub const ITEM_HEADER_LENGTH: u64 = 8;

/// A view over the fragments of an encapsulated pixel data element,
/// borrowed from the host object.
#[derive(Debug)]
pub struct FragmentStore<'a, D: ?Sized> {
    obj: &'a D,
    len: usize,
}

impl<'a, D> FragmentStore<'a, D>
where
    D: PixelDataObject + ?Sized,
{
    /// Create a view over the fragments of the given object.
    ///
    /// Fails with [`NotEncapsulated`](crate::error::Error::NotEncapsulated)
    /// if the object has no pixel data fragments.
    pub fn new(obj: &'a D) -> Result<Self> {
        let len = obj.number_of_fragments().unwrap_or(0) as usize;
        ensure!(len > 0, NotEncapsulatedSnafu);
        Ok(FragmentStore { obj, len })
    }

    /// The number of fragments, excluding the basic offset table.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Retrieve the fragment at the given index.
    pub fn fragment(&self, index: usize) -> Result<Cow<'a, [u8]>> {
        self.obj.fragment(index).context(NotEncapsulatedSnafu)
    }

    /// The basic offset table, if present and not empty.
    pub fn offset_table(&self) -> Option<Cow<'a, [u32]>> {
        self.obj.offset_table().filter(|table| !table.is_empty())
    }

    /// Whether the fragment at the given index
    /// begins a JPEG 2000 codestream.
    pub fn starts_codestream(&self, index: usize) -> bool {
        self.obj
            .fragment(index)
            .map(|fragment| starts_codestream(&fragment))
            .unwrap_or(false)
    }

    /// The byte offset of each fragment item
    /// relative to the first item after the basic offset table.
    pub fn item_offsets(&self) -> Result<Vec<u64>> {
        let mut offsets = Vec::with_capacity(self.len);
        let mut offset = 0;
        for index in 0..self.len {
            offsets.push(offset);
            offset += self.item_length(index)?;
        }
        Ok(offsets)
    }

    /// The length of the item holding the fragment at the given index,
    /// including its header and padding.
    pub fn item_length(&self, index: usize) -> Result<u64> {
        let len = self.fragment(index)?.len() as u64;
        Ok(ITEM_HEADER_LENGTH + len + (len & 1))
    }

    /// Concatenate a range of fragments into one contiguous buffer.
    ///
    /// A range of a single fragment is borrowed without copying.
    pub fn concat(&self, range: RangeInclusive<usize>) -> Result<Cow<'a, [u8]>> {
        if range.start() == range.end() {
            return self.fragment(*range.start());
        }
        let mut data = Vec::new();
        for index in range {
            data.extend_from_slice(&self.fragment(index)?);
        }
        Ok(Cow::Owned(data))
    }
}
