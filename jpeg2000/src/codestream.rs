//! Reading of JPEG 2000 codestream main headers.
//!
//! Only the parts of the main header
//! needed to locate frames, resolve the color model
//! and compare coding parameters are interpreted here.
//! No tile data is ever decoded.

use byteorder::{BigEndian, ByteOrder};
use snafu::{ensure_whatever, whatever, OptionExt};
use tracing::trace;

use crate::codec::CodecError;

/// Start of codestream
pub const SOC: u16 = 0xFF4F;
/// Image and tile size
pub const SIZ: u16 = 0xFF51;
/// Coding style default
pub const COD: u16 = 0xFF52;
/// Quantization default
pub const QCD: u16 = 0xFF5C;
/// Start of tile-part
pub const SOT: u16 = 0xFF90;
/// End of codestream
pub const EOC: u16 = 0xFFD9;

/// The signature box which starts every JP2 file.
const JP2_SIGNATURE: [u8; 12] = [
    0x00, 0x00, 0x00, 0x0C, b'j', b'P', b' ', b' ', 0x0D, 0x0A, 0x87, 0x0A,
];

const BOX_JP2_HEADER: [u8; 4] = *b"jp2h";
const BOX_COLOUR_SPECIFICATION: [u8; 4] = *b"colr";
const BOX_CONTIGUOUS_CODESTREAM: [u8; 4] = *b"jp2c";

/// Enumerated colourspace of a JP2 `colr` box: sRGB
pub const JP2_COLOURSPACE_SRGB: u32 = 16;
/// Enumerated colourspace of a JP2 `colr` box: greyscale
pub const JP2_COLOURSPACE_GREYSCALE: u32 = 17;
/// Enumerated colourspace of a JP2 `colr` box: sYCC
pub const JP2_COLOURSPACE_SYCC: u32 = 18;

/// Check whether the given bytes begin a JPEG 2000 codestream,
/// either raw (SOC followed by SIZ) or in a JP2 file format wrapper.
pub fn starts_codestream(data: &[u8]) -> bool {
    if data.len() >= 4 {
        let first = BigEndian::read_u16(&data[0..2]);
        let second = BigEndian::read_u16(&data[2..4]);
        if first == SOC && second == SIZ {
            return true;
        }
    }
    data.starts_with(&JP2_SIGNATURE)
}

/// The wavelet transform used by a codestream.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum WaveletTransform {
    /// 9-7 irreversible filter
    Irreversible97,
    /// 5-3 reversible filter
    Reversible53,
}

/// Per-component information from the SIZ segment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ComponentInfo {
    /// Bit depth of the component's samples
    pub precision: u8,
    pub signed: bool,
    /// Horizontal subsampling factor
    pub dx: u8,
    /// Vertical subsampling factor
    pub dy: u8,
}

/// The default coding style from the COD segment.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CodingStyle {
    pub progression_order: u8,
    pub layers: u16,
    /// Whether the multi-component transform is applied
    /// to the first three components
    pub multi_component_transform: bool,
    pub decomposition_levels: u8,
    pub transform: WaveletTransform,
}

/// The main header of a JPEG 2000 codestream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodestreamHeader {
    /// The capabilities (`Rsiz`) of the codestream
    pub capabilities: u16,
    /// Width of the image area
    pub width: u32,
    /// Height of the image area
    pub height: u32,
    pub components: Vec<ComponentInfo>,
    pub coding_style: CodingStyle,
    /// The quantization style (`Sqcd`, without the guard bits)
    pub quantization_style: u8,
    /// The enumerated colourspace of the JP2 wrapper, if any
    pub jp2_colourspace: Option<u32>,
    cod_segment: Vec<u8>,
    qcd_segment: Vec<u8>,
}

impl CodestreamHeader {
    /// Read the main header of a codestream,
    /// unwrapping it from a JP2 file format wrapper if necessary.
    pub fn parse(data: &[u8]) -> Result<Self, CodecError> {
        if data.starts_with(&JP2_SIGNATURE) {
            let (codestream, colourspace) = unwrap_jp2(data)?;
            let mut header = Self::parse_codestream(codestream)?;
            header.jp2_colourspace = colourspace;
            return Ok(header);
        }
        Self::parse_codestream(data)
    }

    fn parse_codestream(data: &[u8]) -> Result<Self, CodecError> {
        let mut reader = SegmentReader::new(data);
        let soc = reader.u16()?;
        ensure_whatever!(soc == SOC, "Missing SOC marker, found {:04X}", soc);

        let mut siz = None;
        let mut cod = None;
        let mut qcd = None;

        loop {
            let marker = reader.u16()?;
            ensure_whatever!(
                marker >> 8 == 0xFF,
                "Invalid marker {:04X} in main header",
                marker
            );
            if marker == SOT || marker == EOC {
                break;
            }
            let length = reader.u16()? as usize;
            ensure_whatever!(
                length >= 2,
                "Invalid length {} of marker segment {:04X}",
                length,
                marker
            );
            let segment = reader.bytes(length - 2)?;
            trace!("marker segment {:04X} ({} bytes)", marker, length);

            match marker {
                SIZ => siz = Some(parse_siz(segment)?),
                COD => {
                    if cod.is_none() {
                        cod = Some((parse_cod(segment)?, segment.to_vec()));
                    }
                }
                QCD => {
                    if qcd.is_none() {
                        qcd = Some(segment.to_vec());
                    }
                }
                _ => {
                    // not needed here
                }
            }

            if siz.is_none() {
                whatever!("SIZ marker segment must follow SOC");
            }
        }

        let (capabilities, width, height, components) =
            siz.whatever_context("Missing SIZ marker segment")?;
        let (coding_style, cod_segment) = cod.whatever_context("Missing COD marker segment")?;
        let qcd_segment = qcd.whatever_context("Missing QCD marker segment")?;
        let quantization_style = qcd_segment
            .first()
            .copied()
            .whatever_context("Empty QCD marker segment")?
            & 0x1F;

        Ok(CodestreamHeader {
            capabilities,
            width,
            height,
            components,
            coding_style,
            quantization_style,
            jp2_colourspace: None,
            cod_segment,
            qcd_segment,
        })
    }

    /// Whether the codestream is mathematically lossless:
    /// reversible wavelet and no quantization.
    pub fn is_reversible(&self) -> bool {
        self.coding_style.transform == WaveletTransform::Reversible53
            && self.quantization_style == 0
    }

    /// Whether the codestream relies on JPEG 2000 Part 2 extensions.
    pub fn uses_part2(&self) -> bool {
        self.capabilities & 0x8000 != 0
    }

    /// Whether any component is subsampled.
    pub fn is_subsampled(&self) -> bool {
        self.components.iter().any(|c| c.dx != 1 || c.dy != 1)
    }

    /// The raw contents of the COD and QCD marker segments.
    pub fn coding_parameters(&self) -> (&[u8], &[u8]) {
        (&self.cod_segment, &self.qcd_segment)
    }
}

type Siz = (u16, u32, u32, Vec<ComponentInfo>);

fn parse_siz(segment: &[u8]) -> Result<Siz, CodecError> {
    let mut reader = SegmentReader::new(segment);
    let capabilities = reader.u16()?;
    let x1 = reader.u32()?;
    let y1 = reader.u32()?;
    let x0 = reader.u32()?;
    let y0 = reader.u32()?;
    // tile size and offset
    reader.bytes(16)?;
    let count = reader.u16()?;
    ensure_whatever!(
        x1 > x0 && y1 > y0,
        "Invalid image area ({}, {}) to ({}, {})",
        x0,
        y0,
        x1,
        y1
    );
    ensure_whatever!(count > 0, "SIZ declares no components");

    let components = (0..count)
        .map(|_| {
            let ssiz = reader.u8()?;
            let dx = reader.u8()?;
            let dy = reader.u8()?;
            ensure_whatever!(dx > 0 && dy > 0, "Invalid component subsampling");
            Ok(ComponentInfo {
                precision: (ssiz & 0x7F) + 1,
                signed: ssiz & 0x80 != 0,
                dx,
                dy,
            })
        })
        .collect::<Result<Vec<_>, CodecError>>()?;

    Ok((capabilities, x1 - x0, y1 - y0, components))
}

fn parse_cod(segment: &[u8]) -> Result<CodingStyle, CodecError> {
    let mut reader = SegmentReader::new(segment);
    let _scod = reader.u8()?;
    let progression_order = reader.u8()?;
    let layers = reader.u16()?;
    let mct = reader.u8()?;
    let decomposition_levels = reader.u8()?;
    // code-block width, height and style
    reader.bytes(3)?;
    let transform = match reader.u8()? {
        0 => WaveletTransform::Irreversible97,
        1 => WaveletTransform::Reversible53,
        t => whatever!("Unsupported wavelet transform {}", t),
    };
    ensure_whatever!(layers > 0, "COD declares no quality layers");

    Ok(CodingStyle {
        progression_order,
        layers,
        multi_component_transform: mct != 0,
        decomposition_levels,
        transform,
    })
}

/// Find the contiguous codestream box in a JP2 file,
/// as well as the enumerated colourspace of the header box.
fn unwrap_jp2(data: &[u8]) -> Result<(&[u8], Option<u32>), CodecError> {
    let mut colourspace = None;
    let mut reader = SegmentReader::new(data);
    while !reader.is_empty() {
        let (box_type, contents) = read_box(&mut reader)?;
        if box_type == BOX_JP2_HEADER {
            let mut inner = SegmentReader::new(contents);
            while !inner.is_empty() {
                let (box_type, contents) = read_box(&mut inner)?;
                // method 1: enumerated colourspace
                if box_type == BOX_COLOUR_SPECIFICATION
                    && contents.len() >= 7
                    && contents[0] == 1
                {
                    colourspace = Some(BigEndian::read_u32(&contents[3..7]));
                }
            }
        } else if box_type == BOX_CONTIGUOUS_CODESTREAM {
            return Ok((contents, colourspace));
        }
    }
    whatever!("JP2 file has no contiguous codestream box")
}

fn read_box<'a>(reader: &mut SegmentReader<'a>) -> Result<([u8; 4], &'a [u8]), CodecError> {
    let length = reader.u32()? as u64;
    let mut box_type = [0; 4];
    box_type.copy_from_slice(reader.bytes(4)?);
    let contents_len = match length {
        // box extends to the end of the file
        0 => reader.remaining() as u64,
        1 => {
            let xl = reader.u64()?;
            ensure_whatever!(xl >= 16, "Invalid extended box length {}", xl);
            xl - 16
        }
        l => {
            ensure_whatever!(l >= 8, "Invalid box length {}", l);
            l - 8
        }
    };
    let contents = reader.bytes(contents_len as usize)?;
    Ok((box_type, contents))
}

/// Big endian reader over a byte slice.
struct SegmentReader<'a> {
    data: &'a [u8],
}

impl<'a> SegmentReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        SegmentReader { data }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn remaining(&self) -> usize {
        self.data.len()
    }

    fn bytes(&mut self, len: usize) -> Result<&'a [u8], CodecError> {
        ensure_whatever!(
            self.data.len() >= len,
            "Unexpected end of codestream ({} bytes missing)",
            len - self.data.len()
        );
        let (head, tail) = self.data.split_at(len);
        self.data = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.bytes(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, CodecError> {
        Ok(BigEndian::read_u16(self.bytes(2)?))
    }

    fn u32(&mut self) -> Result<u32, CodecError> {
        Ok(BigEndian::read_u32(self.bytes(4)?))
    }

    fn u64(&mut self) -> Result<u64, CodecError> {
        Ok(BigEndian::read_u64(self.bytes(8)?))
    }
}
