//! The JPEG 2000 transfer syntaxes served by this crate.

use std::fmt;

/// A transfer syntax of the JPEG 2000 family.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Jpeg2000Syntax {
    /// JPEG 2000 Image Compression (Lossless Only)
    LosslessOnly,
    /// JPEG 2000 Image Compression
    Lossy,
    /// JPEG 2000 Part 2 Multi-component Image Compression (Lossless Only)
    MultiComponentLosslessOnly,
    /// JPEG 2000 Part 2 Multi-component Image Compression
    MultiComponent,
}

impl Jpeg2000Syntax {
    /// All transfer syntaxes of the family.
    pub const ALL: [Jpeg2000Syntax; 4] = [
        Jpeg2000Syntax::LosslessOnly,
        Jpeg2000Syntax::Lossy,
        Jpeg2000Syntax::MultiComponentLosslessOnly,
        Jpeg2000Syntax::MultiComponent,
    ];

    /// Obtain the transfer syntax by UID.
    ///
    /// A trailing null character, as may be found in DICOM UIDs, is ignored.
    pub fn from_uid(uid: &str) -> Option<Self> {
        let uid = uid.trim_end_matches('\0');
        Self::ALL.iter().copied().find(|ts| ts.uid() == uid)
    }

    /// The transfer syntax UID.
    pub fn uid(self) -> &'static str {
        match self {
            Jpeg2000Syntax::LosslessOnly => "1.2.840.10008.1.2.4.90",
            Jpeg2000Syntax::Lossy => "1.2.840.10008.1.2.4.91",
            Jpeg2000Syntax::MultiComponentLosslessOnly => "1.2.840.10008.1.2.4.92",
            Jpeg2000Syntax::MultiComponent => "1.2.840.10008.1.2.4.93",
        }
    }

    /// The transfer syntax name.
    pub fn name(self) -> &'static str {
        match self {
            Jpeg2000Syntax::LosslessOnly => "JPEG 2000 Image Compression (Lossless Only)",
            Jpeg2000Syntax::Lossy => "JPEG 2000 Image Compression",
            Jpeg2000Syntax::MultiComponentLosslessOnly => {
                "JPEG 2000 Part 2 Multi-component Image Compression (Lossless Only)"
            }
            Jpeg2000Syntax::MultiComponent => "JPEG 2000 Part 2 Multi-component Image Compression",
        }
    }

    /// Whether this transfer syntax only admits lossless compression.
    pub fn is_lossless_only(self) -> bool {
        matches!(
            self,
            Jpeg2000Syntax::LosslessOnly | Jpeg2000Syntax::MultiComponentLosslessOnly
        )
    }

    /// Whether this transfer syntax admits Part 2 multi-component extensions.
    pub fn is_multi_component(self) -> bool {
        matches!(
            self,
            Jpeg2000Syntax::MultiComponentLosslessOnly | Jpeg2000Syntax::MultiComponent
        )
    }
}

impl fmt::Display for Jpeg2000Syntax {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Check whether pixel data in the transfer syntax `from`
/// can be converted by this crate to the transfer syntax `to`.
///
/// Only pairs of JPEG 2000 transfer syntaxes are supported.
pub fn can_change_coding(from: &str, to: &str) -> bool {
    Jpeg2000Syntax::from_uid(from).is_some() && Jpeg2000Syntax::from_uid(to).is_some()
}
