//! Codec parameters and representation parameters.

/// The progression order of the packets in an encoded codestream.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum ProgressionOrder {
    /// Layer-resolution-component-position
    #[default]
    Lrcp,
    /// Resolution-layer-component-position
    Rlcp,
    /// Resolution-position-component-layer
    Rpcl,
    /// Position-component-resolution-layer
    Pcrl,
    /// Component-position-resolution-layer
    Cprl,
}

impl ProgressionOrder {
    /// Obtain the progression order from the `SGcod` byte of a COD segment.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ProgressionOrder::Lrcp),
            1 => Some(ProgressionOrder::Rlcp),
            2 => Some(ProgressionOrder::Rpcl),
            3 => Some(ProgressionOrder::Pcrl),
            4 => Some(ProgressionOrder::Cprl),
            _ => None,
        }
    }
}

/// A description of the intended compressed representation.
#[derive(Debug, Copy, Clone, PartialEq)]
#[non_exhaustive]
pub enum RepresentationParameter {
    /// Mathematically lossless compression.
    Lossless,
    /// Lossy compression targeting an effective compression ratio,
    /// such that `2.5` means a 2.5:1 compression.
    Lossy { ratio: f32 },
}

impl RepresentationParameter {
    /// Create a lossy representation parameter
    /// targeting the given compression ratio.
    pub fn lossy(ratio: f32) -> Self {
        RepresentationParameter::Lossy { ratio }
    }

    /// Whether this representation is lossless.
    pub fn is_lossless(&self) -> bool {
        matches!(self, RepresentationParameter::Lossless)
    }
}

/// Call-scoped parameters of the JPEG 2000 codec.
///
/// These are read-only for the duration of a single operation.
/// Construct with [`CodecParameters::new`] or [`Default`],
/// then adjust with the chainable setters.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct CodecParameters {
    /// The maximum size in bytes of each encoded fragment.
    /// A codestream larger than this is split into multiple fragments.
    /// If unset, each frame is kept in a single fragment.
    pub max_fragment_size: Option<u32>,

    /// The number of resolution levels when encoding,
    /// reduced automatically for small images.
    pub num_resolutions: u8,

    /// The code-block width and height exponents when encoding
    /// (6 means 64 samples).
    pub code_block_size: (u8, u8),

    /// The progression order when encoding.
    pub progression_order: ProgressionOrder,

    /// Whether to apply the multi-component transform
    /// when encoding RGB images.
    pub use_mct: bool,

    /// The compression ratio to use
    /// when no representation parameter is given
    /// for a transfer syntax admitting lossy compression.
    pub default_lossy_ratio: f32,

    /// The maximum number of bytes that a decode operation may produce.
    pub max_decoded_size: u64,

    /// Whether to relay the codec's informational messages to the log.
    pub verbose: bool,
}

impl Default for CodecParameters {
    fn default() -> Self {
        CodecParameters {
            max_fragment_size: None,
            num_resolutions: 6,
            code_block_size: (6, 6),
            progression_order: ProgressionOrder::Lrcp,
            use_mct: true,
            default_lossy_ratio: 10.,
            max_decoded_size: 1 << 32,
            verbose: false,
        }
    }
}

impl CodecParameters {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the maximum fragment size (0 for no limit).
    pub fn max_fragment_size(mut self, size: u32) -> Self {
        self.max_fragment_size = if size == 0 { None } else { Some(size) };
        self
    }

    pub fn num_resolutions(mut self, num_resolutions: u8) -> Self {
        self.num_resolutions = num_resolutions.max(1);
        self
    }

    pub fn progression_order(mut self, order: ProgressionOrder) -> Self {
        self.progression_order = order;
        self
    }

    pub fn use_mct(mut self, use_mct: bool) -> Self {
        self.use_mct = use_mct;
        self
    }

    pub fn default_lossy_ratio(mut self, ratio: f32) -> Self {
        self.default_lossy_ratio = ratio;
        self
    }

    pub fn max_decoded_size(mut self, limit: u64) -> Self {
        self.max_decoded_size = limit;
        self
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}
