//! JPEG 2000 codestream codec backed by OpenJPEG.
//!
//! Decoding goes through the [`jpeg2k`] bindings.
//! Encoding drives the OpenJPEG compressor directly,
//! writing the codestream into memory.

use std::ffi::{c_char, c_void, CStr};
use std::ptr::NonNull;

use openjpeg_sys as opj;
use snafu::{ensure_whatever, whatever, OptionExt, ResultExt};
use tracing::{debug, error, warn};

use super::{CodecError, CodestreamCodec, CodingMode, Component, EncodeSettings, Image};
use crate::params::ProgressionOrder;

/// Initial capacity of the in-memory output stream.
const STREAM_CHUNK_SIZE: usize = 0x10_0000;

/// Codestream codec backed by OpenJPEG.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub struct OpenJpegCodec;

impl CodestreamCodec for OpenJpegCodec {
    fn decode(&self, codestream: &[u8]) -> Result<Image, CodecError> {
        let image =
            jpeg2k::Image::from_bytes(codestream).whatever_context("OpenJPEG decoder failure")?;

        let components = image
            .components()
            .iter()
            .map(|component| Component {
                precision: component.precision(),
                signed: component.is_signed(),
                data: component.data().to_vec(),
            })
            .collect();

        Ok(Image {
            width: image.width(),
            height: image.height(),
            components,
        })
    }

    fn encode(&self, image: &Image, settings: &EncodeSettings) -> Result<Vec<u8>, CodecError> {
        let pixels = image.width as usize * image.height as usize;
        ensure_whatever!(pixels > 0, "Cannot encode an empty image");
        ensure_whatever!(!image.components.is_empty(), "Cannot encode an image without components");
        for (i, component) in image.components.iter().enumerate() {
            ensure_whatever!(
                component.data.len() == pixels,
                "Component #{} has {} samples, expected {}",
                i,
                component.data.len(),
                pixels
            );
        }

        let mut parameters = encoder_parameters(image, settings);
        let raw_image = create_image(image)?;
        let codec = Compressor::new(settings.verbose)?;

        // SAFETY: all pointers are valid and owned by their guards
        unsafe {
            ensure_whatever!(
                opj::opj_setup_encoder(codec.0.as_ptr(), &mut parameters, raw_image.0.as_ptr()) == 1,
                "Could not set up the OpenJPEG encoder"
            );
        }

        let mut output = Box::new(OutputBuffer {
            data: Vec::with_capacity(STREAM_CHUNK_SIZE),
            position: 0,
        });
        let stream = OutputStream::new(&mut output)?;

        // SAFETY: the output buffer outlives the stream
        unsafe {
            ensure_whatever!(
                opj::opj_start_compress(codec.0.as_ptr(), raw_image.0.as_ptr(), stream.0.as_ptr())
                    == 1,
                "Could not start compression"
            );
            ensure_whatever!(
                opj::opj_encode(codec.0.as_ptr(), stream.0.as_ptr()) == 1,
                "Could not encode image"
            );
            ensure_whatever!(
                opj::opj_end_compress(codec.0.as_ptr(), stream.0.as_ptr()) == 1,
                "Could not end compression"
            );
        }
        drop(stream);

        debug!(
            "OpenJPEG wrote {} bytes for a {}x{} image",
            output.data.len(),
            image.width,
            image.height
        );
        Ok(output.data)
    }
}

fn encoder_parameters(image: &Image, settings: &EncodeSettings) -> opj::opj_cparameters_t {
    // SAFETY: the parameters are plain data, filled in by OpenJPEG
    let mut parameters: opj::opj_cparameters_t = unsafe { std::mem::zeroed() };
    unsafe {
        opj::opj_set_default_encoder_parameters(&mut parameters);
    }

    parameters.tcp_numlayers = 1;
    parameters.cp_disto_alloc = 1;
    match settings.mode {
        CodingMode::Lossless => {
            parameters.tcp_rates[0] = 0.;
            parameters.irreversible = 0;
        }
        CodingMode::Lossy { ratio } => {
            parameters.tcp_rates[0] = ratio;
            parameters.irreversible = 1;
        }
    }

    parameters.numresolution =
        clamp_resolutions(settings.num_resolutions, image.width, image.height) as i32;
    let (cbw, cbh) = clamp_code_block(settings.code_block_size);
    parameters.cblockw_init = 1 << cbw;
    parameters.cblockh_init = 1 << cbh;
    parameters.prog_order = match settings.progression_order {
        ProgressionOrder::Lrcp => opj::PROG_ORDER::OPJ_LRCP,
        ProgressionOrder::Rlcp => opj::PROG_ORDER::OPJ_RLCP,
        ProgressionOrder::Rpcl => opj::PROG_ORDER::OPJ_RPCL,
        ProgressionOrder::Pcrl => opj::PROG_ORDER::OPJ_PCRL,
        ProgressionOrder::Cprl => opj::PROG_ORDER::OPJ_CPRL,
    };
    parameters.tcp_mct = (settings.use_mct && image.components.len() == 3) as _;
    parameters
}

/// Reduce the number of resolutions
/// until the lowest resolution is at least one sample wide.
fn clamp_resolutions(requested: u8, width: u32, height: u32) -> u32 {
    let min_size = width.min(height).max(1);
    let mut resolutions = u32::from(requested.clamp(1, 33));
    while resolutions > 1 && (1_u32 << (resolutions - 1)) > min_size {
        resolutions -= 1;
    }
    resolutions
}

/// Keep code-block exponents within 2 to 10, with at most 4096 samples.
fn clamp_code_block((width, height): (u8, u8)) -> (u8, u8) {
    let mut width = width.clamp(2, 10);
    let mut height = height.clamp(2, 10);
    while width + height > 12 {
        if width >= height {
            width -= 1;
        } else {
            height -= 1;
        }
    }
    (width, height)
}

fn create_image(image: &Image) -> Result<RawImage, CodecError> {
    let mut component_parameters: Vec<opj::opj_image_cmptparm_t> = image
        .components
        .iter()
        .map(|component| {
            // SAFETY: plain data
            let mut parameters: opj::opj_image_cmptparm_t = unsafe { std::mem::zeroed() };
            parameters.dx = 1;
            parameters.dy = 1;
            parameters.w = image.width;
            parameters.h = image.height;
            parameters.prec = component.precision;
            parameters.sgnd = component.signed as u32;
            parameters
        })
        .collect();

    let color_space = if image.components.len() == 3 {
        opj::COLOR_SPACE::OPJ_CLRSPC_SRGB
    } else {
        opj::COLOR_SPACE::OPJ_CLRSPC_GRAY
    };

    // SAFETY: the component parameters are valid for the given count
    let raw = unsafe {
        opj::opj_image_create(
            component_parameters.len() as u32,
            component_parameters.as_mut_ptr(),
            color_space,
        )
    };
    let raw = RawImage(NonNull::new(raw).whatever_context("Could not create OpenJPEG image")?);

    // SAFETY: the image was created with one data buffer
    // of `width * height` samples per component
    unsafe {
        let target = &mut *raw.0.as_ptr();
        target.x0 = 0;
        target.y0 = 0;
        target.x1 = image.width;
        target.y1 = image.height;
        let comps = std::slice::from_raw_parts_mut(target.comps, target.numcomps as usize);
        for (comp, component) in comps.iter_mut().zip(&image.components) {
            if comp.data.is_null() {
                whatever!("OpenJPEG image component has no data buffer");
            }
            std::ptr::copy_nonoverlapping(component.data.as_ptr(), comp.data, component.data.len());
        }
    }
    Ok(raw)
}

struct RawImage(NonNull<opj::opj_image_t>);

impl Drop for RawImage {
    fn drop(&mut self) {
        unsafe { opj::opj_image_destroy(self.0.as_ptr()) }
    }
}

struct Compressor(NonNull<opj::opj_codec_t>);

impl Compressor {
    fn new(verbose: bool) -> Result<Self, CodecError> {
        // SAFETY: the handlers do not use the client data
        unsafe {
            let codec = opj::opj_create_compress(opj::CODEC_FORMAT::OPJ_CODEC_J2K);
            let codec = Compressor(
                NonNull::new(codec).whatever_context("Could not create OpenJPEG compressor")?,
            );
            let ptr = codec.0.as_ptr();
            opj::opj_set_error_handler(ptr, Some(error_handler), std::ptr::null_mut());
            opj::opj_set_warning_handler(ptr, Some(warning_handler), std::ptr::null_mut());
            if verbose {
                opj::opj_set_info_handler(ptr, Some(info_handler), std::ptr::null_mut());
            }
            Ok(codec)
        }
    }
}

impl Drop for Compressor {
    fn drop(&mut self) {
        unsafe { opj::opj_destroy_codec(self.0.as_ptr()) }
    }
}

/// The in-memory destination of an output stream.
struct OutputBuffer {
    data: Vec<u8>,
    position: usize,
}

struct OutputStream(NonNull<opj::opj_stream_t>);

impl OutputStream {
    /// Create an output stream writing into the given buffer.
    ///
    /// The buffer must outlive the stream.
    fn new(output: &mut OutputBuffer) -> Result<Self, CodecError> {
        // SAFETY: the stream only accesses the buffer through the callbacks below
        unsafe {
            let stream = opj::opj_stream_create(STREAM_CHUNK_SIZE, 0);
            let stream = OutputStream(
                NonNull::new(stream).whatever_context("Could not create OpenJPEG stream")?,
            );
            let ptr = stream.0.as_ptr();
            opj::opj_stream_set_write_function(ptr, Some(stream_write));
            opj::opj_stream_set_skip_function(ptr, Some(stream_skip));
            opj::opj_stream_set_seek_function(ptr, Some(stream_seek));
            opj::opj_stream_set_user_data(
                ptr,
                output as *mut OutputBuffer as *mut c_void,
                None,
            );
            Ok(stream)
        }
    }
}

impl Drop for OutputStream {
    fn drop(&mut self) {
        unsafe { opj::opj_stream_destroy(self.0.as_ptr()) }
    }
}

unsafe extern "C" fn stream_write(buffer: *mut c_void, len: usize, user_data: *mut c_void) -> usize {
    if buffer.is_null() || user_data.is_null() {
        return usize::MAX;
    }
    let output = &mut *(user_data as *mut OutputBuffer);
    let bytes = std::slice::from_raw_parts(buffer as *const u8, len);
    let end = output.position + len;
    if output.data.len() < end {
        output.data.resize(end, 0);
    }
    output.data[output.position..end].copy_from_slice(bytes);
    output.position = end;
    len
}

unsafe extern "C" fn stream_skip(len: i64, user_data: *mut c_void) -> i64 {
    let output = &mut *(user_data as *mut OutputBuffer);
    let position = output.position as i64 + len;
    if position < 0 {
        return -1;
    }
    output.position = position as usize;
    len
}

unsafe extern "C" fn stream_seek(position: i64, user_data: *mut c_void) -> i32 {
    let output = &mut *(user_data as *mut OutputBuffer);
    if position < 0 {
        return 0;
    }
    output.position = position as usize;
    1
}

unsafe fn message(msg: *const c_char) -> Option<String> {
    if msg.is_null() {
        return None;
    }
    Some(CStr::from_ptr(msg).to_string_lossy().trim_end().to_string())
}

unsafe extern "C" fn error_handler(msg: *const c_char, _client_data: *mut c_void) {
    if let Some(msg) = message(msg) {
        error!("OpenJPEG: {}", msg);
    }
}

unsafe extern "C" fn warning_handler(msg: *const c_char, _client_data: *mut c_void) {
    if let Some(msg) = message(msg) {
        warn!("OpenJPEG: {}", msg);
    }
}

unsafe extern "C" fn info_handler(msg: *const c_char, _client_data: *mut c_void) {
    if let Some(msg) = message(msg) {
        debug!("OpenJPEG: {}", msg);
    }
}
