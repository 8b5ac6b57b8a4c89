//! Transcoding between JPEG 2000 transfer syntaxes,
//! with a codestream codec storing raw samples.

mod adapters;

use adapters::{build_codestream, gray_image, RawCodec, TestDataObject};
use dicom_dictionary_std::tags;
use dicom_jpeg2000::codestream::CodestreamHeader;
use dicom_jpeg2000::{
    can_change_coding, CodecParameters, Error, Jpeg2000Adapter, Jpeg2000Syntax, PixelDataCodec,
    RepresentationParameter,
};
use rstest::rstest;

const LOSSLESS_ONLY: &str = "1.2.840.10008.1.2.4.90";
const LOSSY: &str = "1.2.840.10008.1.2.4.91";
const MULTI_COMPONENT: &str = "1.2.840.10008.1.2.4.93";

fn adapter(syntax: Jpeg2000Syntax) -> Jpeg2000Adapter<RawCodec> {
    Jpeg2000Adapter::new(syntax, RawCodec)
}

/// A 4x4 8-bit multi-frame object,
/// with each frame coded by the given function.
fn source_object(frames: u32, code: impl Fn(u32) -> (u16, bool, bool)) -> TestDataObject {
    let fragments = (0..frames)
        .map(|f| {
            let (capabilities, mct, reversible) = code(f);
            let image = gray_image(4, 4, 8, (0..16).map(|i| i * 5 + f as i32).collect());
            build_codestream(&image, capabilities, mct, reversible)
        })
        .collect();
    TestDataObject::new(4, 4, 1, 8, "MONOCHROME2")
        .frames(frames)
        .with_fragments(vec![], fragments)
}

fn decode_all(obj: &TestDataObject) -> Vec<u8> {
    adapter(Jpeg2000Syntax::Lossy)
        .decode(obj, &CodecParameters::default())
        .unwrap()
        .data
}

#[rstest]
#[case(LOSSLESS_ONLY, LOSSY, true)]
#[case(LOSSY, LOSSLESS_ONLY, true)]
#[case("1.2.840.10008.1.2.4.92", MULTI_COMPONENT, true)]
#[case(LOSSY, "1.2.840.10008.1.2.4.91\0", true)]
#[case("1.2.840.10008.1.2.1", LOSSLESS_ONLY, false)]
#[case(LOSSY, "1.2.840.10008.1.2.4.50", false)]
#[case(LOSSY, "1.2.840.10008.1.2.4.201", false)]
#[case("", "", false)]
fn change_coding_within_family(#[case] from: &str, #[case] to: &str, #[case] expected: bool) {
    assert_eq!(can_change_coding(from, to), expected);
    assert_eq!(
        adapter(Jpeg2000Syntax::Lossy).can_change_coding(from, to),
        expected
    );
}

#[test]
fn reversible_fragments_are_copied() {
    let mut obj = source_object(3, |_| (0, false, true));
    let source = obj.pixel_data_sequence.clone().unwrap();

    let encoded = adapter(Jpeg2000Syntax::Lossy)
        .transcode(LOSSLESS_ONLY, None, None, &CodecParameters::default(), &mut obj)
        .unwrap();

    assert_eq!(encoded.pixel_sequence.fragments(), source.fragments());
    assert_eq!(encoded.frame_starts, vec![0, 1, 2]);
    assert_eq!(encoded.pixel_sequence.offset_table().len(), 3);
    assert!(!encoded.lossy);
    // no new annotations on passthrough
    assert!(obj.ops.is_empty());
    assert_eq!(obj.derivation_description, None);
}

#[test]
fn lossless_request_on_formerly_lossy_source_is_reencoded() {
    let mut obj = source_object(2, |_| (0, false, true));
    let before = decode_all(&obj);

    let encoded = adapter(Jpeg2000Syntax::LosslessOnly)
        .transcode(
            LOSSY,
            Some(RepresentationParameter::lossy(4.)),
            Some(RepresentationParameter::Lossless),
            &CodecParameters::default(),
            &mut obj,
        )
        .unwrap();
    assert!(!encoded.lossy);
    for fragment in encoded.pixel_sequence.fragments() {
        assert!(CodestreamHeader::parse(fragment).unwrap().is_reversible());
    }
    assert!(obj
        .derivation_description
        .clone()
        .unwrap()
        .starts_with("Lossless compression with JPEG 2000"));

    let obj = obj.with_sequence(encoded.pixel_sequence);
    assert_eq!(decode_all(&obj), before);
}

#[test]
fn reversible_source_of_lossy_syntax_is_reencoded_for_lossless_only() {
    let mut obj = source_object(2, |_| (0, false, true));

    let encoded = adapter(Jpeg2000Syntax::LosslessOnly)
        .transcode(
            LOSSY,
            Some(RepresentationParameter::lossy(4.)),
            None,
            &CodecParameters::default(),
            &mut obj,
        )
        .unwrap();
    assert!(!encoded.lossy);
    assert!(!obj.actions_on(tags::DERIVATION_DESCRIPTION).is_empty());

    // same without any representation known for the source
    let mut obj = source_object(2, |_| (0, false, true));
    let encoded = adapter(Jpeg2000Syntax::LosslessOnly)
        .transcode(LOSSY, None, None, &CodecParameters::default(), &mut obj)
        .unwrap();
    assert!(!encoded.lossy);
    assert!(obj.derivation_description.is_some());
}

#[test]
fn lossless_representation_of_lossy_syntax_is_copied() {
    let mut obj = source_object(2, |_| (0, false, true));
    let source = obj.pixel_data_sequence.clone().unwrap();

    let encoded = adapter(Jpeg2000Syntax::LosslessOnly)
        .transcode(
            LOSSY,
            Some(RepresentationParameter::Lossless),
            None,
            &CodecParameters::default(),
            &mut obj,
        )
        .unwrap();
    assert_eq!(encoded.pixel_sequence.fragments(), source.fragments());
    assert!(!encoded.lossy);
    assert!(obj.ops.is_empty());
}

#[test]
fn copied_fragments_follow_max_fragment_size() {
    let mut obj = source_object(3, |_| (0, false, true));
    let before = decode_all(&obj);

    let encoded = adapter(Jpeg2000Syntax::Lossy)
        .transcode(
            LOSSLESS_ONLY,
            None,
            None,
            &CodecParameters::default().max_fragment_size(49),
            &mut obj,
        )
        .unwrap();
    // 112 bytes per frame in fragments of up to 50 bytes
    let lengths: Vec<_> = encoded
        .pixel_sequence
        .fragments()
        .iter()
        .map(|f| f.len())
        .collect();
    assert_eq!(lengths, vec![50, 50, 12, 50, 50, 12, 50, 50, 12]);
    assert_eq!(encoded.frame_starts, vec![0, 3, 6]);
    assert_eq!(encoded.pixel_sequence.offset_table(), &[0, 136, 272]);
    assert!(!encoded.lossy);
    assert!(obj.ops.is_empty());

    let obj = obj.with_sequence(encoded.pixel_sequence);
    assert_eq!(decode_all(&obj), before);
}

#[test]
fn irreversible_source_is_reencoded_for_lossless_only() {
    let mut obj = source_object(2, |_| (0, false, false));
    let before = decode_all(&obj);

    let encoded = adapter(Jpeg2000Syntax::LosslessOnly)
        .transcode(LOSSY, None, None, &CodecParameters::default(), &mut obj)
        .unwrap();
    assert!(!encoded.lossy);
    for fragment in encoded.pixel_sequence.fragments() {
        assert!(CodestreamHeader::parse(fragment).unwrap().is_reversible());
    }
    let description = obj.derivation_description.clone().unwrap();
    assert!(description.starts_with("Lossless compression with JPEG 2000"));

    let obj = obj.with_sequence(encoded.pixel_sequence);
    assert_eq!(decode_all(&obj), before);
}

#[test]
fn part2_source_is_reencoded_for_part1() {
    let obj = source_object(2, |_| (0x8000, false, true));
    let source = obj.pixel_data_sequence.clone().unwrap();

    // Part 2 target keeps the fragments
    let mut multi_component = obj.clone();
    let encoded = adapter(Jpeg2000Syntax::MultiComponent)
        .transcode(
            MULTI_COMPONENT,
            None,
            None,
            &CodecParameters::default(),
            &mut multi_component,
        )
        .unwrap();
    assert_eq!(encoded.pixel_sequence.fragments(), source.fragments());

    // Part 1 target does not
    let mut part1 = obj.clone();
    let encoded = adapter(Jpeg2000Syntax::LosslessOnly)
        .transcode(
            MULTI_COMPONENT,
            None,
            None,
            &CodecParameters::default(),
            &mut part1,
        )
        .unwrap();
    for fragment in encoded.pixel_sequence.fragments() {
        assert!(!CodestreamHeader::parse(fragment).unwrap().uses_part2());
    }
    assert!(!part1.actions_on(tags::DERIVATION_DESCRIPTION).is_empty());
}

#[test]
fn differing_coding_parameters_are_reencoded() {
    let mut obj = source_object(3, |f| (0, f == 1, true));
    let before = decode_all(&obj);

    let encoded = adapter(Jpeg2000Syntax::LosslessOnly)
        .transcode(LOSSLESS_ONLY, None, None, &CodecParameters::default(), &mut obj)
        .unwrap();
    let parameters: Vec<_> = encoded
        .pixel_sequence
        .fragments()
        .iter()
        .map(|f| {
            let header = CodestreamHeader::parse(f).unwrap();
            let (cod, qcd) = header.coding_parameters();
            (cod.to_vec(), qcd.to_vec())
        })
        .collect();
    assert!(parameters.windows(2).all(|w| w[0] == w[1]));
    assert!(obj.derivation_description.is_some());

    let obj = obj.with_sequence(encoded.pixel_sequence);
    assert_eq!(decode_all(&obj), before);
}

#[test]
fn new_lossy_representation_is_reencoded() {
    let mut obj = source_object(1, |_| (0, false, true));

    let encoded = adapter(Jpeg2000Syntax::Lossy)
        .transcode(
            LOSSLESS_ONLY,
            None,
            Some(RepresentationParameter::lossy(8.)),
            &CodecParameters::default(),
            &mut obj,
        )
        .unwrap();
    assert!(encoded.lossy);
    assert!(obj
        .derivation_description
        .unwrap()
        .starts_with("Lossy compression with JPEG 2000"));
}

#[test]
fn transcode_to_same_syntax_preserves_samples() {
    let mut obj = source_object(3, |_| (0, false, false));
    let before = decode_all(&obj);

    let encoded = adapter(Jpeg2000Syntax::Lossy)
        .transcode(LOSSY, None, None, &CodecParameters::default(), &mut obj)
        .unwrap();
    let obj = obj.with_sequence(encoded.pixel_sequence);
    assert_eq!(decode_all(&obj), before);
}

#[test]
fn transcode_from_other_syntax_fails() {
    let mut obj = source_object(1, |_| (0, false, true));
    let err = adapter(Jpeg2000Syntax::Lossy)
        .transcode(
            "1.2.840.10008.1.2.1",
            None,
            None,
            &CodecParameters::default(),
            &mut obj,
        )
        .unwrap_err();
    assert!(matches!(err, Error::UnsupportedTransferSyntaxPair { .. }));
}
