//! Integration tests for photo fitting

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use herd_ledger::photo::{fit, fit_photo, DEFAULT_MAX_ENCODED_LEN, FALLBACK_EDGE, FALLBACK_QUALITY};
use herd_ledger::HerdError;
use image::codecs::gif::GifEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::{
    ColorType, DynamicImage, ExtendedColorType, GenericImageView, ImageBuffer, ImageEncoder, ImageFormat, Rgb, Rgba,
};
use proptest::prelude::*;

fn solid_png(width: u32, height: u32) -> Vec<u8> {
    let image: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(width, height, Rgb([90, 140, 60]));
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}

fn noisy_png(width: u32, height: u32) -> Vec<u8> {
    let image: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_fn(width, height, |x, y| {
        let v = x.wrapping_mul(2_654_435_761).wrapping_add(y.wrapping_mul(40_503));
        Rgb([(v >> 3) as u8, (v >> 11) as u8, (v >> 19) as u8])
    });
    let mut bytes = Vec::new();
    PngEncoder::new(&mut bytes)
        .write_image(image.as_raw(), width, height, ExtendedColorType::Rgb8)
        .unwrap();
    bytes
}

/// A 40x20 JPEG carrying an Exif APP1 segment with the given orientation tag.
fn jpeg_with_orientation(orientation: u8) -> Vec<u8> {
    let image = DynamicImage::ImageRgb8(ImageBuffer::from_pixel(40, 20, Rgb([30, 160, 90])));
    let mut jpeg = Vec::new();
    image
        .write_with_encoder(JpegEncoder::new_with_quality(&mut jpeg, 90))
        .unwrap();

    let mut app1 = vec![0xFF, 0xE1, 0x00, 0x22];
    app1.extend_from_slice(b"Exif\0\0");
    // Big-endian TIFF header, first IFD at offset 8
    app1.extend_from_slice(&[b'M', b'M', 0x00, 0x2A, 0x00, 0x00, 0x00, 0x08]);
    // One entry: Orientation (0x0112), SHORT, count 1
    app1.extend_from_slice(&[0x00, 0x01, 0x01, 0x12, 0x00, 0x03, 0x00, 0x00, 0x00, 0x01]);
    app1.extend_from_slice(&[0x00, orientation, 0x00, 0x00]);
    app1.extend_from_slice(&[0x00, 0x00, 0x00, 0x00]);
    assert_eq!(app1.len(), 2 + 0x22);

    // Right after SOI
    let rest = jpeg.split_off(2);
    jpeg.extend(app1);
    jpeg.extend(rest);
    jpeg
}

fn decode_output(encoded: &str) -> image::DynamicImage {
    let jpeg = STANDARD.decode(encoded).unwrap();
    assert_eq!(image::guess_format(&jpeg).unwrap(), ImageFormat::Jpeg);
    image::load_from_memory(&jpeg).unwrap()
}

#[test]
fn test_fit_large_image_first_grid_point() {
    let fitted = fit_photo(&solid_png(1000, 600), DEFAULT_MAX_ENCODED_LEN).unwrap();

    assert!(fitted.within_budget);
    assert_eq!((fitted.max_edge, fitted.quality), (800, 85));
    assert_eq!((fitted.width, fitted.height), (800, 480));
    assert_eq!(fitted.attempts, 1);
    assert!(fitted.encoded_len() <= DEFAULT_MAX_ENCODED_LEN);

    let decoded = decode_output(&fitted.encoded);
    assert_eq!(decoded.dimensions(), (800, 480));
}

#[test]
fn test_fit_never_upscales() {
    let fitted = fit_photo(&solid_png(200, 100), DEFAULT_MAX_ENCODED_LEN).unwrap();
    assert_eq!((fitted.width, fitted.height), (200, 100));
    assert_eq!(decode_output(&fitted.encoded).dimensions(), (200, 100));
}

#[test]
fn test_fit_is_deterministic() {
    let png = noisy_png(300, 200);
    assert_eq!(fit(&png, 20_000).unwrap(), fit(&png, 20_000).unwrap());
}

#[test]
fn test_fit_rejects_undecodable_input() {
    let err = fit(b"definitely not an image", DEFAULT_MAX_ENCODED_LEN).unwrap_err();
    assert!(matches!(err, HerdError::Decode(_)));
    assert_eq!(err.kind(), "decode");
}

#[test]
fn test_fit_rejects_truncated_png() {
    let png = solid_png(64, 64);
    let err = fit(&png[..png.len() / 2], DEFAULT_MAX_ENCODED_LEN).unwrap_err();
    assert!(matches!(err, HerdError::Decode(_)));
}

#[test]
fn test_fit_falls_back_when_budget_is_unreachable() {
    let fitted = fit_photo(&solid_png(1000, 600), 10).unwrap();

    assert!(!fitted.within_budget);
    assert_eq!((fitted.max_edge, fitted.quality), (FALLBACK_EDGE, FALLBACK_QUALITY));
    assert_eq!((fitted.width, fitted.height), (480, 288));
    assert_eq!(fitted.attempts, 40);
    assert!(fitted.encoded_len() > 10);
}

#[test]
fn test_fit_drops_alpha_channel() {
    let image: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_pixel(40, 30, Rgba([200, 10, 10, 128]));
    let mut png = Vec::new();
    PngEncoder::new(&mut png)
        .write_image(image.as_raw(), 40, 30, ExtendedColorType::Rgba8)
        .unwrap();

    let decoded = decode_output(&fit(&png, DEFAULT_MAX_ENCODED_LEN).unwrap());
    assert_eq!(decoded.color(), ColorType::Rgb8);
    assert_eq!(decoded.dimensions(), (40, 30));
}

#[test]
fn test_fit_applies_exif_orientation() {
    let rotated = fit_photo(&jpeg_with_orientation(6), DEFAULT_MAX_ENCODED_LEN).unwrap();
    assert_eq!((rotated.width, rotated.height), (20, 40));
    assert_eq!(decode_output(&rotated.encoded).dimensions(), (20, 40));

    let upright = fit_photo(&jpeg_with_orientation(1), DEFAULT_MAX_ENCODED_LEN).unwrap();
    assert_eq!((upright.width, upright.height), (40, 20));
}

#[test]
fn test_fit_flattens_gif_palette() {
    let frame: ImageBuffer<Rgba<u8>, Vec<u8>> =
        ImageBuffer::from_fn(36, 24, |x, _| if x < 18 { Rgba([250, 0, 0, 255]) } else { Rgba([0, 0, 250, 255]) });
    let mut gif = Vec::new();
    {
        let mut encoder = GifEncoder::new(&mut gif);
        encoder.encode(frame.as_raw(), 36, 24, ExtendedColorType::Rgba8).unwrap();
    }
    assert_eq!(image::guess_format(&gif).unwrap(), ImageFormat::Gif);

    let fitted = fit_photo(&gif, DEFAULT_MAX_ENCODED_LEN).unwrap();
    assert!(fitted.within_budget);
    let decoded = decode_output(&fitted.encoded);
    assert_eq!(decoded.color(), ColorType::Rgb8);
    assert_eq!(decoded.dimensions(), (36, 24));
}

#[test]
fn test_fit_accepts_webp_input() {
    let image: ImageBuffer<Rgba<u8>, Vec<u8>> = ImageBuffer::from_pixel(30, 50, Rgba([10, 200, 60, 200]));
    let mut webp = Vec::new();
    WebPEncoder::new_lossless(&mut webp)
        .encode(image.as_raw(), 30, 50, ExtendedColorType::Rgba8)
        .unwrap();

    let decoded = decode_output(&fit(&webp, DEFAULT_MAX_ENCODED_LEN).unwrap());
    assert_eq!(decoded.color(), ColorType::Rgb8);
    assert_eq!(decoded.dimensions(), (30, 50));
}

#[test]
fn test_fit_accepts_jpeg_input() {
    let first = fit(&solid_png(120, 80), DEFAULT_MAX_ENCODED_LEN).unwrap();
    let jpeg = STANDARD.decode(&first).unwrap();

    let refitted = fit_photo(&jpeg, DEFAULT_MAX_ENCODED_LEN).unwrap();
    assert_eq!((refitted.width, refitted.height), (120, 80));
}

#[test]
fn test_smaller_budget_lowers_quality_or_size() {
    let png = noisy_png(900, 700);
    let generous = fit_photo(&png, 10_000_000).unwrap();
    let tight = fit_photo(&png, 30_000).unwrap();

    assert_eq!((generous.max_edge, generous.quality), (800, 85));
    assert!(tight.attempts >= generous.attempts);
    assert!(tight.encoded_len() <= generous.encoded_len());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(8))]

    #[test]
    fn prop_fit_respects_budget_or_falls_back(budget in 500_usize..60_000) {
        let fitted = fit_photo(&noisy_png(160, 120), budget).unwrap();
        if fitted.within_budget {
            prop_assert!(fitted.encoded_len() <= budget);
        } else {
            prop_assert_eq!((fitted.max_edge, fitted.quality), (FALLBACK_EDGE, FALLBACK_QUALITY));
            prop_assert_eq!(fitted.attempts, 40);
        }
        prop_assert_eq!(fitted.encoded_len() % 4, 0);
    }
}
