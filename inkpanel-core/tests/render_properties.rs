use image::{DynamicImage, Rgb, RgbImage};
use inkpanel_core::{DisplaySettings, ImageSettings, Orientation, is_solid_black, render};
use proptest::prelude::*;

fn orientation() -> impl Strategy<Value = Orientation> {
    prop_oneof![Just(Orientation::Horizontal), Just(Orientation::Vertical)]
}

fn settings() -> impl Strategy<Value = Option<ImageSettings>> {
    proptest::option::of((0.0f32..3.0, 0.0f32..3.0, 0.0f32..3.0, 0.0f32..3.0).prop_map(
        |(brightness, contrast, saturation, sharpness)| ImageSettings {
            brightness,
            contrast,
            saturation,
            sharpness,
        },
    ))
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn render_output_matches_panel_resolution(
        src_w in 1u32..200,
        src_h in 1u32..200,
        width in 1u32..160,
        height in 1u32..160,
        orientation in orientation(),
        inverted in any::<bool>(),
        settings in settings(),
        seed in any::<u8>(),
    ) {
        let image = DynamicImage::ImageRgb8(RgbImage::from_fn(src_w, src_h, |x, y| {
            Rgb([seed ^ x as u8, y as u8, seed])
        }));
        let display = DisplaySettings { orientation, inverted, resolution: (width, height) };

        let frame = render(&image, &display, settings.as_ref()).unwrap();
        prop_assert_eq!(frame.dimensions(), (width, height));
    }

    #[test]
    fn solid_black_detection_only_matches_all_zero_images(
        w in 1u32..40,
        h in 1u32..40,
        x in 0u32..40,
        y in 0u32..40,
        value in 1u8..=255,
    ) {
        let mut image = RgbImage::new(w, h);
        prop_assert!(is_solid_black(&DynamicImage::ImageRgb8(image.clone())));

        image.put_pixel(x % w, y % h, Rgb([value, value, value]));
        prop_assert!(!is_solid_black(&DynamicImage::ImageRgb8(image)));
    }
}
