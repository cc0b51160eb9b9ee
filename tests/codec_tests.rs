#[cfg(test)]
mod codec_proptests {
    use proptest::prelude::*;

    use chromagap::{CodecConfig, PanelBuilder, PanelReader};

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(6))]

        #[test]
        fn proptest_panel_round_trip(data in prop::collection::vec(any::<u8>(), 0..=2895)) {
            let cfg = CodecConfig::default();
            let panel = PanelBuilder::new(&cfg).build(&data).unwrap();
            let decoded = PanelReader::new(&cfg).read_rgb(panel.to_image(6)).unwrap();
            prop_assert_eq!(data, decoded);
        }
    }
}

#[cfg(test)]
mod codec_tests {
    use image::{imageops, Rgb, RgbImage};
    use imageproc::geometric_transformations::{
        rotate_about_center, warp, Interpolation, Projection,
    };
    use test_case::test_case;

    use chromagap::{
        builder::Module,
        common::{Layout, DARK},
        CodecConfig, GapError, Panel, PanelBuilder, PanelReader,
    };

    const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

    fn payload(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 131 + i / 7) as u8).collect()
    }

    fn on_canvas(img: &RgbImage, margin: u32) -> RgbImage {
        let (w, h) = img.dimensions();
        let mut canvas = RgbImage::from_pixel(w + 2 * margin, h + 2 * margin, WHITE);
        imageops::overlay(&mut canvas, img, margin as i64, margin as i64);
        canvas
    }

    #[test]
    fn test_full_capacity() {
        let cfg = CodecConfig::default();
        assert_eq!(cfg.capacity(), 2895);
        let data = payload(cfg.capacity());
        let panel = PanelBuilder::new(&cfg).build(&data).unwrap();
        assert_eq!(panel.width(), 108);

        let decoded = PanelReader::new(&cfg).read_rgb(panel.to_image(cfg.scale)).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_over_capacity() {
        let cfg = CodecConfig::default();
        let res = PanelBuilder::new(&cfg).build(&payload(cfg.capacity() + 1));
        assert!(matches!(res, Err(GapError::PayloadTooLarge { size: 2896, capacity: 2895 })));
    }

    #[test_case(2.0; "slight clockwise")]
    #[test_case(-4.0; "counter clockwise")]
    fn test_rotated_capture(degrees: f32) {
        let cfg = CodecConfig::default();
        let data = payload(1200);
        let panel = PanelBuilder::new(&cfg).build(&data).unwrap();

        let canvas = on_canvas(&panel.to_image(cfg.scale), 120);
        let theta = degrees.to_radians();
        let rotated = rotate_about_center(&canvas, theta, Interpolation::Nearest, WHITE);

        let decoded = PanelReader::new(&cfg).read_rgb(rotated).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_perspective_capture() {
        let cfg = CodecConfig::default();
        let data = payload(2000);
        let panel = PanelBuilder::new(&cfg).build(&data).unwrap();

        let canvas = on_canvas(&panel.to_image(cfg.scale), 100);
        let s = canvas.width() as f32;
        let from = [(0.0, 0.0), (s, 0.0), (s, s), (0.0, s)];
        let to = [(30.0, 10.0), (s - 10.0, 40.0), (s - 20.0, s - 15.0), (5.0, s - 35.0)];
        let projection = Projection::from_control_points(from, to).unwrap();
        let warped = warp(&canvas, &projection, Interpolation::Nearest, WHITE);

        let decoded = PanelReader::new(&cfg).read_rgb(warped).unwrap();
        assert_eq!(decoded, data);
    }

    // Fills the light gap inside every finder so each reads as a plain dark square
    fn solid_finders(panel: &mut Panel, layout: &Layout) {
        let size = layout.finder_size();
        for (r0, c0) in layout.finder_origins() {
            for r in r0..r0 + size {
                for c in c0..c0 + size {
                    panel.set(r, c, Module::Func(DARK));
                }
            }
        }
    }

    #[test]
    fn test_solid_finder_fallback() {
        let cfg = CodecConfig::default();
        let layout = Layout::new(&cfg);
        let data = payload(800);
        let mut panel = PanelBuilder::new(&cfg).build(&data).unwrap();
        solid_finders(&mut panel, &layout);

        let decoded = PanelReader::new(&cfg).read_rgb(panel.to_image(cfg.scale)).unwrap();
        assert_eq!(decoded, data);
    }

    #[test]
    fn test_blank_capture() {
        let cfg = CodecConfig::default();
        let blank = RgbImage::from_pixel(400, 400, WHITE);
        let res = PanelReader::new(&cfg).read_rgb(blank);
        assert!(matches!(res, Err(GapError::FinderPatternNotFound)));
    }

    #[test]
    fn test_saved_png_round_trip() {
        let cfg = CodecConfig::default();
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("panel.png");
        let data = payload(321);
        PanelBuilder::new(&cfg).write(&data, &path).unwrap();

        let decoded = PanelReader::new(&cfg).read_path(&path).unwrap();
        assert_eq!(decoded, data);
    }
}
