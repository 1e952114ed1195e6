use effect_gate::probe::{FrameMetrics, PixelBuffer, passthrough::similarity};
use proptest::prelude::*;

fn buffer() -> impl Strategy<Value = PixelBuffer> {
    (1u32..48, 1u32..48).prop_flat_map(|(w, h)| {
        proptest::collection::vec(any::<u8>(), (w * h * 4) as usize)
            .prop_map(move |data| PixelBuffer::new(w, h, data).unwrap())
    })
}

fn solid_buffer() -> impl Strategy<Value = PixelBuffer> {
    (1u32..64, 1u32..64, any::<[u8; 4]>()).prop_map(|(w, h, px)| {
        PixelBuffer::new(w, h, px.repeat((w * h) as usize)).unwrap()
    })
}

proptest! {
    #[test]
    fn metrics_are_deterministic(buf in buffer()) {
        prop_assert_eq!(FrameMetrics::from_pixels(&buf), FrameMetrics::from_pixels(&buf.clone()));
    }

    #[test]
    fn all_zero_means_black(buf in buffer()) {
        let m = FrameMetrics::from_pixels(&buf);
        if m.is_all_zero {
            prop_assert_eq!(m.mean_rgb, [0.0; 3]);
            prop_assert!(m.is_essentially_blank);
        }
    }

    #[test]
    fn one_sampled_colour_is_monochrome(buf in buffer()) {
        let m = FrameMetrics::from_pixels(&buf);
        prop_assert_eq!(m.is_monochrome, m.unique_sampled_colors <= 1);
        prop_assert!(m.sample_count >= 1);
    }

    #[test]
    fn solid_frames_are_always_monochrome(buf in solid_buffer()) {
        let m = FrameMetrics::from_pixels(&buf);
        prop_assert!(m.is_monochrome);
        prop_assert!(m.std_rgb.iter().all(|s| *s < 1e-9));
        prop_assert!(m.luma_variance < 1e-6);
    }

    #[test]
    fn means_stay_normalized(buf in buffer()) {
        let m = FrameMetrics::from_pixels(&buf);
        prop_assert!(m.mean_rgb.iter().all(|v| (0.0..=1.0).contains(v)));
        prop_assert!((0.0..=1.0).contains(&m.mean_alpha));
        prop_assert!(m.luma_mean >= 0.0 && m.luma_mean <= 1.0 + 1e-9);
    }

    #[test]
    fn self_similarity_is_one(buf in buffer()) {
        prop_assert_eq!(similarity(&buf, &buf), 1.0);
    }
}

#[test]
fn transparent_frame_is_flagged() {
    let buf = PixelBuffer::new(4, 4, [30, 60, 90, 0].repeat(16)).unwrap();
    let m = FrameMetrics::from_pixels(&buf);
    assert!(m.is_all_transparent);
    assert_eq!(m.mean_alpha, 0.0);
    assert!(!m.is_all_zero);
}

#[test]
fn large_frames_sample_about_a_thousand_pixels() {
    let (w, h) = (640u32, 480u32);
    let mut data = Vec::with_capacity((w * h * 4) as usize);
    for i in 0..w * h {
        data.extend_from_slice(&[(i % 256) as u8, (i / 256 % 256) as u8, 0, 255]);
    }
    let m = FrameMetrics::from_pixels(&PixelBuffer::new(w, h, data).unwrap());
    assert!((1000..=1100).contains(&m.sample_count), "{}", m.sample_count);
    assert!(m.unique_sampled_colors > 100);
}
