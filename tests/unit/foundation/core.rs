use super::*;

#[test]
fn fraction_does_not_reduce_until_asked() {
    let mut f = Fraction::new(640, 480);
    assert_eq!((f.num, f.den), (640, 480));
    assert!((f.to_f64() - 4.0 / 3.0).abs() < 1e-12);

    f.reduce();
    assert_eq!((f.num, f.den), (4, 3));
}

#[test]
fn fraction_reciprocal_and_rounding() {
    let ntsc = Fraction::new(30000, 1001);
    assert_eq!(ntsc.to_int(), 30);
    assert_eq!(ntsc.reciprocal(), Fraction::new(1001, 30000));
    assert_eq!(Fraction::new(-6, 4).gcd(), 2);
    assert_eq!(Fraction::new(-6, 4).reduced(), Fraction::new(-3, 2));
}

#[test]
fn fraction_parses_ratios_and_integers() {
    assert_eq!("30000/1001".parse::<Fraction>().unwrap(), Fraction::new(30000, 1001));
    assert_eq!(" 24 ".parse::<Fraction>().unwrap(), Fraction::new(24, 1));
    assert!("24/x".parse::<Fraction>().is_err());
    assert!(Fraction::new(0, 1).validate_rate("fps").is_err());
}

#[test]
fn coordinate_serializes_with_upper_case_keys() {
    let json = serde_json::to_value(Coordinate::new(1.0, 2.5)).unwrap();
    assert_eq!(json, serde_json::json!({"X": 1.0, "Y": 2.5}));
}

#[test]
fn channel_layouts_know_their_speakers() {
    assert_eq!(ChannelLayout::FivePointOne.channel_count(), 6);
    assert_eq!(ChannelLayout::for_channels(1), Some(ChannelLayout::Mono));
    assert_eq!(ChannelLayout::for_channels(7), None);
    for v in 0..8u8 {
        let layout = ChannelLayout::from_u8(v).unwrap();
        assert_eq!(layout.to_u8(), v);
    }
    assert_eq!(
        serde_json::to_value(ChannelLayout::FivePointOne).unwrap(),
        serde_json::json!("5.1")
    );
}

#[test]
fn straight_rgba_is_premultiplied() {
    let px = Rgba8Premul::from_straight_rgba(255, 128, 0, 128);
    assert_eq!(px.to_array(), [128, 64, 0, 128]);
    assert_eq!(Rgba8Premul::transparent().to_array(), [0, 0, 0, 0]);
}
