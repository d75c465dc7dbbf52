use super::*;
use crate::foundation::core::Rgba8Premul;

fn frame(number: u64, shade: u8) -> Arc<Frame> {
    Arc::new(Frame::solid(number, 10, 10, Rgba8Premul::opaque(shade, shade, shade)))
}

#[test]
fn frames_survive_encode_and_reload() {
    let dir = tempfile::tempdir().unwrap();
    let mut original = Frame::solid(3, 4, 2, Rgba8Premul::opaque(10, 20, 30));
    original.set_audio(Some(
        AudioBuffer::from_channels(
            48_000,
            ChannelLayout::Stereo,
            vec![vec![0.25, -0.5, 1.0], vec![0.0, 0.125, -1.0]],
        )
        .unwrap(),
    ));
    {
        let cache = DiskCache::open(dir.path()).unwrap();
        cache.add(Arc::new(original.clone())).unwrap();
        cache.add(Arc::new(Frame::metadata_only(4, 4, 2))).unwrap();
    }

    let reopened = DiskCache::open(dir.path()).unwrap();
    assert_eq!(reopened.frame_numbers(), vec![3, 4]);
    let got = reopened.get_frame(3).unwrap().unwrap();
    assert_eq!(*got, original);
    let bare = reopened.get_frame(4).unwrap().unwrap();
    assert!(!bare.has_image_data());
    assert!(!bare.has_audio_data());
    assert_eq!((bare.width(), bare.height()), (4, 2));
}

#[test]
fn budget_evicts_smallest_and_unlinks_files() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskCache::with_max_bytes(dir.path(), 1000).unwrap();
    for n in 1..=5 {
        cache.add(frame(n, n as u8)).unwrap();
    }
    assert_eq!(cache.frame_numbers(), vec![4, 5]);
    assert_eq!(cache.bytes(), 800);
    assert!(!dir.path().join("frame-1.bin").exists());
    assert!(dir.path().join("frame-5.bin").exists());
    assert!(cache.get_frame(2).unwrap().is_none());
}

#[test]
fn duplicate_add_replaces_payload() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(dir.path()).unwrap();
    cache.add(frame(2, 1)).unwrap();
    cache.add(frame(2, 9)).unwrap();
    assert_eq!(cache.count(), 1);
    assert_eq!(cache.bytes(), 400);
    let got = cache.get_frame(2).unwrap().unwrap();
    assert_eq!(got.pixel(0, 0), Some([9, 9, 9, 255]));
}

#[test]
fn remove_range_clear_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(dir.path()).unwrap();
    for n in [1, 2, 3, 7, 8] {
        cache.add(frame(n, 0)).unwrap();
    }
    let json = cache.json_value();
    assert_eq!(json["type"], "disk");
    assert_eq!(json["ranges"].as_array().unwrap().len(), 2);

    cache.remove_range(2, 7).unwrap();
    assert_eq!(cache.frame_numbers(), vec![1, 8]);
    assert_eq!(cache.smallest_frame().unwrap().unwrap().number, 1);

    let v = cache.version();
    cache.clear().unwrap();
    assert!(cache.version() > v);
    assert_eq!(cache.count(), 0);
    assert!(!dir.path().join("frame-8.bin").exists());
}

#[test]
fn missing_file_for_indexed_frame_is_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(dir.path()).unwrap();
    cache.add(frame(5, 0)).unwrap();
    std::fs::remove_file(dir.path().join("frame-5.bin")).unwrap();
    let err = cache.get_frame(5).unwrap_err();
    assert!(matches!(err, MontageError::InvalidFile(_)), "{err}");
}

#[test]
fn corrupt_frame_file_is_invalid_file() {
    let dir = tempfile::tempdir().unwrap();
    let cache = DiskCache::open(dir.path()).unwrap();
    cache.add(frame(6, 0)).unwrap();
    std::fs::write(dir.path().join("frame-6.bin"), b"MTGF\x01short").unwrap();
    let err = cache.get_frame(6).unwrap_err();
    assert!(matches!(err, MontageError::InvalidFile(_)), "{err}");
}

#[test]
fn corrupt_index_is_invalid_json() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("index.json"), "{not json").unwrap();
    let err = DiskCache::open(dir.path()).unwrap_err();
    assert!(matches!(err, MontageError::InvalidJson { .. }), "{err}");
}

#[test]
fn concurrent_adds_and_reads() {
    let dir = tempfile::tempdir().unwrap();
    let cache = Arc::new(DiskCache::with_max_bytes(dir.path(), 400 * 8).unwrap());
    std::thread::scope(|s| {
        for t in 0..4u8 {
            let cache = Arc::clone(&cache);
            s.spawn(move || {
                for n in 1..=24u64 {
                    cache.add(frame(n, t)).unwrap();
                    if let Some(f) = cache.get_frame(n).unwrap() {
                        assert_eq!(f.number, n);
                    }
                }
            });
        }
    });
    assert_eq!(cache.frame_numbers(), (17..=24).collect::<Vec<_>>());
}
