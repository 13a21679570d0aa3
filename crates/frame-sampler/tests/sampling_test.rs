/// Sampling behavior against an in-memory video source
use action_recognition_common::{RecognitionError, Result, VideoProperties, VideoSource};
use action_recognition_sampler::{describe, extract_frames, sample_indices, FrameSampler};
use image::{Rgb, RgbImage};
use std::collections::HashSet;

const SIZE: (u32, u32) = (8, 8);

/// Frame `i` is a solid image whose red/green channels encode `i`
fn numbered_frame(index: u64, (width, height): (u32, u32)) -> RgbImage {
    RgbImage::from_pixel(
        width,
        height,
        Rgb([(index % 256) as u8, (index / 256) as u8, 0]),
    )
}

fn frame_number(frame: &RgbImage) -> u64 {
    let px = frame.get_pixel(0, 0).0;
    u64::from(px[0]) + u64::from(px[1]) * 256
}

struct FakeSource {
    declared_frames: u64,
    decodable_frames: u64,
    native_size: (u32, u32),
    fps: f64,
    failing: HashSet<u64>,
    cursor: u64,
    seeks: Vec<u64>,
}

impl FakeSource {
    fn new(frames: u64) -> Self {
        Self {
            declared_frames: frames,
            decodable_frames: frames,
            native_size: SIZE,
            fps: 30.0,
            failing: HashSet::new(),
            cursor: 0,
            seeks: Vec::new(),
        }
    }

    fn failing_at(mut self, indices: &[u64]) -> Self {
        self.failing.extend(indices);
        self
    }
}

impl VideoSource for FakeSource {
    fn properties(&self) -> VideoProperties {
        VideoProperties {
            fps: self.fps,
            total_frames: self.declared_frames,
            width: self.native_size.0,
            height: self.native_size.1,
        }
    }

    fn read_next(&mut self) -> Result<Option<RgbImage>> {
        if self.cursor >= self.decodable_frames {
            return Ok(None);
        }
        let frame = numbered_frame(self.cursor, self.native_size);
        self.cursor += 1;
        Ok(Some(frame))
    }

    fn read_at(&mut self, index: u64) -> Result<Option<RgbImage>> {
        self.seeks.push(index);
        if self.failing.contains(&index) {
            return Err(RecognitionError::Unexpected(format!("corrupt frame {index}")));
        }
        if index >= self.decodable_frames {
            return Ok(None);
        }
        Ok(Some(numbered_frame(index, self.native_size)))
    }
}

#[test]
fn test_uniform_sampling_uses_interpolated_indices() {
    let mut source = FakeSource::new(300);
    let batch = extract_frames(&mut source, 16, SIZE).unwrap();

    assert_eq!(batch.len(), 16);
    assert_eq!(source.seeks, sample_indices(300, 16));

    let decoded: Vec<u64> = batch.frames().iter().map(frame_number).collect();
    assert_eq!(decoded, sample_indices(300, 16));
    assert_eq!(batch.padded_frames(), 0);
}

#[test]
fn test_exact_length_video_reads_every_frame() {
    let mut source = FakeSource::new(16);
    let batch = extract_frames(&mut source, 16, SIZE).unwrap();

    let decoded: Vec<u64> = batch.frames().iter().map(frame_number).collect();
    assert_eq!(decoded, (0..16).collect::<Vec<_>>());
}

#[test]
fn test_short_video_pads_with_last_frame() {
    let mut source = FakeSource::new(5);
    let batch = extract_frames(&mut source, 16, SIZE).unwrap();

    assert_eq!(batch.len(), 16);
    assert_eq!(batch.padded_frames(), 11);
    assert!(source.seeks.is_empty(), "short path must read sequentially");

    let decoded: Vec<u64> = batch.frames().iter().map(frame_number).collect();
    assert_eq!(&decoded[..5], &[0, 1, 2, 3, 4]);
    assert!(decoded[5..].iter().all(|&n| n == 4));
}

#[test]
fn test_short_video_with_fewer_decodable_frames_than_declared() {
    let mut source = FakeSource::new(10);
    source.decodable_frames = 3;
    let batch = extract_frames(&mut source, 16, SIZE).unwrap();

    let decoded: Vec<u64> = batch.frames().iter().map(frame_number).collect();
    assert_eq!(&decoded[..3], &[0, 1, 2]);
    assert!(decoded[3..].iter().all(|&n| n == 2));
    assert_eq!(batch.padded_frames(), 13);
}

#[test]
fn test_short_video_under_reported_count_stops_at_n() {
    let mut source = FakeSource::new(10);
    source.decodable_frames = 40;
    let batch = extract_frames(&mut source, 16, SIZE).unwrap();

    assert_eq!(batch.len(), 16);
    assert_eq!(batch.padded_frames(), 0);
    assert_eq!(frame_number(&batch.frames()[15]), 15);
    // one extra read detects the surplus frames
    assert_eq!(source.cursor, 17);
}

#[test]
fn test_short_video_exact_decodable_count_reads_to_end() {
    let mut source = FakeSource::new(10);
    source.decodable_frames = 16;
    let batch = extract_frames(&mut source, 16, SIZE).unwrap();

    assert_eq!(batch.padded_frames(), 0);
    assert_eq!(source.cursor, 16);
}

#[test]
fn test_zero_frames_is_empty_source() {
    let mut source = FakeSource::new(0);
    let err = extract_frames(&mut source, 16, SIZE).unwrap_err();
    assert!(matches!(err, RecognitionError::EmptySource));
}

#[test]
fn test_nothing_decodable_is_empty_source() {
    let mut source = FakeSource::new(4);
    source.decodable_frames = 0;
    let err = extract_frames(&mut source, 16, SIZE).unwrap_err();
    assert!(matches!(err, RecognitionError::EmptySource));
}

#[test]
fn test_failed_decode_carries_previous_frame_forward() {
    let indices = sample_indices(300, 16);
    let mut source = FakeSource::new(300).failing_at(&[indices[3], indices[4]]);
    let batch = extract_frames(&mut source, 16, SIZE).unwrap();

    let decoded: Vec<u64> = batch.frames().iter().map(frame_number).collect();
    assert_eq!(decoded[3], indices[2]);
    assert_eq!(decoded[4], indices[2]);
    assert_eq!(decoded[5], indices[5]);
    assert_eq!(batch.padded_frames(), 2);
}

#[test]
fn test_unreachable_tail_carries_forward() {
    let mut source = FakeSource::new(300);
    source.decodable_frames = 290;
    let batch = extract_frames(&mut source, 16, SIZE).unwrap();

    let indices = sample_indices(300, 16);
    let decoded: Vec<u64> = batch.frames().iter().map(frame_number).collect();
    assert_eq!(decoded[15], indices[14]);
    assert_eq!(batch.len(), 16);
}

#[test]
fn test_first_frame_failure_is_extraction_incomplete() {
    let mut source = FakeSource::new(300).failing_at(&[0]);
    let err = extract_frames(&mut source, 16, SIZE).unwrap_err();
    assert!(matches!(
        err,
        RecognitionError::ExtractionIncomplete {
            got: 15,
            expected: 16
        }
    ));
}

#[test]
fn test_frames_are_resized_to_target() {
    let mut source = FakeSource::new(40);
    source.native_size = (64, 48);
    let batch = FrameSampler::new(4, (16, 12)).extract(&mut source).unwrap();

    assert_eq!(batch.dimensions(), (16, 12));
    assert!(batch.frames().iter().all(|f| f.dimensions() == (16, 12)));
}

#[test]
fn test_describe_concrete_clip() {
    let source = FakeSource::new(300);
    let meta = describe(&source);

    assert_eq!(meta.fps, 30.0);
    assert_eq!(meta.total_frames, 300);
    assert_eq!(meta.duration_seconds, 10.0);
    assert_eq!((meta.width, meta.height), SIZE);
}

#[test]
fn test_describe_unknown_fps() {
    let mut source = FakeSource::new(300);
    source.fps = 0.0;
    assert_eq!(describe(&source).duration_seconds, 0.0);
}
