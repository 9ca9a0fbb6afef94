//! Parsing whole synthetic files.

use proptest::prelude::*;
use segmux_ebml::element as id;
use segmux_ebml::write::{block_payload, ElementWriter};
use segmux_ebml::{parse_segments, ClusterReader, Lacing, RawBlock};
use bytes::Bytes;
use std::io::Cursor;

fn info(w: &mut ElementWriter, uid: u8) {
    w.master(id::INFO, |i| {
        i.binary(id::SEGMENT_UID, &[uid; 16]);
        i.uint(id::TIMECODE_SCALE, 1_000_000);
        i.float(id::DURATION, 2000.0);
    });
}

fn tracks(w: &mut ElementWriter) {
    w.master(id::TRACKS, |t| {
        t.master(id::TRACK_ENTRY, |e| {
            e.uint(id::TRACK_NUMBER, 1);
            e.uint(id::TRACK_TYPE, 2);
            e.string(id::CODEC_ID, "A_AAC");
            e.master(id::AUDIO, |a| {
                a.float(id::SAMPLING_FREQUENCY, 48000.0);
                a.uint(id::CHANNELS, 2);
            });
        });
    });
}

#[test]
fn two_segments_in_one_stream() {
    let mut w = ElementWriter::new();
    w.ebml_header("matroska");
    for uid in [1u8, 2] {
        w.master(id::SEGMENT, |s| {
            info(s, uid);
            tracks(s);
            s.master(id::CLUSTER, |c| {
                c.uint(id::TIMECODE, 0);
                c.binary(id::SIMPLE_BLOCK, &block_payload(1, 0, 0x80, Lacing::None, &[b"f"]));
            });
        });
    }

    let segments = parse_segments(&mut Cursor::new(w.finish())).unwrap();
    assert_eq!(segments.len(), 2);
    assert_eq!(segments[1].info.as_ref().unwrap().uid, Some(vec![2; 16]));
    assert_eq!(segments[0].tracks[0].audio.as_ref().unwrap().channels, 2);
    assert!(segments[0].first_cluster.unwrap() < segments[1].offset);
}

#[test]
fn seek_head_reaches_cues_after_live_cluster() {
    // cues are positioned after an unknown-size cluster
    let mut body = ElementWriter::new();
    info(&mut body, 3);
    tracks(&mut body);
    let seek_head_len = 24;
    let cluster_start = body.len() + seek_head_len;

    let mut cluster = ElementWriter::new();
    cluster.open_unknown(id::CLUSTER);
    cluster.uint(id::TIMECODE, 0);
    cluster.binary(id::SIMPLE_BLOCK, &block_payload(1, 0, 0x80, Lacing::None, &[b"a"]));
    let cluster = cluster.finish();
    let cues_start = (cluster_start + cluster.len()) as u64;

    let mut seek_head = ElementWriter::new();
    seek_head.master(id::SEEK_HEAD, |h| {
        h.master(id::SEEK, |s| {
            s.uint(id::SEEK_ID, id::CUES as u64);
            s.uint(id::SEEK_POSITION, cues_start);
        });
    });
    let mut seek_head = seek_head.finish();
    assert!(seek_head.len() <= seek_head_len);
    // pad with a Void element so the cluster lands where computed
    let pad = seek_head_len - seek_head.len();
    if pad > 0 {
        seek_head.push(id::VOID as u8);
        seek_head.push(0x80 | (pad as u8 - 2));
        seek_head.extend(std::iter::repeat(0).take(pad - 2));
    }

    let mut segment = body.finish();
    segment.extend(seek_head);
    segment.extend(cluster);
    let mut cues = ElementWriter::new();
    cues.master(id::CUES, |c| {
        c.master(id::CUE_POINT, |p| {
            p.uint(id::CUE_TIME, 0);
            p.master(id::CUE_TRACK_POSITIONS, |t| {
                t.uint(id::CUE_TRACK, 1);
                t.uint(id::CUE_CLUSTER_POSITION, cluster_start as u64);
            });
        });
    });
    segment.extend(cues.finish());

    let mut w = ElementWriter::new();
    w.ebml_header("matroska");
    w.open_unknown(id::SEGMENT);
    let data_start = w.len() as u64;
    w.raw(&segment);

    let segments = parse_segments(&mut Cursor::new(w.finish())).unwrap();
    assert_eq!(segments.len(), 1);
    let tree = &segments[0];
    assert_eq!(tree.first_cluster, Some(data_start + cluster_start as u64));
    assert_eq!(tree.cues.len(), 1);
    assert_eq!(tree.cues[0].cluster_position, tree.first_cluster.unwrap());
}

#[test]
fn cluster_reader_yields_every_block() {
    let mut w = ElementWriter::new();
    w.ebml_header("webm");
    w.master(id::SEGMENT, |s| {
        info(s, 4);
        tracks(s);
        for c in 0..3u64 {
            s.master(id::CLUSTER, |cl| {
                cl.uint(id::TIMECODE, c * 100);
                for b in 0..4i16 {
                    cl.binary(id::SIMPLE_BLOCK, &block_payload(1, b * 20, 0x80, Lacing::None, &[b"x"]));
                }
            });
        }
    });
    let mut src = Cursor::new(w.finish());
    let tree = parse_segments(&mut src).unwrap().remove(0);
    let mut reader = ClusterReader::new(tree.first_cluster.unwrap(), Some(tree.data_end));

    let mut timecodes = Vec::new();
    while let Some(block) = reader.next_block(&mut src).unwrap() {
        timecodes.push(block.timecode);
    }
    assert_eq!(timecodes.len(), 12);
    assert_eq!(timecodes[4], 100);
    assert_eq!(*timecodes.last().unwrap(), 260);
}

proptest! {
    #[test]
    fn laced_spans_stay_within_block(
        frames in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..400), 1..8),
        mode in 0u8..3,
    ) {
        let lacing = [Lacing::Xiph, Lacing::Ebml, Lacing::None][mode as usize];
        let refs: Vec<&[u8]> = frames.iter().map(|f| f.as_slice()).collect();
        let refs = if lacing == Lacing::None { &refs[..1] } else { &refs[..] };
        let block = RawBlock::parse(Bytes::from(block_payload(1, 0, 0x80, lacing, refs)), 0, true).unwrap();

        prop_assert_eq!(block.frames.len(), refs.len());
        let total: usize = block.frames.iter().map(|s| s.len).sum();
        prop_assert!(total <= block.declared_size());
        for (i, frame) in refs.iter().enumerate() {
            prop_assert_eq!(&block.frame(i).unwrap()[..], *frame);
        }
    }
}
