//! # Ogg Opus Decoding
//!
//! symphonia has no Opus decoder, and Opus in Ogg is what most voice notes
//! are. Streams whose first packet is an `OpusHead` are decoded here with
//! libopus, always at 48 kHz and straight to mono; the normalizer resamples
//! the result like any other source.

use crate::audio::decoder::{DecodeError, DecodedAudio};
use ogg::PacketReader;
use opus::{Channels, Decoder};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

/// Opus decodes at 48 kHz whatever the original input rate was.
pub const OPUS_SAMPLE_RATE: u32 = 48_000;

/// Longest Opus packet: 120 ms at 48 kHz.
const MAX_PACKET_FRAMES: usize = 5_760;

const OGG_CAPTURE: &[u8] = b"OggS";
const OPUS_HEAD: &[u8] = b"OpusHead";
const OPUS_TAGS: &[u8] = b"OpusTags";

/// The identification header fields decoding needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpusHead {
    pub channels: u8,
    /// Decoder warm-up samples (at 48 kHz) to discard.
    pub pre_skip: u16,
    pub input_sample_rate: u32,
}

impl OpusHead {
    pub fn parse(packet: &[u8]) -> Result<Self, DecodeError> {
        if packet.len() < 19 || !packet.starts_with(OPUS_HEAD) {
            return Err(DecodeError::Corrupt("missing OpusHead header".to_string()));
        }
        // Major version lives in the high nibble; only 0 is defined.
        if packet[8] >> 4 != 0 {
            return Err(DecodeError::UnsupportedCodec(format!(
                "Opus header version {}",
                packet[8]
            )));
        }

        let head = OpusHead {
            channels: packet[9],
            pre_skip: u16::from_le_bytes([packet[10], packet[11]]),
            input_sample_rate: u32::from_le_bytes([packet[12], packet[13], packet[14], packet[15]]),
        };

        match head.channels {
            0 => Err(DecodeError::Corrupt("Opus stream declares no channels".to_string())),
            1 | 2 => Ok(head),
            n => Err(DecodeError::UnsupportedCodec(format!("{}-channel Opus stream", n))),
        }
    }
}

/// Whether `path` holds an Ogg stream whose first packet is `OpusHead`.
pub fn is_ogg_opus(path: &Path) -> std::io::Result<bool> {
    let mut header = Vec::with_capacity(64);
    File::open(path)?.take(64).read_to_end(&mut header)?;

    if header.len() < 27 || !header.starts_with(OGG_CAPTURE) {
        return Ok(false);
    }
    // The first packet starts right after the page's segment table.
    let start = 27 + header[26] as usize;
    Ok(header.get(start..start + OPUS_HEAD.len()) == Some(OPUS_HEAD))
}

/// Decode an Ogg Opus file into mono samples at [`OPUS_SAMPLE_RATE`].
pub fn decode_file(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let mut reader = PacketReader::new(BufReader::new(File::open(path)?));

    let first = next_packet(&mut reader)?.ok_or(DecodeError::NoTrack)?;
    let head = OpusHead::parse(&first.data)?;
    let serial = first.stream_serial();

    // libopus folds stereo packets down itself when asked for mono output.
    let mut decoder = Decoder::new(OPUS_SAMPLE_RATE, Channels::Mono)
        .map_err(|e| DecodeError::UnsupportedCodec(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut frame = vec![0.0f32; MAX_PACKET_FRAMES];
    let mut end_granule = None;

    while let Some(packet) = next_packet(&mut reader)? {
        if packet.stream_serial() != serial || packet.data.starts_with(OPUS_TAGS) {
            continue;
        }

        match decoder.decode_float(&packet.data, &mut frame, false) {
            Ok(frames) => samples.extend_from_slice(&frame[..frames]),
            Err(e) => tracing::warn!(error = %e, "Skipping corrupt Opus packet"),
        }

        if packet.last_in_stream() {
            end_granule = Some(packet.absgp_page());
            break;
        }
    }

    let pre_skip = usize::from(head.pre_skip).min(samples.len());
    samples.drain(..pre_skip);

    // The final granule position marks where the real audio ends.
    if let Some(granule) = end_granule {
        let playable = granule.saturating_sub(u64::from(head.pre_skip)) as usize;
        if playable > 0 {
            samples.truncate(playable);
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::NoSamples);
    }

    tracing::debug!(
        path = %path.display(),
        samples = samples.len(),
        channels = head.channels,
        input_sample_rate = head.input_sample_rate,
        "Decoded Ogg Opus stream"
    );

    Ok(DecodedAudio {
        samples,
        sample_rate: OPUS_SAMPLE_RATE,
        source_channels: usize::from(head.channels),
    })
}

fn next_packet(
    reader: &mut PacketReader<BufReader<File>>,
) -> Result<Option<ogg::Packet>, DecodeError> {
    reader
        .read_packet()
        .map_err(|e| DecodeError::Corrupt(e.to_string()))
}
