use byteorder::{LittleEndian, WriteBytesExt};
use std::io::{self, Write};

use super::{file_name, inline_or_streamed, require_int, Category, DecodeError, DecodedPayload, Decoder};
use crate::object::ResolvedObject;

pub const AUDIO_PCM: i64 = 0;
pub const AUDIO_VORBIS: i64 = 1;
pub const AUDIO_MP3: i64 = 3;
pub const AUDIO_AAC: i64 = 4;

/// AudioClip → WAV (PCM) or the stored container as-is (Vorbis/MP3/AAC).
pub struct AudioDecoder;

fn extension(format: i64) -> Option<(&'static str, &'static str)> {
    match format {
        AUDIO_PCM    => Some((".wav", "audio/wav")),
        AUDIO_VORBIS => Some((".ogg", "audio/ogg")),
        AUDIO_MP3    => Some((".mp3", "audio/mpeg")),
        AUDIO_AAC    => Some((".m4a", "audio/mp4")),
        _            => None,
    }
}

/// 44-byte canonical RIFF/WAVE header followed by `samples`.
pub fn wrap_wav(samples: &[u8], channels: u16, sample_rate: u32, bits_per_sample: u16) -> io::Result<Vec<u8>> {
    let block_align = channels
        .checked_mul(bits_per_sample / 8)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "block alignment overflows u16"))?;
    let byte_rate = sample_rate
        .checked_mul(block_align as u32)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "byte rate overflows u32"))?;
    let mut out = Vec::with_capacity(44 + samples.len());
    out.write_all(b"RIFF")?;
    out.write_u32::<LittleEndian>(36 + samples.len() as u32)?;
    out.write_all(b"WAVEfmt ")?;
    out.write_u32::<LittleEndian>(16)?;
    out.write_u16::<LittleEndian>(1)?; // PCM
    out.write_u16::<LittleEndian>(channels)?;
    out.write_u32::<LittleEndian>(sample_rate)?;
    out.write_u32::<LittleEndian>(byte_rate)?;
    out.write_u16::<LittleEndian>(block_align)?;
    out.write_u16::<LittleEndian>(bits_per_sample)?;
    out.write_all(b"data")?;
    out.write_u32::<LittleEndian>(samples.len() as u32)?;
    out.write_all(samples)?;
    Ok(out)
}

impl Decoder for AudioDecoder {
    fn name(&self) -> &'static str { "audio" }

    fn output_name(&self, object: &ResolvedObject) -> String {
        let format = object.int("compression_format").unwrap_or(-1);
        let ext = extension(format).map_or(".bin", |(ext, _)| ext);
        file_name(object, ext)
    }

    fn category(&self) -> Category { Category::Audio }

    fn decode(&self, object: &ResolvedObject) -> Result<DecodedPayload, DecodeError> {
        let format = require_int(object, "compression_format")?;
        let (_, mime) = extension(format).ok_or(DecodeError::UnsupportedAudioFormat(format))?;
        let data = inline_or_streamed(object, "data")?;

        let bytes = if format == AUDIO_PCM {
            let channels  = require_int(object, "channels")?;
            let frequency = require_int(object, "frequency")?;
            let bits = match require_int(object, "bits_per_sample")? {
                0 => 16,
                b => b,
            };
            if !(1..=16).contains(&channels) || frequency <= 0 || frequency > u32::MAX as i64 {
                return Err(DecodeError::InvalidAudio(format!("{channels} channels at {frequency} Hz")));
            }
            if !matches!(bits, 8 | 16 | 24 | 32) {
                return Err(DecodeError::InvalidAudio(format!("{bits} bits per sample")));
            }
            // The WAV header stores frequency * channels * bytes per sample as u32.
            if frequency * channels * (bits / 8) > u32::MAX as i64 {
                return Err(DecodeError::InvalidAudio(format!(
                    "byte rate of {channels} channels at {frequency} Hz, {bits} bits overflows the WAV header"
                )));
            }
            if data.len() > (u32::MAX - 36) as usize {
                return Err(DecodeError::InvalidAudio("sample data exceeds 4 GiB".into()));
            }
            wrap_wav(&data, channels as u16, frequency as u32, bits as u16)
                .map_err(|e| DecodeError::InvalidAudio(e.to_string()))?
        } else {
            data.to_vec()
        };

        Ok(DecodedPayload {
            output_name: self.output_name(object),
            mime_hint:   mime,
            category:    self.category(),
            bytes,
            width:       None,
            height:      None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::test_support::{bytes, name, object};
    use crate::object::ResolvedValue;
    use crate::schema::TypeTag;

    fn clip(format: i64, data: &[u8]) -> std::sync::Arc<ResolvedObject> {
        object(TypeTag::AUDIO_CLIP, 8, vec![
            ("name", name("jump")),
            ("channels", ResolvedValue::Int(2)),
            ("frequency", ResolvedValue::Int(44_100)),
            ("bits_per_sample", ResolvedValue::Int(16)),
            ("compression_format", ResolvedValue::Int(format)),
            ("data", bytes(data)),
            ("stream_data", ResolvedValue::Object(None)),
        ])
    }

    #[test]
    fn pcm_gets_a_wav_header() {
        let p = AudioDecoder.decode(&clip(AUDIO_PCM, &[0; 8])).unwrap();
        assert_eq!(p.output_name, "jump.wav");
        assert_eq!(p.bytes.len(), 44 + 8);
        assert_eq!(&p.bytes[0..4], b"RIFF");
        assert_eq!(&p.bytes[8..16], b"WAVEfmt ");
        // byte rate = 44100 * 2 channels * 2 bytes
        assert_eq!(u32::from_le_bytes(p.bytes[28..32].try_into().unwrap()), 176_400);
        assert_eq!(u32::from_le_bytes(p.bytes[40..44].try_into().unwrap()), 8);
    }

    #[test]
    fn byte_rate_overflow_is_rejected() {
        let loud = object(TypeTag::AUDIO_CLIP, 9, vec![
            ("name", name("loud")),
            ("channels", ResolvedValue::Int(2)),
            ("frequency", ResolvedValue::Int(2_000_000_000)),
            ("bits_per_sample", ResolvedValue::Int(16)),
            ("compression_format", ResolvedValue::Int(AUDIO_PCM)),
            ("data", bytes(&[0; 4])),
            ("stream_data", ResolvedValue::Object(None)),
        ]);
        assert!(matches!(AudioDecoder.decode(&loud), Err(DecodeError::InvalidAudio(_))));
        assert!(wrap_wav(&[], 2, 2_000_000_000, 16).is_err());
    }

    #[test]
    fn compressed_audio_passes_through() {
        let p = AudioDecoder.decode(&clip(AUDIO_VORBIS, b"OggS....")).unwrap();
        assert_eq!(p.output_name, "jump.ogg");
        assert_eq!(p.bytes, b"OggS....");
    }

    #[test]
    fn unknown_audio_format_fails() {
        assert!(matches!(
            AudioDecoder.decode(&clip(2, b"adpcm")),
            Err(DecodeError::UnsupportedAudioFormat(2))
        ));
    }
}
