//! Format hints and codec identification.

use bridge_traits::AudioCodec;
use symphonia::core::codecs::CodecType;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};
use url::Url;

/// Builds Symphonia format hints from what the transport tells us about a
/// resource, and maps Symphonia codec types onto [`AudioCodec`].
pub struct FormatDetector;

impl FormatDetector {
    /// Hint from the URL's file extension and the response `Content-Type`.
    ///
    /// Either source may be missing; detection then falls back to sniffing
    /// the container.
    pub fn hint_for(url: &str, content_type: Option<&str>) -> Hint {
        let mut hint = Hint::new();

        if let Some(extension) = Self::extension_from_url(url) {
            debug!("Setting format hint extension: {}", extension);
            hint.with_extension(&extension);
        }

        let mime = content_type
            .and_then(|value| value.split(';').next())
            .map(str::trim)
            .filter(|mime| !mime.is_empty() && *mime != "application/octet-stream");
        if let Some(mime) = mime {
            debug!("Setting format hint MIME type: {}", mime);
            hint.mime_type(mime);
        }

        hint
    }

    /// Lower-cased extension of the last path segment, ignoring query and
    /// fragment.
    pub fn extension_from_url(url: &str) -> Option<String> {
        let parsed = Url::parse(url).ok()?;
        let file = parsed.path_segments()?.last()?;
        let (stem, extension) = file.rsplit_once('.')?;
        if stem.is_empty() || extension.is_empty() {
            return None;
        }
        Some(extension.to_ascii_lowercase())
    }

    /// Convert Symphonia's `CodecType` to [`AudioCodec`].
    pub fn detect_codec(codec_type: CodecType) -> AudioCodec {
        use symphonia::core::codecs::*;

        if codec_type == CODEC_TYPE_MP3 {
            AudioCodec::Mp3
        } else if codec_type == CODEC_TYPE_AAC {
            AudioCodec::Aac
        } else if codec_type == CODEC_TYPE_FLAC {
            AudioCodec::Flac
        } else if codec_type == CODEC_TYPE_VORBIS {
            AudioCodec::Vorbis
        } else if codec_type == CODEC_TYPE_OPUS {
            AudioCodec::Opus
        } else if codec_type == CODEC_TYPE_ALAC {
            AudioCodec::Alac
        } else if codec_type == CODEC_TYPE_PCM_S16LE
            || codec_type == CODEC_TYPE_PCM_S16BE
            || codec_type == CODEC_TYPE_PCM_S24LE
            || codec_type == CODEC_TYPE_PCM_S24BE
            || codec_type == CODEC_TYPE_PCM_S32LE
            || codec_type == CODEC_TYPE_PCM_S32BE
            || codec_type == CODEC_TYPE_PCM_U8
            || codec_type == CODEC_TYPE_PCM_F32LE
            || codec_type == CODEC_TYPE_PCM_F32BE
            || codec_type == CODEC_TYPE_PCM_F64LE
            || codec_type == CODEC_TYPE_PCM_F64BE
        {
            AudioCodec::Wav
        } else {
            warn!("Unknown codec type: {:?}", codec_type);
            AudioCodec::Unknown
        }
    }

    /// MIME type commonly served for a codec.
    pub fn codec_mime_type(codec: &AudioCodec) -> &'static str {
        match codec {
            AudioCodec::Mp3 => "audio/mpeg",
            AudioCodec::Aac | AudioCodec::Alac => "audio/mp4",
            AudioCodec::Flac => "audio/flac",
            AudioCodec::Vorbis => "audio/ogg",
            AudioCodec::Opus => "audio/opus",
            AudioCodec::Wav => "audio/wav",
            AudioCodec::Unknown | AudioCodec::Other(_) => "application/octet-stream",
        }
    }
}
