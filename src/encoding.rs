use std::borrow::Cow;
use std::fmt;

use chardetng::EncodingDetector;
use encoding_rs::{EncoderResult, Encoding, UTF_8};

/// Byte written in place of a character the target encoding cannot represent.
pub const REPLACEMENT_BYTE: u8 = b'?';

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectionSource {
    Bom,
    Utf8,
    Detector,
}

impl fmt::Display for DetectionSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            DetectionSource::Bom => "bom",
            DetectionSource::Utf8 => "utf8",
            DetectionSource::Detector => "detector",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct DetectedEncoding {
    pub encoding: &'static Encoding,
    pub confidence: f32,
    pub source: DetectionSource,
}

impl DetectedEncoding {
    pub fn name(&self) -> &'static str {
        self.encoding.name()
    }
}

/// Guesses the source encoding of a whole file.
pub trait CharsetDetector {
    fn detect(&self, bytes: &[u8]) -> Option<DetectedEncoding>;

    fn describe(&self) -> &'static str;
}

/// BOM sniffing, then a UTF-8 validity check, then chardetng's statistical guess.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChardetDetector;

impl CharsetDetector for ChardetDetector {
    fn detect(&self, bytes: &[u8]) -> Option<DetectedEncoding> {
        Some(detect_auto(bytes))
    }

    fn describe(&self) -> &'static str {
        "chardetng (BOM → UTF-8 → statistical guess)"
    }
}

fn detect_auto(bytes: &[u8]) -> DetectedEncoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return DetectedEncoding {
            encoding,
            confidence: 1.0,
            source: DetectionSource::Bom,
        };
    }

    if std::str::from_utf8(bytes).is_ok() {
        return DetectedEncoding {
            encoding: UTF_8,
            confidence: 1.0,
            source: DetectionSource::Utf8,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let (encoding, confident) = detector.guess_assess(None, true);

    DetectedEncoding {
        encoding,
        confidence: if confident { 0.9 } else { 0.5 },
        source: DetectionSource::Detector,
    }
}

/// Strict decode: malformed input yields `None` instead of U+FFFD.
/// A leading BOM for the detected encoding is dropped and line endings are
/// normalized to `\n`.
pub fn decode_strict(bytes: &[u8], detected: &DetectedEncoding) -> Option<String> {
    let body = match Encoding::for_bom(bytes) {
        Some((encoding, bom_len)) if encoding == detected.encoding => &bytes[bom_len..],
        _ => bytes,
    };
    let text = detected
        .encoding
        .decode_without_bom_handling_and_without_replacement(body)?;
    Some(normalize_to_lf(&text).into_owned())
}

/// Rewrites `\r\n` and lone `\r` line endings as `\n`.
pub fn normalize_to_lf(text: &str) -> Cow<'_, str> {
    if text.contains('\r') {
        Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        Cow::Borrowed(text)
    }
}

#[derive(Debug, Clone)]
pub struct EncodedText {
    pub bytes: Vec<u8>,
    pub replaced: usize,
}

/// Encodes `text`, writing [`REPLACEMENT_BYTE`] for every unmappable character.
pub fn encode_lossy(text: &str, encoding: &'static Encoding) -> Result<EncodedText, String> {
    if encoding.output_encoding() != encoding {
        return Err(format!(
            "{} cannot be used as an output encoding",
            encoding.name()
        ));
    }

    let mut encoder = encoding.new_encoder();
    let capacity = encoder
        .max_buffer_length_from_utf8_without_replacement(text.len())
        .ok_or_else(|| format!("{} bytes of input overflow the output buffer", text.len()))?;
    let mut bytes = Vec::with_capacity(capacity);
    let mut replaced = 0usize;
    let mut remaining = text;

    loop {
        let (result, read) =
            encoder.encode_from_utf8_to_vec_without_replacement(remaining, &mut bytes, true);
        remaining = &remaining[read..];
        match result {
            EncoderResult::InputEmpty => break,
            EncoderResult::Unmappable(_) => {
                bytes.push(REPLACEMENT_BYTE);
                replaced += 1;
            }
            EncoderResult::OutputFull => {
                let extra = encoder
                    .max_buffer_length_from_utf8_without_replacement(remaining.len())
                    .ok_or_else(|| "output buffer overflow".to_string())?;
                bytes.reserve(extra);
            }
        }
    }

    Ok(EncodedText { bytes, replaced })
}

/// Re-decodes written bytes in the target encoding; `None` when they do not round-trip.
pub fn verify(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    encoding
        .decode_without_bom_handling_and_without_replacement(bytes)
        .map(Cow::into_owned)
}

#[cfg(test)]
mod tests {
    use super::*;
    use encoding_rs::{BIG5, UTF_16LE};

    #[test]
    fn utf8_detection_without_bom() {
        let detected = ChardetDetector.detect("中文 record".as_bytes()).expect("detector");
        assert_eq!(detected.source, DetectionSource::Utf8);
        assert_eq!(detected.name(), "UTF-8");
        assert_eq!(detected.confidence, 1.0);
    }

    #[test]
    fn bom_detection_takes_precedence() {
        let data = [0xFF, 0xFE, 0x61, 0x00];
        let detected = detect_auto(&data);
        assert_eq!(detected.source, DetectionSource::Bom);
        assert_eq!(detected.encoding, UTF_16LE);
    }

    #[test]
    fn non_utf8_bytes_go_through_statistical_guess() {
        let (bytes, _, _) = BIG5.encode("臺灣地區入出境資料，姓名欄位與日期欄位");
        let detected = detect_auto(&bytes);
        assert_eq!(detected.source, DetectionSource::Detector);
        assert!(detected.confidence > 0.0 && detected.confidence <= 1.0);
    }

    #[test]
    fn strict_decode_strips_bom_and_normalizes_newlines() {
        let data = b"\xEF\xBB\xBFone\r\ntwo\rthree\n";
        let detected = detect_auto(data);
        let text = decode_strict(data, &detected).expect("valid utf-8");
        assert_eq!(text, "one\ntwo\nthree\n");
    }

    #[test]
    fn lf_only_text_is_borrowed() {
        assert!(matches!(normalize_to_lf("a\nb\n"), Cow::Borrowed("a\nb\n")));
        assert_eq!(normalize_to_lf("a\r\r\nb\r"), "a\n\nb\n");
    }

    #[test]
    fn strict_decode_rejects_malformed_input() {
        let detected = DetectedEncoding {
            encoding: UTF_8,
            confidence: 0.5,
            source: DetectionSource::Detector,
        };
        assert!(decode_strict(&[0x61, 0xFF, 0x62], &detected).is_none());
    }

    #[test]
    fn unmappable_characters_are_replaced_and_counted() {
        let encoded = encode_lossy("中😀文🎉", BIG5).expect("encodes");
        assert_eq!(encoded.replaced, 2);
        let round_trip = verify(&encoded.bytes, BIG5).expect("valid big5");
        assert_eq!(round_trip, "中?文?");
    }

    #[test]
    fn ascii_encodes_unchanged() {
        let encoded = encode_lossy("I!A123\r\n", BIG5).expect("encodes");
        assert_eq!(encoded.bytes, b"I!A123\r\n");
        assert_eq!(encoded.replaced, 0);
    }

    #[test]
    fn utf16_is_not_an_output_encoding() {
        assert!(encode_lossy("abc", UTF_16LE).is_err());
    }

    #[test]
    fn verify_rejects_truncated_big5() {
        assert!(verify(&[0xA4], BIG5).is_none());
    }
}
