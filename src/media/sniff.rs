use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use tracing::debug;

/// Number of leading bytes inspected for content sniffing.
pub const SNIFF_LEN: usize = 512;

pub const OCTET_STREAM: &str = "application/octet-stream";

/// Detect the MIME type of a file from its leading bytes, falling back to
/// the file extension when the content is not recognized.
pub fn detect_mime(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut buffer = Vec::with_capacity(SNIFF_LEN);
    file.by_ref().take(SNIFF_LEN as u64).read_to_end(&mut buffer)?;

    if let Some(mime) = sniff_mime(&buffer) {
        debug!("Sniffed {} from content of {}", mime, path.display());
        return Ok(mime.to_string());
    }

    let guess = mime_guess::from_path(path).first_or_octet_stream();
    debug!("Guessed {} from extension of {}", guess, path.display());
    Ok(guess.essence_str().to_string())
}

pub fn is_video(mime: &str) -> bool {
    mime.starts_with("video/")
}

/// Identify a content type from magic numbers.
pub fn sniff_mime(data: &[u8]) -> Option<&'static str> {
    if data.is_empty() {
        return None;
    }

    // ISO base media (MP4, MOV, 3GP): size:u32, "ftyp", major brand
    if data.len() >= 12 && &data[4..8] == b"ftyp" {
        let brand = &data[8..12];
        return Some(match brand {
            b"qt  " => "video/quicktime",
            b"M4A " | b"M4B " => "audio/mp4",
            _ if brand.starts_with(b"3g") => "video/3gpp",
            _ => "video/mp4",
        });
    }

    // EBML header: Matroska or WebM, told apart by the doctype
    if data.starts_with(b"\x1A\x45\xDF\xA3") {
        if contains(data, b"webm") {
            return Some("video/webm");
        }
        return Some("video/x-matroska");
    }

    if data.len() >= 12 && data.starts_with(b"RIFF") {
        match &data[8..12] {
            b"AVI " => return Some("video/avi"),
            b"WAVE" => return Some("audio/wav"),
            b"WEBP" => return Some("image/webp"),
            _ => {}
        }
    }

    if data.starts_with(b"\x00\x00\x01\xBA") || data.starts_with(b"\x00\x00\x01\xB3") {
        return Some("video/mpeg");
    }

    // MPEG transport stream: sync byte every 188 bytes
    if data.len() > 188 && data[0] == 0x47 && data[188] == 0x47 {
        return Some("video/mp2t");
    }

    if data.starts_with(b"FLV\x01") {
        return Some("video/x-flv");
    }

    if data.starts_with(b"OggS") {
        return Some("application/ogg");
    }

    if data.starts_with(b"%PDF") {
        return Some("application/pdf");
    }
    if data.starts_with(b"PK\x03\x04") {
        return Some("application/zip");
    }
    if data.starts_with(b"\x1F\x8B") {
        return Some("application/gzip");
    }
    if data.starts_with(b"Rar!\x1A\x07") {
        return Some("application/x-rar-compressed");
    }
    if data.starts_with(b"7z\xBC\xAF\x27\x1C") {
        return Some("application/x-7z-compressed");
    }
    if data.starts_with(b"\xFF\xD8\xFF") {
        return Some("image/jpeg");
    }
    if data.starts_with(b"\x89PNG\r\n\x1A\n") {
        return Some("image/png");
    }
    if data.starts_with(b"GIF87a") || data.starts_with(b"GIF89a") {
        return Some("image/gif");
    }
    if data.starts_with(b"ID3") {
        return Some("audio/mpeg");
    }

    None
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_sniff_mp4() {
        let header = b"\x00\x00\x00\x20ftypisom\x00\x00\x02\x00isomiso2avc1mp41";
        assert_eq!(sniff_mime(header), Some("video/mp4"));
    }

    #[test]
    fn test_sniff_quicktime() {
        assert_eq!(
            sniff_mime(b"\x00\x00\x00\x14ftypqt  \x00\x00\x00\x00"),
            Some("video/quicktime")
        );
    }

    #[test]
    fn test_sniff_matroska_and_webm() {
        let mut mkv = b"\x1A\x45\xDF\xA3\x9F\x42\x86\x81\x01\x42\x82\x88".to_vec();
        mkv.extend_from_slice(b"matroska");
        assert_eq!(sniff_mime(&mkv), Some("video/x-matroska"));

        let mut webm = b"\x1A\x45\xDF\xA3\x9F\x42\x86\x81\x01\x42\x82\x84".to_vec();
        webm.extend_from_slice(b"webm");
        assert_eq!(sniff_mime(&webm), Some("video/webm"));
    }

    #[test]
    fn test_sniff_avi_vs_wav() {
        assert_eq!(sniff_mime(b"RIFF\x00\x00\x00\x00AVI LIST"), Some("video/avi"));
        assert_eq!(sniff_mime(b"RIFF\x00\x00\x00\x00WAVEfmt "), Some("audio/wav"));
    }

    #[test]
    fn test_sniff_non_video() {
        assert_eq!(sniff_mime(b"PK\x03\x04rest"), Some("application/zip"));
        assert_eq!(sniff_mime(b"%PDF-1.7"), Some("application/pdf"));
        assert_eq!(sniff_mime(b"plain text"), None);
        assert_eq!(sniff_mime(b""), None);
    }

    #[test]
    fn test_is_video() {
        assert!(is_video("video/mp4"));
        assert!(!is_video("application/octet-stream"));
        assert!(!is_video("audio/mp4"));
    }

    #[test]
    fn test_detect_mime_prefers_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.mp4");
        let mut file = File::create(&path).unwrap();
        file.write_all(b"PK\x03\x04not really a video").unwrap();

        assert_eq!(detect_mime(&path).unwrap(), "application/zip");
    }

    #[test]
    fn test_detect_mime_extension_fallback() {
        let dir = tempfile::tempdir().unwrap();

        let path = dir.path().join("clip.mkv");
        std::fs::write(&path, b"unrecognized header").unwrap();
        assert!(is_video(&detect_mime(&path).unwrap()));

        let path = dir.path().join("blob.unknownext");
        std::fs::write(&path, b"unrecognized header").unwrap();
        assert_eq!(detect_mime(&path).unwrap(), OCTET_STREAM);
    }

    #[test]
    fn test_detect_mime_missing_file() {
        assert!(detect_mime(Path::new("/nonexistent/file.bin")).is_err());
    }
}
