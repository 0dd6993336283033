use crate::error::UploadError;
use crate::utils::mime_types::{MimeMap, file_type_for_mime};
use std::path::Path;

const KB: u64 = 1024;
const MB: u64 = 1024 * 1024;
const GB: u64 = 1024 * 1024 * 1024;

/// Human readable size using binary thresholds: `"1.50 MB"`, `"512 bytes"`.
pub fn format_size_units(bytes: u64) -> String {
    if bytes >= GB {
        format!("{} GB", format_decimal(bytes as f64 / GB as f64))
    } else if bytes >= MB {
        format!("{} MB", format_decimal(bytes as f64 / MB as f64))
    } else if bytes >= KB {
        format!("{} kB", format_decimal(bytes as f64 / KB as f64))
    } else if bytes > 1 {
        format!("{} bytes", bytes)
    } else if bytes == 1 {
        "1 byte".to_string()
    } else {
        "0 bytes".to_string()
    }
}

/// Two decimals, half away from zero, comma thousands separator.
fn format_decimal(value: f64) -> String {
    let cents = (value * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let fraction = cents % 100;

    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    format!("{}.{:02}", grouped, fraction)
}

pub fn format_size_in_kb(bytes: u64) -> f64 {
    bytes as f64 / KB as f64
}

/// Parses shorthand sizes such as `"2M"`, `"512k"` or `"1G"`. Only the leading
/// digits count; anything unparseable is zero.
pub fn size_in_bytes(value: &str) -> u64 {
    let value = value.trim();
    let digits: String = value.chars().take_while(|c| c.is_ascii_digit()).collect();
    let base: u64 = digits.parse().unwrap_or(0);

    match value.chars().last().map(|c| c.to_ascii_lowercase()) {
        Some('g') => base.saturating_mul(GB),
        Some('m') => base.saturating_mul(MB),
        Some('k') => base.saturating_mul(KB),
        _ => base,
    }
}

/// Validates file size against the resolved ceiling
pub fn validate_file_size(size: u64, max_size: u64) -> Result<(), UploadError> {
    if size > max_size {
        return Err(UploadError::FileTooBig {
            size: format_size_units(size),
            limit: format_size_units(max_size),
        });
    }
    Ok(())
}

/// Validates the declared MIME type against a field allow-list of extensions.
/// An empty allow-list admits everything.
pub fn validate_file_type(
    mime_type: &str,
    allowed: &[String],
    map: &MimeMap,
) -> Result<(), UploadError> {
    if allowed.is_empty() {
        return Ok(());
    }

    let ext = file_type_for_mime(mime_type, map);
    if ext.is_some_and(|ext| allowed.iter().any(|a| a == ext)) {
        return Ok(());
    }

    tracing::debug!(
        "Rejected type '{}' (extension {:?}), allowed: {:?}",
        mime_type,
        ext,
        allowed
    );
    Err(UploadError::Validation(format!(
        "Allowed files types are: {}",
        allowed.join(", ")
    )))
}

/// Sanitizes filename to prevent path traversal and injection attacks
pub fn sanitize_filename(filename: &str) -> Option<String> {
    // Get only the filename component (remove any path)
    let name = filename.rsplit(&['/', '\\'][..]).next().unwrap_or("");
    let name = Path::new(name)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("");

    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        tracing::warn!("Path components stripped from upload name: {}", filename);
    }

    let sanitized: String = name
        .chars()
        .map(|c| {
            if c.is_control() || c.is_whitespace() {
                '-'
            } else if matches!(
                c,
                ':' | '*' | '?' | '"' | '<' | '>' | '|' | ';' | '&' | '%' | '#' | '$' | '\''
            ) {
                '_'
            } else {
                c
            }
        })
        .collect();
    let sanitized = sanitized.trim_start_matches('.').to_string();

    // Limit length safely for UTF-8
    let sanitized = if sanitized.len() > 255 {
        let mut end = 255;
        while !sanitized.is_char_boundary(end) {
            end -= 1;
        }
        sanitized[..end].to_string()
    } else {
        sanitized
    };

    if sanitized.is_empty() {
        None
    } else {
        Some(sanitized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size_units() {
        assert_eq!(format_size_units(0), "0 bytes");
        assert_eq!(format_size_units(1), "1 byte");
        assert_eq!(format_size_units(2), "2 bytes");
        assert_eq!(format_size_units(1023), "1023 bytes");
        assert_eq!(format_size_units(1024), "1.00 kB");
        assert_eq!(format_size_units(2048), "2.00 kB");
        assert_eq!(format_size_units(1536), "1.50 kB");
        assert_eq!(format_size_units(500_000), "488.28 kB");
        assert_eq!(format_size_units(MB), "1.00 MB");
        assert_eq!(format_size_units(2_000_000), "1.91 MB");
        assert_eq!(format_size_units(1_073_741_824), "1.00 GB");
        assert_eq!(format_size_units(1500 * GB), "1,500.00 GB");
    }

    #[test]
    fn test_size_in_bytes() {
        assert_eq!(size_in_bytes("300k"), 300 * 1024);
        assert_eq!(size_in_bytes("2M"), 2 * MB);
        assert_eq!(size_in_bytes(" 1g "), GB);
        assert_eq!(size_in_bytes("4096"), 4096);
        assert_eq!(size_in_bytes(""), 0);
        assert_eq!(size_in_bytes("lots"), 0);
    }

    #[test]
    fn test_format_size_in_kb() {
        assert_eq!(format_size_in_kb(2048), 2.0);
        assert_eq!(format_size_in_kb(512), 0.5);
    }

    #[test]
    fn test_validate_file_size() {
        assert!(validate_file_size(1024, 1024).is_ok());
        assert!(validate_file_size(0, 0).is_ok());

        let err = validate_file_size(2048, 1024).unwrap_err();
        assert!(err.to_string().contains("2.00 kB"));
        assert!(err.to_string().contains("1.00 kB"));

        // Nothing is accepted when no limit is known
        assert!(validate_file_size(1, 0).is_err());
    }

    #[test]
    fn test_validate_file_type() {
        let map = MimeMap::default();
        let allowed = vec!["jpg".to_string(), "png".to_string()];

        assert!(validate_file_type("image/jpeg", &allowed, &map).is_ok());
        assert!(validate_file_type("image/png", &allowed, &map).is_ok());

        let err = validate_file_type("image/gif", &allowed, &map).unwrap_err();
        assert_eq!(err.to_string(), "Allowed files types are: jpg, png");

        // Unknown MIME types never match a restricted list
        assert!(validate_file_type("application/x-msdownload", &allowed, &map).is_err());

        // Unrestricted
        assert!(validate_file_type("application/x-msdownload", &[], &map).is_ok());
    }

    #[test]
    fn test_sanitize_filename() {
        assert_eq!(sanitize_filename("cv.pdf").as_deref(), Some("cv.pdf"));
        assert_eq!(
            sanitize_filename("my photo.png").as_deref(),
            Some("my-photo.png")
        );
        assert_eq!(
            sanitize_filename("../../../etc/passwd").as_deref(),
            Some("passwd")
        );
        assert_eq!(
            sanitize_filename("..\\..\\windows\\evil.txt").as_deref(),
            Some("evil.txt")
        );
        assert_eq!(
            sanitize_filename("a<b>.jpg").as_deref(),
            Some("a_b_.jpg")
        );
        assert_eq!(sanitize_filename("履歴書.pdf").as_deref(), Some("履歴書.pdf"));
        assert_eq!(sanitize_filename(".htaccess").as_deref(), Some("htaccess"));
        assert_eq!(sanitize_filename("/"), None);
    }
}
