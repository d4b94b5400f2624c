//! Target formats for normalized comic pages.

use std::fmt;
use std::str::FromStr;

/// Lossy formats pages can be re-encoded to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TargetFormat {
    /// WebP, the default page format
    #[default]
    WebP,
    /// JPEG, for readers without WebP support
    Jpeg,
}

impl TargetFormat {
    /// Returns the file extension for this format
    pub fn extension(&self) -> &'static str {
        match self {
            TargetFormat::WebP => "webp",
            TargetFormat::Jpeg => "jpg",
        }
    }

    /// Get format names for CLI help text
    pub fn format_names() -> Vec<&'static str> {
        vec!["webp", "jpeg"]
    }
}

impl fmt::Display for TargetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TargetFormat::WebP => "WebP",
            TargetFormat::Jpeg => "JPEG",
        };
        write!(f, "{}", name)
    }
}

impl FromStr for TargetFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "webp" => Ok(TargetFormat::WebP),
            "jpeg" | "jpg" => Ok(TargetFormat::Jpeg),
            _ => Err(format!(
                "unsupported format '{}', expected one of: {}",
                s,
                TargetFormat::format_names().join(", ")
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_format_from_str() {
        assert_eq!(TargetFormat::from_str("webp").unwrap(), TargetFormat::WebP);
        assert_eq!(TargetFormat::from_str("WEBP").unwrap(), TargetFormat::WebP);
        assert_eq!(TargetFormat::from_str("jpg").unwrap(), TargetFormat::Jpeg);
        assert_eq!(TargetFormat::from_str("jpeg").unwrap(), TargetFormat::Jpeg);

        assert!(TargetFormat::from_str("png").is_err());
    }

    #[test]
    fn test_target_format_extension() {
        assert_eq!(TargetFormat::WebP.extension(), "webp");
        assert_eq!(TargetFormat::Jpeg.extension(), "jpg");
        assert_eq!(TargetFormat::default(), TargetFormat::WebP);
    }

    #[test]
    fn test_target_format_display() {
        assert_eq!(format!("{}", TargetFormat::WebP), "WebP");
        assert_eq!(format!("{}", TargetFormat::Jpeg), "JPEG");
    }
}
