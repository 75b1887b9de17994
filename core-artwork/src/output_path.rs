//! Templated wallpaper destination paths
//!
//! Templates may contain `{artist}` and `{album}`; anything else inside
//! braces made of letters and digits is rejected when the template is parsed,
//! so a bad template is caught before any track is processed.
//!
//! ```
//! use core_artwork::output_path::OutputPathFormatter;
//!
//! let formatter = OutputPathFormatter::parse("{artist}-{album}.png").unwrap();
//! let path = formatter.resolve("Air", "Moon Safari");
//! assert_eq!(path.to_str(), Some("Air-MoonSafari.png"));
//! ```

use crate::error::{ArtworkError, Result};
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Literal(String),
    Artist,
    Album,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPathFormatter {
    template: String,
    segments: Vec<Segment>,
}

impl OutputPathFormatter {
    /// Parses `template`
    ///
    /// # Errors
    ///
    /// [`ArtworkError::InvalidTemplate`] naming every unknown placeholder.
    pub fn parse(template: &str) -> Result<Self> {
        let mut segments = Vec::new();
        let mut unknown: Vec<String> = Vec::new();
        let mut literal = String::new();
        let mut rest = template;

        while let Some(open) = rest.find('{') {
            literal.push_str(&rest[..open]);
            let after = &rest[open + 1..];

            let placeholder = after
                .find('}')
                .map(|close| &after[..close])
                .filter(|name| name.chars().all(|c| c.is_ascii_alphanumeric()));

            let Some(name) = placeholder else {
                literal.push('{');
                rest = after;
                continue;
            };

            let segment = match name {
                "artist" => Some(Segment::Artist),
                "album" => Some(Segment::Album),
                other => {
                    if !unknown.iter().any(|seen| seen == other) {
                        unknown.push(other.to_string());
                    }
                    None
                }
            };
            if let Some(segment) = segment {
                if !literal.is_empty() {
                    segments.push(Segment::Literal(std::mem::take(&mut literal)));
                }
                segments.push(segment);
            }
            rest = &after[name.len() + 1..];
        }
        literal.push_str(rest);
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }

        if !unknown.is_empty() {
            let names: Vec<String> = unknown.iter().map(|name| format!("{{{}}}", name)).collect();
            return Err(ArtworkError::InvalidTemplate(format!(
                "unsupported placeholder(s) {} in \"{}\"; only {{artist}} and {{album}} are allowed",
                names.join(", "),
                template
            )));
        }

        Ok(Self {
            template: template.to_string(),
            segments,
        })
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Fills in the placeholders and expands a leading `~`
    pub fn resolve(&self, artist: &str, album: &str) -> PathBuf {
        let artist = sanitize(artist);
        let album = sanitize(album);

        let formatted: String = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::Artist => artist.as_str(),
                Segment::Album => album.as_str(),
            })
            .collect();

        expand_home(&formatted)
    }
}

/// Removes all whitespace and replaces path separators
fn sanitize(value: &str) -> String {
    value
        .chars()
        .filter(|c| !c.is_whitespace())
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect()
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix('~'), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest.trim_start_matches(['/', '\\'])),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_default_template() {
        let formatter = OutputPathFormatter::parse("{artist}-{album}.png").unwrap();
        assert_eq!(
            formatter.resolve("Air", "Moon Safari"),
            PathBuf::from("Air-MoonSafari.png")
        );
    }

    #[test]
    fn test_placeholders_map_to_their_own_values() {
        let formatter = OutputPathFormatter::parse("covers/{album}/{artist}.jpg").unwrap();
        assert_eq!(
            formatter.resolve("Daft Punk", "Discovery"),
            PathBuf::from("covers/Discovery/DaftPunk.jpg")
        );
    }

    #[test]
    fn test_rejects_unknown_placeholder() {
        let error = OutputPathFormatter::parse("{artist}-{unknown}.png").unwrap_err();
        match error {
            ArtworkError::InvalidTemplate(message) => assert!(message.contains("{unknown}")),
            other => panic!("unexpected error: {:?}", other),
        }

        assert!(OutputPathFormatter::parse("{}.png").is_err());
        assert!(OutputPathFormatter::parse("{Artist}.png").is_err());
    }

    #[test]
    fn test_non_placeholder_braces_are_literal() {
        let formatter = OutputPathFormatter::parse("{my art}/{artist}{.png").unwrap();
        assert_eq!(
            formatter.resolve("Air", "Moon Safari"),
            PathBuf::from("{my art}/Air{.png")
        );
    }

    #[test]
    fn test_separators_in_values_are_replaced() {
        let formatter = OutputPathFormatter::parse("{artist}-{album}.png").unwrap();
        assert_eq!(
            formatter.resolve("AC/DC", "Back\\In Black"),
            PathBuf::from("AC_DC-Back_InBlack.png")
        );
    }

    #[test]
    fn test_expands_home_directory() {
        let formatter = OutputPathFormatter::parse("~/Pictures/{artist}.png").unwrap();
        let resolved = formatter.resolve("Air", "Moon Safari");

        match dirs::home_dir() {
            Some(home) => assert_eq!(resolved, home.join("Pictures/Air.png")),
            None => assert_eq!(resolved, PathBuf::from("~/Pictures/Air.png")),
        }
    }
}
