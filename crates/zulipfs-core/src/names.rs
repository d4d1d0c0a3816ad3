//! Mapping between service-native names and filesystem path segments.
//!
//! Service names may contain `/`, which would introduce a spurious directory
//! level, and pictographic glyphs, which some filesystem layers mishandle.
//! `encode` and `decode` are mutual inverses for every name that does not
//! already contain one of the escape sequences verbatim.
//!
//! With decorative symbols, literal `:` is escaped before glyphs are replaced,
//! so every colon in an encoded segment delimits a `:shortcode:` alias.

use zulipfs_config::NameStrategy;

/// Reserved escape for the path separator.
pub const SEPARATOR_ESCAPE: &str = "%2F";

/// Reserved escape for a literal `:` under the decorative-symbols strategy.
pub const COLON_ESCAPE: &str = "%3A";

/// Longest glyph sequence (in chars) tried when matching a pictograph.
const MAX_GLYPH_CHARS: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct NameCodec {
    strategy: NameStrategy,
}

impl NameCodec {
    pub fn new(strategy: NameStrategy) -> Self {
        NameCodec { strategy }
    }

    pub fn strategy(&self) -> NameStrategy {
        self.strategy
    }

    /// Service name to path segment.
    pub fn encode(&self, name: &str) -> String {
        let escaped = name.replace('/', SEPARATOR_ESCAPE);
        match self.strategy {
            NameStrategy::EscapeOnly => escaped,
            NameStrategy::DecorativeSymbols => demojize(&escaped.replace(':', COLON_ESCAPE)),
        }
    }

    /// Path segment to service name.
    pub fn decode(&self, segment: &str) -> String {
        let restored = match self.strategy {
            NameStrategy::EscapeOnly => segment.to_string(),
            NameStrategy::DecorativeSymbols => emojize(segment).replace(COLON_ESCAPE, ":"),
        };
        restored.replace(SEPARATOR_ESCAPE, "/")
    }
}

/// Replace each reversible pictograph with `:shortcode:`.
fn demojize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(first) = rest.chars().next() {
        if first.is_ascii() {
            out.push(first);
            rest = &rest[first.len_utf8()..];
            continue;
        }

        match longest_glyph(rest) {
            Some((len, shortcode)) => {
                out.push(':');
                out.push_str(shortcode);
                out.push(':');
                rest = &rest[len..];
            }
            None => {
                out.push(first);
                rest = &rest[first.len_utf8()..];
            }
        }
    }

    out
}

/// Find the longest prefix of `s` that is a pictograph whose shortcode maps
/// back to exactly the same bytes. Returns the byte length and shortcode.
fn longest_glyph(s: &str) -> Option<(usize, &'static str)> {
    let ends: Vec<usize> = s
        .char_indices()
        .skip(1)
        .map(|(i, _)| i)
        .chain(std::iter::once(s.len()))
        .take(MAX_GLYPH_CHARS)
        .collect();

    ends.into_iter().rev().find_map(|end| {
        let candidate = &s[..end];
        let emoji = emojis::get(candidate)?;
        if emoji.as_str() != candidate {
            return None;
        }
        let shortcode = emoji.shortcode()?;
        let back = emojis::get_by_shortcode(shortcode)?;
        (back.as_str() == candidate).then_some((end, shortcode))
    })
}

/// Replace each `:shortcode:` with its pictograph. Unknown aliases and stray
/// colons are kept verbatim.
fn emojize(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find(':') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];

        let replaced = after.find(':').and_then(|close| {
            let alias = &after[..close];
            if alias.is_empty() {
                return None;
            }
            emojis::get_by_shortcode(alias).map(|e| (e.as_str(), close))
        });

        match replaced {
            Some((glyph, close)) => {
                out.push_str(glyph);
                rest = &after[close + 1..];
            }
            None => {
                // Keep the colon; the next one may open a real alias.
                out.push(':');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn escape_only() -> NameCodec {
        NameCodec::new(NameStrategy::EscapeOnly)
    }

    fn decorative() -> NameCodec {
        NameCodec::new(NameStrategy::DecorativeSymbols)
    }

    const SAMPLE_NAMES: &[&str] = &[
        "general",
        "design-review",
        "frontend/backend sync",
        "a/b/c",
        "/leading and trailing/",
        "🎉 launch party",
        "release 🚀🚀",
        "caf\u{e9} cr\u{e8}me",
        "time 10:30 🎉",
        "hi:rocket🎉",
        "x:tada:",
        ":tada:🎉",
        "a:b:🚀:c",
        "a:🎉",
        "🎉:",
        "::",
        "❤️ team",
        "\u{2764} bare heart",
        "👨‍👩‍👧 family",
        "日本語のトピック",
        "",
    ];

    #[test]
    fn test_escape_separator() {
        let codec = escape_only();
        assert_eq!(codec.encode("frontend/backend"), "frontend%2Fbackend");
        assert_eq!(codec.decode("frontend%2Fbackend"), "frontend/backend");
        assert!(!codec.encode("a/b/c").contains('/'));
    }

    #[test]
    fn test_decorative_escapes_literal_colons() {
        let codec = decorative();
        assert_eq!(codec.encode("hi:rocket🎉"), "hi%3Arocket:tada:");
        assert_eq!(codec.decode("hi%3Arocket:tada:"), "hi:rocket🎉");
        assert_eq!(codec.encode(":tada:"), "%3Atada%3A");
        assert_eq!(codec.decode("%3Atada%3A"), ":tada:");
    }

    #[test]
    fn test_decorative_typed_colons_still_decode() {
        // Segments typed by a user rather than produced by encode.
        let codec = decorative();
        assert_eq!(codec.decode("standup 10:30"), "standup 10:30");
        assert_eq!(codec.decode(":rocket: launch"), "🚀 launch");
    }

    #[test]
    fn test_escape_only_keeps_glyphs() {
        let codec = escape_only();
        assert_eq!(codec.encode("🎉 launch"), "🎉 launch");
        assert_eq!(codec.decode(":tada: launch"), ":tada: launch");
    }

    #[test]
    fn test_decorative_replaces_glyphs() {
        let codec = decorative();
        assert_eq!(codec.encode("🎉 launch"), ":tada: launch");
        assert_eq!(codec.encode("ship it 🚀"), "ship it :rocket:");
        assert_eq!(codec.decode(":tada: launch"), "🎉 launch");
    }

    #[test]
    fn test_decorative_combines_with_escape() {
        let codec = decorative();
        let encoded = codec.encode("🚀/ops");
        assert_eq!(encoded, ":rocket:%2Fops");
        assert_eq!(codec.decode(&encoded), "🚀/ops");
    }

    #[test]
    fn test_decorative_encoding_is_ascii_for_glyph_names() {
        let codec = decorative();
        assert!(codec.encode("🎉🚀").is_ascii());
    }

    #[test]
    fn test_non_pictograph_unicode_untouched() {
        let codec = decorative();
        assert_eq!(codec.encode("caf\u{e9}"), "caf\u{e9}");
        assert_eq!(codec.encode("日本語"), "日本語");
    }

    #[test]
    fn test_unknown_alias_kept() {
        let codec = decorative();
        assert_eq!(codec.decode(":not_a_real_alias_xyz:"), ":not_a_real_alias_xyz:");
        assert_eq!(codec.decode("10:30"), "10:30");
        assert_eq!(codec.decode("trailing:"), "trailing:");
    }

    #[test]
    fn test_round_trip_escape_only() {
        let codec = escape_only();
        for name in SAMPLE_NAMES {
            assert_eq!(codec.decode(&codec.encode(name)), *name, "name: {:?}", name);
        }
    }

    #[test]
    fn test_round_trip_decorative() {
        let codec = decorative();
        for name in SAMPLE_NAMES {
            assert_eq!(codec.decode(&codec.encode(name)), *name, "name: {:?}", name);
        }
    }

    #[test]
    fn test_encoded_segments_never_contain_separator() {
        for codec in [escape_only(), decorative()] {
            for name in SAMPLE_NAMES {
                assert!(!codec.encode(name).contains('/'), "name: {:?}", name);
            }
        }
    }
}
