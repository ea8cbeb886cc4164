//! HTML-to-chat text normalization.
//!
//! Every pass is a separate pure function; [`Normalizer::normalize`] chains
//! them in a fixed order:
//!
//! 1. letter-spaced word reassembly
//! 2. hashtag-search anchors to `#tag`
//! 3. generic anchors to `text <href>`
//! 4. tag stripping (line breaks become newlines)
//! 5. entity unescaping
//! 6. emoji spacing
//! 7. whitespace collapsing
//! 8. em-dash isolation
//! 9. newline before `HH:MM AM/PM` times
//! 10. trim

use {regex::Regex, tgbridge_telegram::is_placeholder};

use crate::{Error, Result};

// Private-use markers wrapping the `<href>` tokens emitted by the anchor pass
// so tag stripping leaves them alone. Restored before emoji spacing, whose
// ranges cover the private-use area.
const HREF_OPEN: char = '\u{E000}';
const HREF_CLOSE: char = '\u{E001}';

/// An image reference found in a post body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageRef {
    /// Absolute HTTP(S) URL usable as-is.
    Direct(String),
    /// Unresolved media URL that needs the media resolver.
    Placeholder(String),
}

/// Display text and the images extracted from one body.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    pub images: Vec<ImageRef>,
}

/// Compiled patterns for the normalization passes.
pub struct Normalizer {
    hashtag: Regex,
    anchor: Regex,
    line_break: Regex,
    tag: Regex,
    blank_lines: Regex,
    clock_time: Regex,
    image: Regex,
}

fn compile(pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| Error::external(format!("invalid pattern {pattern}"), e))
}

impl Normalizer {
    pub fn new() -> Result<Self> {
        Ok(Self {
            hashtag: compile(r#"<a href="[^"]+\?q=%23([^"]+)">#[^<]+</a>"#)?,
            anchor: compile(r#"<a href="([^"]+)"[^>]*>([^<]+)</a>"#)?,
            line_break: compile(r"(?i)<br\s*/?>")?,
            tag: compile(r"<[^>]+>")?,
            blank_lines: compile(r"\n\s*\n+")?,
            clock_time: compile(r"(\d{2}:\d{2} [AP]M)")?,
            image: compile(r#"<img[^>]+src="([^"]+)"[^>]*>"#)?,
        })
    }

    /// Run every pass over `raw_html` and extract its images.
    pub fn normalize(&self, raw_html: &str) -> Normalized {
        Normalized {
            text: self.clean_text(raw_html),
            images: self.extract_images(raw_html),
        }
    }

    /// The text half of [`normalize`](Self::normalize).
    pub fn clean_text(&self, raw_html: &str) -> String {
        let text = reassemble_spaced_letters(raw_html);
        let text = self.rewrite_hashtags(&text);
        let text = self.rewrite_anchors(&text);
        let text = self.strip_tags(&text);
        let text = unescape_entities(&text);
        let text = space_emoji(&text);
        let text = self.collapse_whitespace(&text);
        let text = isolate_em_dashes(&text);
        let text = self.break_before_times(&text);
        text.trim().to_string()
    }

    /// `<a href="...?q=%23tag">#tag</a>` → `#tag`.
    pub fn rewrite_hashtags(&self, text: &str) -> String {
        self.hashtag.replace_all(text, "#${1}").into_owned()
    }

    /// Anchor whose text equals its href → `<href>`, otherwise `text <href>`.
    pub fn rewrite_anchors(&self, text: &str) -> String {
        self.anchor
            .replace_all(text, |caps: &regex::Captures<'_>| {
                let href = &caps[1];
                let label = &caps[2];
                if href == label {
                    format!("{HREF_OPEN}{href}{HREF_CLOSE}")
                } else {
                    format!("{label} {HREF_OPEN}{href}{HREF_CLOSE}")
                }
            })
            .into_owned()
    }

    /// Drop markup; `<br>` becomes a newline. Link tokens from
    /// [`rewrite_anchors`](Self::rewrite_anchors) come out as `<href>`.
    pub fn strip_tags(&self, text: &str) -> String {
        let text = self.line_break.replace_all(text, "\n");
        self.tag
            .replace_all(&text, "")
            .replace(HREF_OPEN, "<")
            .replace(HREF_CLOSE, ">")
    }

    /// Single spaces, at most one blank line in a row.
    pub fn collapse_whitespace(&self, text: &str) -> String {
        let mut spaced = String::with_capacity(text.len());
        let mut previous_space = false;
        for c in text.chars() {
            if c == ' ' && previous_space {
                continue;
            }
            previous_space = c == ' ';
            spaced.push(c);
        }
        self.blank_lines.replace_all(&spaced, "\n\n").into_owned()
    }

    /// Newline before each `HH:MM AM/PM` token.
    pub fn break_before_times(&self, text: &str) -> String {
        self.clock_time.replace_all(text, "\n${1}").into_owned()
    }

    /// `<img src>` values in document order. Placeholders are kept for the
    /// resolver; anything that is not an absolute HTTP(S) URL is dropped.
    pub fn extract_images(&self, raw_html: &str) -> Vec<ImageRef> {
        self.image
            .captures_iter(raw_html)
            .filter_map(|caps| {
                let src = caps[1].replace("&amp;", "&");
                if is_placeholder(&src) {
                    Some(ImageRef::Placeholder(src))
                } else if is_direct_image_url(&src) {
                    Some(ImageRef::Direct(src))
                } else {
                    None
                }
            })
            .collect()
    }
}

fn is_direct_image_url(src: &str) -> bool {
    if src.chars().any(char::is_whitespace) {
        return false;
    }
    reqwest::Url::parse(src)
        .is_ok_and(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
}

/// Whether a body is mostly letter-spaced: more `' '` characters than half
/// the number of other characters.
pub fn is_spaced_text(text: &str) -> bool {
    let spaces = text.chars().filter(|c| *c == ' ').count();
    let others = text.chars().count() - spaces;
    spaces * 2 > others
}

/// Remove all whitespace from a letter-spaced body.
pub fn remove_whitespace(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

/// Collapse runs of two or more single letters separated by single spaces:
/// `"H e l l o world"` → `"Hello world"`. Works line by line.
pub fn reassemble_spaced_letters(text: &str) -> String {
    text.split('\n')
        .map(reassemble_line)
        .collect::<Vec<_>>()
        .join("\n")
}

fn is_single_letter(token: &str) -> bool {
    let mut chars = token.chars();
    matches!((chars.next(), chars.next()), (Some(c), None) if c.is_alphabetic())
}

fn reassemble_line(line: &str) -> String {
    let tokens: Vec<&str> = line.split(' ').collect();
    let mut out: Vec<String> = Vec::with_capacity(tokens.len());
    let mut i = 0;
    while i < tokens.len() {
        let run = tokens[i..]
            .iter()
            .take_while(|t| is_single_letter(t))
            .count();
        if run >= 2 {
            out.push(tokens[i..i + run].concat());
            i += run;
        } else {
            out.push(tokens[i].to_string());
            i += 1;
        }
    }
    out.join(" ")
}

/// Decode the entities feeds leave behind. `&amp;` goes last so `&amp;lt;`
/// stays `&lt;`.
pub fn unescape_entities(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&nbsp;", " ")
        .replace("&amp;", "&")
}

/// Whether `c` falls in one of the emoji-spacing ranges.
pub fn is_emoji(c: char) -> bool {
    matches!(
        c as u32,
        0x1F1E0..=0x1F1FF
            | 0x1F300..=0x1F5FF
            | 0x1F600..=0x1F64F
            | 0x1F680..=0x1F6FF
            | 0x1F700..=0x1F77F
            | 0x1F780..=0x1F7FF
            | 0x1F800..=0x1F8FF
            | 0x1F900..=0x1F9FF
            | 0x1FA00..=0x1FA6F
            | 0x1FA70..=0x1FAFF
            | 0x2702..=0x27B0
            | 0x24C2..=0x1F251
    )
}

/// Joiners and selectors that belong to the emoji before them.
fn is_emoji_joiner(c: char) -> bool {
    matches!(c, '\u{200D}' | '\u{FE0E}' | '\u{FE0F}' | '\u{20E3}')
}

/// Put a single space between emoji and adjacent non-space characters:
/// `"hi😀bye"` → `"hi 😀 bye"`.
///
/// Emoji next to emoji get no space, unlike a strict per-codepoint rule.
/// Skin-tone modifiers and ZWJ sequences would otherwise split into their
/// parts.
pub fn space_emoji(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    let mut previous: Option<char> = None;
    for c in text.chars() {
        if let Some(p) = previous {
            let p_emoji = is_emoji(p) || is_emoji_joiner(p);
            let c_emoji = is_emoji(c) || is_emoji_joiner(c);
            if p_emoji != c_emoji && !p.is_whitespace() && !c.is_whitespace() {
                out.push(' ');
            }
        }
        out.push(c);
        previous = Some(c);
    }
    out
}

/// `—` on its own line.
pub fn isolate_em_dashes(text: &str) -> String {
    text.replace('—', "\n—\n")
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn normalizer() -> Normalizer {
        Normalizer::new().unwrap()
    }

    #[rstest]
    #[case("H e l l o world", "Hello world")]
    #[case("I am a cat", "I am a cat")]
    #[case("W O W\nn e w s today", "WOW\nnews today")]
    #[case("x  y", "x  y")]
    fn reassembles_letter_spacing(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(reassemble_spaced_letters(input), expected);
    }

    #[rstest]
    #[case("H e l l o", true)]
    #[case("Hello world", false)]
    #[case("", false)]
    #[case("a b", false)]
    #[case("a b c", true)]
    fn detects_spaced_text(#[case] input: &str, #[case] expected: bool) {
        assert_eq!(is_spaced_text(input), expected);
    }

    #[test]
    fn removes_all_whitespace() {
        assert_eq!(remove_whitespace("H e l\nl o"), "Hello");
    }

    #[test]
    fn rewrites_hashtag_search_links() {
        let n = normalizer();
        assert_eq!(
            n.rewrite_hashtags(r#"see <a href="https://t.me/s/furcon?q=%23furcon2024">#furcon2024</a>!"#),
            "see #furcon2024!"
        );
    }

    #[rstest]
    #[case(r#"<a href="https://x.com">https://x.com</a>"#, "<https://x.com>")]
    #[case(r#"<a href="https://x.com">Click</a>"#, "Click <https://x.com>")]
    #[case(
        r#"Tickets: <a href="https://t.co/a" target="_blank">here</a>."#,
        "Tickets: here <https://t.co/a>."
    )]
    fn rewrites_links(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(normalizer().clean_text(input), expected);
    }

    #[test]
    fn strips_tags_but_keeps_link_tokens() {
        let n = normalizer();
        let anchored = n.rewrite_anchors(r#"<b>Bold</b> <a href="https://x.com">x</a><br/>next"#);
        assert_eq!(n.strip_tags(&anchored), "Bold x <https://x.com>\nnext");
    }

    #[test]
    fn unescapes_amp_last() {
        assert_eq!(unescape_entities("Tom &amp; Jerry"), "Tom & Jerry");
        assert_eq!(unescape_entities("&amp;lt;"), "&lt;");
        assert_eq!(unescape_entities("a&nbsp;b &quot;c&quot;"), "a b \"c\"");
    }

    #[rstest]
    #[case("hi😀bye", "hi 😀 bye")]
    #[case("hi 😀 bye", "hi 😀 bye")]
    #[case("go🎉🎉!", "go 🎉🎉 !")]
    #[case("👍🏽ok", "👍🏽 ok")]
    #[case("❤\u{FE0F}x", "❤\u{FE0F} x")]
    #[case("plain text", "plain text")]
    fn spaces_emoji(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(space_emoji(input), expected);
    }

    #[test]
    fn collapses_spaces_and_blank_lines() {
        let n = normalizer();
        assert_eq!(n.collapse_whitespace("a   b\n\n\n\nc"), "a b\n\nc");
        assert_eq!(n.collapse_whitespace("a\n \n\nb"), "a\n\nb");
    }

    #[test]
    fn isolates_em_dash() {
        assert_eq!(isolate_em_dashes("before—after"), "before\n—\nafter");
    }

    #[test]
    fn breaks_before_clock_times() {
        let n = normalizer();
        assert_eq!(
            n.break_before_times("Doors 09:30 AM and 11:00 PM"),
            "Doors \n09:30 AM and \n11:00 PM"
        );
    }

    #[test]
    fn full_pipeline_on_a_post() {
        let n = normalizer();
        let html = concat!(
            "<p>Registration is <b>open</b>&amp; tickets are live 🎟",
            "<br>Info: <a href=\"https://furcon.example\">https://furcon.example</a></p>",
            "<p>Tags: <a href=\"https://t.me/s/furcon?q=%23furcon\">#furcon</a></p>",
        );
        assert_eq!(
            n.clean_text(html),
            "Registration is open& tickets are live 🎟\nInfo: <https://furcon.example>Tags: #furcon"
        );
    }

    #[test]
    fn extracts_images_in_order() {
        let n = normalizer();
        let html = concat!(
            r#"<img src="https://cdn.example/a.jpg?x=1&amp;y=2" alt="">"#,
            r#"<img class="p" src="undefined://telegram/channel/furcon_12">"#,
            r#"<img src="data:image/png;base64,AAAA">"#,
            r#"<img src="/relative.png">"#,
            r#"<img src="https://cdn.example/b.jpg">"#,
        );
        assert_eq!(n.extract_images(html), vec![
            ImageRef::Direct("https://cdn.example/a.jpg?x=1&y=2".into()),
            ImageRef::Placeholder("undefined://telegram/channel/furcon_12".into()),
            ImageRef::Direct("https://cdn.example/b.jpg".into()),
        ]);
    }

    #[test]
    fn normalize_returns_text_and_images() {
        let n = normalizer();
        let out = n.normalize(r#"<img src="https://cdn.example/a.jpg"><p>Hi</p>"#);
        assert_eq!(out.text, "Hi");
        assert_eq!(out.images, vec![ImageRef::Direct(
            "https://cdn.example/a.jpg".into()
        )]);
    }
}
