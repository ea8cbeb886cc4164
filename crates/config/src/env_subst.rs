//! `${VAR}` expansion for config and credential files.
//!
//! Supported forms:
//!
//! - `${NAME}` expands to the variable, or stays literal when it is unset.
//! - `${NAME:-fallback}` expands to the variable, or to `fallback` when it is
//!   unset or empty.
//! - `$${` is an escaped `${`.
//!
//! Names follow shell rules (`[A-Za-z_][A-Za-z0-9_]*`). Anything else,
//! including an unterminated `${`, is copied through untouched.

/// Expand placeholders against the process environment.
pub fn substitute_env(input: &str) -> String {
    expand(input, |name| std::env::var(name).ok())
}

fn expand(input: &str, lookup: impl Fn(&str) -> Option<String>) -> String {
    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(start) = rest.find("${") {
        if rest[..start].ends_with('$') {
            out.push_str(&rest[..start - 1]);
            out.push_str("${");
            rest = &rest[start + 2..];
            continue;
        }
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            out.push_str(&rest[start..]);
            return out;
        };
        let body = &after[..end];
        let (name, fallback) = match body.split_once(":-") {
            Some((name, fallback)) => (name, Some(fallback)),
            None => (body, None),
        };

        if !is_var_name(name) {
            out.push_str(&rest[start..start + 2 + end + 1]);
        } else {
            match (lookup(name), fallback) {
                (Some(value), Some(fallback)) if value.is_empty() => out.push_str(fallback),
                (Some(value), _) => out.push_str(&value),
                (None, Some(fallback)) => out.push_str(fallback),
                (None, None) => out.push_str(&rest[start..start + 2 + end + 1]),
            }
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    out
}

fn is_var_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use {super::*, rstest::rstest};

    fn env(name: &str) -> Option<String> {
        match name {
            "DISCORD_TOKEN" => Some("tok".into()),
            "IMGBB_KEY" => Some("abc123".into()),
            "EMPTY" => Some(String::new()),
            _ => None,
        }
    }

    #[rstest]
    #[case("token = \"${DISCORD_TOKEN}\"", "token = \"tok\"")]
    #[case("${DISCORD_TOKEN}${IMGBB_KEY}", "tokabc123")]
    #[case("${UNSET}", "${UNSET}")]
    #[case("${UNSET:-/var/lib/tgbridge}", "/var/lib/tgbridge")]
    #[case("${EMPTY:-fallback}", "fallback")]
    #[case("${EMPTY}", "")]
    #[case("${DISCORD_TOKEN:-unused}", "tok")]
    #[case("$${DISCORD_TOKEN}", "${DISCORD_TOKEN}")]
    #[case("${not a name}", "${not a name}")]
    #[case("${1ST}", "${1ST}")]
    #[case("token=${DISCORD_TOKEN", "token=${DISCORD_TOKEN")]
    #[case("cost: $5 {x}", "cost: $5 {x}")]
    #[case("ümlaut ${IMGBB_KEY} ✓", "ümlaut abc123 ✓")]
    fn expands(#[case] input: &str, #[case] expected: &str) {
        assert_eq!(expand(input, env), expected);
    }

    #[test]
    fn expands_inside_json_strings() {
        assert_eq!(
            expand(r#"{"imgbb_api_key": "${IMGBB_KEY}"}"#, env),
            r#"{"imgbb_api_key": "abc123"}"#
        );
    }

    #[test]
    fn plain_text_is_untouched() {
        assert_eq!(substitute_env("plain text"), "plain text");
    }
}
