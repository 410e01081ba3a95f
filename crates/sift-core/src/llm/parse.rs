//! Tolerant parsing of model output. Models wrap JSON in prose and code
//! fences no matter how firmly the prompt forbids it, so every structured
//! output goes through the same recovery ladder: direct parse, then the
//! first balanced JSON array or object found in the text.

use serde::de::DeserializeOwned;

/// Strip a leading/trailing markdown code fence if present.
pub fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .strip_suffix("```")
        .unwrap_or(without_open)
        .trim()
}

/// Parse JSON out of arbitrary model output. Attempts, in order: the whole
/// (fence-stripped) text, the first balanced array, the first balanced
/// object. Returns `None` when nothing parses into `T`.
pub fn parse_lenient<T: DeserializeOwned>(raw: &str) -> Option<T> {
    let stripped = strip_code_fences(raw);
    if let Ok(value) = serde_json::from_str::<T>(stripped) {
        return Some(value);
    }
    if let Some(array) = extract_balanced(stripped, '[', ']') {
        if let Ok(value) = serde_json::from_str::<T>(array) {
            return Some(value);
        }
    }
    if let Some(object) = extract_balanced(stripped, '{', '}') {
        if let Ok(value) = serde_json::from_str::<T>(object) {
            return Some(value);
        }
    }
    None
}

/// First balanced `open..close` span, string-literal aware.
fn extract_balanced(text: &str, open: char, close: char) -> Option<&str> {
    let start = text.find(open)?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;
    for (offset, c) in text[start..].char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            c if c == open => depth += 1,
            c if c == close => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + c.len_utf8()]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Line-based output (one query per line): strips bullets, numbering, and
/// surrounding quotes; drops empty lines.
pub fn parse_lines(raw: &str) -> Vec<String> {
    strip_code_fences(raw)
        .lines()
        .map(|line| {
            line.trim()
                .trim_start_matches(|c: char| c.is_ascii_digit() || c == '.' || c == ')')
                .trim_start_matches(['-', '*', '•'])
                .trim()
                .trim_matches('"')
                .to_string()
        })
        .filter(|line| !line.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Score {
        id: String,
        value: i32,
    }

    #[test]
    fn parses_clean_json() {
        let parsed: Vec<Score> =
            parse_lenient(r#"[{"id":"a","value":1},{"id":"b","value":2}]"#).unwrap();
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "```json\n[{\"id\":\"a\",\"value\":1}]\n```";
        let parsed: Vec<Score> = parse_lenient(raw).unwrap();
        assert_eq!(parsed[0].id, "a");
    }

    #[test]
    fn parses_json_buried_in_prose() {
        let raw = "Sure! Here are the scores: [{\"id\":\"a\",\"value\":9}] Hope that helps.";
        let parsed: Vec<Score> = parse_lenient(raw).unwrap();
        assert_eq!(parsed[0].value, 9);
    }

    #[test]
    fn balanced_extraction_survives_brackets_in_strings() {
        let raw = r#"noise [{"id":"a ] tricky","value":3}] trailing"#;
        let parsed: Vec<Score> = parse_lenient(raw).unwrap();
        assert_eq!(parsed[0].id, "a ] tricky");
    }

    #[test]
    fn object_extraction_works_too() {
        #[derive(Deserialize)]
        struct Rewrite {
            rewritten_query: String,
        }
        let raw = "The rewritten form is {\"rewritten_query\": \"better query\"} as requested.";
        let parsed: Rewrite = parse_lenient(raw).unwrap();
        assert_eq!(parsed.rewritten_query, "better query");
    }

    #[test]
    fn garbage_returns_none() {
        assert!(parse_lenient::<Vec<Score>>("I cannot help with that.").is_none());
    }

    #[test]
    fn lines_are_cleaned() {
        let raw = "1. first query\n- second query\n\"third query\"\n\n";
        assert_eq!(
            parse_lines(raw),
            vec!["first query", "second query", "third query"]
        );
    }
}
