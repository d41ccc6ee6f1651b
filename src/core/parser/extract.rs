//! Code and JSON extraction functions for LLM responses.

use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::LlmError;

/// Extract source code from an LLM response
///
/// Models usually wrap code in markdown fences. This function:
/// 1. Prefers a ```python / ```py fence
/// 2. Falls back to the first generic ``` fence
/// 3. If no fences, uses the entire response
pub fn extract_code(response: &str) -> String {
    if let Ok(re) = Regex::new(r"(?s)```(?:python|py)[ \t]*\r?\n(.*?)```") {
        if let Some(block) = re
            .captures_iter(response)
            .filter_map(|c| c.get(1).map(|m| m.as_str().trim()))
            .find(|s| !s.is_empty())
        {
            debug!("Extracted code from python fence");
            return block.to_string();
        }
    }

    if let Ok(re) = Regex::new(r"(?s)```[\w+-]*[ \t]*\r?\n?(.*?)```") {
        if let Some(block) = re
            .captures_iter(response)
            .filter_map(|c| c.get(1).map(|m| m.as_str().trim()))
            .find(|s| !s.is_empty())
        {
            debug!("Extracted code from generic fence");
            return block.to_string();
        }
    }

    debug!("No code fences found, using raw response");
    response.trim().to_string()
}

/// Find the first JSON object in a response (fenced or bare)
pub fn extract_json_object(response: &str) -> Option<String> {
    if let Ok(re) = Regex::new(r"(?s)```json\s*\n?(.*?)```") {
        if let Some(inner) = re.captures(response).and_then(|c| c.get(1)) {
            if let Some(obj) = balanced_object(inner.as_str()) {
                return Some(obj.to_string());
            }
        }
    }
    balanced_object(response).map(str::to_string)
}

/// Slice out the first brace-balanced `{...}` span, ignoring braces inside strings
fn balanced_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, c) in text[start..].char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a structured verdict of shape `T` out of a response
///
/// `kind` names the expected shape in the error when the response does not match.
pub fn parse_structured<T: DeserializeOwned>(kind: &str, response: &str) -> Result<T, LlmError> {
    let json = extract_json_object(response).ok_or_else(|| LlmError::MalformedOutput {
        kind: kind.to_string(),
        detail: format!("no JSON object in response: {}", preview(response)),
    })?;

    serde_json::from_str(&json).map_err(|e| LlmError::MalformedOutput {
        kind: kind.to_string(),
        detail: format!("{} in {}", e, preview(&json)),
    })
}

fn preview(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > 200 {
        format!("{}...", trimmed.chars().take(200).collect::<String>())
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Verdict {
        ok: bool,
        note: String,
    }

    #[test]
    fn test_extract_code_python_fence() {
        let response = "Here you go:\n```python\nfrom manim import *\n\nclass Demo(Scene):\n    pass\n```\nEnjoy!";
        let code = extract_code(response);
        assert!(code.starts_with("from manim import *"));
        assert!(code.ends_with("pass"));
    }

    #[test]
    fn test_extract_code_prefers_python_over_first_fence() {
        let response = "```text\nnot code\n```\n```py\nprint('hi')\n```";
        assert_eq!(extract_code(response), "print('hi')");
    }

    #[test]
    fn test_extract_code_generic_fence() {
        let response = "```\nx = 1\n```";
        assert_eq!(extract_code(response), "x = 1");
    }

    #[test]
    fn test_extract_code_no_fence() {
        assert_eq!(extract_code("  x = 1\n"), "x = 1");
    }

    #[test]
    fn test_extract_json_fenced() {
        let response = "Sure.\n```json\n{\"ok\": true, \"note\": \"fine\"}\n```";
        assert_eq!(extract_json_object(response).unwrap(), "{\"ok\": true, \"note\": \"fine\"}");
    }

    #[test]
    fn test_extract_json_bare_with_braces_in_strings() {
        let response = r#"Result: {"ok": false, "note": "use {braces} and \"quotes\""} trailing"#;
        let json = extract_json_object(response).unwrap();
        let verdict: Verdict = serde_json::from_str(&json).unwrap();
        assert!(!verdict.ok);
        assert_eq!(verdict.note, "use {braces} and \"quotes\"");
    }

    #[test]
    fn test_extract_json_unbalanced() {
        assert!(extract_json_object("{\"ok\": true").is_none());
        assert!(extract_json_object("no json here").is_none());
    }

    #[test]
    fn test_parse_structured_errors_name_kind() {
        let err = parse_structured::<Verdict>("code_check", "I think it is fine").unwrap_err();
        match err {
            LlmError::MalformedOutput { kind, .. } => assert_eq!(kind, "code_check"),
            other => panic!("unexpected error: {other}"),
        }

        let err = parse_structured::<Verdict>("code_check", "{\"ok\": \"yes\"}").unwrap_err();
        assert!(matches!(err, LlmError::MalformedOutput { .. }));
    }

    #[test]
    fn test_parse_structured_ok() {
        let verdict: Verdict = parse_structured("x", "{\"ok\": true, \"note\": \"\"}").unwrap();
        assert!(verdict.ok);
    }
}
