//! Helpers for building model prompts and reading model replies.

/// Escapes chat-template control sequences so user-controlled text cannot
/// open a new role or instruction block.
///
/// Covers ChatML markers (`<|...|>`), sequence boundaries (`<s>`, `</s>`)
/// and Llama instruction/system markers.
pub fn sanitize_for_prompt(text: &str) -> String {
    text.replace("<|", "< |")
        .replace("|>", "| >")
        .replace("</s>", "< / s >")
        .replace("<s>", "< s >")
        .replace("[/INST]", "[ / INST ]")
        .replace("[INST]", "[ INST ]")
        .replace("<</SYS>>", "< < / SYS > >")
        .replace("<<SYS>>", "< < SYS > >")
}

/// Sanitizes and caps `text` at `max_chars` characters.
pub fn prompt_field(text: &str, max_chars: usize) -> String {
    let sanitized = sanitize_for_prompt(text.trim());
    if sanitized.chars().count() <= max_chars {
        return sanitized;
    }
    let mut truncated: String = sanitized.chars().take(max_chars).collect();
    truncated.push_str(" [truncated]");
    truncated
}

/// Returns the first balanced `{...}` object in a model reply, if any.
///
/// Braces inside JSON strings and escaped quotes are skipped.
pub fn extract_json(response: &str) -> Option<&str> {
    let start = response.find('{')?;

    let mut depth = 0usize;
    let mut in_string = false;
    let mut escape_next = false;

    for (i, c) in response[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }

        match c {
            '\\' if in_string => escape_next = true,
            '"' => in_string = !in_string,
            '{' if !in_string => depth += 1,
            '}' if !in_string => {
                depth -= 1;
                if depth == 0 {
                    return Some(&response[start..start + i + 1]);
                }
            }
            _ => {}
        }
    }

    None
}
