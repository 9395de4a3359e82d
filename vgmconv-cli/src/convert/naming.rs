//! Output file naming
//!
//! Templates recognize three placeholders:
//! - `?s`: sub-stream index (0 prints as 1)
//! - `?n`: stream title, or the input name when the stream has none
//! - `?f`: input name as given
//!
//! Any other `?x` pair is dropped so no placeholder survives literally.

/// Template used when neither a name nor a template was given
pub fn default_template(subsong_index: u32, subsong_count: u32) -> &'static str {
    if subsong_index >= 1 && subsong_count >= 1 {
        "?f#?s.wav"
    } else {
        "?f.wav"
    }
}

/// Values substituted into a template
#[derive(Debug, Clone, Copy)]
pub struct NameFields<'a> {
    pub input: &'a str,
    pub subsong_index: u32,
    pub stream_name: Option<&'a str>,
}

/// Expand `template` with `fields`.
pub fn expand_template(template: &str, fields: &NameFields<'_>) -> String {
    let mut out = String::with_capacity(template.len() + fields.input.len());
    let mut chars = template.chars();

    while let Some(c) = chars.next() {
        if c != '?' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('s') => out.push_str(&fields.subsong_index.max(1).to_string()),
            Some('n') => match fields.stream_name {
                Some(name) => out.push_str(&sanitize(name)),
                None => out.push_str(fields.input),
            },
            Some('f') => out.push_str(fields.input),
            _ => {}
        }
    }

    out
}

/// Name of the second output written after a reset
pub fn reset_name(output: &str) -> String {
    format!("{}.reset.wav", output)
}

/// Replace characters that can't appear in a file name.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            c => c,
        })
        .collect()
}
