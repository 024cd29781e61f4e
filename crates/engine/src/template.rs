//! Message template substitution.
//!
//! Supports `{{first_name}}`-style placeholders, matched
//! case-insensitively. Placeholders with no value are dropped and the
//! result's whitespace is collapsed, so "Hi {{First_Name}}," with no
//! first name renders as "Hi ,"-free text. Substitution is idempotent.

/// Render `template`, substituting the given variables.
///
/// `vars` maps lower-case placeholder names to optional values; `None`
/// and unknown placeholders vanish from the output.
pub fn render(template: &str, vars: &[(&str, Option<&str>)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find("{{") {
        out.push_str(&rest[..open]);
        let after_open = &rest[open + 2..];
        match after_open.find("}}") {
            Some(close) => {
                let key = after_open[..close].trim().to_ascii_lowercase();
                if let Some((_, Some(value))) =
                    vars.iter().find(|(name, _)| name.eq_ignore_ascii_case(&key))
                {
                    out.push_str(value);
                }
                rest = &after_open[close + 2..];
            }
            // Unterminated placeholder: keep the text verbatim.
            None => {
                out.push_str(&rest[open..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);

    collapse_whitespace(&out)
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
