//! Environment-variable expansion for configuration values.
//!
//! Supports `$NAME` and `${NAME}`. Variables that are not set are left in the
//! string verbatim, so a typo shows up in the resulting path instead of
//! silently collapsing to an empty string.

use serde_yaml::Value;

/// Expand `$NAME` / `${NAME}` references using the process environment.
pub fn expand_env_vars(input: &str) -> String {
    expand_with(input, |name| std::env::var(name).ok())
}

/// Expand variable references using a caller-supplied lookup.
pub fn expand_with<F>(input: &str, lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    if !input.contains('$') {
        return input.to_string();
    }

    let mut out = String::with_capacity(input.len());
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let after = &rest[pos + 1..];

        if let Some(braced) = after.strip_prefix('{') {
            match braced.find('}') {
                Some(end) if is_var_name(&braced[..end]) => {
                    let name = &braced[..end];
                    match lookup(name) {
                        Some(value) => out.push_str(&value),
                        None => {
                            out.push_str("${");
                            out.push_str(name);
                            out.push('}');
                        }
                    }
                    rest = &braced[end + 1..];
                }
                _ => {
                    out.push('$');
                    rest = after;
                }
            }
            continue;
        }

        let name_len = after
            .char_indices()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
            .map(|(i, _)| i)
            .unwrap_or(after.len());

        if name_len == 0 {
            out.push('$');
            rest = after;
            continue;
        }

        let name = &after[..name_len];
        match lookup(name) {
            Some(value) => out.push_str(&value),
            None => {
                out.push('$');
                out.push_str(name);
            }
        }
        rest = &after[name_len..];
    }

    out.push_str(rest);
    out
}

fn is_var_name(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Recursively expand every string scalar in a YAML document.
///
/// Mapping keys are left alone; only values are expanded.
pub fn expand_value(value: Value) -> Value {
    match value {
        Value::String(s) => Value::String(expand_env_vars(&s)),
        Value::Sequence(seq) => Value::Sequence(seq.into_iter().map(expand_value).collect()),
        Value::Mapping(map) => Value::Mapping(
            map.into_iter()
                .map(|(k, v)| (k, expand_value(v)))
                .collect(),
        ),
        other => other,
    }
}
