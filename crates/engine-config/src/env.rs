//! `${VAR}` substitution in parsed config values.
//!
//! References are resolved inside string scalars after the YAML has been
//! parsed, so substituted text is never re-read as YAML and comments are
//! ignored.

use crate::error::ConfigError;
use serde_yaml::{Value, value::TaggedValue};

/// Resolves every `${NAME}` in the string scalars of `value`.
///
/// `$${` produces a literal `${`. A reference to an unset variable is an
/// error naming the config key that holds it. Substituted scalars stay
/// strings, even when the value looks like a number.
pub fn substitute_with<F>(value: Value, lookup: F) -> Result<Value, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    resolve(value, "", &lookup)
}

fn resolve<F>(value: Value, key: &str, lookup: &F) -> Result<Value, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(text) => expand(&text, key, lookup).map(Value::String),
        Value::Sequence(items) => items
            .into_iter()
            .enumerate()
            .map(|(idx, item)| resolve(item, &format!("{key}[{idx}]"), lookup))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Sequence),
        Value::Mapping(entries) => {
            let mut resolved = serde_yaml::Mapping::with_capacity(entries.len());
            for (name, item) in entries {
                let child = match name.as_str() {
                    Some(name) if key.is_empty() => name.to_string(),
                    Some(name) => format!("{key}.{name}"),
                    None => format!("{key}.?"),
                };
                let item = resolve(item, &child, lookup)?;
                resolved.insert(name, item);
            }
            Ok(Value::Mapping(resolved))
        }
        Value::Tagged(tagged) => {
            let TaggedValue { tag, value } = *tagged;
            let value = resolve(value, key, lookup)?;
            Ok(Value::Tagged(Box::new(TaggedValue { tag, value })))
        }
        other => Ok(other),
    }
}

fn expand<F>(text: &str, key: &str, lookup: &F) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut out = String::with_capacity(text.len());
    let mut rest = text;

    while let Some(pos) = rest.find('$') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];

        if let Some(escaped) = tail.strip_prefix("$${") {
            out.push_str("${");
            rest = escaped;
        } else if let Some(reference) = tail.strip_prefix("${") {
            let end = reference.find('}').ok_or_else(|| ConfigError::MalformedVar {
                key: key.to_string(),
                reason: "missing closing '}'".to_string(),
            })?;
            let name = reference[..end].trim();
            if !is_valid_name(name) {
                return Err(ConfigError::MalformedVar {
                    key: key.to_string(),
                    reason: format!("'{name}' is not a valid variable name"),
                });
            }

            let value = lookup(name).ok_or_else(|| ConfigError::MissingVar {
                name: name.to_string(),
                key: key.to_string(),
            })?;
            out.push_str(&value);
            rest = &reference[end + 1..];
        } else {
            out.push('$');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);

    Ok(out)
}

fn is_valid_name(name: &str) -> bool {
    let mut chars = name.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
