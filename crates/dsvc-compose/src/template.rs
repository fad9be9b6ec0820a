//! Expansion of template variables.
//!
//! A template is plain text with `{env[NAME]}` references. `{{` and `}}`
//! stand for literal braces. Lookups go through a caller-supplied scope,
//! never the host process environment.

use std::collections::BTreeMap;

use dsvc_common::error::{Result, ServicesError};

/// A piece of a parsed template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment<'a> {
    /// Text copied verbatim.
    Literal(&'a str),
    /// A literal `{` or `}` written doubled.
    Brace(char),
    /// A variable reference by name.
    Variable(&'a str),
}

/// Splits a template into segments.
///
/// # Errors
///
/// Returns a description of the first malformed placeholder.
pub fn parse_template(template: &str) -> std::result::Result<Vec<Segment<'_>>, String> {
    let mut segments = Vec::new();
    let mut rest = template;

    while let Some(pos) = rest.find(['{', '}']) {
        if pos > 0 {
            segments.push(Segment::Literal(&rest[..pos]));
        }
        let tail = &rest[pos..];
        if let Some(after) = tail.strip_prefix("{{") {
            segments.push(Segment::Brace('{'));
            rest = after;
        } else if let Some(after) = tail.strip_prefix("}}") {
            segments.push(Segment::Brace('}'));
            rest = after;
        } else if tail.starts_with('}') {
            return Err("single '}' encountered; write '}}' for a literal brace".into());
        } else {
            let end = tail
                .find('}')
                .ok_or_else(|| format!("unterminated placeholder: {tail}"))?;
            let field = &tail[1..end];
            let name = field
                .strip_prefix("env[")
                .and_then(|f| f.strip_suffix(']'))
                .filter(|n| !n.is_empty() && !n.contains(['[', ']']))
                .ok_or_else(|| format!("unsupported placeholder {{{field}}}; expected {{env[NAME]}}"))?;
            segments.push(Segment::Variable(name));
            rest = &tail[end + 1..];
        }
    }
    if !rest.is_empty() {
        segments.push(Segment::Literal(rest));
    }
    Ok(segments)
}

/// Expands one template against `scope`.
///
/// # Errors
///
/// Returns [`ServicesError::TemplateExpansionError`] for a malformed
/// template or a reference to a variable missing from `scope`.
pub fn expand(
    service: &str,
    variable: &str,
    template: &str,
    scope: &BTreeMap<String, String>,
) -> Result<String> {
    let fail = |reason: String| ServicesError::TemplateExpansionError {
        service: service.to_string(),
        variable: variable.to_string(),
        reason,
    };

    let segments = parse_template(template).map_err(fail)?;
    let mut out = String::with_capacity(template.len());
    for segment in segments {
        match segment {
            Segment::Literal(text) => out.push_str(text),
            Segment::Brace(c) => out.push(c),
            Segment::Variable(name) => {
                let value = scope
                    .get(name)
                    .ok_or_else(|| fail(format!("undefined variable {name}")))?;
                out.push_str(value);
            }
        }
    }
    Ok(out)
}

/// Expands templates in order, each result joining `scope` for later ones.
///
/// Returns only the variables produced by the templates.
///
/// # Errors
///
/// Stops at the first template that fails to expand.
pub fn expand_all(
    service: &str,
    templates: &[(String, String)],
    scope: &mut BTreeMap<String, String>,
) -> Result<BTreeMap<String, String>> {
    let mut produced = BTreeMap::new();
    for (variable, template) in templates {
        let value = expand(service, variable, template, scope)?;
        let _ = scope.insert(variable.clone(), value.clone());
        let _ = produced.insert(variable.clone(), value);
    }
    Ok(produced)
}
