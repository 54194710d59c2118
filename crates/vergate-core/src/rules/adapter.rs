//! Request adaptation: canonical parameters into the shape one version band
//! expects
//!
//! Adaptation is a pure function of (rule, version, params): transforms run
//! first against the canonical parameter names, then renames, then endpoint
//! placeholders are filled. Each table is applied in rule-declared order, so
//! identical inputs always produce identical output.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::version::ApiVersion;

use super::{AdaptationRule, ResponseShape};

/// Everything needed to issue an adapted call and map its response back
#[derive(Debug, Clone, Serialize)]
pub struct AdaptedRequest {
    /// Version the rule was resolved against
    pub version: ApiVersion,
    pub method: String,
    /// Endpoint path with placeholders filled in
    pub endpoint: String,
    pub params: Map<String, Value>,
    /// Response shape of the same rule, so one call never mixes revisions
    pub response: ResponseShape,
}

/// Adapt canonical parameters to the given rule's shape
///
/// # Errors
///
/// Returns [`Error::Validation`] when the endpoint template names a
/// placeholder the parameters do not supply.
pub fn adapt_request(
    rule: &AdaptationRule,
    version: &ApiVersion,
    params: &Map<String, Value>,
) -> Result<AdaptedRequest> {
    let mut params = params.clone();

    for step in &rule.transforms {
        if let Some(value) = params.get(&step.param) {
            let transformed = step.transform.apply(value);
            params.insert(step.param.clone(), transformed);
        }
    }

    for rename in &rule.parameter_renames {
        if let Some(value) = params.remove(&rename.from) {
            params.insert(rename.to.clone(), value);
        }
    }

    let endpoint = render_endpoint(&rule.endpoint.path, &mut params)?;

    Ok(AdaptedRequest {
        version: version.clone(),
        method: rule.endpoint.method.clone(),
        endpoint,
        params,
        response: rule.response.clone(),
    })
}

/// Fill `{placeholder}` path segments from the parameter map, consuming the
/// parameters they name
fn render_endpoint(template: &str, params: &mut Map<String, Value>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}').ok_or_else(|| {
            Error::configuration(format!(
                "unterminated placeholder in endpoint template '{}'",
                template
            ))
        })?;
        let name = &after[..end];
        let value = params.remove(name).ok_or_else(|| Error::Validation {
            field: name.to_string(),
            message: format!("missing value for endpoint placeholder '{{{}}}'", name),
        })?;
        match value {
            Value::String(s) => out.push_str(&s),
            other => out.push_str(&other.to_string()),
        }
        rest = &after[end + 1..];
    }

    out.push_str(rest);
    Ok(out)
}
