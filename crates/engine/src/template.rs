//! Parameter template resolution.
//!
//! Stored queries carry parameter templates whose values are either literals
//! or placeholders. Overrides replace template values wholesale by key, and
//! independently supply the dynamic values placeholders resolve against.
//! A placeholder with no supplied value drops its parameter key entirely and
//! emits a diagnostic, matching the lenient behavior callers depend on.

use fedstat_common::models::{ParameterMap, TemplateValue};
use std::collections::BTreeMap;
use tracing::warn;

pub type Template = BTreeMap<String, TemplateValue>;

/// Replace template values for every key present in `overrides`; keys not in
/// `overrides` keep the template value, placeholders included.
pub fn merge_overrides(template: &Template, overrides: &ParameterMap) -> Template {
    let mut merged = template.clone();
    for (key, value) in overrides {
        merged.insert(key.clone(), TemplateValue::Literal(value.clone()));
    }
    merged
}

/// Resolve every placeholder in `template` against `dynamic_values`.
///
/// Returns the final parameter mapping and one warning per dropped key.
pub fn resolve_parameters(
    template: &Template,
    dynamic_values: &ParameterMap,
) -> (ParameterMap, Vec<String>) {
    let mut resolved = ParameterMap::new();
    let mut warnings = Vec::new();

    for (key, value) in template {
        match value {
            TemplateValue::Literal(v) => {
                resolved.insert(key.clone(), v.clone());
            }
            TemplateValue::Placeholder { name, hint } => match dynamic_values.get(name) {
                Some(v) => {
                    resolved.insert(key.clone(), v.clone());
                }
                None => {
                    let mut message = format!(
                        "Parameter '{}' dropped: no value supplied for placeholder '{}'",
                        key, name
                    );
                    if let Some(hint) = hint {
                        message.push_str(&format!(" (expected format: {})", hint));
                    }
                    warn!(parameter = %key, placeholder = %name, "Dropping unresolved placeholder");
                    warnings.push(message);
                }
            },
        }
    }

    (resolved, warnings)
}

/// Parse a raw parameter mapping into a template. Used for direct queries so
/// placeholder syntax behaves identically whether or not a stored query is
/// involved.
pub fn parse_template(parameters: &ParameterMap) -> Template {
    parameters
        .iter()
        .map(|(key, value)| (key.clone(), TemplateValue::parse(value)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn template(raw: serde_json::Value) -> Template {
        serde_json::from_value(raw).unwrap()
    }

    #[test]
    fn test_placeholder_resolved_from_dynamic_values() {
        let tpl = template(json!({"from": "{from mm-yyyy}", "to": "12-2023"}));
        let dynamic: ParameterMap =
            serde_json::from_value(json!({"from": "01-2023"})).unwrap();

        let (resolved, warnings) = resolve_parameters(&tpl, &dynamic);
        assert_eq!(
            serde_json::to_value(&resolved).unwrap(),
            json!({"from": "01-2023", "to": "12-2023"})
        );
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_unresolved_placeholder_drops_key_with_warning() {
        let tpl = template(json!({"from": "{from mm-yyyy}", "to": "12-2023"}));

        let (resolved, warnings) = resolve_parameters(&tpl, &ParameterMap::new());
        assert_eq!(
            serde_json::to_value(&resolved).unwrap(),
            json!({"to": "12-2023"})
        );
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("'from'"));
        assert!(warnings[0].contains("mm-yyyy"));
    }

    #[test]
    fn test_override_replaces_template_value() {
        let tpl = template(json!({"year": "2020", "endpoint": "estimates/national"}));
        let overrides: ParameterMap = serde_json::from_value(json!({"year": "2021"})).unwrap();

        let merged = merge_overrides(&tpl, &overrides);
        let (resolved, warnings) = resolve_parameters(&merged, &overrides);
        assert_eq!(resolved["year"], json!("2021"));
        assert_eq!(resolved["endpoint"], json!("estimates/national"));
        assert!(warnings.is_empty());
    }

    #[test]
    fn test_override_replaces_placeholder_directly() {
        let tpl = template(json!({"state": "{state two-letter code}"}));
        let overrides: ParameterMap = serde_json::from_value(json!({"state": "CA"})).unwrap();

        let merged = merge_overrides(&tpl, &overrides);
        let (resolved, warnings) = resolve_parameters(&merged, &ParameterMap::new());
        assert_eq!(resolved["state"], json!("CA"));
        assert!(warnings.is_empty());
    }
}
