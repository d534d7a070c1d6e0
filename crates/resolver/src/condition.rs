//! The condition expression language.
//!
//! Expressions are an OR-list of AND-lists of comparisons; there are no
//! parentheses and no negation operator. A comparison is
//! `<path> == <literal>` or `<path> != <literal>`, where `<path>` resolves
//! against [`DeviceFacts`] and `<literal>` follows JSON scalar grammar
//! after quote stripping. Operator scanning respects quoted spans, so
//! `device.tag.motd == 'a && b'` is a single comparison.

use crate::error::ConditionError;
use crate::facts::{DeviceFacts, FactValue};
use crate::node::Scalar;

/// Evaluate a condition against a device's facts.
///
/// An absent condition and the literal wildcard `*` are always true.
pub fn evaluate(condition: Option<&str>, facts: &DeviceFacts) -> Result<bool, ConditionError> {
    let Some(expr) = condition else {
        return Ok(true);
    };
    if expr == "*" {
        return Ok(true);
    }

    let or_parts = split_outside_quotes(expr, "||");
    if or_parts.iter().all(|part| part.trim().is_empty()) {
        return Err(ConditionError::Malformed {
            expr: expr.to_string(),
        });
    }

    for or_part in &or_parts {
        let mut all_true = true;
        for and_part in split_outside_quotes(or_part, "&&") {
            if !evaluate_comparison(and_part.trim(), facts)? {
                all_true = false;
                break;
            }
        }
        if all_true {
            return Ok(true);
        }
    }
    Ok(false)
}

fn evaluate_comparison(expr: &str, facts: &DeviceFacts) -> Result<bool, ConditionError> {
    let (lhs, rhs, equals) = if let Some((lhs, rhs)) = split_comparison(expr, "==") {
        (lhs, rhs, true)
    } else if let Some((lhs, rhs)) = split_comparison(expr, "!=") {
        (lhs, rhs, false)
    } else {
        return Err(ConditionError::Malformed {
            expr: expr.to_string(),
        });
    };

    let path = lhs.trim();
    if path.is_empty() {
        return Err(ConditionError::Malformed {
            expr: expr.to_string(),
        });
    }

    let lhs_value = facts.lookup(path)?;
    let rhs_value = parse_literal(rhs.trim());
    Ok(compare(&lhs_value, &rhs_value, equals))
}

/// Split on the first occurrence of `operator` outside quoted spans.
fn split_comparison<'a>(expr: &'a str, operator: &str) -> Option<(&'a str, &'a str)> {
    scan_outside_quotes(expr, operator).map(|i| (&expr[..i], &expr[i + operator.len()..]))
}

/// Split on every occurrence of `operator` outside quoted spans.
fn split_outside_quotes(expr: &str, operator: &str) -> Vec<String> {
    let mut parts = Vec::new();
    let mut rest = expr;
    while let Some(i) = scan_outside_quotes(rest, operator) {
        parts.push(rest[..i].to_string());
        rest = &rest[i + operator.len()..];
    }
    parts.push(rest.to_string());
    parts
}

/// Byte offset of the first `operator` not inside a `'…'` or `"…"` span.
fn scan_outside_quotes(expr: &str, operator: &str) -> Option<usize> {
    let bytes = expr.as_bytes();
    let op = operator.as_bytes();
    let mut quote: Option<u8> = None;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) if b == q => quote = None,
            Some(_) => {}
            None if b == b'\'' || b == b'"' => quote = Some(b),
            None if bytes[i..].starts_with(op) => return Some(i),
            None => {}
        }
        i += 1;
    }
    None
}

/// Parse a right-hand-side literal. A quoted token is always a string;
/// an unquoted token is tried as JSON (bool, number, null) and falls
/// back to a raw string.
fn parse_literal(token: &str) -> Scalar {
    if token.len() >= 2 {
        let first = token.as_bytes()[0];
        let last = token.as_bytes()[token.len() - 1];
        if (first == b'\'' || first == b'"') && first == last {
            return Scalar::Str(token[1..token.len() - 1].to_string());
        }
    }
    serde_json::from_str::<serde_json::Value>(token)
        .ok()
        .and_then(|v| Scalar::from_value(&v))
        .unwrap_or_else(|| Scalar::Str(token.to_string()))
}

/// `==` on a list fact means membership; `!=` means absence. Scalars
/// compare as booleans when both sides are booleans, otherwise by their
/// stringified form (mismatched types compare unequal, never error).
fn compare(lhs: &FactValue, rhs: &Scalar, equals: bool) -> bool {
    let result = match lhs {
        FactValue::List(items) => items.iter().any(|item| scalar_eq(item, rhs)),
        FactValue::Scalar(s) => scalar_eq(s, rhs),
    };
    if equals { result } else { !result }
}

fn scalar_eq(lhs: &Scalar, rhs: &Scalar) -> bool {
    if let (Scalar::Bool(a), Scalar::Bool(b)) = (lhs, rhs) {
        return a == b;
    }
    lhs.to_string() == rhs.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::facts::TagValue;
    use std::collections::BTreeMap;

    fn facts() -> DeviceFacts {
        DeviceFacts {
            hostname: "ap-attic".into(),
            ipaddr: "10.0.0.2".into(),
            model_id: "tplink,archer-c7-v5".into(),
            version: "23.05.0".into(),
            sw_config: false,
            tags: BTreeMap::from([
                ("role".into(), TagValue::Scalar(Scalar::Str("ap".into()))),
                ("floor".into(), TagValue::Scalar(Scalar::Int(2))),
                (
                    "ssids".into(),
                    TagValue::List(vec![Scalar::Str("main".into()), Scalar::Str("guest".into())]),
                ),
            ]),
        }
    }

    #[test]
    fn test_absent_and_wildcard_are_true() {
        let f = facts();
        assert!(evaluate(None, &f).unwrap());
        assert!(evaluate(Some("*"), &f).unwrap());
    }

    #[test]
    fn test_simple_equality() {
        let f = facts();
        assert!(evaluate(Some("device.tag.role == 'ap'"), &f).unwrap());
        assert!(!evaluate(Some("device.tag.role == 'router'"), &f).unwrap());
        assert!(evaluate(Some("device.tag.role != 'router'"), &f).unwrap());
    }

    #[test]
    fn test_and_or_precedence() {
        let f = facts();
        // One false conjunct kills the AND-group; the second OR-arm rescues it.
        let expr = "device.tag.role == 'router' && device.sw_config == false \
                    || device.hostname == 'ap-attic'";
        assert!(evaluate(Some(expr), &f).unwrap());

        let expr = "device.tag.role == 'ap' && device.sw_config == true";
        assert!(!evaluate(Some(expr), &f).unwrap());
    }

    #[test]
    fn test_operators_inside_quotes_are_not_separators() {
        let mut f = facts();
        f.tags.insert(
            "motd".into(),
            TagValue::Scalar(Scalar::Str("a && b || c == d".into())),
        );
        assert!(evaluate(Some("device.tag.motd == 'a && b || c == d'"), &f).unwrap());
    }

    #[test]
    fn test_boolean_and_number_literals() {
        let f = facts();
        assert!(evaluate(Some("device.sw_config == false"), &f).unwrap());
        assert!(evaluate(Some("device.sw_config != true"), &f).unwrap());
        assert!(evaluate(Some("device.tag.floor == 2"), &f).unwrap());
        // Unquoted vs quoted numbers compare equal through their text form.
        assert!(evaluate(Some("device.tag.floor == '2'"), &f).unwrap());
    }

    #[test]
    fn test_list_membership() {
        let f = facts();
        assert!(evaluate(Some("device.tag.ssids == 'guest'"), &f).unwrap());
        assert!(!evaluate(Some("device.tag.ssids == 'iot'"), &f).unwrap());
        assert!(evaluate(Some("device.tag.ssids != 'iot'"), &f).unwrap());
        assert!(!evaluate(Some("device.tag.ssids != 'main'"), &f).unwrap());
    }

    #[test]
    fn test_unknown_variable_is_fatal() {
        let f = facts();
        let err = evaluate(Some("device.tag.missing == 'x'"), &f).unwrap_err();
        assert!(matches!(err, ConditionError::UnknownVariable { .. }));
    }

    #[test]
    fn test_malformed_expressions() {
        let f = facts();
        for expr in ["", "   ", "device.hostname", "== 'x'", "||"] {
            let err = evaluate(Some(expr), &f).unwrap_err();
            assert!(matches!(err, ConditionError::Malformed { .. }), "{expr:?}");
        }
    }

    #[test]
    fn test_evaluation_is_pure() {
        let f = facts();
        let expr = Some("device.tag.role == 'ap' || device.tag.floor != 2");
        let first = evaluate(expr, &f).unwrap();
        for _ in 0..3 {
            assert_eq!(evaluate(expr, &f).unwrap(), first);
        }
    }
}
