//! XPath 1.0 Core Functions
//!
//! Node set: position(), last(), count(), local-name(), namespace-uri(), name()
//!
//! String: string(), concat(), starts-with(), contains(), substring(),
//! substring-before(), substring-after(), string-length(), normalize-space(),
//! translate()
//!
//! Boolean: boolean(), not(), true(), false(), lang()
//!
//! Number: number(), sum(), floor(), ceiling(), round()

use super::eval::{number_of, string_of, EvalContext};
use super::value::{parse_number, XPathValue};
use crate::dom::{node_string_value, DocumentAccess, NodeId};

const VARIADIC: usize = usize::MAX;

/// Accepted argument counts, `None` for unknown functions
fn arity(name: &str) -> Option<(usize, usize)> {
    let range = match name {
        "position" | "last" | "true" | "false" => (0, 0),
        "local-name" | "namespace-uri" | "name" | "string" | "string-length"
        | "normalize-space" | "number" => (0, 1),
        "count" | "boolean" | "not" | "lang" | "sum" | "floor" | "ceiling" | "round" => (1, 1),
        "starts-with" | "contains" | "substring-before" | "substring-after" => (2, 2),
        "substring" => (2, 3),
        "translate" => (3, 3),
        "concat" => (2, VARIADIC),
        _ => return None,
    };
    Some(range)
}

/// Evaluate a function call
pub fn call<D: DocumentAccess>(
    name: &str,
    args: Vec<XPathValue>,
    ctx: &EvalContext<'_, D>,
) -> Result<XPathValue, String> {
    let (min, max) = arity(name).ok_or_else(|| format!("unknown function {}()", name))?;
    if args.len() < min || args.len() > max {
        return Err(format!(
            "{}() does not take {} argument(s)",
            name,
            args.len()
        ));
    }

    let doc = ctx.doc;
    let text = |i: usize| string_of(doc, &args[i]);
    let number = |i: usize| number_of(doc, &args[i]);

    let value = match name {
        "position" => XPathValue::Number(ctx.context_position as f64),
        "last" => XPathValue::Number(ctx.context_size as f64),
        "true" => XPathValue::Boolean(true),
        "false" => XPathValue::Boolean(false),
        "count" => XPathValue::Number(count(&args[0])? as f64),
        "local-name" => {
            let node = node_arg(ctx, &args, name)?;
            name_string(node.and_then(|n| doc.node_local_name(n)))
        }
        "namespace-uri" => {
            let node = node_arg(ctx, &args, name)?;
            name_string(node.and_then(|n| doc.node_namespace_uri(n)))
        }
        "name" => {
            let node = node_arg(ctx, &args, name)?;
            name_string(node.and_then(|n| doc.node_name(n)))
        }

        "string" => XPathValue::String(string_or_context(ctx, &args)),
        "concat" => XPathValue::String(args.iter().map(|a| string_of(doc, a)).collect()),
        "starts-with" => XPathValue::Boolean(text(0).starts_with(text(1).as_str())),
        "contains" => XPathValue::Boolean(text(0).contains(text(1).as_str())),
        "substring-before" => {
            let (s, sep) = (text(0), text(1));
            XPathValue::String(
                s.split_once(sep.as_str())
                    .map(|(before, _)| before.to_string())
                    .unwrap_or_default(),
            )
        }
        "substring-after" => {
            let (s, sep) = (text(0), text(1));
            XPathValue::String(
                s.split_once(sep.as_str())
                    .map(|(_, after)| after.to_string())
                    .unwrap_or_default(),
            )
        }
        "substring" => {
            let len = (args.len() == 3).then(|| number(2));
            XPathValue::String(substring(&text(0), number(1), len))
        }
        "string-length" => {
            XPathValue::Number(string_or_context(ctx, &args).chars().count() as f64)
        }
        "normalize-space" => XPathValue::String(
            string_or_context(ctx, &args)
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" "),
        ),
        "translate" => XPathValue::String(translate(&text(0), &text(1), &text(2))),

        "boolean" => XPathValue::Boolean(args[0].to_boolean()),
        "not" => XPathValue::Boolean(!args[0].to_boolean()),
        "lang" => XPathValue::Boolean(lang(doc, ctx.context_node, &text(0))),

        "number" => XPathValue::Number(match args.first() {
            Some(arg) => number_of(doc, arg),
            None => parse_number(&node_string_value(doc, ctx.context_node)),
        }),
        "sum" => XPathValue::Number(sum(doc, &args[0])?),
        "floor" => XPathValue::Number(number(0).floor()),
        "ceiling" => XPathValue::Number(number(0).ceil()),
        "round" => XPathValue::Number(round_half_up(number(0))),

        _ => return Err(format!("unknown function {}()", name)),
    };
    Ok(value)
}

fn name_string(name: Option<&str>) -> XPathValue {
    XPathValue::String(name.unwrap_or("").to_string())
}

/// First node of the argument, or the context node when called without one
fn node_arg<D: DocumentAccess>(
    ctx: &EvalContext<'_, D>,
    args: &[XPathValue],
    name: &str,
) -> Result<Option<NodeId>, String> {
    match args.first() {
        None => Ok(Some(ctx.context_node)),
        Some(XPathValue::NodeSet(nodes)) => Ok(nodes.first().copied()),
        Some(other) => Err(format!(
            "{}() expects a node-set, got a {}",
            name,
            other.type_name()
        )),
    }
}

fn string_or_context<D: DocumentAccess>(ctx: &EvalContext<'_, D>, args: &[XPathValue]) -> String {
    match args.first() {
        Some(arg) => string_of(ctx.doc, arg),
        None => node_string_value(ctx.doc, ctx.context_node),
    }
}

/// count() also counts selected attribute values
fn count(value: &XPathValue) -> Result<usize, String> {
    match value {
        XPathValue::NodeSet(nodes) => Ok(nodes.len()),
        XPathValue::StringList(values) => Ok(values.len()),
        XPathValue::String(_) => Ok(1),
        other => Err(format!("count() expects a node-set, got a {}", other.type_name())),
    }
}

fn sum<D: DocumentAccess>(doc: &D, value: &XPathValue) -> Result<f64, String> {
    match value {
        XPathValue::NodeSet(nodes) => Ok(nodes
            .iter()
            .map(|&n| parse_number(&node_string_value(doc, n)))
            .sum()),
        XPathValue::StringList(values) => Ok(values.iter().map(|v| parse_number(v)).sum()),
        XPathValue::String(s) => Ok(parse_number(s)),
        other => Err(format!("sum() expects a node-set, got a {}", other.type_name())),
    }
}

/// round(): halves go towards positive infinity; NaN and infinities pass through
fn round_half_up(n: f64) -> f64 {
    if n.is_finite() {
        (n + 0.5).floor()
    } else {
        n
    }
}

/// Characters at 1-based positions p with round(start) <= p < round(start) + round(len)
fn substring(s: &str, start: f64, len: Option<f64>) -> String {
    let first = round_half_up(start);
    let end = len.map_or(f64::INFINITY, |l| first + round_half_up(l));
    s.chars()
        .enumerate()
        .filter(|&(i, _)| {
            let pos = (i + 1) as f64;
            pos >= first && pos < end
        })
        .map(|(_, c)| c)
        .collect()
}

fn translate(s: &str, from: &str, to: &str) -> String {
    let from: Vec<char> = from.chars().collect();
    let to: Vec<char> = to.chars().collect();
    s.chars()
        .filter_map(|c| match from.iter().position(|&f| f == c) {
            Some(i) => to.get(i).copied(),
            None => Some(c),
        })
        .collect()
}

/// lang(): the nearest xml:lang decides; subtags match their primary tag
fn lang<D: DocumentAccess>(doc: &D, context: NodeId, wanted: &str) -> bool {
    let wanted = wanted.to_lowercase();
    let mut node = Some(context);
    while let Some(id) = node {
        if let Some(value) = doc.get_attribute(id, "xml:lang") {
            let value = value.to_lowercase();
            return value == wanted
                || value
                    .strip_prefix(wanted.as_str())
                    .is_some_and(|rest| rest.starts_with('-'));
        }
        node = doc.parent_of(id);
    }
    false
}
