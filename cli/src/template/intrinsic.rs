//! CloudFormation intrinsic functions in long form.
//!
//! `{"Ref": "X"}` rather than `!Ref X`, so the documents stay plain YAML
//! and can be produced with serde.

use serde_json::{json, Map, Value};

pub const AWS_ACCOUNT_ID: &str = "AWS::AccountId";

/// Pseudo parameters CloudFormation always resolves
pub const PSEUDO_PARAMETERS: &[&str] = &[
    "AWS::AccountId",
    "AWS::NotificationARNs",
    "AWS::NoValue",
    "AWS::Partition",
    "AWS::Region",
    "AWS::StackId",
    "AWS::StackName",
    "AWS::URLSuffix",
];

/// `Ref` to a parameter, resource or pseudo parameter
pub fn reference(logical_id: &str) -> Value {
    json!({ "Ref": logical_id })
}

/// `Fn::GetAtt` on a resource attribute
pub fn get_att(logical_id: &str, attribute: &str) -> Value {
    json!({ "Fn::GetAtt": [logical_id, attribute] })
}

/// `Fn::Join` with a delimiter
pub fn join<I>(delimiter: &str, parts: I) -> Value
where
    I: IntoIterator,
    I::Item: Into<Value>,
{
    let parts: Vec<Value> = parts.into_iter().map(Into::into).collect();
    json!({ "Fn::Join": [delimiter, parts] })
}

/// `Fn::Sub` resolving `${Name}` against the template
pub fn sub(template: &str) -> Value {
    json!({ "Fn::Sub": template })
}

/// `Fn::Sub` with an explicit variable map
pub fn sub_with<I, K>(template: &str, variables: I) -> Value
where
    I: IntoIterator<Item = (K, Value)>,
    K: Into<String>,
{
    let vars: Map<String, Value> = variables
        .into_iter()
        .map(|(k, v)| (k.into(), v))
        .collect();
    json!({ "Fn::Sub": [template, vars] })
}

/// A logical id an intrinsic points at
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// `Ref` or a bare `${Name}` in `Fn::Sub`
    Ref(String),
    /// `Fn::GetAtt` or `${Name.Attr}` in `Fn::Sub`
    Attribute(String),
}

impl Target {
    pub fn logical_id(&self) -> &str {
        match self {
            Self::Ref(id) | Self::Attribute(id) => id,
        }
    }
}

/// Walk a property tree and collect everything it references
pub fn collect_targets(value: &Value, out: &mut Vec<Target>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(id)) = map.get("Ref") {
                out.push(Target::Ref(id.clone()));
            }
            if let Some(Value::Array(args)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(id)) = args.first() {
                    out.push(Target::Attribute(id.clone()));
                }
            }
            match map.get("Fn::Sub") {
                Some(Value::String(template)) => sub_targets(template, &Map::new(), out),
                Some(Value::Array(args)) => {
                    if let (Some(Value::String(template)), Some(Value::Object(vars))) =
                        (args.first(), args.get(1))
                    {
                        sub_targets(template, vars, out);
                        for v in vars.values() {
                            collect_targets(v, out);
                        }
                    }
                }
                _ => {}
            }
            for (key, v) in map {
                if key != "Fn::Sub" {
                    collect_targets(v, out);
                }
            }
        }
        Value::Array(items) => {
            for v in items {
                collect_targets(v, out);
            }
        }
        _ => {}
    }
}

/// `${Name}` placeholders in a Sub string that the variable map does not cover.
/// `${!Literal}` is an escape and is skipped.
fn sub_targets(template: &str, vars: &Map<String, Value>, out: &mut Vec<Target>) {
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else {
            break;
        };
        let name = &after[..end];
        rest = &after[end + 1..];

        if name.starts_with('!') || vars.contains_key(name) {
            continue;
        }
        match name.split_once('.') {
            Some((id, _attr)) => out.push(Target::Attribute(id.to_string())),
            None => out.push(Target::Ref(name.to_string())),
        }
    }
}
