//! CloudFormation template model
//!
//! A small declarative builder: parameters, resources and outputs keyed by
//! logical id, serialised to YAML. References between them are checked
//! before anything is written.

pub mod intrinsic;

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{Context, Result};

use crate::error::TemplateError;
use intrinsic::{collect_targets, Target, PSEUDO_PARAMETERS};

const FORMAT_VERSION: &str = "2010-09-09";

/// Template parameter (always `String` here)
#[derive(Debug, Clone, Serialize)]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub kind: String,

    #[serde(rename = "Description")]
    pub description: String,
}

impl Parameter {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            kind: "String".to_string(),
            description: description.into(),
        }
    }
}

/// A resource declaration
#[derive(Debug, Clone, Serialize)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub kind: String,

    #[serde(rename = "DependsOn", skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,

    #[serde(rename = "Properties", skip_serializing_if = "Value::is_null")]
    pub properties: Value,
}

impl Resource {
    pub fn new(kind: impl Into<String>, properties: Value) -> Self {
        Self {
            kind: kind.into(),
            depends_on: Vec::new(),
            properties,
        }
    }

    pub fn depends_on<I, S>(mut self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.depends_on.extend(ids.into_iter().map(Into::into));
        self
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Export {
    #[serde(rename = "Name")]
    pub name: String,
}

/// A stack output
#[derive(Debug, Clone, Serialize)]
pub struct Output {
    #[serde(rename = "Description", skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(rename = "Value")]
    pub value: Value,

    #[serde(rename = "Export", skip_serializing_if = "Option::is_none")]
    pub export: Option<Export>,
}

impl Output {
    pub fn new(value: Value) -> Self {
        Self {
            description: None,
            value,
            export: None,
        }
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn export(mut self, name: impl Into<String>) -> Self {
        self.export = Some(Export { name: name.into() });
        self
    }
}

/// A CloudFormation document
#[derive(Debug, Clone, Serialize)]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    format_version: &'static str,

    #[serde(rename = "Description")]
    description: String,

    #[serde(rename = "Parameters", skip_serializing_if = "BTreeMap::is_empty")]
    parameters: BTreeMap<String, Parameter>,

    #[serde(rename = "Resources")]
    resources: BTreeMap<String, Resource>,

    #[serde(rename = "Outputs", skip_serializing_if = "BTreeMap::is_empty")]
    outputs: BTreeMap<String, Output>,
}

impl Template {
    pub fn new(description: impl Into<String>) -> Self {
        Self {
            format_version: FORMAT_VERSION,
            description: description.into(),
            parameters: BTreeMap::new(),
            resources: BTreeMap::new(),
            outputs: BTreeMap::new(),
        }
    }

    pub fn add_parameter(
        &mut self,
        logical_id: &str,
        parameter: Parameter,
    ) -> Result<(), TemplateError> {
        self.check_new_id(logical_id)?;
        self.parameters.insert(logical_id.to_string(), parameter);
        Ok(())
    }

    pub fn add_resource(
        &mut self,
        logical_id: &str,
        resource: Resource,
    ) -> Result<(), TemplateError> {
        self.check_new_id(logical_id)?;
        self.resources.insert(logical_id.to_string(), resource);
        Ok(())
    }

    pub fn add_output(&mut self, name: &str, output: Output) -> Result<(), TemplateError> {
        if self.outputs.contains_key(name) {
            return Err(TemplateError::DuplicateLogicalId {
                logical_id: name.to_string(),
            });
        }
        self.outputs.insert(name.to_string(), output);
        Ok(())
    }

    #[cfg(test)]
    pub fn resource(&self, logical_id: &str) -> Option<&Resource> {
        self.resources.get(logical_id)
    }

    #[cfg(test)]
    pub fn output(&self, name: &str) -> Option<&Output> {
        self.outputs.get(name)
    }

    pub fn resource_ids(&self) -> impl Iterator<Item = &str> {
        self.resources.keys().map(String::as_str)
    }

    // Parameters and resources share one namespace
    fn check_new_id(&self, logical_id: &str) -> Result<(), TemplateError> {
        if self.parameters.contains_key(logical_id) || self.resources.contains_key(logical_id) {
            return Err(TemplateError::DuplicateLogicalId {
                logical_id: logical_id.to_string(),
            });
        }
        Ok(())
    }

    /// Check every reference and `DependsOn` names something declared.
    pub fn validate(&self) -> Result<(), TemplateError> {
        for (id, resource) in &self.resources {
            for dep in &resource.depends_on {
                if !self.resources.contains_key(dep) {
                    return Err(TemplateError::UnknownReference {
                        location: format!("Resources.{}.DependsOn", id),
                        target: dep.clone(),
                    });
                }
            }
            self.check_targets(&format!("Resources.{}", id), &resource.properties)?;
        }

        for (name, output) in &self.outputs {
            self.check_targets(&format!("Outputs.{}", name), &output.value)?;
        }

        Ok(())
    }

    fn check_targets(&self, location: &str, value: &Value) -> Result<(), TemplateError> {
        let mut targets = Vec::new();
        collect_targets(value, &mut targets);

        for target in targets {
            let id = target.logical_id();
            let known = match target {
                Target::Ref(_) => {
                    PSEUDO_PARAMETERS.contains(&id)
                        || self.parameters.contains_key(id)
                        || self.resources.contains_key(id)
                }
                Target::Attribute(_) => self.resources.contains_key(id),
            };
            if !known {
                return Err(TemplateError::UnknownReference {
                    location: location.to_string(),
                    target: id.to_string(),
                });
            }
        }
        Ok(())
    }

    /// Validate and serialise to YAML
    pub fn to_yaml(&self) -> Result<String, TemplateError> {
        self.validate()?;
        serde_yaml::to_string(self).map_err(|e| TemplateError::Serialize {
            message: e.to_string(),
        })
    }

    /// Validate, serialise and write to `path`, creating parent directories
    pub fn write_to(&self, path: &Path) -> Result<()> {
        let yaml = self.to_yaml()?;
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create {}", parent.display()))?;
            }
        }
        std::fs::write(path, yaml).with_context(|| format!("Failed to write {}", path.display()))?;
        Ok(())
    }
}
