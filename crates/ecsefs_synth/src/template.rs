//! CloudFormation template model.

use serde::Serialize;
use serde_json::{json, Map, Value};

use ecsefs_core::{Parameter, Resource, ResourceGraph, StackOutput};

pub const TEMPLATE_FORMAT_VERSION: &str = "2010-09-09";

/// A rendered CloudFormation template.
///
/// Sections keep the graph's declaration order, so the same graph always
/// renders to the same text.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct Template {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub parameters: Map<String, Value>,
    pub resources: Map<String, Value>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,
}

impl Template {
    pub fn from_graph(graph: &ResourceGraph) -> Self {
        let parameters = graph
            .parameters()
            .iter()
            .map(|p| (p.name.clone(), parameter(p)))
            .collect();
        let resources = graph
            .resources()
            .iter()
            .map(|r| (r.id.to_string(), resource(r)))
            .collect();
        let outputs = graph
            .outputs()
            .iter()
            .map(|o| (o.key.clone(), output(o)))
            .collect();

        Self {
            format_version: TEMPLATE_FORMAT_VERSION.to_string(),
            description: graph.description().map(String::from),
            parameters,
            resources,
            outputs,
        }
    }

    pub fn resource(&self, id: &str) -> Option<&Value> {
        self.resources.get(id)
    }
}

fn parameter(parameter: &Parameter) -> Value {
    let mut entry = Map::new();
    entry.insert("Type".into(), json!(parameter.param_type));
    entry.insert("Description".into(), json!(parameter.description));
    if let Some(default) = &parameter.default {
        entry.insert("Default".into(), json!(default));
    }
    Value::Object(entry)
}

fn resource(resource: &Resource) -> Value {
    let mut entry = Map::new();
    entry.insert("Type".into(), json!(resource.kind.cfn_type()));
    if !resource.properties.is_empty() {
        entry.insert("Properties".into(), Value::Object(resource.properties.clone()));
    }
    if !resource.depends_on.is_empty() {
        let deps: Vec<&str> = resource.depends_on.iter().map(|d| d.as_str()).collect();
        entry.insert("DependsOn".into(), json!(deps));
    }
    if let Some(policy) = resource.deletion_policy {
        let policy = policy.as_str();
        entry.insert("UpdateReplacePolicy".into(), json!(policy));
        entry.insert("DeletionPolicy".into(), json!(policy));
    }
    Value::Object(entry)
}

fn output(output: &StackOutput) -> Value {
    json!({
        "Description": output.description,
        "Value": output.value
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecsefs_core::{logical_id, Concern, ResourceKind};

    #[test]
    fn test_resource_entry() {
        let mut graph = ResourceGraph::new(Some("demo".to_string()));
        let log = graph
            .add(Resource::new(logical_id(&["Logs"]), ResourceKind::LogGroup, Concern::Task).retain())
            .unwrap();
        graph
            .add(
                Resource::new(logical_id(&["Td"]), ResourceKind::TaskDefinition, Concern::Task)
                    .with_properties(json!({ "Family": "demo" }))
                    .depends_on(&log),
            )
            .unwrap();

        let template = Template::from_graph(&graph);
        assert_eq!(template.description.as_deref(), Some("demo"));

        let logs = template.resource("Logs").unwrap();
        assert_eq!(logs["Type"], "AWS::Logs::LogGroup");
        assert_eq!(logs["DeletionPolicy"], "Retain");
        assert!(logs.get("Properties").is_none());

        let td = template.resource("Td").unwrap();
        assert_eq!(td["DependsOn"][0], "Logs");
        assert_eq!(td["Properties"]["Family"], "demo");
    }

    #[test]
    fn test_empty_sections_are_omitted() {
        let template = Template::from_graph(&ResourceGraph::new(None));
        let value = serde_json::to_value(&template).unwrap();

        assert_eq!(value["AWSTemplateFormatVersion"], "2010-09-09");
        assert!(value.get("Parameters").is_none());
        assert!(value.get("Outputs").is_none());
        assert!(value.get("Description").is_none());
    }
}
