//! Declarative resource graph.
//!
//! Resources carry CloudFormation-shaped JSON properties. Edges come from two
//! places: explicit `depends_on` entries and the intrinsic references
//! (`Ref`, `Fn::GetAtt`, `${..}` in `Fn::Sub`) found inside properties.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use serde::Serialize;
use serde_json::{json, Map, Value};

use ecsefs_spec::id_segment;

use crate::error::{CoreError, CoreResult};

/// Template-unique resource name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ResourceId(String);

impl ResourceId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `{"Ref": id}`
    pub fn reference(&self) -> Value {
        json!({ "Ref": self.0 })
    }

    /// `{"Fn::GetAtt": [id, attribute]}`
    pub fn attr(&self, attribute: &str) -> Value {
        json!({ "Fn::GetAtt": [self.0, attribute] })
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Build a logical id from construct path segments.
///
/// Each segment is split on non-alphanumeric characters and the pieces are
/// joined in PascalCase: `["task-def", "app1"]` becomes `TaskDefApp1`.
pub fn logical_id(parts: &[&str]) -> ResourceId {
    ResourceId(parts.iter().map(|p| id_segment(p)).collect())
}

/// Reference to a template parameter or pseudo parameter.
pub fn param_ref(name: &str) -> Value {
    json!({ "Ref": name })
}

/// `{"Fn::Sub": template}`
pub fn sub(template: impl Into<String>) -> Value {
    json!({ "Fn::Sub": template.into() })
}

/// CloudFormation resource types produced by the assembler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum ResourceKind {
    Cluster,
    LaunchTemplate,
    AutoScalingGroup,
    CapacityProvider,
    CapacityProviderAssociations,
    SecurityGroup,
    SecurityGroupIngress,
    Role,
    InstanceProfile,
    Policy,
    LogGroup,
    FileSystem,
    MountTarget,
    AccessPoint,
    TaskDefinition,
    Service,
    LoadBalancer,
    Listener,
    ListenerRule,
    TargetGroup,
    ScalableTarget,
    ScalingPolicy,
}

impl ResourceKind {
    pub fn cfn_type(&self) -> &'static str {
        match self {
            ResourceKind::Cluster => "AWS::ECS::Cluster",
            ResourceKind::LaunchTemplate => "AWS::EC2::LaunchTemplate",
            ResourceKind::AutoScalingGroup => "AWS::AutoScaling::AutoScalingGroup",
            ResourceKind::CapacityProvider => "AWS::ECS::CapacityProvider",
            ResourceKind::CapacityProviderAssociations => {
                "AWS::ECS::ClusterCapacityProviderAssociations"
            }
            ResourceKind::SecurityGroup => "AWS::EC2::SecurityGroup",
            ResourceKind::SecurityGroupIngress => "AWS::EC2::SecurityGroupIngress",
            ResourceKind::Role => "AWS::IAM::Role",
            ResourceKind::InstanceProfile => "AWS::IAM::InstanceProfile",
            ResourceKind::Policy => "AWS::IAM::Policy",
            ResourceKind::LogGroup => "AWS::Logs::LogGroup",
            ResourceKind::FileSystem => "AWS::EFS::FileSystem",
            ResourceKind::MountTarget => "AWS::EFS::MountTarget",
            ResourceKind::AccessPoint => "AWS::EFS::AccessPoint",
            ResourceKind::TaskDefinition => "AWS::ECS::TaskDefinition",
            ResourceKind::Service => "AWS::ECS::Service",
            ResourceKind::LoadBalancer => "AWS::ElasticLoadBalancingV2::LoadBalancer",
            ResourceKind::Listener => "AWS::ElasticLoadBalancingV2::Listener",
            ResourceKind::ListenerRule => "AWS::ElasticLoadBalancingV2::ListenerRule",
            ResourceKind::TargetGroup => "AWS::ElasticLoadBalancingV2::TargetGroup",
            ResourceKind::ScalableTarget => "AWS::ApplicationAutoScaling::ScalableTarget",
            ResourceKind::ScalingPolicy => "AWS::ApplicationAutoScaling::ScalingPolicy",
        }
    }
}

/// Which part of the stack a resource belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Concern {
    Cluster,
    Network,
    Task,
    Storage,
    Routing,
    Scaling,
}

impl Concern {
    pub fn as_str(&self) -> &'static str {
        match self {
            Concern::Cluster => "cluster",
            Concern::Network => "network",
            Concern::Task => "task",
            Concern::Storage => "storage",
            Concern::Routing => "routing",
            Concern::Scaling => "scaling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DeletionPolicy {
    Retain,
}

impl DeletionPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeletionPolicy::Retain => "Retain",
        }
    }
}

/// A declared resource.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resource {
    pub id: ResourceId,
    pub kind: ResourceKind,
    pub concern: Concern,
    /// Service that owns the resource; `None` for cluster-wide and shared resources.
    pub owner: Option<String>,
    pub properties: Map<String, Value>,
    pub depends_on: BTreeSet<ResourceId>,
    pub deletion_policy: Option<DeletionPolicy>,
}

impl Resource {
    pub fn new(id: ResourceId, kind: ResourceKind, concern: Concern) -> Self {
        Self {
            id,
            kind,
            concern,
            owner: None,
            properties: Map::new(),
            depends_on: BTreeSet::new(),
            deletion_policy: None,
        }
    }

    pub fn owned_by(mut self, service: impl Into<String>) -> Self {
        self.owner = Some(service.into());
        self
    }

    /// Set properties from a JSON object. Non-object values are ignored.
    pub fn with_properties(mut self, properties: Value) -> Self {
        if let Value::Object(map) = properties {
            self.properties = map;
        }
        self
    }

    pub fn depends_on(mut self, id: &ResourceId) -> Self {
        self.depends_on.insert(id.clone());
        self
    }

    pub fn retain(mut self) -> Self {
        self.deletion_policy = Some(DeletionPolicy::Retain);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn set_property(&mut self, key: impl Into<String>, value: Value) {
        self.properties.insert(key.into(), value);
    }

    /// Append to an array property, creating it if absent.
    pub fn push_property(&mut self, key: &str, value: Value) -> CoreResult<()> {
        let entry = self
            .properties
            .entry(key.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        match entry {
            Value::Array(items) => {
                items.push(value);
                Ok(())
            }
            _ => Err(CoreError::InvalidProperty {
                resource: self.id.to_string(),
                property: key.to_string(),
                message: "not an array".to_string(),
            }),
        }
    }

    /// Names referenced from properties through intrinsic functions.
    pub fn references(&self) -> BTreeSet<String> {
        let mut names = BTreeSet::new();
        for value in self.properties.values() {
            collect_references(value, &mut names);
        }
        names
    }
}

/// Collect `Ref`, `Fn::GetAtt` and `Fn::Sub` targets from a JSON value.
pub fn collect_references(value: &Value, names: &mut BTreeSet<String>) {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(name)) = map.get("Ref") {
                names.insert(name.clone());
            }
            if let Some(Value::Array(parts)) = map.get("Fn::GetAtt") {
                if let Some(Value::String(name)) = parts.first() {
                    names.insert(name.clone());
                }
            }
            if let Some(Value::String(template)) = map.get("Fn::Sub") {
                names.extend(sub_variables(template));
            }
            for (key, nested) in map {
                if key != "Ref" {
                    collect_references(nested, names);
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_references(item, names);
            }
        }
        _ => {}
    }
}

/// Variables in an `Fn::Sub` template: `${Name}` and `${Name.Attr}` yield `Name`.
fn sub_variables(template: &str) -> Vec<String> {
    let mut names = Vec::new();
    let mut rest = template;
    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        let Some(end) = after.find('}') else { break };
        let var = &after[..end];
        // `${!Literal}` is an escape, not a reference.
        if !var.starts_with('!') {
            let name = var.split('.').next().unwrap_or(var);
            names.push(name.to_string());
        }
        rest = &after[end + 1..];
    }
    names
}

/// Template parameter supplied at deploy time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    pub name: String,
    pub param_type: String,
    pub description: String,
    pub default: Option<String>,
}

/// An emitted value (template output).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StackOutput {
    pub key: String,
    pub value: Value,
    pub description: String,
}

/// The assembled resource graph.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResourceGraph {
    description: Option<String>,
    parameters: Vec<Parameter>,
    resources: Vec<Resource>,
    index: HashMap<ResourceId, usize>,
    outputs: Vec<StackOutput>,
}

impl ResourceGraph {
    pub fn new(description: Option<String>) -> Self {
        Self {
            description,
            ..Self::default()
        }
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn add_parameter(&mut self, parameter: Parameter) -> CoreResult<()> {
        if self.parameters.iter().any(|p| p.name == parameter.name) {
            return Err(CoreError::DuplicateParameter(parameter.name));
        }
        self.parameters.push(parameter);
        Ok(())
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Add a resource. Fails if the logical id is already taken.
    pub fn add(&mut self, resource: Resource) -> CoreResult<ResourceId> {
        if self.index.contains_key(&resource.id) {
            return Err(CoreError::DuplicateResource(resource.id.to_string()));
        }
        let id = resource.id.clone();
        self.index.insert(id.clone(), self.resources.len());
        self.resources.push(resource);
        Ok(id)
    }

    pub fn get(&self, id: &ResourceId) -> Option<&Resource> {
        self.index.get(id).map(|&i| &self.resources[i])
    }

    pub fn get_mut(&mut self, id: &ResourceId) -> CoreResult<&mut Resource> {
        match self.index.get(id) {
            Some(&i) => Ok(&mut self.resources[i]),
            None => Err(CoreError::ResourceNotFound(id.to_string())),
        }
    }

    pub fn contains(&self, id: &ResourceId) -> bool {
        self.index.contains_key(id)
    }

    /// Resources in declaration order.
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    pub fn of_kind(&self, kind: ResourceKind) -> impl Iterator<Item = &Resource> {
        self.resources.iter().filter(move |r| r.kind == kind)
    }

    pub fn count(&self, kind: ResourceKind) -> usize {
        self.of_kind(kind).count()
    }

    pub fn owned_by<'a>(&'a self, service: &'a str) -> impl Iterator<Item = &'a Resource> + 'a {
        self.resources
            .iter()
            .filter(move |r| r.owner.as_deref() == Some(service))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    /// Add an explicit dependency edge. Both ends must exist.
    pub fn add_dependency(&mut self, from: &ResourceId, to: &ResourceId) -> CoreResult<()> {
        if !self.contains(to) {
            return Err(CoreError::ResourceNotFound(to.to_string()));
        }
        self.get_mut(from)?.depends_on.insert(to.clone());
        Ok(())
    }

    pub fn add_output(&mut self, output: StackOutput) -> CoreResult<()> {
        if self.outputs.iter().any(|o| o.key == output.key) {
            return Err(CoreError::DuplicateOutput(output.key));
        }
        self.outputs.push(output);
        Ok(())
    }

    pub fn outputs(&self) -> &[StackOutput] {
        &self.outputs
    }

    /// Resource-to-resource edges, explicit and implicit, sorted.
    pub fn edges(&self) -> Vec<(ResourceId, ResourceId)> {
        let mut edges = BTreeSet::new();
        for resource in &self.resources {
            for dep in &resource.depends_on {
                edges.insert((resource.id.clone(), dep.clone()));
            }
            for name in resource.references() {
                let target = ResourceId::new(name);
                if self.contains(&target) {
                    edges.insert((resource.id.clone(), target));
                }
            }
        }
        edges.into_iter().collect()
    }

    /// Ensure every reference resolves to a resource, parameter or pseudo parameter.
    pub fn check_references(&self) -> CoreResult<()> {
        for resource in &self.resources {
            for dep in &resource.depends_on {
                if !self.contains(dep) {
                    return Err(CoreError::DanglingReference {
                        from: resource.id.to_string(),
                        target: dep.to_string(),
                    });
                }
            }
            for name in resource.references() {
                if !self.resolves(&name) {
                    return Err(CoreError::DanglingReference {
                        from: resource.id.to_string(),
                        target: name,
                    });
                }
            }
        }

        for output in &self.outputs {
            let mut names = BTreeSet::new();
            collect_references(&output.value, &mut names);
            if let Some(name) = names.into_iter().find(|n| !self.resolves(n)) {
                return Err(CoreError::DanglingReference {
                    from: output.key.clone(),
                    target: name,
                });
            }
        }

        Ok(())
    }

    fn resolves(&self, name: &str) -> bool {
        name.starts_with("AWS::")
            || self.parameters.iter().any(|p| p.name == name)
            || self.contains(&ResourceId::new(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_logical_id() {
        assert_eq!(logical_id(&["task-def", "app1"]).as_str(), "TaskDefApp1");
        assert_eq!(logical_id(&["Alb", "shared-alb", "Listener"]).as_str(), "AlbSharedAlbListener");
        assert_eq!(logical_id(&["LBSG"]).as_str(), "LBSG");
    }

    #[test]
    fn test_duplicate_resource_rejected() {
        let mut graph = ResourceGraph::new(None);
        let id = logical_id(&["EcsCluster"]);
        graph
            .add(Resource::new(id.clone(), ResourceKind::Cluster, Concern::Cluster))
            .unwrap();

        let err = graph
            .add(Resource::new(id, ResourceKind::Cluster, Concern::Cluster))
            .unwrap_err();
        assert!(matches!(err, CoreError::DuplicateResource(_)));
    }

    #[test]
    fn test_references_and_edges() {
        let mut graph = ResourceGraph::new(None);
        graph
            .add_parameter(Parameter {
                name: "VpcId".to_string(),
                param_type: "AWS::EC2::VPC::Id".to_string(),
                description: "VPC".to_string(),
                default: None,
            })
            .unwrap();
        let sg = graph
            .add(
                Resource::new(logical_id(&["AppSG"]), ResourceKind::SecurityGroup, Concern::Network)
                    .with_properties(json!({ "VpcId": param_ref("VpcId") })),
            )
            .unwrap();
        let ingress = graph
            .add(
                Resource::new(
                    logical_id(&["AppSG", "Ingress"]),
                    ResourceKind::SecurityGroupIngress,
                    Concern::Network,
                )
                .with_properties(json!({
                    "GroupId": sg.attr("GroupId"),
                    "Description": sub("from ${AWS::Region} ${AppSG.GroupId} ${!Literal}"),
                })),
            )
            .unwrap();

        let refs = graph.get(&ingress).unwrap().references();
        assert!(refs.contains("AppSG"));
        assert!(refs.contains("AWS::Region"));
        assert!(!refs.contains("!Literal"));

        assert_eq!(graph.edges(), vec![(ingress, sg)]);
        graph.check_references().unwrap();
    }

    #[test]
    fn test_dangling_reference_detected() {
        let mut graph = ResourceGraph::new(None);
        graph
            .add(
                Resource::new(logical_id(&["Svc"]), ResourceKind::Service, Concern::Task)
                    .with_properties(json!({ "TaskDefinition": { "Ref": "Missing" } })),
            )
            .unwrap();

        let err = graph.check_references().unwrap_err();
        assert!(matches!(err, CoreError::DanglingReference { ref target, .. } if target == "Missing"));
    }

    #[test]
    fn test_add_dependency_requires_both_ends() {
        let mut graph = ResourceGraph::new(None);
        let service = graph
            .add(Resource::new(logical_id(&["Svc"]), ResourceKind::Service, Concern::Task))
            .unwrap();
        let listener = graph
            .add(Resource::new(logical_id(&["Listener"]), ResourceKind::Listener, Concern::Routing))
            .unwrap();

        graph.add_dependency(&service, &listener).unwrap();
        assert!(graph.get(&service).unwrap().depends_on.contains(&listener));

        let err = graph.add_dependency(&service, &ResourceId::new("Missing")).unwrap_err();
        assert!(matches!(err, CoreError::ResourceNotFound(ref id) if id == "Missing"));
    }

    #[test]
    fn test_push_property() {
        let mut resource = Resource::new(logical_id(&["Td"]), ResourceKind::TaskDefinition, Concern::Task);
        resource.push_property("Volumes", json!({ "Name": "app" })).unwrap();
        resource.push_property("Volumes", json!({ "Name": "data" })).unwrap();
        assert_eq!(resource.property("Volumes").unwrap().as_array().unwrap().len(), 2);

        resource.set_property("Family", json!("x"));
        assert!(resource.push_property("Family", json!("y")).is_err());
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let mut graph = ResourceGraph::new(None);
        let output = StackOutput {
            key: "EcsLbDnsNameSharedAlb".to_string(),
            value: json!("x"),
            description: "ECS Load Balancer DNS Name".to_string(),
        };
        graph.add_output(output.clone()).unwrap();
        assert!(matches!(graph.add_output(output), Err(CoreError::DuplicateOutput(_))));
    }
}
