//! The ECS service running a task definition on the cluster.

use serde_json::{json, Value};

use ecsefs_spec::ServiceSpec;

use crate::error::CoreResult;
use crate::graph::{logical_id, param_ref, Concern, Resource, ResourceGraph, ResourceId, ResourceKind};

use super::cluster::{ClusterResources, PRIVATE_SUBNETS};
use super::storage::StorageResources;
use super::task::TaskResources;

/// Declare the ECS service. `LoadBalancers` starts empty and is filled by routing.
pub fn declare(
    graph: &mut ResourceGraph,
    cluster: &ClusterResources,
    service: &ServiceSpec,
    task: &TaskResources,
    storage: Option<&StorageResources>,
) -> CoreResult<ResourceId> {
    let name = service.name.as_str();

    let mut resource = Resource::new(logical_id(&["Service", name]), ResourceKind::Service, Concern::Task)
        .owned_by(name)
        .with_properties(json!({
            "Cluster": cluster.cluster.reference(),
            "TaskDefinition": task.task_definition.reference(),
            "DesiredCount": service.desired_count,
            "DeploymentConfiguration": {
                "MaximumPercent": service.max_healthy_percent(),
                "MinimumHealthyPercent": service.min_healthy_percent()
            },
            "NetworkConfiguration": {
                "AwsvpcConfiguration": {
                    "AssignPublicIp": "DISABLED",
                    "Subnets": param_ref(PRIVATE_SUBNETS),
                    "SecurityGroups": [cluster.app_group_id()]
                }
            },
            "CapacityProviderStrategy": [
                { "CapacityProvider": cluster.capacity_provider.reference(), "Weight": 1 }
            ],
            "LoadBalancers": []
        }))
        .depends_on(&cluster.associations);

    if !service.placement_strategies.is_empty() {
        resource.set_property("PlacementStrategies", placement(service));
    }

    if let Some(storage) = storage {
        for dep in storage.service_dependencies() {
            resource = resource.depends_on(&dep);
        }
    }

    graph.add(resource)
}

fn placement(service: &ServiceSpec) -> Value {
    let strategies: Vec<Value> = service
        .placement_strategies
        .iter()
        .map(|s| match s.as_ecs() {
            (kind, Some(field)) => json!({ "Type": kind, "Field": field }),
            (kind, None) => json!({ "Type": kind }),
        })
        .collect();
    Value::Array(strategies)
}
