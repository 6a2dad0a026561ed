//! Target-tracking autoscaling on a service's desired count.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use ecsefs_spec::{AutoscalePolicy, ScalingTrigger, ServiceSpec};

use crate::error::CoreResult;
use crate::graph::{logical_id, sub, Concern, Resource, ResourceGraph, ResourceId, ResourceKind};

use super::cluster::ClusterResources;
use super::routing::ServiceRoute;

/// Scaling resources declared for one service.
#[derive(Debug, Clone, Serialize)]
pub struct ScalingResources {
    pub scalable_target: ResourceId,
    pub policy: ResourceId,
    /// `"cpu"` or `"request-count"`.
    pub trigger: &'static str,
}

/// Declare the scalable target and its single tracking policy.
pub fn attach(
    graph: &mut ResourceGraph,
    cluster: &ClusterResources,
    service: &ServiceSpec,
    ecs_service: &ResourceId,
    route: &ServiceRoute,
    policy: &AutoscalePolicy,
) -> CoreResult<ScalingResources> {
    let name = service.name.as_str();

    let scalable_target = graph.add(
        Resource::new(
            logical_id(&["Service", name, "TaskCount", "Target"]),
            ResourceKind::ScalableTarget,
            Concern::Scaling,
        )
        .owned_by(name)
        .with_properties(json!({
            "MaxCapacity": policy.max,
            "MinCapacity": policy.min,
            "ResourceId": {
                "Fn::Join": ["", ["service/", cluster.cluster.reference(), "/", ecs_service.attr("Name")]]
            },
            "RoleARN": sub(
                "arn:${AWS::Partition}:iam::${AWS::AccountId}:role/aws-service-role/ecs.application-autoscaling.amazonaws.com/AWSServiceRoleForApplicationAutoScaling_ECSService"
            ),
            "ScalableDimension": "ecs:service:DesiredCount",
            "ServiceNamespace": "ecs"
        })),
    )?;

    let (suffix, config, in_cooldown, out_cooldown) = match &policy.trigger {
        ScalingTrigger::Cpu(cpu) => (
            "CpuScaling",
            json!({
                "PredefinedMetricSpecification": {
                    "PredefinedMetricType": "ECSServiceAverageCPUUtilization"
                },
                "TargetValue": cpu.target_utilization_percent
            }),
            cpu.scale_in_cooldown_secs,
            cpu.scale_out_cooldown_secs,
        ),
        ScalingTrigger::RequestCount(requests) => (
            "RequestScaling",
            json!({
                "PredefinedMetricSpecification": {
                    "PredefinedMetricType": "ALBRequestCountPerTarget",
                    "ResourceLabel": {
                        "Fn::Join": ["/", [
                            route.load_balancer.attr("LoadBalancerFullName"),
                            route.target_group.attr("TargetGroupFullName")
                        ]]
                    }
                },
                "TargetValue": requests.requests_per_target
            }),
            requests.scale_in_cooldown_secs,
            requests.scale_out_cooldown_secs,
        ),
    };

    let mut config = match config {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    if let Some(secs) = in_cooldown {
        config.insert("ScaleInCooldown".into(), json!(secs));
    }
    if let Some(secs) = out_cooldown {
        config.insert("ScaleOutCooldown".into(), json!(secs));
    }

    let mut scaling_policy = Resource::new(
        logical_id(&["Service", name, "TaskCount", "Target", suffix]),
        ResourceKind::ScalingPolicy,
        Concern::Scaling,
    )
    .owned_by(name)
    .with_properties(json!({
        "PolicyName": format!("{}-{}", name, policy.trigger.name()),
        "PolicyType": "TargetTrackingScaling",
        "ScalingTargetId": scalable_target.reference(),
        "TargetTrackingScalingPolicyConfiguration": Value::Object(config)
    }));
    if let ScalingTrigger::RequestCount(_) = policy.trigger {
        // The metric only exists once the target group is attached.
        scaling_policy = scaling_policy.depends_on(route.attachment());
    }
    let scaling_policy = graph.add(scaling_policy)?;

    debug!(
        "Service {}: {} scaling between {} and {}",
        name,
        policy.trigger.name(),
        policy.min,
        policy.max
    );

    Ok(ScalingResources {
        scalable_target,
        policy: scaling_policy,
        trigger: policy.trigger.name(),
    })
}
