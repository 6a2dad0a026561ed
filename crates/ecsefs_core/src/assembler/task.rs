//! Per-service task definition and container.

use serde_json::{json, Map, Value};

use ecsefs_spec::{ServiceSpec, StackConfig};

use crate::error::CoreResult;
use crate::graph::{logical_id, param_ref, Concern, Resource, ResourceGraph, ResourceId, ResourceKind};

use super::cluster::assume_role_policy;

/// Resources private to one service's task.
#[derive(Debug, Clone)]
pub struct TaskResources {
    pub task_definition: ResourceId,
    pub task_role: ResourceId,
    pub execution_role: ResourceId,
    pub log_group: ResourceId,
}

/// Declare a fresh task definition with its roles and log group.
pub fn define(
    graph: &mut ResourceGraph,
    config: &StackConfig,
    service: &ServiceSpec,
) -> CoreResult<TaskResources> {
    let name = service.name.as_str();

    let task_role = graph.add(
        Resource::new(logical_id(&["TaskDef", name, "TaskRole"]), ResourceKind::Role, Concern::Task)
            .owned_by(name)
            .with_properties(json!({
                "AssumeRolePolicyDocument": assume_role_policy("ecs-tasks.amazonaws.com")
            })),
    )?;

    let execution_role = graph.add(
        Resource::new(
            logical_id(&["TaskDef", name, "ExecutionRole"]),
            ResourceKind::Role,
            Concern::Task,
        )
        .owned_by(name)
        .with_properties(json!({
            "AssumeRolePolicyDocument": assume_role_policy("ecs-tasks.amazonaws.com")
        })),
    )?;

    let log_group = graph.add(
        Resource::new(logical_id(&["TaskDef", name, "LogGroup"]), ResourceKind::LogGroup, Concern::Task)
            .owned_by(name)
            .retain(),
    )?;

    graph.add(
        Resource::new(
            logical_id(&["TaskDef", name, "ExecutionRoleDefaultPolicy"]),
            ResourceKind::Policy,
            Concern::Task,
        )
        .owned_by(name)
        .with_properties(json!({
            "PolicyName": format!("{}-execution-logs", name),
            "PolicyDocument": {
                "Version": "2012-10-17",
                "Statement": [{
                    "Action": ["logs:CreateLogStream", "logs:PutLogEvents"],
                    "Effect": "Allow",
                    "Resource": log_group.attr("Arn")
                }]
            },
            "Roles": [execution_role.reference()]
        })),
    )?;

    let task_definition = graph.add(
        Resource::new(logical_id(&["TaskDef", name]), ResourceKind::TaskDefinition, Concern::Task)
            .owned_by(name)
            .with_properties(json!({
                "Family": format!("{}-{}", config.stack_name, name),
                "NetworkMode": "awsvpc",
                "RequiresCompatibilities": ["EC2"],
                "TaskRoleArn": task_role.attr("Arn"),
                "ExecutionRoleArn": execution_role.attr("Arn"),
                "ContainerDefinitions": [],
                "Volumes": []
            })),
    )?;

    Ok(TaskResources {
        task_definition,
        task_role,
        execution_role,
        log_group,
    })
}

/// Attach the service's container, binding every mount by volume name.
pub fn add_container(
    graph: &mut ResourceGraph,
    service: &ServiceSpec,
    task: &TaskResources,
) -> CoreResult<()> {
    let container = container_definition(service, &task.log_group);
    graph
        .get_mut(&task.task_definition)?
        .push_property("ContainerDefinitions", container)
}

fn container_definition(service: &ServiceSpec, log_group: &ResourceId) -> Value {
    let spec = &service.container;
    let mut def = Map::new();

    def.insert("Name".into(), json!(service.container_name()));
    def.insert("Image".into(), json!(spec.image));
    def.insert("Essential".into(), json!(spec.essential));
    if let Some(cpu) = spec.cpu {
        def.insert("Cpu".into(), json!(cpu));
    }
    if let Some(memory) = spec.memory_limit_mib {
        def.insert("Memory".into(), json!(memory));
    }
    if let Some(reservation) = spec.memory_reservation_mib {
        def.insert("MemoryReservation".into(), json!(reservation));
    }
    if !spec.command.is_empty() {
        def.insert("Command".into(), json!(spec.command));
    }
    if !spec.environment.is_empty() {
        let env: Vec<Value> = spec
            .environment
            .iter()
            .map(|(k, v)| json!({ "Name": k, "Value": v }))
            .collect();
        def.insert("Environment".into(), Value::Array(env));
    }

    // awsvpc requires the host port to equal the container port.
    let ports: Vec<Value> = spec
        .port_mappings
        .iter()
        .map(|p| {
            json!({
                "ContainerPort": p.container_port,
                "HostPort": p.host_port.unwrap_or(p.container_port),
                "Protocol": p.protocol.as_str()
            })
        })
        .collect();
    def.insert("PortMappings".into(), Value::Array(ports));

    let mounts: Vec<Value> = service
        .mounts()
        .iter()
        .map(|m| {
            json!({
                "ContainerPath": m.container_path,
                "SourceVolume": m.volume_name,
                "ReadOnly": m.read_only
            })
        })
        .collect();
    if !mounts.is_empty() {
        def.insert("MountPoints".into(), Value::Array(mounts));
    }

    def.insert(
        "LogConfiguration".into(),
        json!({
            "LogDriver": "awslogs",
            "Options": {
                "awslogs-group": log_group.reference(),
                "awslogs-stream-prefix": service.name,
                "awslogs-region": param_ref("AWS::Region")
            }
        }),
    );

    Value::Object(def)
}
