//! EFS volumes for a service.
//!
//! Every mapping gets its own access point and volume. The task and execution
//! roles receive `elasticfilesystem:ClientMount` on the access points and the
//! filesystem and nothing more; write and root access are never granted.

use serde_json::{json, Value};
use tracing::debug;

use ecsefs_spec::{EfsMount, ServiceSpec, StackConfig};

use crate::error::CoreResult;
use crate::graph::{
    logical_id, param_ref, sub, Concern, Resource, ResourceGraph, ResourceId, ResourceKind,
    StackOutput,
};

use super::cluster::{ingress_from_group, security_group, ClusterResources, NFS_PORT, PRIVATE_SUBNETS};
use super::task::TaskResources;

/// Storage resources declared for one service.
#[derive(Debug, Clone)]
pub struct StorageResources {
    pub mount_targets: Vec<ResourceId>,
    pub mount_policy: ResourceId,
    /// Volume names registered on the task definition, in mapping order.
    pub volumes: Vec<String>,
}

impl StorageResources {
    /// Resources the ECS service must wait for before tasks can mount.
    pub fn service_dependencies(&self) -> Vec<ResourceId> {
        let mut deps = self.mount_targets.clone();
        deps.push(self.mount_policy.clone());
        deps
    }
}

/// Declare the filesystem, access points, mount policy and volumes.
pub fn attach(
    graph: &mut ResourceGraph,
    config: &StackConfig,
    cluster: &ClusterResources,
    service: &ServiceSpec,
    efs: &EfsMount,
    task: &TaskResources,
) -> CoreResult<StorageResources> {
    let name = service.name.as_str();

    let sg_id = match &efs.security_group_id {
        Some(id) => json!(id),
        None => {
            let sg = graph.add(
                security_group(
                    logical_id(&["EfsSg", name]),
                    "Security group used by EFS",
                    false,
                    Concern::Storage,
                )
                .owned_by(name),
            )?;
            sg.attr("GroupId")
        }
    };

    graph.add(
        ingress_from_group(
            logical_id(&["EfsSg", name, "From", "AppSG", &NFS_PORT.to_string()]),
            sg_id.clone(),
            cluster.app_group_id(),
            NFS_PORT,
            Concern::Storage,
        )
        .owned_by(name),
    )?;

    let (file_system, fs_id, fs_arn) = match &efs.file_system_id {
        Some(id) => (
            None,
            json!(id),
            sub(format!(
                "arn:${{AWS::Partition}}:elasticfilesystem:${{AWS::Region}}:${{AWS::AccountId}}:file-system/{}",
                id
            )),
        ),
        None => {
            let fs = graph.add(
                Resource::new(logical_id(&["EcsEfs", name]), ResourceKind::FileSystem, Concern::Storage)
                    .owned_by(name)
                    .retain()
                    .with_properties(json!({
                        "Encrypted": true,
                        "LifecyclePolicies": [{ "TransitionToIA": "AFTER_14_DAYS" }],
                        "PerformanceMode": "generalPurpose",
                        "ThroughputMode": "bursting",
                        "FileSystemTags": [{ "Key": "Name", "Value": format!("{}/{}", config.stack_name, name) }]
                    })),
            )?;
            let (id, arn) = (fs.reference(), fs.attr("Arn"));
            (Some(fs), id, arn)
        }
    };

    let mut mount_targets = Vec::new();
    if let Some(fs) = &file_system {
        for az in 0..config.az_count {
            let target = graph.add(
                Resource::new(
                    logical_id(&["EcsEfs", name, "MountTarget", &az.to_string()]),
                    ResourceKind::MountTarget,
                    Concern::Storage,
                )
                .owned_by(name)
                .with_properties(json!({
                    "FileSystemId": fs.reference(),
                    "SecurityGroups": [sg_id],
                    "SubnetId": { "Fn::Select": [az, param_ref(PRIVATE_SUBNETS)] }
                })),
            )?;
            mount_targets.push(target);
        }
    }

    let mut statements = Vec::new();
    let mut volumes = Vec::new();

    for mapping in &efs.mappings {
        let mut access_point = Resource::new(
            logical_id(&["EfsAp", name, &mapping.volume_name]),
            ResourceKind::AccessPoint,
            Concern::Storage,
        )
        .owned_by(name)
        .with_properties(json!({
            "FileSystemId": fs_id,
            "RootDirectory": { "Path": mapping.efs_path }
        }));
        if let Some(fs) = &file_system {
            access_point = access_point.depends_on(fs);
        }
        let access_point = graph.add(access_point)?;

        statements.push(json!({
            "Action": "elasticfilesystem:ClientMount",
            "Effect": "Allow",
            "Resource": [access_point.attr("Arn"), fs_arn]
        }));

        graph.get_mut(&task.task_definition)?.push_property(
            "Volumes",
            json!({
                "Name": mapping.volume_name,
                "EFSVolumeConfiguration": {
                    "FilesystemId": fs_id,
                    "TransitEncryption": "ENABLED",
                    "AuthorizationConfig": {
                        "AccessPointId": access_point.reference(),
                        "IAM": "ENABLED"
                    }
                }
            }),
        )?;

        debug!(
            "Service {}: volume {} -> {} ({})",
            name, mapping.volume_name, mapping.efs_path, mapping.container_path
        );
        volumes.push(mapping.volume_name.clone());
    }

    let mount_policy = graph.add(
        Resource::new(logical_id(&["EfsMountPolicy", name]), ResourceKind::Policy, Concern::Storage)
            .owned_by(name)
            .with_properties(json!({
                "PolicyName": format!("{}-efs-mount", name),
                "PolicyDocument": { "Version": "2012-10-17", "Statement": Value::Array(statements) },
                "Roles": [task.task_role.reference(), task.execution_role.reference()]
            })),
    )?;

    graph.add_output(StackOutput {
        key: logical_id(&["EcsEfsId", name]).to_string(),
        value: fs_id,
        description: format!("ECS EFS Id for {}", name),
    })?;
    graph.add_output(StackOutput {
        key: logical_id(&["EcsEfsArn", name]).to_string(),
        value: fs_arn,
        description: format!("ECS EFS ARN for {}", name),
    })?;

    Ok(StorageResources {
        mount_targets,
        mount_policy,
        volumes,
    })
}
