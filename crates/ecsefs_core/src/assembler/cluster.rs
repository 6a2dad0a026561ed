//! Cluster-wide resources: parameters, security groups and EC2 capacity.

use serde_json::{json, Value};
use tracing::debug;

use ecsefs_spec::{MachineImage, StackConfig};

use crate::error::CoreResult;
use crate::graph::{
    logical_id, param_ref, sub, Concern, Parameter, Resource, ResourceGraph, ResourceId,
    ResourceKind,
};

pub const VPC_ID: &str = "VpcId";
pub const PRIVATE_SUBNETS: &str = "PrivateSubnetIds";
pub const PUBLIC_SUBNETS: &str = "PublicSubnetIds";
pub const AMI_ID: &str = "EcsAmiId";

pub(crate) const NFS_PORT: u16 = 2049;
const MYSQL_PORT: u16 = 3306;

/// Handles to the resources every service builds on.
#[derive(Debug, Clone)]
pub struct ClusterResources {
    pub cluster: ResourceId,
    pub capacity_provider: ResourceId,
    pub associations: ResourceId,
    pub lb_security_group: ResourceId,
    pub app_security_group: ResourceId,
    pub db_security_group: ResourceId,
}

impl ClusterResources {
    pub fn app_group_id(&self) -> Value {
        self.app_security_group.attr("GroupId")
    }

    pub fn lb_group_id(&self) -> Value {
        self.lb_security_group.attr("GroupId")
    }
}

/// Declare the deploy-time parameters standing in for the VPC lookup.
pub fn declare_parameters(graph: &mut ResourceGraph, config: &StackConfig) -> CoreResult<()> {
    graph.add_parameter(Parameter {
        name: VPC_ID.to_string(),
        param_type: "AWS::EC2::VPC::Id".to_string(),
        description: format!("Id of the VPC named '{}'", config.vpc_name),
        default: None,
    })?;
    graph.add_parameter(Parameter {
        name: PRIVATE_SUBNETS.to_string(),
        param_type: "List<AWS::EC2::Subnet::Id>".to_string(),
        description: format!(
            "Private subnets with egress of '{}', one per availability zone ({} expected)",
            config.vpc_name, config.az_count
        ),
        default: None,
    })?;
    graph.add_parameter(Parameter {
        name: PUBLIC_SUBNETS.to_string(),
        param_type: "List<AWS::EC2::Subnet::Id>".to_string(),
        description: format!("Public subnets of '{}' for internet-facing load balancers", config.vpc_name),
        default: None,
    })?;

    if let MachineImage::EcsOptimized { generation } = &config.capacity.machine_image {
        graph.add_parameter(Parameter {
            name: AMI_ID.to_string(),
            param_type: "AWS::SSM::Parameter::Value<AWS::EC2::Image::Id>".to_string(),
            description: "ECS-optimized AMI for container instances".to_string(),
            default: Some(generation.ssm_parameter().to_string()),
        })?;
    }

    Ok(())
}

/// Security group in the stack VPC.
pub(crate) fn security_group(
    id: ResourceId,
    description: &str,
    allow_all_outbound: bool,
    concern: Concern,
) -> Resource {
    let egress = if allow_all_outbound {
        json!([{ "CidrIp": "0.0.0.0/0", "Description": "Allow all outbound traffic by default", "IpProtocol": "-1" }])
    } else {
        json!([{
            "CidrIp": "255.255.255.255/32",
            "Description": "Disallow all traffic",
            "IpProtocol": "icmp",
            "FromPort": 252,
            "ToPort": 86
        }])
    };

    Resource::new(id, ResourceKind::SecurityGroup, concern).with_properties(json!({
        "GroupDescription": description,
        "SecurityGroupEgress": egress,
        "VpcId": param_ref(VPC_ID),
    }))
}

/// TCP ingress on `group` from another security group.
pub(crate) fn ingress_from_group(
    id: ResourceId,
    group: Value,
    source: Value,
    port: u16,
    concern: Concern,
) -> Resource {
    Resource::new(id, ResourceKind::SecurityGroupIngress, concern).with_properties(json!({
        "GroupId": group,
        "SourceSecurityGroupId": source,
        "IpProtocol": "tcp",
        "FromPort": port,
        "ToPort": port,
        "Description": format!("tcp {}", port),
    }))
}

/// Build the cluster, its EC2 capacity and the shared security groups.
pub fn build(graph: &mut ResourceGraph, config: &StackConfig) -> CoreResult<ClusterResources> {
    let (db_sg, app_sg, lb_sg) = build_security_groups(graph)?;

    let insights = if config.container_insights { "enabled" } else { "disabled" };
    let cluster = graph.add(
        Resource::new(logical_id(&["EcsCluster"]), ResourceKind::Cluster, Concern::Cluster)
            .with_properties(json!({
                "ClusterSettings": [{ "Name": "containerInsights", "Value": insights }]
            })),
    )?;

    let instance_role = graph.add(
        Resource::new(logical_id(&["EcsAsg", "InstanceRole"]), ResourceKind::Role, Concern::Cluster)
            .with_properties(json!({
                "AssumeRolePolicyDocument": assume_role_policy("ec2.amazonaws.com"),
                "ManagedPolicyArns": [
                    sub("arn:${AWS::Partition}:iam::aws:policy/service-role/AmazonEC2ContainerServiceforEC2Role"),
                    sub("arn:${AWS::Partition}:iam::aws:policy/AmazonSSMManagedInstanceCore"),
                ]
            })),
    )?;

    let profile = graph.add(
        Resource::new(
            logical_id(&["EcsAsg", "InstanceProfile"]),
            ResourceKind::InstanceProfile,
            Concern::Cluster,
        )
        .with_properties(json!({ "Roles": [instance_role.reference()] })),
    )?;

    let image_id = match &config.capacity.machine_image {
        MachineImage::EcsOptimized { .. } => param_ref(AMI_ID),
        MachineImage::Ami { id } => json!(id),
    };

    let launch_template = graph.add(
        Resource::new(
            logical_id(&["EcsAsg", "LaunchTemplate"]),
            ResourceKind::LaunchTemplate,
            Concern::Cluster,
        )
        .with_properties(json!({
            "LaunchTemplateData": {
                "ImageId": image_id,
                "InstanceType": config.capacity.instance_type,
                "IamInstanceProfile": { "Arn": profile.attr("Arn") },
                "SecurityGroupIds": [app_sg.attr("GroupId")],
                "UserData": {
                    "Fn::Base64": sub("#!/bin/bash\necho ECS_CLUSTER=${EcsCluster} >> /etc/ecs/ecs.config\n")
                }
            }
        }))
        .depends_on(&instance_role),
    )?;

    let capacity = &config.capacity;
    let asg = graph.add(
        Resource::new(
            logical_id(&["EcsAsg"]),
            ResourceKind::AutoScalingGroup,
            Concern::Cluster,
        )
        .with_properties(json!({
            "MinSize": capacity.min().to_string(),
            "MaxSize": capacity.max().to_string(),
            "DesiredCapacity": capacity.desired_capacity.to_string(),
            "Cooldown": capacity.cooldown_secs.to_string(),
            "LaunchTemplate": {
                "LaunchTemplateId": launch_template.reference(),
                "Version": launch_template.attr("LatestVersionNumber")
            },
            "VPCZoneIdentifier": param_ref(PRIVATE_SUBNETS),
        })),
    )?;

    let capacity_provider = graph.add(
        Resource::new(
            logical_id(&["AsgCapacityProvider"]),
            ResourceKind::CapacityProvider,
            Concern::Cluster,
        )
        .with_properties(json!({
            "AutoScalingGroupProvider": {
                "AutoScalingGroupArn": asg.reference(),
                "ManagedScaling": { "Status": "ENABLED", "TargetCapacity": 100 },
                "ManagedTerminationProtection": "DISABLED"
            }
        })),
    )?;

    let associations = graph.add(
        Resource::new(
            logical_id(&["EcsCluster", "CapacityProviders"]),
            ResourceKind::CapacityProviderAssociations,
            Concern::Cluster,
        )
        .with_properties(json!({
            "Cluster": cluster.reference(),
            "CapacityProviders": [capacity_provider.reference()],
            "DefaultCapacityProviderStrategy": [
                { "CapacityProvider": capacity_provider.reference(), "Weight": 1 }
            ]
        })),
    )?;

    debug!(
        "Declared cluster {} with {} x {}",
        cluster, capacity.desired_capacity, capacity.instance_type
    );

    Ok(ClusterResources {
        cluster,
        capacity_provider,
        associations,
        lb_security_group: lb_sg,
        app_security_group: app_sg,
        db_security_group: db_sg,
    })
}

fn build_security_groups(
    graph: &mut ResourceGraph,
) -> CoreResult<(ResourceId, ResourceId, ResourceId)> {
    let db_sg = graph.add(security_group(
        logical_id(&["DBSG"]),
        "Database tier",
        true,
        Concern::Network,
    ))?;
    let app_sg = graph.add(security_group(
        logical_id(&["AppSG"]),
        "Application tasks and container instances",
        true,
        Concern::Network,
    ))?;
    let lb_sg = graph.add(security_group(
        logical_id(&["LBSG"]),
        "Application load balancers",
        true,
        Concern::Network,
    ))?;

    graph.add(ingress_from_group(
        logical_id(&["DBSG", "From", "AppSG", &MYSQL_PORT.to_string()]),
        db_sg.attr("GroupId"),
        app_sg.attr("GroupId"),
        MYSQL_PORT,
        Concern::Network,
    ))?;

    Ok((db_sg, app_sg, lb_sg))
}

/// Trust policy letting `service` assume a role.
pub(crate) fn assume_role_policy(service: &str) -> Value {
    json!({
        "Version": "2012-10-17",
        "Statement": [{
            "Action": "sts:AssumeRole",
            "Effect": "Allow",
            "Principal": { "Service": service }
        }]
    })
}
