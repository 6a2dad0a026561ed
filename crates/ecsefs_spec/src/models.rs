//! Data models for stack configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default ALB/container HTTP port.
pub const DEFAULT_HTTP_PORT: u16 = 80;

/// Healthy-percent bounds applied when a service leaves them unset.
pub const DEFAULT_MAX_HEALTHY_PERCENT: u32 = 200;
pub const DEFAULT_MIN_HEALTHY_PERCENT: u32 = 50;

/// PascalCase form of a name as it appears inside resource logical ids.
///
/// The name is split on non-alphanumeric characters and the first letter of
/// each piece is uppercased: `shared-alb` and `sharedAlb` both become
/// `SharedAlb`.
pub fn id_segment(name: &str) -> String {
    let mut segment = String::new();
    for piece in name
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|p| !p.is_empty())
    {
        let mut chars = piece.chars();
        if let Some(first) = chars.next() {
            segment.push(first.to_ascii_uppercase());
            segment.push_str(chars.as_str());
        }
    }
    segment
}

fn default_stack_name() -> String {
    "EcsEfsStack".to_string()
}

fn default_true() -> bool {
    true
}

fn default_az_count() -> u32 {
    2
}

fn default_http_port() -> u16 {
    DEFAULT_HTTP_PORT
}

/// Root stack configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackConfig {
    #[serde(default = "default_stack_name")]
    pub stack_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub env: Environment,
    /// Name of the VPC the stack is deployed into.
    pub vpc_name: String,
    /// Availability zones (one private subnet each) that new filesystems get mount targets in.
    #[serde(default = "default_az_count")]
    pub az_count: u32,
    pub capacity: CapacitySpec,
    #[serde(default = "default_true")]
    pub container_insights: bool,
    #[serde(default)]
    pub services: Vec<ServiceSpec>,
    /// Directory of additional service files, relative to the config file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub services_dir: Option<PathBuf>,
}

impl StackConfig {
    /// Find a service by name.
    pub fn service(&self, name: &str) -> Option<&ServiceSpec> {
        self.services.iter().find(|s| s.name == name)
    }

    /// Names of all shared load balancers, in first-reference order.
    pub fn load_balancer_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for service in &self.services {
            let name = service.load_balancer.name.as_str();
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

/// Target account and region.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Environment {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub account: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
}

impl Environment {
    /// Apply overrides; `None` keeps the configured value.
    pub fn with_overrides(mut self, account: Option<String>, region: Option<String>) -> Self {
        if account.is_some() {
            self.account = account;
        }
        if region.is_some() {
            self.region = region;
        }
        self
    }
}

/// Cluster-wide EC2 capacity.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapacitySpec {
    pub instance_type: String,
    #[serde(default)]
    pub machine_image: MachineImage,
    pub desired_capacity: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_capacity: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_capacity: Option<u32>,
    #[serde(default)]
    pub cooldown_secs: u64,
}

impl CapacitySpec {
    pub fn min(&self) -> u32 {
        self.min_capacity.unwrap_or(1)
    }

    pub fn max(&self) -> u32 {
        self.max_capacity.unwrap_or(self.desired_capacity)
    }
}

/// AMI used by the container instances.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MachineImage {
    EcsOptimized {
        #[serde(default)]
        generation: AmiGeneration,
    },
    Ami {
        id: String,
    },
}

impl Default for MachineImage {
    fn default() -> Self {
        MachineImage::EcsOptimized {
            generation: AmiGeneration::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AmiGeneration {
    #[default]
    AmazonLinux2,
    AmazonLinux2023,
}

impl AmiGeneration {
    /// Public SSM parameter holding the recommended ECS-optimized image id.
    pub fn ssm_parameter(&self) -> &'static str {
        match self {
            AmiGeneration::AmazonLinux2 => {
                "/aws/service/ecs/optimized-ami/amazon-linux-2/recommended/image_id"
            }
            AmiGeneration::AmazonLinux2023 => {
                "/aws/service/ecs/optimized-ami/amazon-linux-2023/recommended/image_id"
            }
        }
    }
}

/// A single ECS service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSpec {
    pub name: String,
    pub desired_count: u32,
    #[serde(default)]
    pub placement_strategies: Vec<PlacementStrategy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_healthy_percent: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_healthy_percent: Option<u32>,
    pub container: ContainerSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autoscaling: Option<AutoscaleSpec>,
    pub load_balancer: LoadBalancerRef,
}

impl ServiceSpec {
    pub fn max_healthy_percent(&self) -> u32 {
        self.max_healthy_percent.unwrap_or(DEFAULT_MAX_HEALTHY_PERCENT)
    }

    pub fn min_healthy_percent(&self) -> u32 {
        self.min_healthy_percent.unwrap_or(DEFAULT_MIN_HEALTHY_PERCENT)
    }

    /// Mount mappings, empty when the container has no EFS mount.
    pub fn mounts(&self) -> &[MountSpec] {
        self.container
            .efs_mount
            .as_ref()
            .map(|m| m.mappings.as_slice())
            .unwrap_or(&[])
    }

    /// Name of the container inside the task definition.
    pub fn container_name(&self) -> String {
        format!("cntr-{}", self.name)
    }

    /// Name of the service's target group.
    pub fn target_group_name(&self) -> String {
        format!("tg-{}", self.name)
    }
}

/// Task placement strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PlacementStrategy {
    SpreadAcrossInstances,
    SpreadAcrossZones,
    PackedByCpu,
    PackedByMemory,
    Random,
}

impl PlacementStrategy {
    /// `(type, field)` pair as ECS expects it.
    pub fn as_ecs(&self) -> (&'static str, Option<&'static str>) {
        match self {
            PlacementStrategy::SpreadAcrossInstances => ("spread", Some("instanceId")),
            PlacementStrategy::SpreadAcrossZones => {
                ("spread", Some("attribute:ecs.availability-zone"))
            }
            PlacementStrategy::PackedByCpu => ("binpack", Some("CPU")),
            PlacementStrategy::PackedByMemory => ("binpack", Some("MEMORY")),
            PlacementStrategy::Random => ("random", None),
        }
    }
}

/// Container definition options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContainerSpec {
    pub image: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit_mib: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_reservation_mib: Option<u32>,
    #[serde(default)]
    pub port_mappings: Vec<PortMapping>,
    #[serde(default = "default_true")]
    pub essential: bool,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub environment: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub command: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub efs_mount: Option<EfsMount>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PortMapping {
    pub container_port: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub host_port: Option<u16>,
    #[serde(default)]
    pub protocol: PortProtocol,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PortProtocol {
    #[default]
    Tcp,
    Udp,
}

impl PortProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            PortProtocol::Tcp => "tcp",
            PortProtocol::Udp => "udp",
        }
    }
}

/// EFS filesystem mount for a container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EfsMount {
    /// Existing filesystem to reuse instead of creating one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_system_id: Option<String>,
    /// Existing security group guarding the filesystem.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
    #[serde(default)]
    pub mappings: Vec<MountSpec>,
}

/// One volume: a path inside the filesystem bound to a path in the container.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MountSpec {
    pub volume_name: String,
    pub efs_path: String,
    pub container_path: String,
    #[serde(default)]
    pub read_only: bool,
}

/// Reference to a shared load balancer plus this service's routing settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoadBalancerRef {
    /// Shared key; services naming the same balancer share one listener.
    pub name: String,
    #[serde(default)]
    pub listener: ListenerSpec,
    #[serde(default)]
    pub target: TargetSpec,
}

/// Listener settings. Only the first service naming a balancer applies them.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ListenerSpec {
    #[serde(default = "default_http_port")]
    pub port: u16,
    #[serde(default)]
    pub protocol: ListenerProtocol,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub certificate_arns: Vec<String>,
    /// Allow ingress from anywhere on the listener port.
    #[serde(default = "default_true")]
    pub open: bool,
}

impl Default for ListenerSpec {
    fn default() -> Self {
        Self {
            port: DEFAULT_HTTP_PORT,
            protocol: ListenerProtocol::default(),
            certificate_arns: Vec::new(),
            open: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ListenerProtocol {
    #[default]
    Http,
    Https,
}

impl ListenerProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListenerProtocol::Http => "HTTP",
            ListenerProtocol::Https => "HTTPS",
        }
    }
}

/// Per-service target group settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TargetSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deregistration_delay_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_check: Option<HealthCheck>,
    /// Rule priority; required together with `conditions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub conditions: Vec<ListenerCondition>,
}

impl TargetSpec {
    /// Whether the target is routed by a listener rule instead of the default action.
    pub fn is_conditional(&self) -> bool {
        self.priority.is_some() || !self.conditions.is_empty()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct HealthCheck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy_http_codes: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub healthy_threshold_count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unhealthy_threshold_count: Option<u32>,
}

/// Listener rule condition.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ListenerCondition {
    PathPatterns(Vec<String>),
    HostHeaders(Vec<String>),
    QueryStrings(Vec<QueryStringPair>),
    HttpHeader { name: String, values: Vec<String> },
}

impl ListenerCondition {
    pub fn field(&self) -> &'static str {
        match self {
            ListenerCondition::PathPatterns(_) => "path-pattern",
            ListenerCondition::HostHeaders(_) => "host-header",
            ListenerCondition::QueryStrings(_) => "query-string",
            ListenerCondition::HttpHeader { .. } => "http-header",
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            ListenerCondition::PathPatterns(v) | ListenerCondition::HostHeaders(v) => v.is_empty(),
            ListenerCondition::QueryStrings(v) => v.is_empty(),
            ListenerCondition::HttpHeader { values, .. } => values.is_empty(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueryStringPair {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
    pub value: String,
}

/// Autoscaling block as written in configuration.
///
/// Both triggers may be present in the file; [`AutoscaleSpec::policy`]
/// normalizes them into a single [`AutoscalePolicy`], CPU first.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AutoscaleSpec {
    pub min: u32,
    pub max: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cpu: Option<CpuScaling>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_count: Option<RequestCountScaling>,
}

impl AutoscaleSpec {
    /// Select the single trigger to attach. `None` when no trigger is set.
    pub fn policy(&self) -> Option<AutoscalePolicy> {
        let trigger = match (&self.cpu, &self.request_count) {
            (Some(cpu), _) => ScalingTrigger::Cpu(cpu.clone()),
            (None, Some(requests)) => ScalingTrigger::RequestCount(requests.clone()),
            (None, None) => return None,
        };
        Some(AutoscalePolicy {
            min: self.min,
            max: self.max,
            trigger,
        })
    }

    pub fn has_both_triggers(&self) -> bool {
        self.cpu.is_some() && self.request_count.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CpuScaling {
    pub target_utilization_percent: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_in_cooldown_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_out_cooldown_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequestCountScaling {
    pub requests_per_target: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_in_cooldown_secs: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scale_out_cooldown_secs: Option<u64>,
}

/// Normalized autoscaling policy with exactly one trigger.
#[derive(Debug, Clone, PartialEq)]
pub struct AutoscalePolicy {
    pub min: u32,
    pub max: u32,
    pub trigger: ScalingTrigger,
}

/// The one scaling trigger attached to a service.
///
/// `RequestCount` tracks requests per target against the service's own
/// target group on the shared listener.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalingTrigger {
    Cpu(CpuScaling),
    RequestCount(RequestCountScaling),
}

impl ScalingTrigger {
    pub fn name(&self) -> &'static str {
        match self {
            ScalingTrigger::Cpu(_) => "cpu",
            ScalingTrigger::RequestCount(_) => "request-count",
        }
    }
}
