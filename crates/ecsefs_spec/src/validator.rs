//! Stack configuration validation.
//!
//! Validation runs before any resource is constructed and collects every
//! problem it finds. Errors are fatal; warnings describe configuration that is
//! accepted but resolved silently (first listener declaration wins, CPU
//! scaling wins over request-count scaling).

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::error::{SpecError, SpecResult};
use crate::models::{
    id_segment, CapacitySpec, ListenerProtocol, MachineImage, ServiceSpec, StackConfig,
};

/// Longest name ALB accepts for a target group.
pub const MAX_TARGET_GROUP_NAME_LEN: usize = 32;

fn target_group_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9](?:[A-Za-z0-9-]*[A-Za-z0-9])?$").unwrap())
}

fn volume_name_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[A-Za-z0-9_-]{1,255}$").unwrap())
}

/// Report distinct names that produce the same logical id segment.
fn check_id_collisions<'a>(
    result: &mut ValidationResult,
    context: &str,
    names: impl IntoIterator<Item = &'a str>,
) {
    let mut segments: HashMap<String, &str> = HashMap::new();
    for name in names {
        let segment = id_segment(name);
        if segment.is_empty() {
            continue;
        }
        match segments.get(&segment).copied() {
            Some(first) if first != name => result.add_error(format!(
                "{} '{}' and '{}' resolve to the same resource id '{}'",
                context, first, name, segment
            )),
            Some(_) => {}
            None => {
                segments.insert(segment, name);
            }
        }
    }
}

/// Validation result with details.
#[derive(Debug, Default)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    pub fn add_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn merge(&mut self, other: ValidationResult) {
        if !other.valid {
            self.valid = false;
        }
        self.errors.extend(other.errors);
        self.warnings.extend(other.warnings);
    }

    /// Convert into an error when invalid. With `deny_warnings`, warnings count as errors.
    pub fn into_result(self, deny_warnings: bool) -> SpecResult<Self> {
        if !self.valid {
            return Err(SpecError::ValidationFailed(self.errors));
        }
        if deny_warnings && !self.warnings.is_empty() {
            return Err(SpecError::ValidationFailed(self.warnings));
        }
        Ok(self)
    }
}

/// Validator for stack configurations.
pub struct StackValidator;

impl StackValidator {
    /// Validate an entire stack configuration.
    pub fn validate(config: &StackConfig) -> ValidationResult {
        let mut result = ValidationResult::new();

        if config.stack_name.trim().is_empty() {
            result.add_error("Stack name cannot be empty");
        }
        if config.vpc_name.trim().is_empty() {
            result.add_error("vpc_name cannot be empty");
        }
        if !(1..=6).contains(&config.az_count) {
            result.add_error(format!("az_count ({}) must be between 1 and 6", config.az_count));
        }
        result.merge(Self::validate_capacity(&config.capacity));

        if config.services.is_empty() {
            result.add_warning("Stack declares no services");
        }

        let mut seen = HashSet::new();
        for service in &config.services {
            if !service.name.is_empty() && !seen.insert(service.name.as_str()) {
                result.add_error(format!("Duplicate service name '{}'", service.name));
            }
            result.merge(Self::validate_service(service));
        }
        check_id_collisions(
            &mut result,
            "Service names",
            config.services.iter().map(|s| s.name.as_str()),
        );
        check_id_collisions(&mut result, "Load balancer names", config.load_balancer_names());

        result.merge(Self::validate_shared_listeners(&config.services));
        result
    }

    /// Validate cluster capacity settings.
    pub fn validate_capacity(capacity: &CapacitySpec) -> ValidationResult {
        let mut result = ValidationResult::new();

        if capacity.instance_type.trim().is_empty() {
            result.add_error("capacity.instance_type cannot be empty");
        }
        if let MachineImage::Ami { id } = &capacity.machine_image {
            if !id.starts_with("ami-") {
                result.add_error(format!("Machine image id '{}' must start with 'ami-'", id));
            }
        }

        let (min, max) = (capacity.min(), capacity.max());
        if min > max {
            result.add_error(format!(
                "capacity.min_capacity ({}) exceeds max_capacity ({})",
                min, max
            ));
        } else if capacity.desired_capacity < min || capacity.desired_capacity > max {
            result.add_error(format!(
                "capacity.desired_capacity ({}) must be between {} and {}",
                capacity.desired_capacity, min, max
            ));
        }

        result
    }

    /// Validate a single service.
    pub fn validate_service(service: &ServiceSpec) -> ValidationResult {
        let mut result = ValidationResult::new();

        if service.name.trim().is_empty() {
            result.add_error("Service name cannot be empty");
            return result;
        }
        let name = &service.name;

        let tg_name = service.target_group_name();
        if tg_name.len() > MAX_TARGET_GROUP_NAME_LEN {
            result.add_error(format!(
                "Service '{}': target group name '{}' exceeds {} characters",
                name, tg_name, MAX_TARGET_GROUP_NAME_LEN
            ));
        }
        if !target_group_name_pattern().is_match(&tg_name) {
            result.add_error(format!(
                "Service '{}': name may only contain letters, digits and hyphens",
                name
            ));
        }

        if service.min_healthy_percent() > service.max_healthy_percent() {
            result.add_error(format!(
                "Service '{}': min_healthy_percent ({}) exceeds max_healthy_percent ({})",
                name,
                service.min_healthy_percent(),
                service.max_healthy_percent()
            ));
        }

        if service.container.image.trim().is_empty() {
            result.add_error(format!("Service '{}': container image cannot be empty", name));
        }
        if service.container.port_mappings.is_empty() {
            result.add_warning(format!(
                "Service '{}': container has no port mappings; the load balancer target uses port 80",
                name
            ));
        }
        for mapping in &service.container.port_mappings {
            if let Some(host) = mapping.host_port {
                if host != mapping.container_port {
                    result.add_error(format!(
                        "Service '{}': host_port {} must equal container_port {} in awsvpc mode",
                        name, host, mapping.container_port
                    ));
                }
            }
        }

        result.merge(Self::validate_mounts(service));
        result.merge(Self::validate_autoscaling(service));
        result.merge(Self::validate_target(service));
        result
    }

    /// Validate the EFS mount set of a service.
    pub fn validate_mounts(service: &ServiceSpec) -> ValidationResult {
        let mut result = ValidationResult::new();
        let Some(efs) = &service.container.efs_mount else {
            return result;
        };
        let name = &service.name;

        if efs.mappings.is_empty() {
            result.add_error(format!("Service '{}': efs_mount declares no mappings", name));
        }
        if matches!(&efs.file_system_id, Some(id) if !id.starts_with("fs-")) {
            result.add_error(format!(
                "Service '{}': file_system_id must start with 'fs-'",
                name
            ));
        }

        let mut volumes = HashSet::new();
        let mut container_paths = HashSet::new();
        for mapping in &efs.mappings {
            if !volume_name_pattern().is_match(&mapping.volume_name) {
                result.add_error(format!(
                    "Service '{}': invalid volume name '{}'",
                    name, mapping.volume_name
                ));
            }
            if !volumes.insert(mapping.volume_name.as_str()) {
                result.add_error(format!(
                    "Service '{}': duplicate volume name '{}'",
                    name, mapping.volume_name
                ));
            }
            if !container_paths.insert(mapping.container_path.as_str()) {
                result.add_error(format!(
                    "Service '{}': container path '{}' is mounted twice",
                    name, mapping.container_path
                ));
            }
            if !mapping.efs_path.starts_with('/') {
                result.add_error(format!(
                    "Service '{}': efs_path '{}' must be absolute",
                    name, mapping.efs_path
                ));
            }
            if !mapping.container_path.starts_with('/') {
                result.add_error(format!(
                    "Service '{}': container_path '{}' must be absolute",
                    name, mapping.container_path
                ));
            }
        }
        check_id_collisions(
            &mut result,
            &format!("Service '{}': volume names", name),
            efs.mappings.iter().map(|m| m.volume_name.as_str()),
        );

        result
    }

    /// Validate the autoscaling block of a service.
    pub fn validate_autoscaling(service: &ServiceSpec) -> ValidationResult {
        let mut result = ValidationResult::new();
        let Some(scaling) = &service.autoscaling else {
            return result;
        };
        let name = &service.name;

        if scaling.min > scaling.max {
            result.add_error(format!(
                "Service '{}': autoscaling min ({}) exceeds max ({})",
                name, scaling.min, scaling.max
            ));
        }

        match scaling.policy() {
            None => result.add_error(format!(
                "Service '{}': autoscaling requires either cpu or request_count",
                name
            )),
            Some(_) if scaling.has_both_triggers() => result.add_warning(format!(
                "Service '{}': both cpu and request_count scaling are set; only cpu scaling is attached",
                name
            )),
            Some(_) => {}
        }

        if let Some(cpu) = &scaling.cpu {
            if !(cpu.target_utilization_percent > 0.0 && cpu.target_utilization_percent <= 100.0) {
                result.add_error(format!(
                    "Service '{}': target_utilization_percent must be in (0, 100]",
                    name
                ));
            }
        }
        if matches!(&scaling.request_count, Some(r) if r.requests_per_target == 0) {
            result.add_error(format!(
                "Service '{}': requests_per_target must be greater than zero",
                name
            ));
        }

        result
    }

    /// Validate load balancer routing settings of a service.
    pub fn validate_target(service: &ServiceSpec) -> ValidationResult {
        let mut result = ValidationResult::new();
        let lb = &service.load_balancer;
        let name = &service.name;

        if lb.name.trim().is_empty() {
            result.add_error(format!("Service '{}': load_balancer.name cannot be empty", name));
        } else if id_segment(&lb.name).is_empty() {
            result.add_error(format!(
                "Service '{}': load_balancer.name '{}' must contain a letter or digit",
                name, lb.name
            ));
        }

        match (lb.target.priority, lb.target.conditions.is_empty()) {
            (Some(_), true) => result.add_error(format!(
                "Service '{}': target priority requires at least one condition",
                name
            )),
            (None, false) => result.add_error(format!(
                "Service '{}': target conditions require a priority",
                name
            )),
            (Some(0), false) => result.add_error(format!(
                "Service '{}': target priority must be between 1 and 50000",
                name
            )),
            (Some(p), false) if p > 50_000 => result.add_error(format!(
                "Service '{}': target priority must be between 1 and 50000",
                name
            )),
            _ => {}
        }

        for condition in &lb.target.conditions {
            if condition.is_empty() {
                result.add_error(format!(
                    "Service '{}': {} condition has no values",
                    name,
                    condition.field()
                ));
            }
        }

        if lb.listener.protocol == ListenerProtocol::Https && lb.listener.certificate_arns.is_empty() {
            result.add_error(format!(
                "Service '{}': HTTPS listener on '{}' requires certificate_arns",
                name, lb.name
            ));
        }

        result
    }

    /// Cross-service checks on services sharing one load balancer.
    pub fn validate_shared_listeners(services: &[ServiceSpec]) -> ValidationResult {
        let mut result = ValidationResult::new();

        let mut owners: HashMap<&str, &ServiceSpec> = HashMap::new();
        let mut priorities: BTreeMap<(&str, u32), &str> = BTreeMap::new();

        for service in services {
            let lb = &service.load_balancer;
            match owners.get(lb.name.as_str()) {
                Some(owner) if owner.load_balancer.listener != lb.listener => {
                    result.add_warning(format!(
                        "Service '{}': listener settings for '{}' differ from service '{}'; the first declaration is used",
                        service.name, lb.name, owner.name
                    ));
                }
                Some(_) => {}
                None => {
                    owners.insert(lb.name.as_str(), service);
                }
            }

            if let Some(priority) = lb.target.priority {
                if let Some(other) = priorities.insert((lb.name.as_str(), priority), service.name.as_str()) {
                    result.add_error(format!(
                        "Services '{}' and '{}' use the same rule priority {} on '{}'",
                        other, service.name, priority, lb.name
                    ));
                }
            }
        }

        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::*;

    fn service(name: &str) -> ServiceSpec {
        ServiceSpec {
            name: name.to_string(),
            desired_count: 1,
            placement_strategies: Vec::new(),
            max_healthy_percent: None,
            min_healthy_percent: None,
            container: ContainerSpec {
                image: "amazon/amazon-ecs-sample".to_string(),
                cpu: Some(256),
                memory_limit_mib: Some(512),
                memory_reservation_mib: None,
                port_mappings: vec![PortMapping {
                    container_port: 80,
                    host_port: None,
                    protocol: PortProtocol::Tcp,
                }],
                essential: true,
                environment: Default::default(),
                command: Vec::new(),
                efs_mount: None,
            },
            autoscaling: None,
            load_balancer: LoadBalancerRef {
                name: "shared-alb".to_string(),
                listener: ListenerSpec::default(),
                target: TargetSpec::default(),
            },
        }
    }

    fn mount(volume: &str, container_path: &str) -> MountSpec {
        MountSpec {
            volume_name: volume.to_string(),
            efs_path: "/data".to_string(),
            container_path: container_path.to_string(),
            read_only: false,
        }
    }

    #[test]
    fn test_valid_service() {
        let result = StackValidator::validate_service(&service("app1"));
        assert!(result.valid, "{:?}", result.errors);
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn test_duplicate_volume_name() {
        let mut svc = service("app1");
        svc.container.efs_mount = Some(EfsMount {
            file_system_id: None,
            security_group_id: None,
            mappings: vec![mount("app", "/usr/app"), mount("app", "/usr/data")],
        });

        let result = StackValidator::validate_mounts(&svc);
        assert!(!result.valid);
        assert!(result.errors[0].contains("duplicate volume name 'app'"));
    }

    #[test]
    fn test_volume_names_with_same_id_rejected() {
        let mut svc = service("app1");
        svc.container.efs_mount = Some(EfsMount {
            file_system_id: None,
            security_group_id: None,
            mappings: vec![mount("data-1", "/usr/a"), mount("data1", "/usr/b")],
        });

        let result = StackValidator::validate_mounts(&svc);
        assert!(!result.valid);
        assert!(result.errors[0].contains("'data-1' and 'data1'"));
        assert!(result.errors[0].contains("'Data1'"));
    }

    #[test]
    fn test_autoscaling_without_trigger() {
        let mut svc = service("app1");
        svc.autoscaling = Some(AutoscaleSpec {
            min: 1,
            max: 3,
            cpu: None,
            request_count: None,
        });

        let result = StackValidator::validate_autoscaling(&svc);
        assert!(!result.valid);
    }

    #[test]
    fn test_autoscaling_with_both_triggers_warns() {
        let mut svc = service("app1");
        svc.autoscaling = Some(AutoscaleSpec {
            min: 1,
            max: 3,
            cpu: Some(CpuScaling {
                target_utilization_percent: 30.0,
                scale_in_cooldown_secs: None,
                scale_out_cooldown_secs: None,
            }),
            request_count: Some(RequestCountScaling {
                requests_per_target: 50,
                scale_in_cooldown_secs: None,
                scale_out_cooldown_secs: None,
            }),
        });

        let result = StackValidator::validate_autoscaling(&svc);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.into_result(true).is_err());
    }

    #[test]
    fn test_priority_requires_conditions() {
        let mut svc = service("app2");
        svc.load_balancer.target.priority = Some(100);

        let result = StackValidator::validate_target(&svc);
        assert!(!result.valid);
    }

    #[test]
    fn test_long_name_rejected() {
        let svc = service("a-very-long-service-name-exceeding");
        let result = StackValidator::validate_service(&svc);
        assert!(!result.valid);
        assert!(result.errors.iter().any(|e| e.contains("exceeds 32")));
    }

    #[test]
    fn test_punctuation_only_load_balancer_name_rejected() {
        let mut svc = service("app1");
        svc.load_balancer.name = "--".to_string();

        let result = StackValidator::validate_target(&svc);
        assert!(!result.valid);
        assert!(result.errors[0].contains("must contain a letter or digit"));
    }

    #[test]
    fn test_free_form_load_balancer_name_accepted() {
        let mut svc = service("app1");
        svc.load_balancer.name = "AriefhInfraStack/shared alb with a very long name".to_string();

        let result = StackValidator::validate_target(&svc);
        assert!(result.valid, "{:?}", result.errors);
    }

    #[test]
    fn test_listener_conflict_is_warning() {
        let first = service("app1");
        let mut second = service("app2");
        second.load_balancer.listener.port = 8080;

        let result = StackValidator::validate_shared_listeners(&[first, second]);
        assert!(result.valid);
        assert_eq!(result.warnings.len(), 1);
        assert!(result.warnings[0].contains("first declaration is used"));
    }

    #[test]
    fn test_duplicate_priority_on_shared_listener() {
        let mut first = service("app1");
        let mut second = service("app2");
        for svc in [&mut first, &mut second] {
            svc.load_balancer.target.priority = Some(10);
            svc.load_balancer.target.conditions =
                vec![ListenerCondition::PathPatterns(vec!["/x".to_string()])];
        }

        let result = StackValidator::validate_shared_listeners(&[first, second]);
        assert!(!result.valid);
    }
}
