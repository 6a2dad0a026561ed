//! Sample stack: two services behind one shared load balancer.

use std::collections::BTreeMap;

use crate::models::*;

/// Build the sample stack written by `ecsefs init`.
///
/// `app1` mounts an existing filesystem and scales on request count; `app2`
/// shares `shared-alb` and is routed by a `q=app2` query-string rule.
pub fn sample_stack() -> StackConfig {
    StackConfig {
        stack_name: "EcsEfsStack".to_string(),
        description: Some("ECS on EC2 with EFS-backed volumes behind a shared ALB".to_string()),
        env: Environment::default(),
        vpc_name: "dev-vpc".to_string(),
        az_count: 2,
        capacity: CapacitySpec {
            instance_type: "m6a.xlarge".to_string(),
            machine_image: MachineImage::default(),
            desired_capacity: 2,
            min_capacity: None,
            max_capacity: None,
            cooldown_secs: 300,
        },
        container_insights: true,
        services: vec![
            sample_service(
                "app1",
                2,
                vec![PlacementStrategy::SpreadAcrossInstances],
                Some(AutoscaleSpec {
                    min: 1,
                    max: 5,
                    cpu: None,
                    request_count: Some(RequestCountScaling {
                        requests_per_target: 50,
                        scale_in_cooldown_secs: Some(60),
                        scale_out_cooldown_secs: Some(60),
                    }),
                }),
                "200,303",
                None,
            ),
            sample_service(
                "app2",
                1,
                Vec::new(),
                None,
                "200",
                Some(ListenerCondition::QueryStrings(vec![QueryStringPair {
                    key: Some("q".to_string()),
                    value: "app2".to_string(),
                }])),
            ),
        ],
        services_dir: None,
    }
}

fn sample_service(
    name: &str,
    desired_count: u32,
    placement_strategies: Vec<PlacementStrategy>,
    autoscaling: Option<AutoscaleSpec>,
    healthy_http_codes: &str,
    condition: Option<ListenerCondition>,
) -> ServiceSpec {
    let (priority, conditions) = match condition {
        Some(c) => (Some(100), vec![c]),
        None => (None, Vec::new()),
    };

    ServiceSpec {
        name: name.to_string(),
        desired_count,
        placement_strategies,
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
            environment: BTreeMap::new(),
            command: Vec::new(),
            efs_mount: Some(EfsMount {
                file_system_id: Some("fs-03b2cba49c1ad64c0".to_string()),
                security_group_id: None,
                mappings: vec![MountSpec {
                    volume_name: "app".to_string(),
                    efs_path: format!("/mpi/2023-05-01/{}", name),
                    container_path: "/usr/app".to_string(),
                    read_only: false,
                }],
            }),
        },
        autoscaling,
        load_balancer: LoadBalancerRef {
            name: "shared-alb".to_string(),
            listener: ListenerSpec::default(),
            target: TargetSpec {
                deregistration_delay_secs: Some(5),
                health_check: Some(HealthCheck {
                    path: Some("/".to_string()),
                    healthy_http_codes: Some(healthy_http_codes.to_string()),
                    timeout_secs: Some(5),
                    interval_secs: Some(30),
                    healthy_threshold_count: Some(2),
                    unhealthy_threshold_count: None,
                }),
                priority,
                conditions,
            },
        },
    }
}
