//! Integration tests for stack assembly.

use ecsefs_core::{AssemblerOptions, Concern, CoreError, ResourceId, ResourceKind, StackAssembler};
use ecsefs_spec::{
    sample_stack, CpuScaling, ListenerCondition, ListenerSpec, SpecError, StackConfig,
};

fn assemble(config: &StackConfig) -> ecsefs_core::AssembledStack {
    StackAssembler::default().assemble(config).unwrap()
}

fn id(name: &str) -> ResourceId {
    ResourceId::new(name)
}

#[test]
fn test_shared_load_balancer_constructed_once() {
    let stack = assemble(&sample_stack());
    let graph = &stack.graph;

    assert_eq!(graph.count(ResourceKind::LoadBalancer), 1);
    assert_eq!(graph.count(ResourceKind::Listener), 1);
    assert_eq!(graph.count(ResourceKind::TargetGroup), 2);

    let dns: Vec<_> = graph
        .outputs()
        .iter()
        .filter(|o| o.key.starts_with("EcsLbDnsName"))
        .collect();
    assert_eq!(dns.len(), 1);
    assert_eq!(dns[0].key, "EcsLbDnsNameSharedAlb");
    assert_eq!(dns[0].description, "ECS Load Balancer DNS Name");

    for service in ["ServiceApp1", "ServiceApp2"] {
        let lbs = graph.get(&id(service)).unwrap().property("LoadBalancers").unwrap();
        assert_eq!(lbs.as_array().unwrap().len(), 1);
    }
}

#[test]
fn test_first_service_governs_listener_and_second_is_routed_by_rule() {
    let stack = assemble(&sample_stack());
    let graph = &stack.graph;

    let listener = graph.get(&id("AlbSharedAlbListener")).unwrap();
    assert_eq!(*listener.property("Port").unwrap(), 80);
    let groups = &listener.property("DefaultActions").unwrap()[0]["ForwardConfig"]["TargetGroups"];
    assert_eq!(groups.as_array().unwrap().len(), 1);
    assert_eq!(groups[0]["TargetGroupArn"]["Ref"], "TargetGroupApp1");

    let app1_tg = graph.get(&id("TargetGroupApp1")).unwrap();
    assert_eq!(app1_tg.property("Matcher").unwrap()["HttpCode"], "200,303");
    assert_eq!(*app1_tg.property("Name").unwrap(), "tg-app1");

    let app2 = stack.service("app2").unwrap();
    let rule_id = app2.listener_rule.clone().unwrap();
    let rule = graph.get(&rule_id).unwrap();
    assert_eq!(*rule.property("Priority").unwrap(), 100);
    let condition = &rule.property("Conditions").unwrap()[0];
    assert_eq!(condition["Field"], "query-string");
    assert_eq!(condition["QueryStringConfig"]["Values"][0]["Key"], "q");
    assert_eq!(rule.property("Actions").unwrap()[0]["TargetGroupArn"]["Ref"], "TargetGroupApp2");

    let edges = graph.edges();
    assert!(edges.contains(&(id("ServiceApp2"), rule_id)));
    assert!(edges.contains(&(id("ServiceApp1"), id("AlbSharedAlbListener"))));
}

#[test]
fn test_service_without_mounts_has_no_storage() {
    let mut config = sample_stack();
    config.services[1].container.efs_mount = None;

    let stack = assemble(&config);
    let graph = &stack.graph;

    assert!(graph.owned_by("app2").all(|r| r.concern != Concern::Storage));
    assert!(!graph.outputs().iter().any(|o| o.key.ends_with("App2")));

    let task = graph.get(&id("TaskDefApp2")).unwrap();
    assert!(task.property("Volumes").unwrap().as_array().unwrap().is_empty());
    assert!(task.property("ContainerDefinitions").unwrap()[0].get("MountPoints").is_none());
    assert!(stack.service("app2").unwrap().volumes.is_empty());
}

#[test]
fn test_mount_policy_grants_client_mount_only() {
    let stack = assemble(&sample_stack());
    let graph = &stack.graph;

    let policy = graph.get(&id("EfsMountPolicyApp1")).unwrap();
    let statements = policy.property("PolicyDocument").unwrap()["Statement"].as_array().unwrap();
    assert_eq!(statements.len(), 1);
    assert_eq!(statements[0]["Action"], "elasticfilesystem:ClientMount");
    assert_eq!(policy.property("Roles").unwrap().as_array().unwrap().len(), 2);

    let task = graph.get(&id("TaskDefApp1")).unwrap();
    let volume = &task.property("Volumes").unwrap()[0];
    assert_eq!(volume["Name"], "app");
    assert_eq!(volume["EFSVolumeConfiguration"]["TransitEncryption"], "ENABLED");
    assert_eq!(volume["EFSVolumeConfiguration"]["FilesystemId"], "fs-03b2cba49c1ad64c0");
    let mount = &task.property("ContainerDefinitions").unwrap()[0]["MountPoints"][0];
    assert_eq!(mount["SourceVolume"], "app");
    assert_eq!(mount["ContainerPath"], "/usr/app");

    assert_eq!(graph.count(ResourceKind::FileSystem), 0);
    assert!(graph.outputs().iter().any(|o| o.key == "EcsEfsIdApp1"));
}

#[test]
fn test_new_filesystem_gets_mount_target_per_zone() {
    let mut config = sample_stack();
    config.az_count = 3;
    if let Some(efs) = config.services[0].container.efs_mount.as_mut() {
        efs.file_system_id = None;
    }

    let stack = assemble(&config);
    let graph = &stack.graph;

    assert_eq!(graph.count(ResourceKind::FileSystem), 1);
    assert_eq!(graph.count(ResourceKind::MountTarget), 3);
    let fs = graph.get(&id("EcsEfsApp1")).unwrap();
    assert_eq!(*fs.property("Encrypted").unwrap(), true);
    assert!(fs.deletion_policy.is_some());

    let service = graph.get(&id("ServiceApp1")).unwrap();
    assert!(service.depends_on.contains(&id("EcsEfsApp1MountTarget0")));
}

#[test]
fn test_cpu_trigger_takes_precedence() {
    let mut config = sample_stack();
    if let Some(autoscaling) = config.services[0].autoscaling.as_mut() {
        autoscaling.cpu = Some(CpuScaling {
            target_utilization_percent: 60.0,
            scale_in_cooldown_secs: None,
            scale_out_cooldown_secs: None,
        });
    }

    let stack = assemble(&config);
    let scaling = stack.service("app1").unwrap().scaling.clone().unwrap();
    assert_eq!(scaling.trigger, "cpu");
    assert_eq!(scaling.scalable_target, id("ServiceApp1TaskCountTarget"));
    assert_eq!(scaling.policy, id("ServiceApp1TaskCountTargetCpuScaling"));
    assert_eq!(stack.graph.count(ResourceKind::ScalingPolicy), 1);

    let policy = stack.graph.get(&id("ServiceApp1TaskCountTargetCpuScaling")).unwrap();
    let config_json = policy.property("TargetTrackingScalingPolicyConfiguration").unwrap();
    assert_eq!(
        config_json["PredefinedMetricSpecification"]["PredefinedMetricType"],
        "ECSServiceAverageCPUUtilization"
    );
    assert_eq!(stack.warnings.len(), 1);
}

#[test]
fn test_deny_warnings_rejects_both_triggers() {
    let mut config = sample_stack();
    if let Some(autoscaling) = config.services[0].autoscaling.as_mut() {
        autoscaling.cpu = Some(CpuScaling {
            target_utilization_percent: 60.0,
            scale_in_cooldown_secs: None,
            scale_out_cooldown_secs: None,
        });
    }

    let assembler = StackAssembler::new(AssemblerOptions { deny_warnings: true });
    let err = assembler.assemble(&config).unwrap_err();
    assert!(matches!(err, CoreError::Spec(SpecError::ValidationFailed(_))));
}

#[test]
fn test_request_count_scaling_tracks_own_target_group() {
    let stack = assemble(&sample_stack());

    let scaling = stack.service("app1").unwrap().scaling.clone().unwrap();
    assert_eq!(scaling.trigger, "request-count");
    assert!(stack.service("app2").unwrap().scaling.is_none());
    let policy = stack.graph.get(&scaling.policy).unwrap();
    assert_eq!(policy.property("ScalingTargetId").unwrap()["Ref"], "ServiceApp1TaskCountTarget");
    let label = &policy.property("TargetTrackingScalingPolicyConfiguration").unwrap()
        ["PredefinedMetricSpecification"]["ResourceLabel"]["Fn::Join"][1];
    assert_eq!(label[1]["Fn::GetAtt"][0], "TargetGroupApp1");
    assert!(policy.depends_on.contains(&id("AlbSharedAlbListener")));
}

#[test]
fn test_assembly_is_idempotent() {
    let config = sample_stack();
    let first = assemble(&config);
    let second = assemble(&config);

    assert_eq!(first.graph, second.graph);
    assert_eq!(first.graph.edges(), second.graph.edges());
}

#[test]
fn test_empty_placement_uses_default_healthy_percents() {
    let stack = assemble(&sample_stack());
    let service = stack.graph.get(&id("ServiceApp2")).unwrap();

    assert!(service.property("PlacementStrategies").is_none());
    let deployment = service.property("DeploymentConfiguration").unwrap();
    assert_eq!(deployment["MaximumPercent"], 200);
    assert_eq!(deployment["MinimumHealthyPercent"], 50);

    let app1 = stack.graph.get(&id("ServiceApp1")).unwrap();
    assert_eq!(app1.property("PlacementStrategies").unwrap()[0]["Field"], "instanceId");
}

#[test]
fn test_conflicting_listener_keeps_first_declaration() {
    let mut config = sample_stack();
    config.services[1].load_balancer.listener = ListenerSpec {
        port: 8080,
        ..ListenerSpec::default()
    };

    let stack = assemble(&config);
    assert_eq!(stack.graph.count(ResourceKind::Listener), 1);
    let listener = stack.graph.get(&id("AlbSharedAlbListener")).unwrap();
    assert_eq!(*listener.property("Port").unwrap(), 80);
    assert!(stack.warnings.iter().any(|w| w.contains("differ")));
}

#[test]
fn test_listener_without_default_target_answers_404() {
    let mut config = sample_stack();
    let target = &mut config.services[0].load_balancer.target;
    target.priority = Some(10);
    target.conditions = vec![ListenerCondition::PathPatterns(vec!["/app1/*".to_string()])];

    let stack = assemble(&config);
    let listener = stack.graph.get(&id("AlbSharedAlbListener")).unwrap();
    let action = &listener.property("DefaultActions").unwrap()[0];
    assert_eq!(action["Type"], "fixed-response");
    assert_eq!(action["FixedResponseConfig"]["StatusCode"], "404");
    assert_eq!(stack.graph.count(ResourceKind::ListenerRule), 2);
}

#[test]
fn test_separate_load_balancers_in_first_reference_order() {
    let mut config = sample_stack();
    config.services[1].load_balancer.name = "internal-alb".to_string();
    config.services[1].load_balancer.target.priority = None;
    config.services[1].load_balancer.target.conditions.clear();

    let stack = assemble(&config);
    assert_eq!(stack.load_balancers, vec!["shared-alb", "internal-alb"]);
    assert_eq!(stack.graph.count(ResourceKind::LoadBalancer), 2);
    // Both listeners are on port 80: one LBSG ingress, one AppSG ingress.
    assert_eq!(stack.graph.count(ResourceKind::SecurityGroupIngress), 5);
}

#[test]
fn test_duplicate_volume_name_fails_fast() {
    let mut config = sample_stack();
    if let Some(efs) = config.services[0].container.efs_mount.as_mut() {
        let mut copy = efs.mappings[0].clone();
        copy.container_path = "/usr/other".to_string();
        efs.mappings.push(copy);
    }

    let err = StackAssembler::default().assemble(&config).unwrap_err();
    assert!(err.to_string().contains("app"));
}

#[test]
fn test_names_with_same_resource_id_fail_before_construction() {
    let mut services = sample_stack();
    services.services[1].name = "app-1".to_string();

    let mut cased = sample_stack();
    cased.services[0].name = "App1".to_string();
    cased.services[1].name = "app1".to_string();

    let mut volumes = sample_stack();
    if let Some(efs) = volumes.services[0].container.efs_mount.as_mut() {
        efs.mappings[0].volume_name = "data-1".to_string();
        let mut copy = efs.mappings[0].clone();
        copy.volume_name = "data1".to_string();
        copy.container_path = "/usr/other".to_string();
        efs.mappings.push(copy);
    }

    let mut load_balancers = sample_stack();
    load_balancers.services[1].load_balancer.name = "sharedAlb".to_string();

    for config in [services, cased, volumes, load_balancers] {
        let err = StackAssembler::default().assemble(&config).unwrap_err();
        match err {
            CoreError::Spec(SpecError::ValidationFailed(errors)) => {
                assert!(errors.iter().any(|e| e.contains("same resource id")), "{:?}", errors);
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}

#[test]
fn test_load_balancer_name_is_not_a_physical_name() {
    let mut config = sample_stack();
    for service in &mut config.services {
        service.load_balancer.name = "AriefhInfraStack/shared alb with a very long name".to_string();
    }

    let stack = assemble(&config);
    let lb = stack
        .graph
        .get(&id("AlbAriefhInfraStackSharedAlbWithAVeryLongName"))
        .unwrap();
    assert!(lb.property("Name").is_none());
    assert_eq!(*lb.property("Type").unwrap(), "application");
    assert!(stack
        .graph
        .outputs()
        .iter()
        .any(|o| o.key == "EcsLbDnsNameAriefhInfraStackSharedAlbWithAVeryLongName"));
}
