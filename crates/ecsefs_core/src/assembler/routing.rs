//! Load balancers, listeners and target groups.
//!
//! A load balancer and its listener are created the first time a service names
//! them and reused by every later service. Each service gets its own target
//! group: conditional targets are routed through a listener rule, the rest join
//! the listener's default forward action.

use serde_json::{json, Value};
use tracing::{debug, warn};

use ecsefs_spec::{ListenerCondition, ListenerProtocol, ListenerSpec, ServiceSpec, DEFAULT_HTTP_PORT};

use crate::error::CoreResult;
use crate::graph::{
    logical_id, param_ref, Concern, Resource, ResourceGraph, ResourceId, ResourceKind, StackOutput,
};
use crate::registry::SharedRegistry;

use super::cluster::{ingress_from_group, ClusterResources, PUBLIC_SUBNETS, VPC_ID};

/// A load balancer and its single listener.
#[derive(Debug, Clone)]
pub struct SharedListener {
    pub load_balancer: ResourceId,
    pub listener: ResourceId,
    /// Service whose declaration created the pair.
    pub owner: String,
    pub spec: ListenerSpec,
}

/// Routing handles for one service.
#[derive(Debug, Clone)]
pub struct ServiceRoute {
    pub load_balancer: ResourceId,
    pub listener: ResourceId,
    pub target_group: ResourceId,
    pub listener_rule: Option<ResourceId>,
}

impl ServiceRoute {
    /// Resource that wires the target group into the listener.
    pub fn attachment(&self) -> &ResourceId {
        self.listener_rule.as_ref().unwrap_or(&self.listener)
    }
}

/// Shared routing state for one assembly pass.
#[derive(Debug, Default)]
pub struct Routing {
    listeners: SharedRegistry<SharedListener>,
    ingress: SharedRegistry<ResourceId>,
}

impl Routing {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load balancer names in first-reference order.
    pub fn load_balancers(&self) -> Vec<String> {
        self.listeners.names().into_iter().map(String::from).collect()
    }

    /// Register `service` behind its load balancer, creating the load balancer on first use.
    pub fn attach(
        &mut self,
        graph: &mut ResourceGraph,
        cluster: &ClusterResources,
        service: &ServiceSpec,
        ecs_service: &ResourceId,
    ) -> CoreResult<ServiceRoute> {
        let lb = &service.load_balancer;
        let ingress = &mut self.ingress;

        let shared = self
            .listeners
            .get_or_try_create(&lb.name, || {
                create_listener(graph, ingress, cluster, &lb.name, &service.name, &lb.listener)
            })?
            .clone();

        if shared.owner != service.name && shared.spec != lb.listener {
            warn!(
                "Service {}: listener settings for {} ignored, keeping those of {}",
                service.name, lb.name, shared.owner
            );
        }

        let port = service
            .container
            .port_mappings
            .first()
            .map(|p| p.container_port)
            .unwrap_or(DEFAULT_HTTP_PORT);

        let target_group = graph.add(target_group(service, port))?;

        let ingress_id = logical_id(&["AppSG", "From", "LBSG", &port.to_string()]);
        let ingress_key = ingress_id.to_string();
        self.ingress.get_or_try_create(&ingress_key, || {
            graph.add(ingress_from_group(
                ingress_id.clone(),
                cluster.app_group_id(),
                cluster.lb_group_id(),
                port,
                Concern::Routing,
            ))
        })?;

        let listener_rule = if lb.target.is_conditional() {
            let rule = graph.add(listener_rule(service, &shared.listener, &target_group))?;
            debug!(
                "Service {}: rule {} on {} (priority {:?})",
                service.name, rule, lb.name, lb.target.priority
            );
            Some(rule)
        } else {
            add_default_target(graph.get_mut(&shared.listener)?, &target_group)?;
            debug!("Service {}: default target on {}", service.name, lb.name);
            None
        };

        let route = ServiceRoute {
            load_balancer: shared.load_balancer,
            listener: shared.listener,
            target_group,
            listener_rule,
        };

        graph.get_mut(ecs_service)?.push_property(
            "LoadBalancers",
            json!({
                "ContainerName": service.container_name(),
                "ContainerPort": port,
                "TargetGroupArn": route.target_group.reference()
            }),
        )?;
        graph.add_dependency(ecs_service, route.attachment())?;

        Ok(route)
    }

    /// Give every listener without a default target a fixed 404 response.
    pub fn finish(&self, graph: &mut ResourceGraph) -> CoreResult<()> {
        for (name, shared) in self.listeners.iter() {
            let listener = graph.get_mut(&shared.listener)?;
            let empty = listener
                .property("DefaultActions")
                .and_then(Value::as_array)
                .map_or(true, |a| a.is_empty());
            if empty {
                warn!("Load balancer {} has no default target; answering 404", name);
                listener.set_property(
                    "DefaultActions",
                    json!([{
                        "Type": "fixed-response",
                        "FixedResponseConfig": { "StatusCode": "404", "ContentType": "text/plain" }
                    }]),
                );
            }
        }
        Ok(())
    }
}

fn create_listener(
    graph: &mut ResourceGraph,
    ingress: &mut SharedRegistry<ResourceId>,
    cluster: &ClusterResources,
    name: &str,
    owner: &str,
    spec: &ListenerSpec,
) -> CoreResult<SharedListener> {
    let load_balancer = graph.add(
        Resource::new(logical_id(&["Alb", name]), ResourceKind::LoadBalancer, Concern::Routing)
            .with_properties(json!({
                "Type": "application",
                "Scheme": "internet-facing",
                "Subnets": param_ref(PUBLIC_SUBNETS),
                "SecurityGroups": [cluster.lb_group_id()]
            })),
    )?;

    if spec.open {
        let id = logical_id(&["LBSG", "From", "AnyIpv4", &spec.port.to_string()]);
        let key = id.to_string();
        ingress.get_or_try_create(&key, || {
            graph.add(
                Resource::new(id.clone(), ResourceKind::SecurityGroupIngress, Concern::Routing)
                    .with_properties(json!({
                        "GroupId": cluster.lb_group_id(),
                        "CidrIp": "0.0.0.0/0",
                        "IpProtocol": "tcp",
                        "FromPort": spec.port,
                        "ToPort": spec.port,
                        "Description": format!("Allow from anyone on port {}", spec.port)
                    })),
            )
        })?;
    }

    let mut listener = Resource::new(logical_id(&["Alb", name, "Listener"]), ResourceKind::Listener, Concern::Routing)
        .with_properties(json!({
            "LoadBalancerArn": load_balancer.reference(),
            "Port": spec.port,
            "Protocol": spec.protocol.as_str(),
            "DefaultActions": []
        }));
    if spec.protocol == ListenerProtocol::Https {
        let certificates: Vec<Value> = spec
            .certificate_arns
            .iter()
            .map(|arn| json!({ "CertificateArn": arn }))
            .collect();
        listener.set_property("Certificates", Value::Array(certificates));
    }
    let listener = graph.add(listener)?;

    graph.add_output(StackOutput {
        key: logical_id(&["EcsLbDnsName", name]).to_string(),
        value: load_balancer.attr("DNSName"),
        description: "ECS Load Balancer DNS Name".to_string(),
    })?;

    debug!("Created load balancer {} for {}", name, owner);

    Ok(SharedListener {
        load_balancer,
        listener,
        owner: owner.to_string(),
        spec: spec.clone(),
    })
}

fn target_group(service: &ServiceSpec, port: u16) -> Resource {
    let target = &service.load_balancer.target;
    let mut resource = Resource::new(
        logical_id(&["TargetGroup", &service.name]),
        ResourceKind::TargetGroup,
        Concern::Routing,
    )
    .owned_by(service.name.as_str())
    .with_properties(json!({
        "Name": service.target_group_name(),
        "Port": port,
        "Protocol": "HTTP",
        "TargetType": "ip",
        "VpcId": param_ref(VPC_ID)
    }));

    if let Some(check) = &target.health_check {
        if let Some(path) = &check.path {
            resource.set_property("HealthCheckPath", json!(path));
        }
        if let Some(codes) = &check.healthy_http_codes {
            resource.set_property("Matcher", json!({ "HttpCode": codes }));
        }
        if let Some(timeout) = check.timeout_secs {
            resource.set_property("HealthCheckTimeoutSeconds", json!(timeout));
        }
        if let Some(interval) = check.interval_secs {
            resource.set_property("HealthCheckIntervalSeconds", json!(interval));
        }
        if let Some(count) = check.healthy_threshold_count {
            resource.set_property("HealthyThresholdCount", json!(count));
        }
        if let Some(count) = check.unhealthy_threshold_count {
            resource.set_property("UnhealthyThresholdCount", json!(count));
        }
    }

    if let Some(delay) = target.deregistration_delay_secs {
        resource.set_property(
            "TargetGroupAttributes",
            json!([{ "Key": "deregistration_delay.timeout_seconds", "Value": delay.to_string() }]),
        );
    }

    resource
}

fn listener_rule(service: &ServiceSpec, listener: &ResourceId, target_group: &ResourceId) -> Resource {
    let target = &service.load_balancer.target;
    let conditions: Vec<Value> = target.conditions.iter().map(condition).collect();

    Resource::new(
        logical_id(&["Alb", &service.load_balancer.name, "Listener", &service.name, "Rule"]),
        ResourceKind::ListenerRule,
        Concern::Routing,
    )
    .owned_by(service.name.as_str())
    .with_properties(json!({
        "ListenerArn": listener.reference(),
        "Priority": target.priority,
        "Conditions": conditions,
        "Actions": [{ "Type": "forward", "TargetGroupArn": target_group.reference() }]
    }))
}

fn condition(condition: &ListenerCondition) -> Value {
    let field = condition.field();
    match condition {
        ListenerCondition::PathPatterns(values) => {
            json!({ "Field": field, "PathPatternConfig": { "Values": values } })
        }
        ListenerCondition::HostHeaders(values) => {
            json!({ "Field": field, "HostHeaderConfig": { "Values": values } })
        }
        ListenerCondition::QueryStrings(pairs) => {
            let values: Vec<Value> = pairs
                .iter()
                .map(|p| match &p.key {
                    Some(key) => json!({ "Key": key, "Value": p.value }),
                    None => json!({ "Value": p.value }),
                })
                .collect();
            json!({ "Field": field, "QueryStringConfig": { "Values": values } })
        }
        ListenerCondition::HttpHeader { name, values } => json!({
            "Field": field,
            "HttpHeaderConfig": { "HttpHeaderName": name, "Values": values }
        }),
    }
}

/// Add a weighted target to the listener's default forward action.
fn add_default_target(listener: &mut Resource, target_group: &ResourceId) -> CoreResult<()> {
    let entry = json!({ "TargetGroupArn": target_group.reference(), "Weight": 1 });

    let groups = listener
        .properties
        .get_mut("DefaultActions")
        .and_then(|actions| actions.get_mut(0))
        .and_then(|action| action.pointer_mut("/ForwardConfig/TargetGroups"))
        .and_then(Value::as_array_mut);

    match groups {
        Some(groups) => {
            groups.push(entry);
            Ok(())
        }
        None => listener.push_property(
            "DefaultActions",
            json!({ "Type": "forward", "ForwardConfig": { "TargetGroups": [entry] } }),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ecsefs_spec::QueryStringPair;

    #[test]
    fn test_query_string_condition() {
        let value = condition(&ListenerCondition::QueryStrings(vec![QueryStringPair {
            key: Some("q".to_string()),
            value: "app2".to_string(),
        }]));
        assert_eq!(value["Field"], "query-string");
        assert_eq!(value["QueryStringConfig"]["Values"][0]["Key"], "q");
        assert_eq!(value["QueryStringConfig"]["Values"][0]["Value"], "app2");
    }

    #[test]
    fn test_default_targets_share_one_forward_action() {
        let mut listener = Resource::new(logical_id(&["AlbListener"]), ResourceKind::Listener, Concern::Routing)
            .with_properties(json!({ "DefaultActions": [] }));

        add_default_target(&mut listener, &ResourceId::new("TargetGroupApp1")).unwrap();
        add_default_target(&mut listener, &ResourceId::new("TargetGroupApp3")).unwrap();

        let actions = listener.property("DefaultActions").unwrap().as_array().unwrap();
        assert_eq!(actions.len(), 1);
        let groups = actions[0]["ForwardConfig"]["TargetGroups"].as_array().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[1]["TargetGroupArn"]["Ref"], "TargetGroupApp3");
    }
}
