//! Stack assembly.
//!
//! The assembler turns a validated [`StackConfig`] into a [`ResourceGraph`] in
//! one synchronous pass: cluster-wide resources first, then each service in
//! input order through the task, storage, container, service, routing and
//! scaling stages. Load balancers are resolved through a shared registry, so
//! the first service naming one creates it and later services reuse it.

pub mod cluster;
pub mod routing;
pub mod scaling;
pub mod service;
pub mod storage;
pub mod task;

use serde::Serialize;
use tracing::{debug, info, warn};

use ecsefs_spec::{Environment, StackConfig, StackValidator};

use crate::error::CoreResult;
use crate::graph::{ResourceGraph, ResourceId};

use routing::Routing;
use scaling::ScalingResources;

/// Options controlling assembly.
#[derive(Debug, Clone, Default)]
pub struct AssemblerOptions {
    /// Treat validation warnings as errors.
    pub deny_warnings: bool,
}

/// What was declared for one service.
#[derive(Debug, Clone, Serialize)]
pub struct ServiceAssembly {
    pub name: String,
    pub task_definition: ResourceId,
    pub service: ResourceId,
    pub load_balancer: String,
    pub target_group: ResourceId,
    pub listener_rule: Option<ResourceId>,
    pub scaling: Option<ScalingResources>,
    pub volumes: Vec<String>,
}

/// Result of an assembly pass.
#[derive(Debug, Clone)]
pub struct AssembledStack {
    pub stack_name: String,
    pub environment: Environment,
    pub graph: ResourceGraph,
    pub services: Vec<ServiceAssembly>,
    /// Load balancer names in first-reference order.
    pub load_balancers: Vec<String>,
    pub warnings: Vec<String>,
}

impl AssembledStack {
    pub fn service(&self, name: &str) -> Option<&ServiceAssembly> {
        self.services.iter().find(|s| s.name == name)
    }
}

/// Assembles stack configurations into resource graphs.
#[derive(Debug, Default)]
pub struct StackAssembler {
    options: AssemblerOptions,
}

impl StackAssembler {
    pub fn new(options: AssemblerOptions) -> Self {
        Self { options }
    }

    /// Validate `config` and assemble its resource graph.
    ///
    /// Validation errors abort before any resource is declared.
    pub fn assemble(&self, config: &StackConfig) -> CoreResult<AssembledStack> {
        let validation = StackValidator::validate(config).into_result(self.options.deny_warnings)?;
        for warning in &validation.warnings {
            warn!("{}", warning);
        }

        info!(
            "Assembling stack {} ({} services)",
            config.stack_name,
            config.services.len()
        );

        let mut graph = ResourceGraph::new(config.description.clone());
        cluster::declare_parameters(&mut graph, config)?;
        let cluster = cluster::build(&mut graph, config)?;

        let mut routing = Routing::new();
        let mut services = Vec::with_capacity(config.services.len());

        for spec in &config.services {
            debug!("Assembling service {}", spec.name);

            let task = task::define(&mut graph, config, spec)?;

            let storage = match &spec.container.efs_mount {
                Some(efs) => Some(storage::attach(&mut graph, config, &cluster, spec, efs, &task)?),
                None => None,
            };

            task::add_container(&mut graph, spec, &task)?;

            let ecs_service = service::declare(&mut graph, &cluster, spec, &task, storage.as_ref())?;
            let route = routing.attach(&mut graph, &cluster, spec, &ecs_service)?;

            let scaling = match spec.autoscaling.as_ref().and_then(|a| a.policy()) {
                Some(policy) => Some(scaling::attach(
                    &mut graph,
                    &cluster,
                    spec,
                    &ecs_service,
                    &route,
                    &policy,
                )?),
                None => None,
            };

            services.push(ServiceAssembly {
                name: spec.name.clone(),
                task_definition: task.task_definition,
                service: ecs_service,
                load_balancer: spec.load_balancer.name.clone(),
                target_group: route.target_group,
                listener_rule: route.listener_rule,
                scaling,
                volumes: storage.map(|s| s.volumes).unwrap_or_default(),
            });
        }

        routing.finish(&mut graph)?;
        graph.check_references()?;

        info!(
            "Assembled {} resources, {} load balancers, {} outputs",
            graph.len(),
            routing.load_balancers().len(),
            graph.outputs().len()
        );

        Ok(AssembledStack {
            stack_name: config.stack_name.clone(),
            environment: config.env.clone(),
            graph,
            services,
            load_balancers: routing.load_balancers(),
            warnings: validation.warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::ResourceKind;
    use ecsefs_spec::sample_stack;

    #[test]
    fn test_assemble_sample() {
        let stack = StackAssembler::default().assemble(&sample_stack()).unwrap();

        assert_eq!(stack.load_balancers, vec!["shared-alb"]);
        assert_eq!(stack.graph.count(ResourceKind::LoadBalancer), 1);
        assert_eq!(stack.graph.count(ResourceKind::Listener), 1);
        assert_eq!(stack.graph.count(ResourceKind::TargetGroup), 2);
        assert_eq!(stack.graph.count(ResourceKind::ListenerRule), 1);
        assert!(stack.warnings.is_empty());
    }

    #[test]
    fn test_invalid_config_declares_nothing() {
        let mut config = sample_stack();
        config.services[0].container.image.clear();

        let err = StackAssembler::default().assemble(&config).unwrap_err();
        assert!(err.to_string().contains("container image cannot be empty"));
    }
}
