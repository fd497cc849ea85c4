//! Provisioning runs.
//!
//! A [`ProvisioningRun`] binds every resource a client stack uses or depends
//! on, for one environment, into a single [`ComputeContext`]:
//!
//! 1. [`ProvisioningRun::plan`] validates the client against the parent
//!    descriptor and schedules one binding per used resource and per
//!    dependency. Scheduling only composes outputs; nothing waits yet.
//! 2. [`ProvisioningRun::settle`] waits for every scheduled binding together.
//!    This is the only wait point of the run. Afterwards the descriptor's own
//!    `env` and `secrets` are rendered through the
//!    [`TemplateExtensionRegistry`] and the collector is merged.
//!
//! Any failed binding fails the whole run and no context is returned.
//! [`ProvisioningRun::cancel`] (or a [`RunCanceller`] held elsewhere) aborts
//! the outstanding bindings; a cancelled run must be started over.

use chrono::{DateTime, Utc};
use futures::future::{AbortHandle, AbortRegistration, Abortable};
use serde::Serialize;
use std::future::IntoFuture;
use std::sync::Arc;
use tracing::{Instrument, Span, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::GlobalConfig;
use crate::context::{BindingSource, ComputeContext, ComputeContextCollector};
use crate::core::{BindError, Output};
use crate::credentials::{ConsumerIdentity, CredentialBackend, CredentialProvisioner};
use crate::descriptor::{ClientDescriptor, ClientStack, ParentDescriptor};
use crate::resources::{BindingRequest, BindingServices, ResourceConfig, ResourceRegistry};
use crate::stack::{ExportSource, StackReference, StackReferenceResolver};
use crate::templating::TemplateExtensionRegistry;

/// Resource type recorded for values set in the client descriptor.
const DESCRIPTOR_SOURCE: &str = "descriptor";

/// Cancels a run from outside the task that settles it.
#[derive(Debug, Clone)]
pub struct RunCanceller {
    run_id: Uuid,
    handle: AbortHandle,
}

impl RunCanceller {
    pub fn cancel(&self) {
        info!("Cancelling provisioning run {}", self.run_id);
        self.handle.abort();
    }
}

/// Result of a settled run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunOutcome {
    pub run_id: Uuid,
    pub stack: String,
    pub environment: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    /// Number of resource bindings settled
    pub bindings: usize,
    pub context: ComputeContext,
}

/// One provisioning run of one client stack in one environment.
pub struct ProvisioningRun {
    run_id: Uuid,
    stack: String,
    environment: String,
    started_at: DateTime<Utc>,
    config: GlobalConfig,
    registry: Arc<ResourceRegistry>,
    services: BindingServices,
    effects: Vec<Output<()>>,
    abort_handle: AbortHandle,
    abort_registration: AbortRegistration,
    span: Span,
}

impl ProvisioningRun {
    pub fn new(
        stack: impl Into<String>,
        environment: impl Into<String>,
        registry: Arc<ResourceRegistry>,
        source: Arc<dyn ExportSource>,
        backend: Arc<dyn CredentialBackend>,
        config: &GlobalConfig,
    ) -> Self {
        let run_id = Uuid::new_v4();
        let stack = stack.into();
        let environment = environment.into();
        let span = info_span!("provisioning_run", run_id = %run_id, stack = %stack, env = %environment);
        let (abort_handle, abort_registration) = AbortHandle::new_pair();

        let services = BindingServices {
            resolver: StackReferenceResolver::new(source),
            provisioner: CredentialProvisioner::new(backend)
                .with_password_length(config.password_length),
            collector: ComputeContextCollector::new(),
        };

        Self {
            run_id,
            stack,
            environment,
            started_at: Utc::now(),
            config: config.clone(),
            registry,
            services,
            effects: Vec::new(),
            abort_handle,
            abort_registration,
            span,
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Bindings scheduled so far.
    pub fn pending_bindings(&self) -> usize {
        self.effects.len()
    }

    pub fn canceller(&self) -> RunCanceller {
        RunCanceller {
            run_id: self.run_id,
            handle: self.abort_handle.clone(),
        }
    }

    pub fn cancel(&self) {
        self.canceller().cancel();
    }

    /// Reference to `owner_stack` in this run's environment, qualified with the
    /// configured organization.
    pub fn reference_to(&self, owner_stack: &str) -> Result<StackReference, BindError> {
        match &self.config.organization {
            Some(org) => StackReference::with_organization(org, owner_stack, &self.environment),
            None => StackReference::new(owner_stack, &self.environment),
        }
    }

    /// Schedule the binding of one resource of `parent` into `consumer`.
    ///
    /// # Errors
    ///
    /// Configuration and naming errors are returned immediately; resolution and
    /// provisioning errors surface from [`ProvisioningRun::settle`].
    pub fn bind(
        &mut self,
        parent: &StackReference,
        resource_name: &str,
        config: &ResourceConfig,
        consumer: &ConsumerIdentity,
    ) -> Result<(), BindError> {
        let _entered = self.span.enter();
        let kind = config.kind();
        let binder = self.registry.get(kind)?;
        let request = BindingRequest {
            resource_name,
            config,
            parent,
            consumer,
            default_version: self.config.default_naming_version,
            max_name_length: self.config.max_name_length(kind),
        };

        debug!(
            "Scheduling {} '{}' of {} for {} from exports {:?}",
            kind,
            resource_name,
            parent,
            consumer,
            binder.export_keys(&request.identifier()?)
        );
        let effect = binder.bind(&request, &self.services)?;
        self.effects.push(effect);
        Ok(())
    }

    /// Schedule every binding `client` declares for this run's environment.
    pub fn plan(
        &mut self,
        parent: &ParentDescriptor,
        client: &ClientDescriptor,
    ) -> Result<(), BindError> {
        client.validate_against(&self.environment, parent)?;
        let stack = client.stack(&self.environment)?;
        let resources = &parent.environment(&self.environment)?.resources;
        let reference = self.reference_to(&parent.name)?;

        let mut scheduled = Vec::new();
        for name in &stack.uses {
            if let Some(config) = resources.get(name) {
                let consumer = ConsumerIdentity::direct(&client.name, &self.environment);
                scheduled.push((name, config, consumer));
            }
        }
        for dependency in &stack.dependencies {
            if let Some(config) = resources.get(&dependency.resource) {
                let consumer = ConsumerIdentity::dependency(
                    &client.name,
                    &self.environment,
                    &dependency.owner,
                    &dependency.name,
                );
                scheduled.push((&dependency.resource, config, consumer));
            }
        }

        for (name, config, consumer) in scheduled {
            self.bind(&reference, name, config, &consumer)?;
        }
        info!(
            parent: &self.span,
            "Planned {} binding(s) of '{}' against '{}'",
            self.effects.len(),
            client.name,
            reference
        );
        Ok(())
    }

    /// Wait for every scheduled binding, then render `stack`'s own env and
    /// secrets and merge the context.
    ///
    /// # Errors
    ///
    /// Returns the first binding failure, or [`BindError::Cancelled`] if the
    /// run was cancelled before all bindings settled.
    pub async fn settle(self, stack: Option<&ClientStack>) -> Result<RunOutcome, BindError> {
        let Self {
            run_id,
            stack: stack_name,
            environment,
            started_at,
            services,
            effects,
            abort_registration,
            span,
            ..
        } = self;

        let bindings = effects.len();
        let all = Abortable::new(Output::all(effects).into_future(), abort_registration);
        match all.instrument(span.clone()).await {
            Ok(Ok(_)) => {}
            Ok(Err(error)) => {
                warn!(parent: &span, "Provisioning run failed: {}", error);
                return Err(error);
            }
            Err(_aborted) => {
                return Err(BindError::Cancelled {
                    run_id: run_id.to_string(),
                });
            }
        }

        let collector = services.collector;
        if let Some(stack) = stack {
            let registry = TemplateExtensionRegistry::from_context(&collector.merge());
            let env_source = BindingSource::new(DESCRIPTOR_SOURCE, "env", &stack_name);
            for (key, value) in &stack.env {
                collector.add_env(key, registry.render(value), false, &env_source);
            }
            let secret_source = BindingSource::new(DESCRIPTOR_SOURCE, "secrets", &stack_name);
            for (key, value) in &stack.secrets {
                collector.add_env(key, registry.render(value), true, &secret_source);
            }
        }

        let context = collector.merge();
        info!(
            parent: &span,
            "Settled {} binding(s) into {} env value(s)",
            bindings,
            context.env.len()
        );
        Ok(RunOutcome {
            run_id,
            stack: stack_name,
            environment,
            started_at,
            finished_at: Utc::now(),
            bindings,
            context,
        })
    }

    /// Plan and settle `client` against `parent`.
    pub async fn execute(
        mut self,
        parent: &ParentDescriptor,
        client: &ClientDescriptor,
    ) -> Result<RunOutcome, BindError> {
        self.plan(parent, client)?;
        let stack = client.stack(&self.environment)?;
        self.settle(Some(stack)).await
    }
}

impl std::fmt::Debug for ProvisioningRun {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProvisioningRun")
            .field("run_id", &self.run_id)
            .field("stack", &self.stack)
            .field("environment", &self.environment)
            .field("pending_bindings", &self.effects.len())
            .finish_non_exhaustive()
    }
}
