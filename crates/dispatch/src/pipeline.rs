//! Ordered interceptor execution with cooperative gating.
//!
//! Interceptors are registered by name on a [`PipelineBuilder`] and
//! referenced by name from command declarations, so configuration stays
//! declarative while the registry itself is an explicit value handed to
//! the dispatcher, not ambient global state.

use std::{collections::HashMap, sync::Arc};

use {
    async_trait::async_trait,
    tracing::{debug, warn},
};

use herald_common::Interaction;

use crate::gate::Gate;

/// A middleware (runs before the handler) or afterware (runs after). One
/// contract for both: inspect the interaction, consult or mutate the gate.
///
/// Returning an error is treated as "did not stop" — the pipeline logs it
/// and carries on. Authorization logic must express denial through the
/// gate, which stays fail-closed, never through an error.
#[async_trait]
pub trait Interceptor: Send + Sync {
    async fn intercept(&self, interaction: &Interaction, gate: &mut Gate) -> anyhow::Result<()>;
}

/// Builds an immutable [`Pipeline`].
#[derive(Default)]
pub struct PipelineBuilder {
    middlewares: HashMap<String, Arc<dyn Interceptor>>,
    afterwares: HashMap<String, Arc<dyn Interceptor>>,
    global_middleware: Vec<String>,
    global_afterware: Vec<String>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a middleware under `name`.
    #[must_use]
    pub fn middleware(mut self, name: impl Into<String>, step: Arc<dyn Interceptor>) -> Self {
        self.middlewares.insert(name.into(), step);
        self
    }

    /// Register an afterware under `name`.
    #[must_use]
    pub fn afterware(mut self, name: impl Into<String>, step: Arc<dyn Interceptor>) -> Self {
        self.afterwares.insert(name.into(), step);
        self
    }

    /// Run the named middleware ahead of every command's own list, in
    /// registration order.
    #[must_use]
    pub fn global_middleware(mut self, name: impl Into<String>) -> Self {
        self.global_middleware.push(name.into());
        self
    }

    /// Run the named afterware ahead of every command's own list.
    #[must_use]
    pub fn global_afterware(mut self, name: impl Into<String>) -> Self {
        self.global_afterware.push(name.into());
        self
    }

    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            middlewares: self.middlewares,
            afterwares: self.afterwares,
            global_middleware: self.global_middleware,
            global_afterware: self.global_afterware,
        }
    }
}

/// Immutable interceptor pipeline shared by all invocations.
pub struct Pipeline {
    middlewares: HashMap<String, Arc<dyn Interceptor>>,
    afterwares: HashMap<String, Arc<dyn Interceptor>>,
    global_middleware: Vec<String>,
    global_afterware: Vec<String>,
}

impl Pipeline {
    #[must_use]
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    /// Run the global middlewares followed by `names`, in order.
    ///
    /// Returns the gate when an interceptor halted the run (carrying any
    /// response message for the invoker), or `None` when every step passed
    /// and the handler may proceed.
    pub async fn run_middlewares(&self, names: &[String], interaction: &Interaction) -> Option<Gate> {
        self.run(&self.middlewares, &self.global_middleware, names, interaction, "middleware")
            .await
    }

    /// Run the global afterwares followed by `names`, under the same
    /// ordering and gate contract as the middleware run.
    pub async fn run_afterwares(&self, names: &[String], interaction: &Interaction) -> Option<Gate> {
        self.run(&self.afterwares, &self.global_afterware, names, interaction, "afterware")
            .await
    }

    async fn run(
        &self,
        table: &HashMap<String, Arc<dyn Interceptor>>,
        global: &[String],
        names: &[String],
        interaction: &Interaction,
        kind: &'static str,
    ) -> Option<Gate> {
        let mut gate = Gate::new();
        for name in global.iter().chain(names) {
            // Unknown names are configuration drift, not an error.
            let Some(step) = table.get(name) else {
                debug!(name, kind, "unknown interceptor name skipped");
                continue;
            };
            if let Err(e) = step.intercept(interaction, &mut gate).await {
                warn!(
                    name,
                    kind,
                    interaction = %interaction.id,
                    "interceptor failed, treating as pass: {e}"
                );
            }
            if !gate.is_allowed() {
                debug!(name, kind, interaction = %interaction.id, "pipeline halted");
                return Some(gate);
            }
        }
        None
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use herald_common::{InteractionId, UserId};

    use super::*;

    fn interaction() -> Interaction {
        Interaction::new(InteractionId(1), "ping", UserId(7))
    }

    /// Records its name into a shared trace, optionally halting.
    struct Tracing {
        name: &'static str,
        trace: Arc<Mutex<Vec<&'static str>>>,
        halt_with: Option<&'static str>,
    }

    #[async_trait]
    impl Interceptor for Tracing {
        async fn intercept(&self, _: &Interaction, gate: &mut Gate) -> anyhow::Result<()> {
            self.trace.lock().unwrap().push(self.name);
            match self.halt_with {
                Some(msg) => gate.stop_with(msg),
                None => gate.next(),
            }
            Ok(())
        }
    }

    fn traced(
        name: &'static str,
        trace: &Arc<Mutex<Vec<&'static str>>>,
        halt_with: Option<&'static str>,
    ) -> Arc<dyn Interceptor> {
        Arc::new(Tracing {
            name,
            trace: Arc::clone(trace),
            halt_with,
        })
    }

    #[tokio::test]
    async fn runs_in_order_and_passes() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .middleware("first", traced("first", &trace, None))
            .middleware("second", traced("second", &trace, None))
            .build();
        let names = vec!["first".to_string(), "second".to_string()];
        let halted = pipeline.run_middlewares(&names, &interaction()).await;
        assert!(halted.is_none());
        assert_eq!(*trace.lock().unwrap(), vec!["first", "second"]);
    }

    #[tokio::test]
    async fn halt_stops_iteration_and_carries_response() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .middleware("deny", traced("deny", &trace, Some("nope")))
            .middleware("after", traced("after", &trace, None))
            .build();
        let names = vec!["deny".to_string(), "after".to_string()];
        let gate = pipeline.run_middlewares(&names, &interaction()).await;
        let gate = gate.unwrap();
        assert!(!gate.is_allowed());
        assert_eq!(gate.response(), Some("nope"));
        assert_eq!(*trace.lock().unwrap(), vec!["deny"], "later steps must not run");
    }

    #[tokio::test]
    async fn unknown_names_are_silently_skipped() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .middleware("known", traced("known", &trace, None))
            .build();
        let names = vec!["ghost".to_string(), "known".to_string()];
        let halted = pipeline.run_middlewares(&names, &interaction()).await;
        assert!(halted.is_none());
        assert_eq!(*trace.lock().unwrap(), vec!["known"]);
    }

    #[tokio::test]
    async fn global_middlewares_run_first() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .middleware("auth", traced("auth", &trace, None))
            .middleware("own", traced("own", &trace, None))
            .global_middleware("auth")
            .build();
        let names = vec!["own".to_string()];
        pipeline.run_middlewares(&names, &interaction()).await;
        assert_eq!(*trace.lock().unwrap(), vec!["auth", "own"]);
    }

    struct Failing;

    #[async_trait]
    impl Interceptor for Failing {
        async fn intercept(&self, _: &Interaction, _: &mut Gate) -> anyhow::Result<()> {
            anyhow::bail!("authoring bug")
        }
    }

    #[tokio::test]
    async fn interceptor_error_is_fail_open() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .middleware("broken", Arc::new(Failing))
            .middleware("next", traced("next", &trace, None))
            .build();
        let names = vec!["broken".to_string(), "next".to_string()];
        let halted = pipeline.run_middlewares(&names, &interaction()).await;
        assert!(halted.is_none(), "an erroring interceptor must not halt");
        assert_eq!(*trace.lock().unwrap(), vec!["next"]);
    }

    struct StopIf {
        predicate: bool,
    }

    #[async_trait]
    impl Interceptor for StopIf {
        async fn intercept(&self, _: &Interaction, gate: &mut Gate) -> anyhow::Result<()> {
            gate.stop_if_with(self.predicate, "cooldown active");
            Ok(())
        }
    }

    #[tokio::test]
    async fn stop_if_true_halts_before_later_steps() {
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_probe = Arc::clone(&ran);
        struct Count(Arc<AtomicUsize>);
        #[async_trait]
        impl Interceptor for Count {
            async fn intercept(&self, _: &Interaction, _: &mut Gate) -> anyhow::Result<()> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
        let pipeline = Pipeline::builder()
            .middleware("guard", Arc::new(StopIf { predicate: true }))
            .middleware("probe", Arc::new(Count(ran_probe)))
            .build();
        let names = vec!["guard".to_string(), "probe".to_string()];
        let gate = pipeline.run_middlewares(&names, &interaction()).await.unwrap();
        assert_eq!(gate.response(), Some("cooldown active"));
        assert_eq!(ran.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn stop_if_false_lets_the_run_pass() {
        let pipeline = Pipeline::builder()
            .middleware("guard", Arc::new(StopIf { predicate: false }))
            .build();
        let names = vec!["guard".to_string()];
        assert!(pipeline.run_middlewares(&names, &interaction()).await.is_none());
    }

    #[tokio::test]
    async fn afterwares_use_their_own_table() {
        let trace = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::builder()
            .middleware("shared", traced("as-middleware", &trace, None))
            .afterware("shared", traced("as-afterware", &trace, None))
            .build();
        let names = vec!["shared".to_string()];
        pipeline.run_afterwares(&names, &interaction()).await;
        assert_eq!(*trace.lock().unwrap(), vec!["as-afterware"]);
    }
}
