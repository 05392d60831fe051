use std::sync::Arc;

use tracing::{instrument, trace};

use crate::{
    driver::{Driver, DriverContext, DriverFactory},
    error::DriverError,
};

/// Driver factories, looked up by the task's `driver` name.
#[derive(Default, Clone)]
pub struct DriverRegistry {
    factories: Vec<Arc<dyn DriverFactory>>,
}

impl DriverRegistry {
    #[inline]
    pub fn new() -> Self {
        Self {
            factories: Vec::new(),
        }
    }

    /// Register a factory; a later registration with the same name shadows earlier ones.
    #[inline]
    pub fn register(&mut self, factory: Arc<dyn DriverFactory>) {
        self.factories.push(factory);
    }

    #[inline]
    pub fn with(mut self, factory: Arc<dyn DriverFactory>) -> Self {
        self.register(factory);
        self
    }

    pub fn pick(&self, name: &str) -> Option<&Arc<dyn DriverFactory>> {
        self.factories.iter().rev().find(|f| f.name() == name)
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.factories.iter().map(|f| f.name()).collect()
    }

    #[instrument(level = "trace", skip(self, ctx), fields(task = %ctx.task_name))]
    pub fn build(&self, name: &str, ctx: DriverContext) -> Result<Arc<dyn Driver>, DriverError> {
        let factory = self
            .pick(name)
            .ok_or_else(|| DriverError::NotFound(name.to_string()))?;

        let driver = factory.build(ctx)?;
        trace!(driver = factory.name(), "driver built successfully");
        Ok(driver)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::{DriverHandle, EventEmitter, ExecContext};
    use async_trait::async_trait;
    use ward_model::Task;

    struct Named(&'static str);

    #[async_trait]
    impl Driver for Named {
        fn name(&self) -> &'static str {
            self.0
        }
        async fn prestart(&self, _: &ExecContext, _: &Task) -> Result<(), DriverError> {
            Ok(())
        }
        async fn start(
            &self,
            _: &ExecContext,
            _: &Task,
        ) -> Result<Arc<dyn DriverHandle>, DriverError> {
            Err(DriverError::Unsupported("start"))
        }
    }

    struct Factory(&'static str);

    impl DriverFactory for Factory {
        fn name(&self) -> &'static str {
            self.0
        }
        fn build(&self, _ctx: DriverContext) -> Result<Arc<dyn Driver>, DriverError> {
            Ok(Arc::new(Named(self.0)))
        }
    }

    fn ctx() -> DriverContext {
        DriverContext {
            job_name: "job".into(),
            task_group: "group".into(),
            task_name: "task".into(),
            alloc_id: "alloc".into(),
            emitter: EventEmitter::noop(),
        }
    }

    #[test]
    fn builds_registered_driver_by_name() {
        let registry = DriverRegistry::new()
            .with(Arc::new(Factory("exec")))
            .with(Arc::new(Factory("docker")));

        let driver = registry.build("docker", ctx()).unwrap();
        assert_eq!(driver.name(), "docker");
        assert_eq!(registry.names(), ["exec", "docker"]);
    }

    #[test]
    fn unknown_driver_is_not_found() {
        let registry = DriverRegistry::new().with(Arc::new(Factory("exec")));
        match registry.build("qemu", ctx()) {
            Err(DriverError::NotFound(name)) => assert_eq!(name, "qemu"),
            other => panic!("expected NotFound, got {:?}", other.map(|d| d.name())),
        }
    }
}
