//! Ordered plugin registry (C15).
//!
//! Hooks run in registration order and are awaited one at a time. A failing
//! hook is logged and collected; later hooks still run, and the plugin
//! stays registered until explicit unregister.

use forge_contract::{
    FileConcept, FileRecord, PluginContext, PluginError, SessionPlugin, SessionState,
};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

#[derive(Default)]
pub struct PluginManager {
    plugins: RwLock<Vec<Arc<dyn SessionPlugin>>>,
}

macro_rules! run_hook {
    ($self:ident, $ctx:ident, $hook:ident $(, $arg:expr)*) => {{
        let plugins = $self.plugins.read().await.clone();
        let mut failures = Vec::new();
        for plugin in plugins {
            if let Err(message) = plugin.$hook($ctx $(, $arg)*).await {
                let err = PluginError::new(plugin.name(), stringify!($hook), message);
                warn!(plugin = plugin.name(), hook = stringify!($hook), error = %err, "plugin hook failed");
                failures.push(err);
            }
        }
        failures
    }};
}

impl PluginManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a plugin. Duplicate names warn and are ignored.
    pub async fn register(&self, ctx: &PluginContext, plugin: Arc<dyn SessionPlugin>) {
        {
            let plugins = self.plugins.read().await;
            if plugins.iter().any(|p| p.name() == plugin.name()) {
                warn!(plugin = plugin.name(), "duplicate plugin registration ignored");
                return;
            }
        }
        if let Err(message) = plugin.on_register(ctx).await {
            warn!(plugin = plugin.name(), error = %message, "plugin on_register failed");
        }
        self.plugins.write().await.push(plugin);
    }

    pub async fn unregister(&self, ctx: &PluginContext, name: &str) {
        let removed = {
            let mut plugins = self.plugins.write().await;
            let pos = plugins.iter().position(|p| p.name() == name);
            pos.map(|i| plugins.remove(i))
        };
        if let Some(plugin) = removed {
            if let Err(message) = plugin.on_unregister(ctx).await {
                warn!(plugin = name, error = %message, "plugin on_unregister failed");
            }
        }
    }

    pub async fn registered_names(&self) -> Vec<String> {
        self.plugins
            .read()
            .await
            .iter()
            .map(|p| p.name().to_string())
            .collect()
    }

    pub async fn on_initialize(&self, ctx: &PluginContext) -> Vec<PluginError> {
        run_hook!(self, ctx, on_initialize)
    }

    pub async fn before_files_generated(
        &self,
        ctx: &PluginContext,
        phase_name: &str,
        concepts: &[FileConcept],
    ) -> Vec<PluginError> {
        run_hook!(self, ctx, before_files_generated, phase_name, concepts)
    }

    pub async fn after_files_generated(
        &self,
        ctx: &PluginContext,
        phase_name: &str,
        outputs: &[FileRecord],
    ) -> Vec<PluginError> {
        run_hook!(self, ctx, after_files_generated, phase_name, outputs)
    }

    pub async fn before_deployment(&self, ctx: &PluginContext) -> Vec<PluginError> {
        run_hook!(self, ctx, before_deployment)
    }

    pub async fn after_deployment(
        &self,
        ctx: &PluginContext,
        preview_url: &str,
    ) -> Vec<PluginError> {
        run_hook!(self, ctx, after_deployment, preview_url)
    }

    pub async fn on_generation_start(&self, ctx: &PluginContext) -> Vec<PluginError> {
        run_hook!(self, ctx, on_generation_start)
    }

    pub async fn on_generation_complete(&self, ctx: &PluginContext) -> Vec<PluginError> {
        run_hook!(self, ctx, on_generation_complete)
    }

    pub async fn on_error(
        &self,
        ctx: &PluginContext,
        error: &str,
        context: &str,
    ) -> Vec<PluginError> {
        run_hook!(self, ctx, on_error, error, context)
    }

    pub async fn on_state_update(
        &self,
        ctx: &PluginContext,
        old: &SessionState,
        new: &SessionState,
    ) -> Vec<PluginError> {
        run_hook!(self, ctx, on_state_update, old, new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use forge_contract::HookResult;
    use std::sync::Mutex;

    struct RecordingPlugin {
        name: String,
        calls: Arc<Mutex<Vec<String>>>,
        fail_hooks: Vec<&'static str>,
    }

    impl RecordingPlugin {
        fn new(name: &str, calls: Arc<Mutex<Vec<String>>>) -> Self {
            Self {
                name: name.to_string(),
                calls,
                fail_hooks: Vec::new(),
            }
        }

        fn failing(name: &str, calls: Arc<Mutex<Vec<String>>>, hooks: Vec<&'static str>) -> Self {
            Self {
                name: name.to_string(),
                calls,
                fail_hooks: hooks,
            }
        }

        fn record(&self, hook: &str) -> HookResult {
            self.calls
                .lock()
                .unwrap()
                .push(format!("{}:{hook}", self.name));
            if self.fail_hooks.contains(&hook) {
                Err(format!("{hook} refused"))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl SessionPlugin for RecordingPlugin {
        fn name(&self) -> &str {
            &self.name
        }

        async fn on_generation_start(&self, _ctx: &PluginContext) -> HookResult {
            self.record("on_generation_start")
        }

        async fn after_deployment(&self, _ctx: &PluginContext, _url: &str) -> HookResult {
            self.record("after_deployment")
        }
    }

    fn ctx() -> PluginContext {
        PluginContext {
            session_id: "sess".into(),
            agent_id: "agent".into(),
            project_name: "proj".into(),
        }
    }

    #[tokio::test]
    async fn hooks_run_in_registration_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = PluginManager::new();
        let ctx = ctx();
        manager
            .register(&ctx, Arc::new(RecordingPlugin::new("first", calls.clone())))
            .await;
        manager
            .register(&ctx, Arc::new(RecordingPlugin::new("second", calls.clone())))
            .await;

        manager.on_generation_start(&ctx).await;

        let calls = calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec!["first:on_generation_start", "second:on_generation_start"]
        );
    }

    #[tokio::test]
    async fn duplicate_registration_is_ignored() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = PluginManager::new();
        let ctx = ctx();
        manager
            .register(&ctx, Arc::new(RecordingPlugin::new("dup", calls.clone())))
            .await;
        manager
            .register(&ctx, Arc::new(RecordingPlugin::new("dup", calls.clone())))
            .await;

        assert_eq!(manager.registered_names().await, vec!["dup"]);
    }

    #[tokio::test]
    async fn failing_hook_does_not_stop_later_hooks() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = PluginManager::new();
        let ctx = ctx();
        manager
            .register(
                &ctx,
                Arc::new(RecordingPlugin::failing(
                    "broken",
                    calls.clone(),
                    vec!["on_generation_start"],
                )),
            )
            .await;
        manager
            .register(&ctx, Arc::new(RecordingPlugin::new("healthy", calls.clone())))
            .await;

        let failures = manager.on_generation_start(&ctx).await;

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].plugin, "broken");
        let calls = calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 2);
        // The broken plugin stays registered.
        assert_eq!(manager.registered_names().await.len(), 2);
    }

    #[tokio::test]
    async fn unregister_removes_plugin() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = PluginManager::new();
        let ctx = ctx();
        manager
            .register(&ctx, Arc::new(RecordingPlugin::new("p", calls.clone())))
            .await;
        manager.unregister(&ctx, "p").await;

        assert!(manager.registered_names().await.is_empty());
        manager.on_generation_start(&ctx).await;
        assert!(calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hooks_with_payloads_pass_arguments() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let manager = PluginManager::new();
        let ctx = ctx();
        manager
            .register(&ctx, Arc::new(RecordingPlugin::new("p", calls.clone())))
            .await;

        manager.after_deployment(&ctx, "https://preview").await;
        assert_eq!(calls.lock().unwrap().as_slice(), ["p:after_deployment"]);
    }
}
