//! Session plugin hooks.
//!
//! Plugins observe well-defined lifecycle points. Hooks run in registration
//! order; a failing hook is logged and aggregated, never fatal.

use crate::state::{FileConcept, FileRecord, SessionState};
use async_trait::async_trait;
use thiserror::Error;

/// Identity passed to every hook in place of the session object.
#[derive(Debug, Clone, Default)]
pub struct PluginContext {
    pub session_id: String,
    pub agent_id: String,
    pub project_name: String,
}

/// A hook failure, tagged with the plugin that produced it.
#[derive(Debug, Clone, Error)]
#[error("plugin '{plugin}' hook '{hook}' failed: {message}")]
pub struct PluginError {
    pub plugin: String,
    pub hook: String,
    pub message: String,
}

impl PluginError {
    pub fn new(
        plugin: impl Into<String>,
        hook: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            plugin: plugin.into(),
            hook: hook.into(),
            message: message.into(),
        }
    }
}

pub type HookResult = Result<(), String>;

/// Lifecycle hooks. All default to no-ops.
#[async_trait]
pub trait SessionPlugin: Send + Sync {
    /// Registration name; duplicates are rejected with a warning.
    fn name(&self) -> &str;

    async fn on_register(&self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    async fn on_unregister(&self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    /// After session initialization returns.
    async fn on_initialize(&self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    async fn before_files_generated(
        &self,
        _ctx: &PluginContext,
        _phase_name: &str,
        _concepts: &[FileConcept],
    ) -> HookResult {
        Ok(())
    }

    async fn after_files_generated(
        &self,
        _ctx: &PluginContext,
        _phase_name: &str,
        _outputs: &[FileRecord],
    ) -> HookResult {
        Ok(())
    }

    async fn before_deployment(&self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    async fn after_deployment(&self, _ctx: &PluginContext, _preview_url: &str) -> HookResult {
        Ok(())
    }

    async fn on_generation_start(&self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    async fn on_generation_complete(&self, _ctx: &PluginContext) -> HookResult {
        Ok(())
    }

    async fn on_error(&self, _ctx: &PluginContext, _error: &str, _context: &str) -> HookResult {
        Ok(())
    }

    async fn on_state_update(
        &self,
        _ctx: &PluginContext,
        _old: &SessionState,
        _new: &SessionState,
    ) -> HookResult {
        Ok(())
    }
}
