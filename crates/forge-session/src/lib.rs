//! The per-session agent runtime.
//!
//! A session is a single logical actor: one authoritative state record,
//! two conversation logs, an embedded version-control store, an event bus
//! fanning out to attached clients, and a project-type controller driving
//! generation through the LLM and the sandbox.

pub mod control;
pub mod controllers;
pub mod debug;
pub mod deploy;
pub mod events;
pub mod export;
pub mod files;
pub mod inference;
pub mod plugins;
pub mod scaffold;
pub mod session;
pub mod state;
pub mod storage;
pub mod tools;

#[doc(hidden)]
pub mod testing;

pub use control::handle_frame;
pub use controllers::{controller_for, AppController, ProjectController, WorkflowController};
pub use debug::DeepDebugAssistant;
pub use deploy::{DeployHooks, DeploymentManager, NoHooks, SandboxDeployArgs};
pub use events::{ChannelId, EventBus};
pub use export::push_to_github;
pub use files::FileManager;
pub use inference::{model_configs, GenaiInference, RetryPolicy};
pub use plugins::PluginManager;
pub use scaffold::{
    derive_workflow_class_name, ScaffoldOutput, ScaffoldProvider, TemplateScaffold,
    WorkflowScaffoldRequest,
};
pub use session::{InitializeArgs, SessionAgent, SessionConfig};
pub use state::StateStore;
pub use storage::{
    ConversationManager, ConversationStore, LogTable, MemoryConversationStore,
    SqliteConversationStore, StorageError,
};
pub use tools::{registry_for, ToolRegistry};
