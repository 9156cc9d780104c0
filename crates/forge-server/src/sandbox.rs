//! In-process development sandbox.
//!
//! Production deployments wire a real sandbox service client; this one
//! backs local development and demos. It holds files in memory, accepts
//! every command, and serves a preview URL derived from the instance id.

use async_trait::async_trait;
use forge_contract::{
    AnalysisResponse, CommandOutcome, ExecResponse, FilesResponse, InstanceResponse, LogsResponse,
    PreviewStatusResponse, RuntimeErrorsResponse, SandboxClient, SandboxFile, SandboxResponse,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

#[derive(Default)]
struct Instance {
    files: HashMap<String, String>,
    logs: String,
}

#[derive(Default)]
pub struct DevSandbox {
    instances: Mutex<HashMap<String, Instance>>,
    next_id: AtomicU64,
    preview_domain: String,
}

impl DevSandbox {
    pub fn new(preview_domain: impl Into<String>) -> Self {
        Self {
            instances: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            preview_domain: preview_domain.into(),
        }
    }

    fn with_instance<T>(&self, id: &str, f: impl FnOnce(&mut Instance) -> T) -> Option<T> {
        let mut instances = self.instances.lock().expect("sandbox lock poisoned");
        instances.get_mut(id).map(f)
    }
}

#[async_trait]
impl SandboxClient for DevSandbox {
    async fn create_instance(&self, project_name: &str) -> InstanceResponse {
        let n = self.next_id.fetch_add(1, Ordering::SeqCst);
        let id = format!("{project_name}-{n}");
        self.instances
            .lock()
            .expect("sandbox lock poisoned")
            .insert(id.clone(), Instance::default());
        InstanceResponse {
            success: true,
            error: None,
            instance_id: Some(id),
        }
    }

    async fn write_files(&self, instance_id: &str, files: &[SandboxFile]) -> SandboxResponse {
        match self.with_instance(instance_id, |instance| {
            for file in files {
                instance.files.insert(file.path.clone(), file.contents.clone());
            }
        }) {
            Some(()) => SandboxResponse::ok(),
            None => SandboxResponse::err(format!("unknown instance: {instance_id}")),
        }
    }

    async fn get_files(&self, instance_id: &str, paths: Option<&[String]>) -> FilesResponse {
        match self.with_instance(instance_id, |instance| {
            instance
                .files
                .iter()
                .filter(|(path, _)| match paths {
                    Some(paths) => paths.contains(path),
                    None => true,
                })
                .map(|(path, contents)| SandboxFile {
                    path: path.clone(),
                    contents: contents.clone(),
                })
                .collect::<Vec<_>>()
        }) {
            Some(files) => FilesResponse {
                success: true,
                error: None,
                files,
            },
            None => FilesResponse {
                success: false,
                error: Some(format!("unknown instance: {instance_id}")),
                files: Vec::new(),
            },
        }
    }

    async fn execute_commands(
        &self,
        instance_id: &str,
        commands: &[String],
        _timeout_secs: Option<u64>,
    ) -> ExecResponse {
        let logged = self.with_instance(instance_id, |instance| {
            for command in commands {
                instance.logs.push_str(&format!("$ {command}\n"));
            }
        });
        if logged.is_none() {
            return ExecResponse {
                success: false,
                error: Some(format!("unknown instance: {instance_id}")),
                outcomes: Vec::new(),
            };
        }
        ExecResponse {
            success: true,
            error: None,
            outcomes: commands
                .iter()
                .map(|command| CommandOutcome {
                    command: command.clone(),
                    exit_code: 0,
                    stdout: String::new(),
                    stderr: String::new(),
                })
                .collect(),
        }
    }

    async fn get_logs(
        &self,
        instance_id: &str,
        reset: bool,
        _duration_secs: Option<u64>,
    ) -> LogsResponse {
        match self.with_instance(instance_id, |instance| {
            let logs = instance.logs.clone();
            if reset {
                instance.logs.clear();
            }
            logs
        }) {
            Some(logs) => LogsResponse {
                success: true,
                error: None,
                logs,
            },
            None => LogsResponse {
                success: false,
                error: Some(format!("unknown instance: {instance_id}")),
                logs: String::new(),
            },
        }
    }

    async fn run_static_analysis(
        &self,
        _instance_id: &str,
        _files: Option<&[String]>,
    ) -> AnalysisResponse {
        AnalysisResponse {
            success: true,
            ..Default::default()
        }
    }

    async fn fetch_runtime_errors(
        &self,
        _instance_id: &str,
        _clear: bool,
    ) -> RuntimeErrorsResponse {
        RuntimeErrorsResponse {
            success: true,
            ..Default::default()
        }
    }

    async fn update_project_name(&self, instance_id: &str, _name: &str) -> SandboxResponse {
        match self.with_instance(instance_id, |_| ()) {
            Some(()) => SandboxResponse::ok(),
            None => SandboxResponse::err(format!("unknown instance: {instance_id}")),
        }
    }

    async fn deploy(&self, instance_id: &str) -> SandboxResponse {
        match self.with_instance(instance_id, |_| ()) {
            Some(()) => SandboxResponse::ok(),
            None => SandboxResponse::err(format!("unknown instance: {instance_id}")),
        }
    }

    async fn preview_status(&self, instance_id: &str) -> PreviewStatusResponse {
        PreviewStatusResponse {
            success: true,
            error: None,
            ready: true,
            preview_url: Some(format!("https://{instance_id}.{}", self.preview_domain)),
        }
    }
}
