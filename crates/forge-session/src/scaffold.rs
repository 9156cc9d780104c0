//! Deterministic scaffold provider (the scaffold contract).
//!
//! Given the same inputs, the provider yields byte-identical outputs. The
//! workflow scaffold derives `wrangler.jsonc` and `README.md` entirely from
//! the metadata record, and the entry class name from the code itself.

use forge_contract::{FileRecord, ResourceKind, WorkflowMetadata, WORKFLOW_ENTRY_PATH};
use regex::Regex;
use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Inputs for the workflow scaffold.
#[derive(Debug, Clone, Default)]
pub struct WorkflowScaffoldRequest {
    pub workflow_name: String,
    /// Current entry-file contents; `None` scaffolds the default stub.
    pub workflow_code: Option<String>,
    pub metadata: Option<WorkflowMetadata>,
}

/// A produced scaffold.
#[derive(Debug, Clone, Default)]
pub struct ScaffoldOutput {
    pub all_files: Vec<FileRecord>,
    /// Indented listing of the produced paths.
    pub file_tree: String,
    pub deps: BTreeMap<String, String>,
    /// Files generation should focus on.
    pub important_files: Vec<String>,
    /// Files generation must never rewrite.
    pub dont_touch_files: Vec<String>,
}

/// Scaffold provider contract.
pub trait ScaffoldProvider: Send + Sync {
    fn workflow(&self, request: &WorkflowScaffoldRequest) -> ScaffoldOutput;

    fn app(&self, template_name: &str, project_name: &str) -> ScaffoldOutput;
}

const DEFAULT_WORKFLOW_CLASS: &str = "MyWorkflow";

fn class_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"export\s+class\s+(\w+)\s+extends\s+WorkflowEntrypoint").expect("static regex")
    })
}

/// Extract the entry class name from workflow code.
pub fn derive_workflow_class_name(code: Option<&str>) -> String {
    code.and_then(|code| class_name_regex().captures(code))
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .unwrap_or_else(|| DEFAULT_WORKFLOW_CLASS.to_string())
}

/// The built-in deterministic provider.
#[derive(Debug, Default, Clone)]
pub struct TemplateScaffold;

impl ScaffoldProvider for TemplateScaffold {
    fn workflow(&self, request: &WorkflowScaffoldRequest) -> ScaffoldOutput {
        let metadata = request.metadata.clone().unwrap_or_default();
        let class_name = derive_workflow_class_name(request.workflow_code.as_deref());
        let code = request
            .workflow_code
            .clone()
            .unwrap_or_else(|| default_workflow_code(&class_name));

        let files = vec![
            FileRecord::new(WORKFLOW_ENTRY_PATH, code).with_purpose("workflow entry point"),
            FileRecord::new(
                "wrangler.jsonc",
                render_wrangler(&request.workflow_name, &class_name, &metadata),
            )
            .with_purpose("deployment configuration"),
            FileRecord::new("README.md", render_readme(&request.workflow_name, &metadata))
                .with_purpose("project documentation"),
            FileRecord::new("package.json", render_package_json(&request.workflow_name))
                .with_purpose("package manifest"),
        ];

        ScaffoldOutput {
            file_tree: render_tree(&files),
            deps: workflow_deps(),
            important_files: vec![WORKFLOW_ENTRY_PATH.to_string()],
            dont_touch_files: vec!["wrangler.jsonc".to_string(), "package.json".to_string()],
            all_files: files,
        }
    }

    fn app(&self, _template_name: &str, project_name: &str) -> ScaffoldOutput {
        let files = vec![
            FileRecord::new("package.json", render_app_package_json(project_name))
                .with_purpose("package manifest"),
            FileRecord::new("index.html", render_app_index_html(project_name))
                .with_purpose("document shell"),
            FileRecord::new("src/main.tsx", APP_MAIN_STUB).with_purpose("application entry point"),
        ];
        ScaffoldOutput {
            file_tree: render_tree(&files),
            deps: app_deps(),
            important_files: vec!["src/main.tsx".to_string()],
            dont_touch_files: vec!["package.json".to_string()],
            all_files: files,
        }
    }
}

fn default_workflow_code(class_name: &str) -> String {
    format!(
        "import {{ WorkflowEntrypoint, WorkflowStep, WorkflowEvent }} from 'cloudflare:workers';\n\n\
         export class {class_name} extends WorkflowEntrypoint {{\n\
         \tasync run(event: WorkflowEvent, step: WorkflowStep) {{\n\
         \t\tawait step.do('start', async () => {{\n\
         \t\t\treturn {{ ok: true }};\n\
         \t\t}});\n\
         \t}}\n\
         }}\n"
    )
}

fn render_wrangler(name: &str, class_name: &str, metadata: &WorkflowMetadata) -> String {
    let mut root = Map::new();
    root.insert("name".into(), json!(name));
    root.insert("main".into(), json!(WORKFLOW_ENTRY_PATH));
    root.insert("compatibility_date".into(), json!("2025-01-01"));
    root.insert(
        "workflows".into(),
        json!([{
            "name": name,
            "binding": "WORKFLOW",
            "class_name": class_name,
        }]),
    );

    if !metadata.env_vars.is_empty() {
        root.insert("vars".into(), json!(metadata.env_vars));
    }

    let mut kv = Vec::new();
    let mut r2 = Vec::new();
    let mut d1 = Vec::new();
    let mut queues = Vec::new();
    let mut ai: Option<Value> = None;
    for (binding, resource) in &metadata.resources {
        let name = resource.name.clone().unwrap_or_else(|| binding.to_lowercase());
        match resource.kind {
            ResourceKind::Kv => kv.push(json!({"binding": binding, "id": name})),
            ResourceKind::R2 => r2.push(json!({"binding": binding, "bucket_name": name})),
            ResourceKind::D1 => d1.push(json!({"binding": binding, "database_name": name})),
            ResourceKind::Queue => queues.push(json!({"binding": binding, "queue": name})),
            ResourceKind::Ai => ai = Some(json!({"binding": binding})),
        }
    }
    if !kv.is_empty() {
        root.insert("kv_namespaces".into(), Value::Array(kv));
    }
    if !r2.is_empty() {
        root.insert("r2_buckets".into(), Value::Array(r2));
    }
    if !d1.is_empty() {
        root.insert("d1_databases".into(), Value::Array(d1));
    }
    if !queues.is_empty() {
        root.insert("queues".into(), json!({"producers": queues}));
    }
    if let Some(ai) = ai {
        root.insert("ai".into(), ai);
    }

    let body = serde_json::to_string_pretty(&Value::Object(root)).unwrap_or_default();
    format!("// Generated from workflow metadata. Do not edit by hand.\n{body}\n")
}

fn render_readme(name: &str, metadata: &WorkflowMetadata) -> String {
    let title = metadata.name.as_deref().unwrap_or(name);
    let mut out = format!("# {title}\n\n");
    if let Some(description) = &metadata.description {
        out.push_str(description);
        out.push_str("\n\n");
    }

    out.push_str("## Parameters\n\n");
    let params = metadata
        .params_schema
        .as_ref()
        .and_then(|schema| schema.get("properties"))
        .and_then(Value::as_object);
    match params {
        Some(props) if !props.is_empty() => {
            out.push_str("| Name | Type | Description |\n|---|---|---|\n");
            let mut names: Vec<&String> = props.keys().collect();
            names.sort();
            for key in names {
                let prop = &props[key];
                let kind = prop.get("type").and_then(Value::as_str).unwrap_or("any");
                let doc = prop
                    .get("description")
                    .and_then(Value::as_str)
                    .unwrap_or("");
                out.push_str(&format!("| `{key}` | {kind} | {doc} |\n"));
            }
        }
        _ => out.push_str("This workflow takes no parameters.\n"),
    }

    out.push_str("\n## Bindings\n\n");
    if metadata.resources.is_empty() && metadata.secrets.is_empty() {
        out.push_str("No bindings declared.\n");
    } else {
        out.push_str("| Binding | Kind | Resource |\n|---|---|---|\n");
        for (binding, resource) in &metadata.resources {
            let backing = resource.name.clone().unwrap_or_else(|| binding.to_lowercase());
            out.push_str(&format!(
                "| `{binding}` | {} | {backing} |\n",
                resource.kind.wrangler_section()
            ));
        }
        for (secret, doc) in &metadata.secrets {
            out.push_str(&format!("| `{secret}` | secret | {doc} |\n"));
        }
    }

    out.push_str(
        "\n## Run locally\n\n```sh\nnpx wrangler dev\n```\n\n## Deploy\n\n```sh\nnpx wrangler deploy\n```\n",
    );
    out
}

fn render_package_json(name: &str) -> String {
    let manifest = json!({
        "name": name,
        "private": true,
        "scripts": {
            "dev": "wrangler dev",
            "deploy": "wrangler deploy"
        },
        "devDependencies": workflow_deps(),
    });
    let mut body = serde_json::to_string_pretty(&manifest).unwrap_or_default();
    body.push('\n');
    body
}

fn workflow_deps() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("typescript".to_string(), "^5.5.0".to_string()),
        ("wrangler".to_string(), "^3.80.0".to_string()),
    ])
}

fn render_app_package_json(name: &str) -> String {
    let manifest = json!({
        "name": name,
        "private": true,
        "scripts": {
            "dev": "vite",
            "build": "vite build"
        },
        "dependencies": {
            "react": "^18.3.0",
            "react-dom": "^18.3.0"
        },
        "devDependencies": app_deps(),
    });
    let mut body = serde_json::to_string_pretty(&manifest).unwrap_or_default();
    body.push('\n');
    body
}

fn app_deps() -> BTreeMap<String, String> {
    BTreeMap::from([
        ("typescript".to_string(), "^5.5.0".to_string()),
        ("vite".to_string(), "^5.4.0".to_string()),
    ])
}

fn render_app_index_html(name: &str) -> String {
    format!(
        "<!doctype html>\n<html lang=\"en\">\n  <head>\n    <meta charset=\"UTF-8\" />\n    <title>{name}</title>\n  </head>\n  <body>\n    <div id=\"root\"></div>\n    <script type=\"module\" src=\"/src/main.tsx\"></script>\n  </body>\n</html>\n"
    )
}

const APP_MAIN_STUB: &str = "import { createRoot } from 'react-dom/client';\n\nconst root = createRoot(document.getElementById('root')!);\nroot.render(<main>Ready.</main>);\n";

fn render_tree(files: &[FileRecord]) -> String {
    let mut paths: Vec<&str> = files.iter().map(|f| f.file_path.as_str()).collect();
    paths.sort();
    let mut out = String::new();
    for path in paths {
        out.push_str(path);
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_contract::ResourceBinding;

    fn metadata_with_bindings() -> WorkflowMetadata {
        let mut meta = WorkflowMetadata {
            name: Some("scheduled-slack".into()),
            description: Some("Posts to Slack on a schedule.".into()),
            params_schema: Some(json!({
                "type": "object",
                "properties": {
                    "channel": {"type": "string", "description": "Target channel"},
                    "message": {"type": "string"}
                }
            })),
            ..Default::default()
        };
        meta.resources.insert(
            "CACHE".into(),
            ResourceBinding {
                kind: ResourceKind::Kv,
                binding: "CACHE".into(),
                name: None,
            },
        );
        meta.resources.insert(
            "JOBS".into(),
            ResourceBinding {
                kind: ResourceKind::Queue,
                binding: "JOBS".into(),
                name: Some("job-queue".into()),
            },
        );
        meta.secrets
            .insert("SLACK_TOKEN".into(), "bot token".into());
        meta
    }

    #[test]
    fn scaffold_is_deterministic() {
        let provider = TemplateScaffold;
        let request = WorkflowScaffoldRequest {
            workflow_name: "wf".into(),
            workflow_code: Some("export class Job extends WorkflowEntrypoint {}".into()),
            metadata: Some(metadata_with_bindings()),
        };
        let a = provider.workflow(&request);
        let b = provider.workflow(&request);
        let a_files: Vec<(String, String)> = a
            .all_files
            .iter()
            .map(|f| (f.file_path.clone(), f.file_contents.clone()))
            .collect();
        let b_files: Vec<(String, String)> = b
            .all_files
            .iter()
            .map(|f| (f.file_path.clone(), f.file_contents.clone()))
            .collect();
        assert_eq!(a_files, b_files);
        assert_eq!(a.file_tree, b.file_tree);
    }

    #[test]
    fn class_name_derived_from_code_with_default() {
        assert_eq!(
            derive_workflow_class_name(Some(
                "export class SlackNotifier extends WorkflowEntrypoint<Env> {"
            )),
            "SlackNotifier"
        );
        assert_eq!(derive_workflow_class_name(Some("const x = 1;")), "MyWorkflow");
        assert_eq!(derive_workflow_class_name(None), "MyWorkflow");
    }

    #[test]
    fn wrangler_embeds_bindings_in_dedicated_sections() {
        let provider = TemplateScaffold;
        let out = provider.workflow(&WorkflowScaffoldRequest {
            workflow_name: "wf".into(),
            workflow_code: None,
            metadata: Some(metadata_with_bindings()),
        });
        let wrangler = out
            .all_files
            .iter()
            .find(|f| f.file_path == "wrangler.jsonc")
            .unwrap();
        let body: Value = serde_json::from_str(
            wrangler
                .file_contents
                .lines()
                .skip(1)
                .collect::<Vec<_>>()
                .join("\n")
                .as_str(),
        )
        .unwrap();
        assert_eq!(body["kv_namespaces"][0]["binding"], "CACHE");
        assert_eq!(body["queues"]["producers"][0]["queue"], "job-queue");
        assert!(body.get("r2_buckets").is_none());
    }

    #[test]
    fn readme_is_derived_from_metadata() {
        let provider = TemplateScaffold;
        let out = provider.workflow(&WorkflowScaffoldRequest {
            workflow_name: "wf".into(),
            workflow_code: None,
            metadata: Some(metadata_with_bindings()),
        });
        let readme = out
            .all_files
            .iter()
            .find(|f| f.file_path == "README.md")
            .unwrap();
        assert!(readme.file_contents.contains("# scheduled-slack"));
        assert!(readme.file_contents.contains("| `channel` | string | Target channel |"));
        assert!(readme.file_contents.contains("| `SLACK_TOKEN` | secret | bot token |"));
        assert!(readme.file_contents.contains("npx wrangler deploy"));
    }

    #[test]
    fn workflow_scaffold_keeps_existing_code() {
        let provider = TemplateScaffold;
        let code = "export class Kept extends WorkflowEntrypoint {}";
        let out = provider.workflow(&WorkflowScaffoldRequest {
            workflow_name: "wf".into(),
            workflow_code: Some(code.into()),
            metadata: None,
        });
        let entry = out
            .all_files
            .iter()
            .find(|f| f.file_path == WORKFLOW_ENTRY_PATH)
            .unwrap();
        assert_eq!(entry.file_contents, code);
    }

    #[test]
    fn app_scaffold_has_entry_and_manifest() {
        let provider = TemplateScaffold;
        let out = provider.app("vite-react", "demo-app");
        let paths: Vec<&str> = out.all_files.iter().map(|f| f.file_path.as_str()).collect();
        assert!(paths.contains(&"src/main.tsx"));
        assert!(paths.contains(&"package.json"));
        assert_eq!(out.important_files, vec!["src/main.tsx"]);
    }
}
