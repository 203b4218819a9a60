//! `ClusterClient` backed by the kubectl binary.

use std::path::PathBuf;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, warn};
use unstuck_common::{Error, Result};
use unstuck_config::ClusterSettings;

use super::runner::{CommandOutput, CommandRunner, CommandSpec, RunnerError};
use super::{ApiResourceList, ClusterClient, DiscoveryResult, DynamicObject, Gvr, NamespaceObject};
use crate::action::deadline::Deadline;
use crate::logging::event_names;

/// Slack added to the subprocess timeout on top of `--request-timeout`.
const PROCESS_SLACK: Duration = Duration::from_secs(5);

#[derive(Debug, Deserialize)]
struct ObjectList {
    #[serde(default)]
    items: Vec<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGroupList {
    #[serde(default)]
    groups: Vec<ApiGroup>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiGroup {
    name: String,
    #[serde(default)]
    preferred_version: Option<GroupVersion>,
    #[serde(default)]
    versions: Vec<GroupVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroupVersion {
    group_version: String,
}

impl ApiGroup {
    fn preferred(&self) -> Option<&str> {
        self.preferred_version
            .as_ref()
            .or_else(|| self.versions.first())
            .map(|v| v.group_version.as_str())
    }
}

/// Shells out to kubectl for every call.
#[derive(Debug, Clone)]
pub struct KubectlClient {
    runner: CommandRunner,
    kubectl: String,
    kubeconfig: Option<PathBuf>,
    context: Option<String>,
    request_timeout: Duration,
    deadline: Deadline,
}

impl KubectlClient {
    pub fn new(kubectl: impl Into<String>) -> Self {
        KubectlClient {
            runner: CommandRunner::default(),
            kubectl: kubectl.into(),
            kubeconfig: None,
            context: None,
            request_timeout: Duration::from_secs(30),
            deadline: Deadline::none(),
        }
    }

    pub fn from_settings(settings: &ClusterSettings, deadline: Deadline) -> Self {
        KubectlClient {
            kubeconfig: settings.kubeconfig.clone(),
            context: settings.context.clone(),
            request_timeout: Duration::from_secs(settings.request_timeout),
            deadline,
            ..KubectlClient::new(settings.kubectl.clone())
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_deadline(mut self, deadline: Deadline) -> Self {
        self.deadline = deadline;
        self
    }

    /// Name used in logs: the context, or `default`.
    pub fn cluster_label(&self) -> String {
        self.context.clone().unwrap_or_else(|| "default".to_string())
    }

    fn global_args(&self, timeout: Duration) -> Vec<String> {
        let mut args = Vec::new();
        if let Some(path) = &self.kubeconfig {
            args.push(format!("--kubeconfig={}", path.display()));
        }
        if let Some(context) = &self.context {
            args.push(format!("--context={}", context));
        }
        args.push(format!("--request-timeout={}s", timeout.as_secs().max(1)));
        args
    }

    fn run(&self, mut args: Vec<String>, stdin: Option<Vec<u8>>) -> Result<CommandOutput> {
        if self.deadline.is_expired() {
            return Err(Error::Timeout {
                seconds: self.deadline.budget_secs(),
            });
        }
        let timeout = self.deadline.bound(self.request_timeout);
        args.extend(self.global_args(timeout));

        debug!(
            target: event_names::KUBECTL_CALL,
            args = %args.join(" "),
            timeout_s = timeout.as_secs(),
            "kubectl"
        );

        let mut spec = CommandSpec::new(&self.kubectl, args).with_timeout(timeout + PROCESS_SLACK);
        if let Some(input) = stdin {
            spec = spec.with_stdin(input);
        }

        let output = self.runner.run(&spec).map_err(|e| match e {
            RunnerError::CommandNotFound(cmd) => Error::Cluster(format!(
                "kubectl binary not found: {} (set [cluster].kubectl in config.toml)",
                cmd
            )),
            other => Error::Cluster(other.to_string()),
        })?;

        if output.timed_out {
            return Err(Error::Timeout {
                seconds: timeout.as_secs().max(1),
            });
        }
        Ok(output)
    }

    /// Run and map a failed exit into `NotFound` or `Cluster`.
    fn run_checked(
        &self,
        args: Vec<String>,
        stdin: Option<Vec<u8>>,
        gvr: &Gvr,
        name: &str,
    ) -> Result<CommandOutput> {
        let output = self.run(args, stdin)?;
        if output.success() {
            return Ok(output);
        }
        let stderr = output.stderr_str();
        if stderr.contains("(NotFound)") || stderr.contains("NotFound") {
            return Err(super::not_found(gvr, name));
        }
        Err(Error::Cluster(stderr.trim().to_string()))
    }

    fn parse_json<T: DeserializeOwned>(output: &CommandOutput) -> Result<T> {
        if output.truncated {
            return Err(Error::Cluster(format!(
                "kubectl output exceeded {} bytes",
                output.stdout.len()
            )));
        }
        serde_json::from_slice(&output.stdout).map_err(Error::from)
    }

    fn get_raw<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let output = self.run(vec!["get".into(), "--raw".into(), path.into()], None)?;
        if !output.success() {
            return Err(Error::Cluster(output.stderr_str().trim().to_string()));
        }
        Self::parse_json(&output)
    }
}

fn push_namespace(args: &mut Vec<String>, namespace: Option<&str>) {
    if let Some(ns) = namespace {
        args.push("-n".into());
        args.push(ns.into());
    }
}

impl ClusterClient for KubectlClient {
    fn get_object(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        name: &str,
    ) -> Result<DynamicObject> {
        let mut args = vec![
            "get".into(),
            gvr.to_string(),
            name.into(),
            "-o".into(),
            "json".into(),
        ];
        push_namespace(&mut args, namespace);
        let output = self.run_checked(args, None, gvr, name)?;
        Self::parse_json(&output).map(DynamicObject::new)
    }

    fn list_objects(&self, gvr: &Gvr, namespace: Option<&str>) -> Result<Vec<DynamicObject>> {
        let mut args = vec!["get".into(), gvr.to_string(), "-o".into(), "json".into()];
        match namespace {
            Some(ns) => push_namespace(&mut args, Some(ns)),
            None => args.push("--all-namespaces".into()),
        }
        let output = self.run_checked(args, None, gvr, "")?;
        let list: ObjectList = Self::parse_json(&output)?;
        Ok(list.items.into_iter().map(DynamicObject::new).collect())
    }

    fn list_api_resources(&self) -> Result<DiscoveryResult> {
        let mut result = DiscoveryResult::default();
        result.lists.push(self.get_raw::<ApiResourceList>("/api/v1")?);

        let groups: ApiGroupList = self.get_raw("/apis")?;
        let mut failures = Vec::new();
        for group in &groups.groups {
            let Some(gv) = group.preferred() else {
                continue;
            };
            match self.get_raw::<ApiResourceList>(&format!("/apis/{}", gv)) {
                Ok(mut list) => {
                    if list.group_version.is_empty() {
                        list.group_version = gv.to_string();
                    }
                    result.lists.push(list);
                }
                Err(Error::Timeout { seconds }) => return Err(Error::Timeout { seconds }),
                Err(e) => {
                    warn!(group = %group.name, error = %e, "discovery failed for group");
                    failures.push(format!("{}: {}", gv, e));
                }
            }
        }

        if !failures.is_empty() {
            result.partial_error = Some(format!(
                "unable to retrieve the complete list of server APIs: {}",
                failures.join(", ")
            ));
        }
        Ok(result)
    }

    fn patch_object(
        &self,
        gvr: &Gvr,
        namespace: Option<&str>,
        name: &str,
        body: &serde_json::Value,
    ) -> Result<()> {
        let mut args = vec!["patch".into(), gvr.to_string(), name.into()];
        push_namespace(&mut args, namespace);
        args.extend([
            "--type=merge".into(),
            "-p".into(),
            serde_json::to_string(body)?,
        ]);
        self.run_checked(args, None, gvr, name).map(|_| ())
    }

    fn delete_object(&self, gvr: &Gvr, namespace: Option<&str>, name: &str) -> Result<()> {
        let mut args = vec!["delete".into(), gvr.to_string(), name.into()];
        push_namespace(&mut args, namespace);
        args.push("--wait=false".into());
        self.run_checked(args, None, gvr, name).map(|_| ())
    }

    fn finalize_namespace(&self, namespace: &NamespaceObject) -> Result<()> {
        let body = serde_json::to_vec(namespace)?;
        let args = vec![
            "replace".into(),
            "--raw".into(),
            format!("/api/v1/namespaces/{}/finalize", namespace.name()),
            "-f".into(),
            "-".into(),
        ];
        self.run_checked(args, Some(body), &Gvr::namespaces(), namespace.name())
            .map(|_| ())
    }
}
