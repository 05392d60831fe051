use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{AllocId, RestartPolicy, Task, TaskStatus};

/// Scheduling class of a job; drives restart-on-success behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum JobType {
    /// Long-running; restarted even after a clean exit.
    #[default]
    Service,
    /// Run to completion; a clean exit is final.
    Batch,
    /// Runs on every node, restarted like a service.
    System,
}

impl JobType {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobType::Service => "service",
            JobType::Batch => "batch",
            JobType::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskGroup {
    pub name: String,
    pub restart_policy: RestartPolicy,
    #[serde(default)]
    pub tasks: Vec<Task>,
}

impl TaskGroup {
    pub fn lookup_task(&self, name: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub job_type: JobType,
    #[serde(default)]
    pub task_groups: Vec<TaskGroup>,
}

impl Job {
    pub fn lookup_task_group(&self, name: &str) -> Option<&TaskGroup> {
        self.task_groups.iter().find(|g| g.name == name)
    }
}

/// Binding of one task group instance of a job to this node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Allocation {
    pub id: AllocId,
    pub job: Job,
    pub task_group: String,
    /// Last known status per task, as reported by the controller.
    #[serde(default)]
    pub task_states: BTreeMap<String, TaskStatus>,
}

impl Allocation {
    /// Task group this allocation runs.
    pub fn group(&self) -> Option<&TaskGroup> {
        self.job.lookup_task_group(&self.task_group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alloc() -> Allocation {
        Allocation {
            id: "a1".into(),
            job: Job {
                id: "j".into(),
                name: "cache".into(),
                job_type: JobType::Batch,
                task_groups: vec![TaskGroup {
                    name: "g".into(),
                    restart_policy: RestartPolicy::for_job_type(JobType::Batch),
                    tasks: vec![Task::new("redis", "exec")],
                }],
            },
            task_group: "g".into(),
            task_states: BTreeMap::new(),
        }
    }

    #[test]
    fn group_and_task_lookup() {
        let a = alloc();
        let g = a.group().expect("group present");
        assert!(g.lookup_task("redis").is_some());
        assert!(g.lookup_task("nope").is_none());
        assert!(a.job.lookup_task_group("other").is_none());
    }

    #[test]
    fn decodes_with_defaults() {
        let json = r#"{
            "id": "a1",
            "taskGroup": "g",
            "job": {
                "id": "j", "name": "cache",
                "taskGroups": [{
                    "name": "g",
                    "restartPolicy": {"attempts": 1, "intervalMs": 1000, "delayMs": 10, "mode": "fail"},
                    "tasks": [{"name": "redis", "driver": "exec", "config": {"command": "true"}}]
                }]
            }
        }"#;
        let a: Allocation = serde_json::from_str(json).unwrap();
        assert_eq!(a.job.job_type, JobType::Service);
        assert!(a.task_states.is_empty());
        assert_eq!(a.group().unwrap().tasks[0].config["command"], "true");
    }
}
