//! Two-way fan-out join over a shared executor.
//!
//! One logical request fans out into two independent fetches - the employee
//! record and that employee's course records - issued as separate tasks on
//! the same executor. The caller blocks until both resolve, then gets the
//! merged `Enrollment`. All-or-nothing: a failure on either side fails the
//! aggregation, and no partially-populated result is ever observable.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::directory::DirectoryClient;
use crate::executor::{Executor, ExecutorError};
use crate::task::{Handle, TaskError, package};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Employee {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Course {
    pub id: String,
    pub emp_id: String,
    pub title: String,
}

/// The merged result of one aggregation: the employee and every course they
/// are enrolled in. Never partially populated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Enrollment {
    pub employee_id: String,
    pub employee: Employee,
    pub courses: Vec<Course>,
}

/// Course payloads arrive as one object or as a list of objects depending on
/// how many records matched; both shapes decode to a list.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_vec(self) -> Vec<T> {
        match self {
            OneOrMany::One(item) => vec![item],
            OneOrMany::Many(items) => items,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    #[error("executor rejected fetch: {0}")]
    Rejected(#[from] ExecutorError),

    #[error("fetch failed: {0}")]
    Fetch(#[from] TaskError),

    #[error("payload could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Issues both fetches of an aggregation as independent tasks on one
/// executor and joins the results.
pub struct Aggregator {
    executor: Arc<dyn Executor>,
    client: Arc<dyn DirectoryClient>,
}

impl Aggregator {
    pub fn new(executor: Arc<dyn Executor>, client: Arc<dyn DirectoryClient>) -> Self {
        Self { executor, client }
    }

    /// Fetch the employee record and their course records concurrently, then
    /// merge. The ordering between the two fetches is irrelevant; the whole
    /// call fails if either side does.
    pub async fn enrollment(&self, emp_id: &str) -> Result<Enrollment, AggregateError> {
        let employee = self.fetch(format!("/employee/{emp_id}"))?;
        let courses = self.fetch(format!("/course?empId={emp_id}"))?;

        let employee = employee.join().await?;
        let courses = courses.join().await?;

        let employee: Employee = serde_json::from_str(&employee)?;
        let courses: OneOrMany<Course> = serde_json::from_str(&courses)?;

        Ok(Enrollment {
            employee_id: emp_id.to_string(),
            employee,
            courses: courses.into_vec(),
        })
    }

    fn fetch(&self, path: String) -> Result<Handle<String>, ExecutorError> {
        let client = Arc::clone(&self.client);
        let (job, handle) = package(async move {
            client
                .get(&path)
                .await
                .map_err(|e| TaskError::Failed(e.to_string()))
        });
        self.executor.execute(job)?;
        Ok(handle)
    }
}
