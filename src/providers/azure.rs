use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use reqwest::header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{CatalogScope, TestCaseService};
use crate::error::TransportError;
use crate::model::work_item::RemoteWorkItem;
use crate::sync::patch::FieldOp;

const TIMEOUT: Duration = Duration::from_secs(10);
const WIQL_VERSION: &str = "7.1-preview.2";
const FETCH_VERSION: &str = "7.1-preview.3";
const PATCH_VERSION: &str = "7.2-preview.3";
/// Upper bound on ids per work-item batch request.
const FETCH_BATCH: usize = 200;

pub struct AzureDevOps {
    base_url: String,
    auth_header: String,
    client: reqwest::Client,
}

impl AzureDevOps {
    /// `base_url` is the project URL, e.g. `https://dev.azure.com/org/project`.
    pub fn new(base_url: String, personal_access_token: &str) -> Result<Self, TransportError> {
        let encoded =
            base64::engine::general_purpose::STANDARD.encode(format!(":{personal_access_token}"));
        let client = reqwest::Client::builder()
            .timeout(TIMEOUT)
            .build()
            .map_err(TransportError::Client)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            auth_header: format!("Basic {encoded}"),
            client,
        })
    }

    async fn send<T: DeserializeOwned>(
        &self,
        url: &str,
        request: reqwest::RequestBuilder,
    ) -> Result<T, TransportError> {
        let resp = request
            .header(AUTHORIZATION, &self.auth_header)
            .header(ACCEPT, "application/json")
            .send()
            .await
            .map_err(|source| TransportError::Request {
                url: url.to_string(),
                source,
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TransportError::Status {
                url: url.to_string(),
                status: status.as_u16(),
                body,
            });
        }
        resp.json().await.map_err(|e| TransportError::Shape {
            url: url.to_string(),
            reason: e.to_string(),
        })
    }

    async fn wiql_catalog(&self, area_path: &str) -> Result<BTreeSet<u64>, TransportError> {
        let url = format!(
            "{}/_apis/wit/wiql?api-version={WIQL_VERSION}",
            self.base_url
        );
        let body = WiqlRequest {
            query: wiql_query(area_path),
        };
        let resp: WiqlResponse = self
            .send(&url, self.client.post(&url).json(&body))
            .await?;
        Ok(resp.work_items.into_iter().map(|w| w.id).collect())
    }

    async fn plan_catalog(&self, plan: u64) -> Result<BTreeSet<u64>, TransportError> {
        let url = format!("{}/_apis/testplan/Plans/{plan}/suites", self.base_url);
        let suites: ValueList<Suite> = self.send(&url, self.client.get(&url)).await?;

        let mut ids = BTreeSet::new();
        for suite in suites.value {
            let Some(href) = suite.links.and_then(|l| l.test_cases).map(|l| l.href) else {
                debug!(suite = suite.id, "suite has no test case link");
                continue;
            };
            match self
                .send::<ValueList<SuiteTestCase>>(&href, self.client.get(&href))
                .await
            {
                Ok(cases) => ids.extend(cases.value.into_iter().map(|c| c.work_item.id)),
                Err(e) => warn!(suite = suite.id, name = %suite.name, error = %e, "skipping suite"),
            }
        }
        Ok(ids)
    }
}

/// WIQL selecting test cases under `area_path`, or the whole project when
/// it is empty.
fn wiql_query(area_path: &str) -> String {
    let scope = if area_path.trim().is_empty() {
        "[System.TeamProject] = @project".to_string()
    } else {
        format!("[System.AreaPath] UNDER '{}'", area_path.replace('\'', "''"))
    };
    format!(
        "SELECT [System.Id] FROM WorkItems WHERE {scope} \
         AND [System.WorkItemType] = 'Test Case'"
    )
}

#[derive(Serialize)]
struct WiqlRequest {
    query: String,
}

#[derive(Deserialize)]
struct WiqlResponse {
    #[serde(rename = "workItems", default)]
    work_items: Vec<WorkItemRef>,
}

#[derive(Deserialize)]
struct WorkItemRef {
    id: u64,
}

#[derive(Deserialize)]
struct ValueList<T> {
    #[serde(default = "Vec::new")]
    value: Vec<T>,
}

#[derive(Deserialize)]
struct Suite {
    id: u64,
    #[serde(default)]
    name: String,
    #[serde(rename = "_links")]
    links: Option<SuiteLinks>,
}

#[derive(Deserialize)]
struct SuiteLinks {
    #[serde(rename = "testCases")]
    test_cases: Option<Link>,
}

#[derive(Deserialize)]
struct Link {
    href: String,
}

#[derive(Deserialize)]
struct SuiteTestCase {
    #[serde(rename = "workItem")]
    work_item: WorkItemRef,
}

#[async_trait]
impl TestCaseService for AzureDevOps {
    fn name(&self) -> &str {
        "Azure DevOps"
    }

    async fn list_catalog(&self, scope: &CatalogScope) -> Result<BTreeSet<u64>, TransportError> {
        match scope {
            CatalogScope::TestPlan(plan) => self.plan_catalog(*plan).await,
            CatalogScope::AreaPath(path) => self.wiql_catalog(path).await,
        }
    }

    async fn fetch(&self, ids: &[u64]) -> Result<Vec<RemoteWorkItem>, TransportError> {
        let mut items = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(FETCH_BATCH) {
            let joined = chunk
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let url = format!(
                "{}/_apis/wit/workitems?ids={joined}&$expand=all&api-version={FETCH_VERSION}",
                self.base_url
            );
            let page: ValueList<RemoteWorkItem> = self.send(&url, self.client.get(&url)).await?;
            items.extend(page.value);
        }
        Ok(items)
    }

    async fn patch(&self, id: u64, ops: &[FieldOp]) -> Result<(), TransportError> {
        let url = format!(
            "{}/_apis/wit/workitems/{id}?api-version={PATCH_VERSION}",
            self.base_url
        );
        let request = self
            .client
            .patch(&url)
            .header(CONTENT_TYPE, "application/json-patch+json")
            .json(ops);
        let _: serde_json::Value = self.send(&url, request).await?;
        Ok(())
    }
}
