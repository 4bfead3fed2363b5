//! GraphQL client for the student/contest backend
//!
//! Posts `{ query, variables }` and unwraps the `data` object. An `errors`
//! envelope is a protocol error; timeouts and connection failures are
//! transport errors.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use super::{DataSource, UpstreamError};

/// Default backend endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4000/graphql";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const CONTEST_FIELDS: &str = "title startTime ranking rating attended problemsSolved totalProblems trendDirection finishTimeInSeconds";

const ALL_BATCHES_QUERY: &str = "query { allBatches { name secCount } }";

const ALL_CONTESTS_QUERY: &str =
    "query GetAllContests($batch: String!) { allContests(batch: $batch) }";

const CONTEST_DETAILS_QUERY: &str = "query GetContestDetails($title: String!) { contestDetails(title: $title) { title startTime questions { title difficulty } } }";

/// Raw GraphQL response envelope
#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    #[serde(default)]
    data: Option<Value>,
    #[serde(default)]
    errors: Option<Value>,
}

/// Client for the upstream GraphQL endpoint
#[derive(Debug, Clone)]
pub struct GraphqlClient {
    client: Client,
    endpoint: String,
}

impl Default for GraphqlClient {
    fn default() -> Self {
        Self::new(DEFAULT_ENDPOINT, DEFAULT_TIMEOUT)
    }
}

impl GraphqlClient {
    /// Creates a client for `endpoint` with a fixed request timeout
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|e| {
                warn!(error = %e, "Falling back to default HTTP client");
                Client::new()
            });
        Self::with_client(client, endpoint)
    }

    /// Creates a client with a custom HTTP client
    pub fn with_client(client: Client, endpoint: impl Into<String>) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
        }
    }

    /// Executes one query and returns its `data` object
    pub async fn execute(&self, query: &str, variables: Value) -> Result<Value, UpstreamError> {
        debug!(endpoint = %self.endpoint, "Sending GraphQL request");
        let response = self
            .client
            .post(&self.endpoint)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await?
            .error_for_status()?;
        let text = response.text().await?;
        parse_response(&text)
    }
}

/// Unwraps a response body into its `data` object
fn parse_response(body: &str) -> Result<Value, UpstreamError> {
    let response: GraphqlResponse = serde_json::from_str(body)?;

    if let Some(errors) = response.errors {
        let has_errors = match &errors {
            Value::Null => false,
            Value::Array(items) => !items.is_empty(),
            _ => true,
        };
        if has_errors {
            return Err(UpstreamError::Protocol(format!("GraphQL Error: {}", errors)));
        }
    }

    Ok(response.data.unwrap_or_else(|| Value::Object(Map::new())))
}

fn student_query(root: &str, args: &str, params: &str) -> String {
    format!(
        "query {root}({params}) {{ {field}({args}) {{ id name leetcodeUsername section rollNumber totalSolved easySolved mediumSolved hardSolved attendedContestsCount rating globalRanking totalParticipants topPercentage badge lastUpdatedAt recentContests {{ {c} }} latestContests {{ title data {{ {c} }} }} }} }}",
        root = root,
        params = params,
        field = if root == "GetStudents" { "students" } else { "student" },
        args = args,
        c = CONTEST_FIELDS,
    )
}

fn leaderboard_query() -> String {
    format!(
        "query GetContestLeaderboard($batch: String!, $title: String!) {{ contestStatusLeaderboard(batch: $batch, title: $title) {{ participants {{ id name leetcodeUsername section rollNumber rating contestRanking contest {{ {c} }} }} nonParticipants {{ id name leetcodeUsername section rollNumber rating }} }} }}",
        c = CONTEST_FIELDS,
    )
}

#[async_trait]
impl DataSource for GraphqlClient {
    async fn all_batches(&self) -> Result<Value, UpstreamError> {
        self.execute(ALL_BATCHES_QUERY, json!({})).await
    }

    async fn students_by_batch(&self, batch: &str) -> Result<Value, UpstreamError> {
        let query = student_query("GetStudents", "batch: $batch", "$batch: String!");
        self.execute(&query, json!({ "batch": batch })).await
    }

    async fn student(&self, batch: &str, username: &str) -> Result<Value, UpstreamError> {
        let query = student_query(
            "GetStudent",
            "batch: $batch, username: $username",
            "$batch: String!, $username: String!",
        );
        self.execute(&query, json!({ "batch": batch, "username": username }))
            .await
    }

    async fn contest_leaderboard(&self, batch: &str, title: &str) -> Result<Value, UpstreamError> {
        self.execute(&leaderboard_query(), json!({ "batch": batch, "title": title }))
            .await
    }

    async fn all_contests(&self, batch: &str) -> Result<Value, UpstreamError> {
        self.execute(ALL_CONTESTS_QUERY, json!({ "batch": batch })).await
    }

    async fn contest_details(&self, title: &str) -> Result<Value, UpstreamError> {
        self.execute(CONTEST_DETAILS_QUERY, json!({ "title": title })).await
    }
}
