//! `SparqlExecutor`: SELECT/UPDATE execution plus graph-level transactions
//! over a remote SPARQL endpoint.

use std::collections::HashMap;
use std::time::Duration;

use reqwest::Client;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::SparqlEndpointConfig;
use crate::error::{Error, Result};

use super::transaction::TransactionState;

/// One row of a SPARQL 1.1 JSON SELECT result: variable name -> bound value.
pub type Binding = HashMap<String, String>;

/// Parsed SPARQL 1.1 JSON results.
#[derive(Debug, Clone, Default)]
pub struct ResultBindings {
    pub vars: Vec<String>,
    pub bindings: Vec<Binding>,
}

impl ResultBindings {
    fn parse(body: &str) -> Result<Self> {
        let value: serde_json::Value =
            serde_json::from_str(body).map_err(Error::Serialization)?;
        let vars = value["head"]["vars"]
            .as_array()
            .map(|arr| {
                arr.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default();
        let mut bindings = Vec::new();
        if let Some(rows) = value["results"]["bindings"].as_array() {
            for row in rows {
                let mut binding = Binding::new();
                if let Some(obj) = row.as_object() {
                    for (var, cell) in obj {
                        if let Some(val) = cell["value"].as_str() {
                            binding.insert(var.clone(), val.to_string());
                        }
                    }
                }
                bindings.push(binding);
            }
        }
        Ok(Self { vars, bindings })
    }

    /// Read the first bound value for `var` out of the first row, if any.
    #[must_use]
    pub fn first(&self, var: &str) -> Option<&str> {
        self.bindings.first().and_then(|b| b.get(var)).map(String::as_str)
    }
}

/// Executes SPARQL SELECT/UPDATE against a pair of endpoints and manages
/// graph-level transactions via `COPY`/`DROP`/`MOVE`.
pub struct SparqlExecutor {
    client: Client,
    config: SparqlEndpointConfig,
    timeout: Duration,
    state: Mutex<TransactionState>,
}

impl SparqlExecutor {
    #[must_use]
    pub fn new(config: SparqlEndpointConfig, timeout: Duration) -> Self {
        Self {
            client: Client::new(),
            config,
            timeout,
            state: Mutex::new(TransactionState::Idle),
        }
    }

    /// The named graph interactions are persisted into.
    #[must_use]
    pub fn graph_name(&self) -> &str {
        &self.config.graph_name
    }

    fn backup_graph(&self) -> String {
        format!("{}.backup", self.config.graph_name)
    }

    fn apply_auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match (&self.config.user, &self.config.password) {
            (Some(user), password) => builder.basic_auth(user, password.clone()),
            _ => builder,
        }
    }

    async fn send(&self, builder: reqwest::RequestBuilder) -> Result<(u16, String)> {
        let request = self.apply_auth(builder);
        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| Error::Timeout)?
            .map_err(|e| Error::Network(e.to_string()))?;
        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(Error::Auth);
        }
        let body = response.text().await.map_err(|e| Error::Network(e.to_string()))?;
        if !status.is_success() {
            return Err(Error::Endpoint {
                status: status.as_u16(),
                body,
            });
        }
        Ok((status.as_u16(), body))
    }

    /// Execute a SPARQL 1.1 SELECT query, returning parsed JSON results.
    ///
    /// Fails with `Error::Disposed` once `dispose()` has been called.
    pub async fn select(&self, query: &str) -> Result<ResultBindings> {
        self.state.lock().await.check_not_disposed()?;
        self.select_unchecked(query).await
    }

    /// Execute a SPARQL 1.1 UPDATE; returns once the server acknowledges 2xx.
    ///
    /// Fails with `Error::Disposed` once `dispose()` has been called.
    pub async fn update(&self, sparql: &str) -> Result<()> {
        self.state.lock().await.check_not_disposed()?;
        self.update_unchecked(sparql).await
    }

    /// `select` without the disposed check, for callers that already hold
    /// `self.state`'s lock (the transaction methods below).
    async fn select_unchecked(&self, query: &str) -> Result<ResultBindings> {
        debug!(endpoint = %self.config.query_url, "executing SPARQL SELECT");
        let builder = self
            .client
            .post(&self.config.query_url)
            .header("Content-Type", "application/sparql-query")
            .header("Accept", "application/sparql-results+json")
            .body(query.to_string());
        let (_, body) = self.send(builder).await?;
        ResultBindings::parse(&body)
    }

    /// `update` without the disposed check, for callers that already hold
    /// `self.state`'s lock (the transaction methods below).
    async fn update_unchecked(&self, sparql: &str) -> Result<()> {
        debug!(endpoint = %self.config.update_url, "executing SPARQL UPDATE");
        let builder = self
            .client
            .post(&self.config.update_url)
            .header("Content-Type", "application/sparql-update")
            .header("Accept", "application/sparql-results+json")
            .body(sparql.to_string());
        self.send(builder).await?;
        Ok(())
    }

    /// Idempotently ensure the configured graph exists, returning its triple count.
    pub async fn verify_graph(&self) -> Result<u64> {
        let graph = &self.config.graph_name;
        self.update(&format!("CREATE SILENT GRAPH <{graph}>")).await?;
        self.update(&format!(
            "PREFIX semem: <http://purl.org/stuff/semem/>\nINSERT DATA {{ GRAPH <{graph}> {{ <{graph}> semem:verifiedAt \"ok\" }} }}"
        ))
        .await
        .ok();
        let result = self
            .select(&format!("SELECT (COUNT(*) AS ?count) WHERE {{ GRAPH <{graph}> {{ ?s ?p ?o }} }}"))
            .await?;
        let count = result
            .first("count")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        info!(graph = %graph, triples = count, "graph verified");
        Ok(count)
    }

    /// Begin a graph-scoped transaction via `COPY GRAPH <g> TO GRAPH <g.backup>`.
    pub async fn begin_transaction(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.begin()?;
        let graph = &self.config.graph_name;
        let backup = self.backup_graph();
        if let Err(e) = self
            .update_unchecked(&format!("COPY GRAPH <{graph}> TO GRAPH <{backup}>"))
            .await
        {
            state.end().ok();
            return Err(e);
        }
        Ok(())
    }

    /// Commit: drop the backup graph, clearing the transaction flag.
    pub async fn commit_transaction(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_not_disposed()?;
        if !state.is_in_transaction() {
            return Err(Error::NoTransactionInProgress);
        }
        let backup = self.backup_graph();
        self.update_unchecked(&format!("DROP SILENT GRAPH <{backup}>")).await?;
        state.end()?;
        Ok(())
    }

    /// Roll back: drop the live graph and move the backup back over it.
    pub async fn rollback_transaction(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.check_not_disposed()?;
        if !state.is_in_transaction() {
            return Err(Error::NoTransactionInProgress);
        }
        let graph = &self.config.graph_name;
        let backup = self.backup_graph();
        warn!(graph = %graph, "rolling back SPARQL transaction");
        self.update_unchecked(&format!("DROP SILENT GRAPH <{graph}>")).await?;
        self.update_unchecked(&format!("MOVE GRAPH <{backup}> TO GRAPH <{graph}>"))
            .await?;
        state.end()?;
        Ok(())
    }

    /// Whether a transaction is currently in progress.
    pub async fn is_in_transaction(&self) -> bool {
        self.state.lock().await.is_in_transaction()
    }

    /// Roll back any open transaction and mark the executor disposed.
    pub async fn dispose(&self) {
        let mut state = self.state.lock().await;
        if state.is_in_transaction() {
            let graph = &self.config.graph_name;
            let backup = self.backup_graph();
            let _ = self.update_unchecked(&format!("DROP SILENT GRAPH <{graph}>")).await;
            let _ = self
                .update_unchecked(&format!("MOVE GRAPH <{backup}> TO GRAPH <{graph}>"))
                .await;
        }
        state.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> SparqlEndpointConfig {
        SparqlEndpointConfig {
            query_url: format!("{}/query", server.uri()),
            update_url: format!("{}/update", server.uri()),
            user: None,
            password: None,
            graph_name: "http://example.org/g".into(),
        }
    }

    #[tokio::test]
    async fn select_parses_sparql_json_results() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/query"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"head":{"vars":["count"]},"results":{"bindings":[{"count":{"type":"literal","value":"3"}}]}}"#,
            ))
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(config_for(&server), Duration::from_secs(5));
        let result = executor.select("SELECT (COUNT(*) AS ?count) WHERE {}").await.unwrap();
        assert_eq!(result.first("count"), Some("3"));
    }

    #[tokio::test]
    async fn update_errors_on_non_2xx_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(config_for(&server), Duration::from_secs(5));
        let err = executor.update("INSERT DATA {}").await.unwrap_err();
        assert!(matches!(err, Error::Endpoint { status: 500, .. }));
    }

    #[tokio::test]
    async fn unauthorized_response_maps_to_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(config_for(&server), Duration::from_secs(5));
        assert!(matches!(executor.update("INSERT DATA {}").await, Err(Error::Auth)));
    }

    #[tokio::test]
    async fn begin_transaction_issues_copy_and_sets_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .and(body_string_contains("COPY GRAPH"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(config_for(&server), Duration::from_secs(5));
        executor.begin_transaction().await.unwrap();
        assert!(executor.is_in_transaction().await);
    }

    #[tokio::test]
    async fn begin_transaction_twice_fails_without_a_second_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(config_for(&server), Duration::from_secs(5));
        executor.begin_transaction().await.unwrap();
        assert!(matches!(
            executor.begin_transaction().await,
            Err(Error::TransactionAlreadyActive)
        ));
    }

    #[tokio::test]
    async fn commit_drops_backup_graph_and_returns_to_idle() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(config_for(&server), Duration::from_secs(5));
        executor.begin_transaction().await.unwrap();
        executor.commit_transaction().await.unwrap();
        assert!(!executor.is_in_transaction().await);
    }

    #[tokio::test]
    async fn rollback_restores_the_pre_transaction_state() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(config_for(&server), Duration::from_secs(5));
        executor.begin_transaction().await.unwrap();
        executor.rollback_transaction().await.unwrap();
        assert!(!executor.is_in_transaction().await);
    }

    #[tokio::test]
    async fn request_deadline_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(200)))
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(config_for(&server), Duration::from_millis(20));
        assert!(matches!(executor.update("INSERT DATA {}").await, Err(Error::Timeout)));
    }

    #[tokio::test]
    async fn update_sends_the_expected_basic_auth_header_when_credentials_are_set() {
        let server = MockServer::start().await;
        let expected = format!("Basic {}", STANDARD.encode("alice:hunter2"));
        Mock::given(method("POST"))
            .and(path("/update"))
            .and(header("Authorization", expected.as_str()))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let config = SparqlEndpointConfig {
            query_url: format!("{}/query", server.uri()),
            update_url: format!("{}/update", server.uri()),
            user: Some("alice".into()),
            password: Some("hunter2".into()),
            graph_name: "http://example.org/g".into(),
        };
        let executor = SparqlExecutor::new(config, Duration::from_secs(5));
        executor.update("INSERT DATA {}").await.unwrap();
    }

    #[tokio::test]
    async fn disposed_executor_rejects_select_update_and_verify_graph() {
        let server = MockServer::start().await;
        // No mocks registered: any request reaching the server fails the test
        // via a 404, proving the disposed check short-circuits before I/O.
        let executor = SparqlExecutor::new(config_for(&server), Duration::from_secs(5));
        executor.dispose().await;

        assert!(matches!(executor.select("SELECT * WHERE {}").await, Err(Error::Disposed)));
        assert!(matches!(executor.update("INSERT DATA {}").await, Err(Error::Disposed)));
        assert!(matches!(executor.verify_graph().await, Err(Error::Disposed)));
        assert!(matches!(executor.begin_transaction().await, Err(Error::Disposed)));
        assert!(matches!(executor.commit_transaction().await, Err(Error::Disposed)));
        assert!(matches!(executor.rollback_transaction().await, Err(Error::Disposed)));
    }

    #[tokio::test]
    async fn dispose_rolls_back_an_open_transaction_before_disposing() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/update"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let executor = SparqlExecutor::new(config_for(&server), Duration::from_secs(5));
        executor.begin_transaction().await.unwrap();
        executor.dispose().await;
        assert!(!executor.is_in_transaction().await);
        assert!(matches!(executor.update("INSERT DATA {}").await, Err(Error::Disposed)));
    }
}
