//! External adapters (C1, §4.6): typed clients the dispatcher and batch
//! planner invoke. Each trait is the contract; the structs in this module
//! are `reqwest`-backed reference implementations configured with a base
//! URL and a timeout. Mock implementations for deterministic tests live in
//! [`crate::mock`].

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use veil_workflow::{DataObject, Value};

use crate::error::{EngineError, EngineResult};

/// A sub-graph node submitted to the MPC-graph adapter (§4.9): operation
/// plus its externally-resolved operands.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpcSubGraphNode {
    pub id: String,
    pub block_id: String,
    pub inputs: DataObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MpcSubGraphEdge {
    pub source: String,
    pub target: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_handle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_handle: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MpcSubGraph {
    pub nodes: Vec<MpcSubGraphNode>,
    pub edges: Vec<MpcSubGraphEdge>,
}

#[derive(Debug, Clone)]
pub struct MpcSingleResponse {
    pub response: Value,
    pub attestation: Option<Value>,
    pub result: Value,
}

#[derive(Debug, Clone, Default)]
pub struct MpcGraphResponse {
    /// Output keyed by `nodeId.outputName`.
    pub output: DataObject,
    pub attestation: Option<Value>,
}

/// **MPC single** (§4.6): forwards `input` to a named workload.
#[async_trait]
pub trait MpcSingleAdapter: Send + Sync {
    async fn execute(
        &self,
        workload_id: &str,
        input: Value,
        relative_path: &str,
    ) -> EngineResult<MpcSingleResponse>;
}

/// **MPC graph** (§4.6, §4.9): submits a computation graph as one job. The
/// graph is opaque to the adapter — either a [`MpcSubGraph`] the batch
/// planner or single-node math dispatch assembled (serialized via
/// [`mpc_sub_graph_to_value`]), or a precomputed graph handed straight
/// through from a `nillion-block-graph` block's `config.nillionGraph`.
#[async_trait]
pub trait MpcGraphAdapter: Send + Sync {
    async fn execute_block_graph(
        &self,
        graph: Value,
        inputs: DataObject,
        run_tag: &str,
    ) -> EngineResult<MpcGraphResponse>;
}

/// Serialize an internally-built sub-graph to the opaque `Value` form the
/// adapter boundary expects.
pub fn mpc_sub_graph_to_value(graph: &MpcSubGraph) -> Value {
    serde_json::to_value(graph).map(Value::from).unwrap_or(Value::Null)
}

#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub message: String,
    pub signature: Option<String>,
    pub verifying_key: Option<String>,
    pub attestation: Option<Value>,
    pub raw: Option<Value>,
}

/// **LLM** (§4.6): private inference over a rendered prompt.
#[async_trait]
pub trait LlmAdapter: Send + Sync {
    async fn run_inference(&self, prompt: &str) -> EngineResult<LlmResponse>;
}

#[derive(Debug, Clone, Default)]
pub struct TransferOptions {
    pub memo: Option<String>,
    pub from_address: Option<String>,
    pub min_confirmations: Option<u32>,
    pub fee: Option<Value>,
    pub privacy_policy: Option<String>,
    pub timeout_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct TransferResponse {
    pub tx_id: String,
    pub operation_id: String,
}

/// **Shielded transfer** (§4.6).
#[async_trait]
pub trait TransferAdapter: Send + Sync {
    async fn send(
        &self,
        address: &str,
        amount: Value,
        options: TransferOptions,
    ) -> EngineResult<TransferResponse>;
}

#[derive(Debug, Clone, Default)]
pub struct KvPutOptions {
    pub encrypt_fields: Option<Vec<String>>,
    pub encrypt_all: Option<bool>,
}

#[derive(Debug, Clone)]
pub struct KvPutResponse {
    pub key: String,
    pub collection_id: String,
}

/// **Encrypted KV** (§4.6).
#[async_trait]
pub trait KvAdapter: Send + Sync {
    async fn put_document(
        &self,
        collection_id: &str,
        key: &str,
        data: Value,
        options: KvPutOptions,
    ) -> EngineResult<KvPutResponse>;

    async fn get_document(&self, collection_id: &str, key: &str) -> EngineResult<Option<Value>>;

    /// Auto-keyed variant; returns `"collectionId:key"`.
    async fn store_state(
        &self,
        collection_id: &str,
        data: Value,
        options: KvPutOptions,
    ) -> EngineResult<String> {
        let key = uuid::Uuid::new_v4().to_string();
        self.put_document(collection_id, &key, data, options).await?;
        Ok(format!("{collection_id}:{key}"))
    }
}

/// **Generic HTTP** (§4.6): method + URL + headers + body → response body.
#[async_trait]
pub trait HttpAdapter: Send + Sync {
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: DataObject,
        body: Option<Value>,
    ) -> EngineResult<Value>;
}

/// Bundles the five external adapters a run needs.
pub struct AdapterSet {
    pub mpc_single: std::sync::Arc<dyn MpcSingleAdapter>,
    pub mpc_graph: std::sync::Arc<dyn MpcGraphAdapter>,
    pub llm: std::sync::Arc<dyn LlmAdapter>,
    pub transfer: std::sync::Arc<dyn TransferAdapter>,
    pub kv: std::sync::Arc<dyn KvAdapter>,
    pub http: std::sync::Arc<dyn HttpAdapter>,
}

// --- reqwest-backed reference implementations -----------------------------

fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .expect("failed to build reqwest client")
}

fn value_to_json(v: &Value) -> serde_json::Value {
    serde_json::to_value(v).unwrap_or(serde_json::Value::Null)
}

pub struct HttpMpcSingleAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMpcSingleAdapter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self { client: http_client(timeout), base_url: base_url.into() }
    }
}

#[async_trait]
impl MpcSingleAdapter for HttpMpcSingleAdapter {
    async fn execute(
        &self,
        workload_id: &str,
        input: Value,
        relative_path: &str,
    ) -> EngineResult<MpcSingleResponse> {
        let url = format!(
            "{}/workloads/{}{}",
            self.base_url.trim_end_matches('/'),
            workload_id,
            relative_path
        );
        let resp = self
            .client
            .post(&url)
            .json(&value_to_json(&input))
            .send()
            .await
            .map_err(|e| EngineError::Adapter(format!("mpc single request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(EngineError::Adapter(format!(
                "mpc single workload {workload_id} returned {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EngineError::Adapter(format!("mpc single response decode failed: {e}")))?;
        let value: Value = body.into();
        Ok(MpcSingleResponse {
            response: value.clone(),
            attestation: None,
            result: value,
        })
    }
}

pub struct HttpMpcGraphAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpMpcGraphAdapter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self { client: http_client(timeout), base_url: base_url.into() }
    }
}

#[derive(Serialize)]
struct GraphSubmission<'a> {
    graph: &'a Value,
    inputs: &'a DataObject,
    run_tag: &'a str,
}

#[async_trait]
impl MpcGraphAdapter for HttpMpcGraphAdapter {
    async fn execute_block_graph(
        &self,
        graph: Value,
        inputs: DataObject,
        run_tag: &str,
    ) -> EngineResult<MpcGraphResponse> {
        let url = format!("{}/block-graphs/execute", self.base_url.trim_end_matches('/'));
        let submission = GraphSubmission { graph: &graph, inputs: &inputs, run_tag };

        let resp = self
            .client
            .post(&url)
            .json(&submission)
            .send()
            .await
            .map_err(|e| EngineError::Adapter(format!("mpc graph request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(EngineError::Adapter(format!(
                "mpc graph submission returned {}",
                resp.status()
            )));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EngineError::Adapter(format!("mpc graph response decode failed: {e}")))?;
        let output = match Value::from(body) {
            Value::Object(o) => o,
            _ => DataObject::new(),
        };
        Ok(MpcGraphResponse { output, attestation: None })
    }
}

pub struct HttpLlmAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpLlmAdapter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self { client: http_client(timeout), base_url: base_url.into() }
    }
}

#[async_trait]
impl LlmAdapter for HttpLlmAdapter {
    async fn run_inference(&self, prompt: &str) -> EngineResult<LlmResponse> {
        let url = format!("{}/inference", self.base_url.trim_end_matches('/'));
        let resp = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(|e| EngineError::Adapter(format!("llm request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(EngineError::Adapter(format!("llm inference returned {}", resp.status())));
        }

        #[derive(Deserialize)]
        struct Raw {
            message: String,
            #[serde(default)]
            signature: Option<String>,
            #[serde(default)]
            verifying_key: Option<String>,
        }
        let raw: Raw = resp
            .json()
            .await
            .map_err(|e| EngineError::Adapter(format!("llm response decode failed: {e}")))?;

        Ok(LlmResponse {
            message: raw.message,
            signature: raw.signature,
            verifying_key: raw.verifying_key,
            attestation: None,
            raw: None,
        })
    }
}

pub struct HttpTransferAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransferAdapter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self { client: http_client(timeout), base_url: base_url.into() }
    }
}

#[async_trait]
impl TransferAdapter for HttpTransferAdapter {
    async fn send(
        &self,
        address: &str,
        amount: Value,
        options: TransferOptions,
    ) -> EngineResult<TransferResponse> {
        let url = format!("{}/transfers", self.base_url.trim_end_matches('/'));
        let body = serde_json::json!({
            "address": address,
            "amount": value_to_json(&amount),
            "memo": options.memo,
            "fromAddress": options.from_address,
            "minConfirmations": options.min_confirmations,
            "fee": options.fee.as_ref().map(value_to_json),
            "privacyPolicy": options.privacy_policy,
        });

        let mut request = self.client.post(&url).json(&body);
        if let Some(ms) = options.timeout_ms {
            request = request.timeout(Duration::from_millis(ms));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| EngineError::Adapter(format!("transfer request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(EngineError::Adapter(format!("transfer send returned {}", resp.status())));
        }

        #[derive(Deserialize)]
        struct Raw {
            tx_id: String,
            operation_id: String,
        }
        let raw: Raw = resp
            .json()
            .await
            .map_err(|e| EngineError::Adapter(format!("transfer response decode failed: {e}")))?;
        Ok(TransferResponse { tx_id: raw.tx_id, operation_id: raw.operation_id })
    }
}

pub struct HttpKvAdapter {
    client: reqwest::Client,
    base_url: String,
}

impl HttpKvAdapter {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self { client: http_client(timeout), base_url: base_url.into() }
    }
}

#[async_trait]
impl KvAdapter for HttpKvAdapter {
    async fn put_document(
        &self,
        collection_id: &str,
        key: &str,
        data: Value,
        options: KvPutOptions,
    ) -> EngineResult<KvPutResponse> {
        let url = format!(
            "{}/collections/{}/documents/{}",
            self.base_url.trim_end_matches('/'),
            collection_id,
            key
        );
        let body = serde_json::json!({
            "data": value_to_json(&data),
            "encryptFields": options.encrypt_fields,
            "encryptAll": options.encrypt_all.unwrap_or(options.encrypt_fields.is_none()),
        });
        let resp = self
            .client
            .put(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| EngineError::Adapter(format!("kv put request failed: {e}")))?;

        if !resp.status().is_success() {
            return Err(EngineError::Adapter(format!("kv put returned {}", resp.status())));
        }

        Ok(KvPutResponse { key: key.to_string(), collection_id: collection_id.to_string() })
    }

    async fn get_document(&self, collection_id: &str, key: &str) -> EngineResult<Option<Value>> {
        let url = format!(
            "{}/collections/{}/documents/{}",
            self.base_url.trim_end_matches('/'),
            collection_id,
            key
        );
        let resp = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Adapter(format!("kv get request failed: {e}")))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !resp.status().is_success() {
            return Err(EngineError::Adapter(format!("kv get returned {}", resp.status())));
        }

        let body: serde_json::Value = resp
            .json()
            .await
            .map_err(|e| EngineError::Adapter(format!("kv get response decode failed: {e}")))?;
        Ok(Some(Value::from(body)))
    }
}

pub struct HttpGenericAdapter {
    client: reqwest::Client,
}

impl HttpGenericAdapter {
    pub fn new(timeout: Duration) -> Self {
        Self { client: http_client(timeout) }
    }
}

#[async_trait]
impl HttpAdapter for HttpGenericAdapter {
    async fn request(
        &self,
        method: &str,
        url: &str,
        headers: DataObject,
        body: Option<Value>,
    ) -> EngineResult<Value> {
        let method_name = method.to_uppercase();
        let parsed_method = reqwest::Method::from_bytes(method_name.as_bytes())
            .map_err(|_| EngineError::InputResolution(format!("invalid HTTP method: {method}")))?;

        let mut request = self.client.request(parsed_method, url);
        for (k, v) in headers.iter() {
            request = request.header(k, v.to_display_string());
        }
        if let Some(b) = body {
            request = request.json(&value_to_json(&b));
        }

        let resp = request
            .send()
            .await
            .map_err(|e| EngineError::Adapter(format!("http request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(EngineError::Adapter(format!(
                "http {method_name} {url} returned {status}: {text}"
            )));
        }

        let text = resp.text().await.unwrap_or_default();
        match serde_json::from_str::<serde_json::Value>(&text) {
            Ok(json) => Ok(Value::from(json)),
            Err(_) => Ok(Value::String(text)),
        }
    }
}
