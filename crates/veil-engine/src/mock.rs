//! Deterministic in-memory adapter doubles, for use in tests only. Each mock
//! records its calls so assertions can inspect what the dispatcher sent.

use std::sync::Mutex;

use async_trait::async_trait;
use veil_workflow::{DataObject, Value};

use crate::adapters::{
    HttpAdapter, KvAdapter, KvPutOptions, KvPutResponse, LlmAdapter, LlmResponse, MpcGraphAdapter,
    MpcGraphResponse, MpcSingleAdapter, MpcSingleResponse, MpcSubGraph, TransferAdapter, TransferOptions,
    TransferResponse,
};
use crate::error::EngineResult;

/// Evaluate one sub-graph node's arithmetic/comparison result from its
/// resolved operands, mirroring the real MPC backend's `nillion-*` kinds.
fn evaluate_node(block_id: &str, inputs: &DataObject) -> Value {
    let a = inputs.get("a").and_then(Value::as_int_lenient);
    let b = inputs.get("b").and_then(Value::as_int_lenient);
    match block_id {
        "nillion-add" => Value::Int(a.unwrap_or(0) + b.unwrap_or(0)),
        "nillion-subtract" => Value::Int(a.unwrap_or(0) - b.unwrap_or(0)),
        "nillion-multiply" => Value::Int(a.unwrap_or(0) * b.unwrap_or(0)),
        "nillion-divide" => Value::Int(a.and_then(|a| b.filter(|b| *b != 0).map(|b| a / b)).unwrap_or(0)),
        "nillion-greater-than" => Value::Bool(a.unwrap_or(0) > b.unwrap_or(0)),
        "nillion-if-else" => {
            let condition = inputs.get("condition").and_then(Value::as_bool_lenient).unwrap_or(false);
            let branch = if condition { "true" } else { "false" };
            inputs.get(branch).cloned().unwrap_or(Value::Null)
        }
        _ => Value::Int(0),
    }
}

#[derive(Default)]
pub struct MockMpcSingleAdapter {
    pub calls: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl MpcSingleAdapter for MockMpcSingleAdapter {
    async fn execute(
        &self,
        workload_id: &str,
        input: Value,
        _relative_path: &str,
    ) -> EngineResult<MpcSingleResponse> {
        self.calls.lock().unwrap().push((workload_id.to_string(), input.clone()));
        Ok(MpcSingleResponse {
            response: input.clone(),
            attestation: Some(Value::String("mock-attestation".into())),
            result: input,
        })
    }
}

#[derive(Default)]
pub struct MockMpcGraphAdapter {
    pub calls: Mutex<Vec<Value>>,
}

#[async_trait]
impl MpcGraphAdapter for MockMpcGraphAdapter {
    async fn execute_block_graph(
        &self,
        graph: Value,
        _inputs: DataObject,
        _run_tag: &str,
    ) -> EngineResult<MpcGraphResponse> {
        let sub_graph: MpcSubGraph = serde_json::to_value(&graph)
            .ok()
            .and_then(|v| serde_json::from_value(v).ok())
            .unwrap_or_default();

        let mut results: DataObject = DataObject::new();
        let mut remaining: Vec<_> = sub_graph.nodes.iter().collect();
        while !remaining.is_empty() {
            let mut made_progress = false;
            remaining.retain(|node| {
                let unresolved_incoming = sub_graph
                    .edges
                    .iter()
                    .filter(|e| e.target == node.id)
                    .any(|e| !results.contains_key(&format!("{}.result", e.source)));
                if unresolved_incoming {
                    return true;
                }

                let mut inputs = node.inputs.clone();
                for edge in sub_graph.edges.iter().filter(|e| e.target == node.id) {
                    let handle = edge.target_handle.clone().unwrap_or_else(|| "value".to_string());
                    if let Some(v) = results.get(&format!("{}.result", edge.source)) {
                        inputs.insert(handle, v.clone());
                    }
                }

                results.insert(format!("{}.result", node.id), evaluate_node(&node.block_id, &inputs));
                made_progress = true;
                false
            });
            if !made_progress {
                break;
            }
        }

        self.calls.lock().unwrap().push(graph);
        Ok(MpcGraphResponse { output: results, attestation: Some(Value::String("mock-attestation".into())) })
    }
}

pub struct MockLlmAdapter {
    pub fixed_message: String,
}

impl Default for MockLlmAdapter {
    fn default() -> Self {
        Self { fixed_message: "mock response".to_string() }
    }
}

#[async_trait]
impl LlmAdapter for MockLlmAdapter {
    async fn run_inference(&self, _prompt: &str) -> EngineResult<LlmResponse> {
        Ok(LlmResponse {
            message: self.fixed_message.clone(),
            signature: Some("mock-sig".to_string()),
            verifying_key: Some("mock-key".to_string()),
            attestation: None,
            raw: None,
        })
    }
}

#[derive(Default)]
pub struct MockTransferAdapter {
    pub calls: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl TransferAdapter for MockTransferAdapter {
    async fn send(
        &self,
        address: &str,
        amount: Value,
        _options: TransferOptions,
    ) -> EngineResult<TransferResponse> {
        self.calls.lock().unwrap().push((address.to_string(), amount));
        Ok(TransferResponse {
            tx_id: "mock-tx-id".to_string(),
            operation_id: "mock-op-id".to_string(),
        })
    }
}

#[derive(Default)]
pub struct MockKvAdapter {
    pub documents: Mutex<DataObject>,
}

#[async_trait]
impl KvAdapter for MockKvAdapter {
    async fn put_document(
        &self,
        collection_id: &str,
        key: &str,
        data: Value,
        _options: KvPutOptions,
    ) -> EngineResult<KvPutResponse> {
        let full_key = format!("{collection_id}:{key}");
        self.documents.lock().unwrap().insert(full_key, data);
        Ok(KvPutResponse { key: key.to_string(), collection_id: collection_id.to_string() })
    }

    async fn get_document(&self, collection_id: &str, key: &str) -> EngineResult<Option<Value>> {
        let full_key = format!("{collection_id}:{key}");
        Ok(self.documents.lock().unwrap().get(&full_key).cloned())
    }
}

#[derive(Default)]
pub struct MockHttpAdapter {
    pub fixed_response: Option<Value>,
    pub calls: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl HttpAdapter for MockHttpAdapter {
    async fn request(
        &self,
        method: &str,
        url: &str,
        _headers: DataObject,
        _body: Option<Value>,
    ) -> EngineResult<Value> {
        self.calls.lock().unwrap().push((method.to_string(), url.to_string()));
        Ok(self.fixed_response.clone().unwrap_or(Value::Null))
    }
}
