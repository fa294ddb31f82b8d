//! Node dispatcher (C7, §4.7): per-block-id execution logic. Single-node
//! math/condition dispatch and batch dispatch (§4.9) share the operand
//! resolution and normalization helpers here.

use std::collections::HashMap;

use veil_workflow::{data_object, Connector, DataObject, Node, Value};

use crate::adapters::{mpc_sub_graph_to_value, AdapterSet, MpcSubGraph, MpcSubGraphNode, TransferOptions};
use crate::context::ValueContext;
use crate::error::{EngineError, EngineResult};
use crate::resolver::resolve;

/// `{payload, memory}` — the root every config path resolves against.
pub fn scope(payload: &Value, ctx: &ValueContext) -> Value {
    Value::Object(data_object([("payload", payload.clone()), ("memory", ctx.as_object())]))
}

/// Dispatch one node, given its gathered `__inputs`, the run payload, the
/// value context so far, and the connectors/adapters available to this run.
pub async fn dispatch(
    node: &Node,
    inputs: &DataObject,
    payload: &Value,
    ctx: &ValueContext,
    connectors: &HashMap<String, Connector>,
    adapters: &AdapterSet,
) -> EngineResult<Value> {
    let scope = scope(payload, ctx);

    match node.block_id.as_str() {
        "payload-input" => Ok(dispatch_payload_input(node, payload)),
        "json-extract" => Ok(dispatch_json_extract(node, &scope)),
        "memo-parser" => Ok(dispatch_memo_parser(node, inputs, &scope)),
        "math-add" | "math-subtract" | "math-multiply" | "math-divide" | "math-greater-than" | "logic-if-else" => {
            dispatch_mpc_single_op(node, inputs, &scope, adapters).await
        }
        "nillion-compute" => dispatch_nillion_compute(node, payload, &scope, adapters).await,
        "nillion-block-graph" => dispatch_nillion_block_graph(node, &scope, adapters).await,
        "nilai-llm" => dispatch_nilai_llm(node, &scope, adapters).await,
        "zcash-send" => dispatch_zcash_send(node, &scope, adapters).await,
        "state-store" => dispatch_state_store(node, &scope, adapters).await,
        "state-read" => dispatch_state_read(node, &scope, adapters).await,
        "connector-request" => dispatch_connector_request(node, payload, &scope, connectors, adapters).await,
        "custom-http-action" => dispatch_custom_http_action(node, payload, &scope, adapters).await,
        other => Err(EngineError::InputResolution(format!("no dispatcher for block id: {other}"))),
    }
}

fn config_str<'a>(node: &'a Node, key: &str) -> Option<&'a str> {
    node.data.get(key).and_then(Value::as_str)
}

fn dispatch_payload_input(node: &Node, payload: &Value) -> Value {
    match config_str(node, "path") {
        Some(path) => resolve(payload, path).unwrap_or(Value::Null),
        None => payload.clone(),
    }
}

fn dispatch_json_extract(node: &Node, scope: &Value) -> Value {
    let source = config_str(node, "source").unwrap_or("payload");
    let path = config_str(node, "path").unwrap_or("");
    resolve(scope, &format!("{source}.{path}")).unwrap_or(Value::Null)
}

fn dispatch_memo_parser(node: &Node, inputs: &DataObject, scope: &Value) -> Value {
    let text = match config_str(node, "path") {
        Some(path) => resolve(scope, path).unwrap_or(Value::Null),
        None => inputs.get("value").cloned().unwrap_or(Value::Null),
    };
    let delimiter = config_str(node, "delimiter").unwrap_or(":");

    let mut out = DataObject::new();
    for line in text.to_display_string().lines() {
        if let Some((key, rest)) = line.split_once(delimiter) {
            out.insert(key.trim().to_string(), Value::String(rest.trim().to_string()));
        }
    }
    Value::Object(out)
}

/// §4.7 operand priority for `math-*`/`logic-if-else`: input-slot metadata,
/// then edge-gathered `__inputs`, then a path-config literal.
pub fn resolve_operand(
    node: &Node,
    handle: &str,
    path_key: &str,
    inputs: &DataObject,
    scope: &Value,
) -> Option<Value> {
    if let Some(Value::Object(slots)) = node.data.get("__inputSlots") {
        if let Some(Value::Object(slot)) = slots.get(handle) {
            if let Some(source) = slot.get("source").and_then(Value::as_str) {
                let output = slot.get("output").and_then(Value::as_str).unwrap_or("result");
                if let Some(v) = resolve(scope, &format!("memory.{source}.{output}")) {
                    return Some(v);
                }
            }
        }
    }

    if let Some(v) = inputs.get(handle) {
        return Some(v.clone());
    }

    if let Some(path) = config_str(node, path_key) {
        return resolve(scope, path);
    }

    None
}

/// The operand handles and their path-config keys for a given MPC-eligible
/// block id (§4.7).
pub fn operand_spec(block_id: &str) -> &'static [(&'static str, &'static str)] {
    match block_id {
        "logic-if-else" => &[("condition", "conditionPath"), ("true", "truePath"), ("false", "falsePath")],
        _ => &[("a", "aPath"), ("b", "bPath")],
    }
}

/// Normalize an MPC result per §4.7: `math-greater-than` to boolean, other
/// arithmetic to a number where possible (otherwise left as-is).
pub fn normalize_mpc_result(block_id: &str, raw: &Value) -> Value {
    if block_id == "math-greater-than" {
        return raw.as_bool_lenient().map(Value::Bool).unwrap_or_else(|| raw.clone());
    }
    raw.as_int_lenient().map(Value::Int).unwrap_or_else(|| raw.clone())
}

async fn dispatch_mpc_single_op(
    node: &Node,
    inputs: &DataObject,
    scope: &Value,
    adapters: &AdapterSet,
) -> EngineResult<Value> {
    let kind = veil_workflow::mpc_sub_graph_kind(&node.block_id)
        .ok_or_else(|| EngineError::InputResolution(format!("block {} is not MPC-eligible", node.block_id)))?;

    let mut node_inputs = DataObject::new();
    for (handle, path_key) in operand_spec(&node.block_id) {
        let resolved = resolve_operand(node, handle, path_key, inputs, scope).ok_or_else(|| {
            EngineError::InputResolution(format!("missing operand `{handle}` for node {}", node.id))
        })?;
        let validated = resolved.as_int_lenient().ok_or_else(|| {
            EngineError::InputResolution(format!("Invalid integer for operand `{handle}` on node {}", node.id))
        })?;
        node_inputs.insert((*handle).to_string(), Value::Int(validated));
    }

    let sub_graph = MpcSubGraph {
        nodes: vec![MpcSubGraphNode { id: node.id.clone(), block_id: kind.to_string(), inputs: node_inputs }],
        edges: vec![],
    };

    let response = adapters
        .mpc_graph
        .execute_block_graph(mpc_sub_graph_to_value(&sub_graph), DataObject::new(), &node.id)
        .await?;

    let raw = response
        .output
        .get(&format!("{}.result", node.id))
        .cloned()
        .ok_or_else(|| EngineError::Adapter(format!("mpc graph response missing output for node {}", node.id)))?;

    Ok(normalize_mpc_result(&node.block_id, &raw))
}

async fn dispatch_nillion_compute(node: &Node, payload: &Value, scope: &Value, adapters: &AdapterSet) -> EngineResult<Value> {
    let input = match config_str(node, "inputPath") {
        Some(path) => resolve(scope, path).unwrap_or(Value::Null),
        None => payload.clone(),
    };
    let workload_id = config_str(node, "workloadId")
        .ok_or_else(|| EngineError::InputResolution(format!("node {} missing workloadId", node.id)))?;
    let relative_path = config_str(node, "relativePath").unwrap_or("/");

    let response = adapters.mpc_single.execute(workload_id, input, relative_path).await?;
    Ok(response.result)
}

async fn dispatch_nillion_block_graph(node: &Node, scope: &Value, adapters: &AdapterSet) -> EngineResult<Value> {
    let graph = node
        .data
        .get("nillionGraph")
        .cloned()
        .ok_or_else(|| EngineError::InputResolution(format!("node {} missing nillionGraph", node.id)))?;

    let mut resolved_inputs = DataObject::new();
    if let Some(Value::Object(mapping)) = node.data.get("inputMapping") {
        for (graph_key, context_path) in mapping.iter() {
            let Some(path) = context_path.as_str() else { continue };
            if let Some(v) = resolve(scope, path) {
                resolved_inputs.insert(graph_key.clone(), v);
            }
        }
    }

    let response = adapters.mpc_graph.execute_block_graph(graph, resolved_inputs, &node.id).await?;
    Ok(Value::Object(response.output))
}

async fn dispatch_nilai_llm(node: &Node, scope: &Value, adapters: &AdapterSet) -> EngineResult<Value> {
    let template = config_str(node, "promptTemplate")
        .ok_or_else(|| EngineError::InputResolution(format!("node {} missing promptTemplate", node.id)))?;
    let prompt = render_template(template, scope);

    let response = adapters.llm.run_inference(&prompt).await?;
    let mut out = DataObject::new();
    out.insert("message".to_string(), Value::String(response.message));
    if let Some(sig) = response.signature {
        out.insert("signature".to_string(), Value::String(sig));
    }
    if let Some(key) = response.verifying_key {
        out.insert("verifyingKey".to_string(), Value::String(key));
    }
    Ok(Value::Object(out))
}

/// Replace every `{{path}}` in `template` with the resolved string (missing
/// paths resolve to the empty string).
fn render_template(template: &str, scope: &Value) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                let path = after[..end].trim();
                let value = resolve(scope, path).map(|v| v.to_display_string()).unwrap_or_default();
                out.push_str(&value);
                rest = &after[end + 2..];
            }
            None => {
                out.push_str("{{");
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

async fn dispatch_zcash_send(node: &Node, scope: &Value, adapters: &AdapterSet) -> EngineResult<Value> {
    let address = config_str(node, "addressPath")
        .and_then(|p| resolve(scope, p))
        .or_else(|| node.data.get("address").cloned())
        .and_then(|v| v.as_str().map(str::to_string))
        .ok_or_else(|| EngineError::InputResolution(format!("node {} missing address", node.id)))?;

    let amount = config_str(node, "amountPath")
        .and_then(|p| resolve(scope, p))
        .or_else(|| node.data.get("amount").cloned())
        .ok_or_else(|| EngineError::InputResolution(format!("node {} missing amount", node.id)))?;

    let options = TransferOptions {
        memo: config_str(node, "memo").map(str::to_string),
        from_address: config_str(node, "fromAddress").map(str::to_string),
        min_confirmations: node.data.get("minConfirmations").and_then(Value::as_int_lenient).map(|n| n as u32),
        fee: node.data.get("fee").cloned(),
        privacy_policy: config_str(node, "privacyPolicy").map(str::to_string),
        timeout_ms: node.data.get("timeoutMs").and_then(Value::as_int_lenient).map(|n| n as u64),
    };

    let response = adapters.transfer.send(&address, amount, options).await?;
    Ok(Value::Object(data_object([
        ("txId", Value::String(response.tx_id)),
        ("operationId", Value::String(response.operation_id)),
    ])))
}

async fn dispatch_state_store(node: &Node, scope: &Value, adapters: &AdapterSet) -> EngineResult<Value> {
    let collection_id = config_str(node, "collectionId").unwrap_or("default");
    let key = config_str(node, "keyPath")
        .and_then(|p| resolve(scope, p))
        .and_then(|v| v.as_str().map(str::to_string))
        .or_else(|| config_str(node, "key").map(str::to_string))
        .unwrap_or_else(|| "default".to_string());
    let data = config_str(node, "dataPath")
        .and_then(|p| resolve(scope, p))
        .or_else(|| node.data.get("data").cloned())
        .unwrap_or(Value::Null);

    let encrypt_fields = match node.data.get("encryptFields") {
        Some(Value::Array(items)) => {
            Some(items.iter().filter_map(|v| v.as_str().map(str::to_string)).collect::<Vec<_>>())
        }
        _ => None,
    };
    let encrypt_all = node.data.get("encryptAll").and_then(Value::as_bool_lenient);
    let options = crate::adapters::KvPutOptions { encrypt_fields, encrypt_all };

    let response = adapters.kv.put_document(collection_id, &key, data, options).await?;
    Ok(Value::Object(data_object([
        ("key", Value::String(response.key)),
        ("collectionId", Value::String(response.collection_id)),
    ])))
}

async fn dispatch_state_read(node: &Node, scope: &Value, adapters: &AdapterSet) -> EngineResult<Value> {
    let collection_id = config_str(node, "collectionId").unwrap_or("default");
    let key = config_str(node, "keyPath")
        .and_then(|p| resolve(scope, p))
        .and_then(|v| v.as_str().map(str::to_string))
        .or_else(|| config_str(node, "key").map(str::to_string))
        .unwrap_or_else(|| "default".to_string());

    Ok(adapters.kv.get_document(collection_id, &key).await?.unwrap_or(Value::Null))
}

fn merged_headers(a: &DataObject, b: &DataObject) -> DataObject {
    let mut out = a.clone();
    for (k, v) in b.iter() {
        out.insert(k.clone(), v.clone());
    }
    out
}

fn request_body(node: &Node, payload: &Value, scope: &Value) -> Option<Value> {
    match config_str(node, "bodyPath") {
        Some(path) => resolve(scope, path),
        None => Some(payload.clone()),
    }
}

async fn dispatch_connector_request(
    node: &Node,
    payload: &Value,
    scope: &Value,
    connectors: &HashMap<String, Connector>,
    adapters: &AdapterSet,
) -> EngineResult<Value> {
    let connector_id = node
        .connector
        .as_deref()
        .ok_or_else(|| EngineError::InputResolution(format!("node {} has no connector", node.id)))?;
    let connector = connectors
        .get(connector_id)
        .ok_or_else(|| EngineError::InputResolution(format!("unknown connector: {connector_id}")))?;

    if connector.base_url.is_empty() {
        return Err(EngineError::InputResolution(format!("connector {connector_id} missing baseUrl")));
    }

    let relative_path = config_str(node, "relativePath").unwrap_or("");
    let url = format!("{}{}", connector.base_url.trim_end_matches('/'), relative_path);
    let method = config_str(node, "method").unwrap_or("GET");
    let headers = match node.data.get("headers") {
        Some(Value::Object(h)) => merged_headers(&connector.headers, h),
        _ => connector.headers.clone(),
    };
    let body = request_body(node, payload, scope);

    adapters.http.request(method, &url, headers, body).await
}

async fn dispatch_custom_http_action(
    node: &Node,
    payload: &Value,
    scope: &Value,
    adapters: &AdapterSet,
) -> EngineResult<Value> {
    let url = config_str(node, "url")
        .ok_or_else(|| EngineError::InputResolution(format!("node {} missing url", node.id)))?;
    let method = config_str(node, "method").unwrap_or("GET");
    let headers = match node.data.get("headers") {
        Some(Value::Object(h)) => h.clone(),
        _ => DataObject::new(),
    };
    let body = request_body(node, payload, scope);

    adapters.http.request(method, url, headers, body).await
}
