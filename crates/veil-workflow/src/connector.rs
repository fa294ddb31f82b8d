//! Connector records: the pre-decrypted base URL and headers a
//! `connector-request` block merges with its own per-call overrides (§4.7,
//! §9 "Connector headers").

use serde::{Deserialize, Serialize};

use crate::value::DataObject;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub id: String,
    pub base_url: String,
    #[serde(default)]
    pub headers: DataObject,
}
