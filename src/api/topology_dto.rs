use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Wire shape of a containerlab-style topology document.
///
/// Node and link configs are carried as raw JSON so that kinds we do not
/// know about (images, startup configs, vendor extensions) survive the
/// round trip onto the remote host unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyDto {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mgmt: Option<Value>,
    pub topology: TopologyBodyDto,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologyBodyDto {
    #[serde(default)]
    pub nodes: Map<String, Value>,
    #[serde(default)]
    pub links: Vec<LinkDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkDto {
    #[serde(default)]
    pub endpoints: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
