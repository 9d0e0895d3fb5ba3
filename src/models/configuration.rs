//! Configuration resource served by the CRUD API

use serde::{Deserialize, Serialize};

use super::record::{Lifecycle, Record};

/// Collection holding [`Configuration`] records.
pub const CONFIGURATION_COLLECTION: &str = "Configuration";

/// Display configuration for one cabinet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Configuration {
    pub id: String,
    #[serde(default)]
    pub cabinet: String,
    #[serde(default)]
    pub heartbeat: u64,
    #[serde(default)]
    pub screens: Vec<Screen>,
    #[serde(default)]
    pub messages: Vec<Message>,
    #[serde(flatten)]
    pub lifecycle: Lifecycle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Screen {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub picture: Option<String>,
}

impl Record for Configuration {
    fn id(&self) -> &str {
        &self.id
    }
}
