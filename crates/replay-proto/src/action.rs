use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How the frame arrived at its current URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavMethod {
    Navigation,
    Hash,
    History,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutopilotStatus {
    Complete,
    Stopped,
}

/// State transitions issued to the outer store. The store owns their
/// reducer semantics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum StoreAction {
    UpdateUrl(String),
    UpdateTimestamp(Option<String>),
    SetMethod(NavMethod),
    ToggleAutopilot {
        id: Option<String>,
        status: AutopilotStatus,
        url: String,
    },
    UpdateBehaviorState(Value),
    UpdateBehaviorMessage(String),
    AutopilotReady,
    ToggleBugReportModal(bool),
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn actions_serialize_as_tagged_payloads() {
        let value = serde_json::to_value(StoreAction::SetMethod(NavMethod::Hash)).unwrap();
        assert_eq!(value, json!({"type": "set_method", "payload": "hash"}));

        let value = serde_json::to_value(StoreAction::AutopilotReady).unwrap();
        assert_eq!(value, json!({"type": "autopilot_ready"}));
    }
}
