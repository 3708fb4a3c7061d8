// SPDX-FileCopyrightText: 2026 mqlens Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! MQSC commands carried by the mqweb `runCommandJSON` action.

use mqlens_core::{MqError, ObjectKind};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const MQRC_NOT_AUTHORIZED: u32 = 2035;
pub const MQRC_OBJECT_IN_USE: u32 = 2042;
pub const MQRC_UNKNOWN_OBJECT_NAME: u32 = 2085;
pub const MQRCCF_CHL_STATUS_NOT_FOUND: u32 = 3065;

/// One structured MQSC command.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MqscCommand<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    command: &'a str,
    qualifier: &'a str,
    name: &'a str,
    #[serde(skip_serializing_if = "<[_]>::is_empty")]
    response_parameters: &'a [&'a str],
}

impl<'a> MqscCommand<'a> {
    pub fn new(command: &'a str, qualifier: &'a str, name: &'a str) -> Self {
        Self {
            kind: "runCommandJSON",
            command,
            qualifier,
            name,
            response_parameters: &[],
        }
    }

    pub fn display(qualifier: &'a str, name: &'a str, parameters: &'a [&'a str]) -> Self {
        Self {
            response_parameters: parameters,
            ..Self::new("display", qualifier, name)
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MqscResponse {
    #[serde(default)]
    pub command_response: Vec<CommandResponse>,
    #[serde(default)]
    pub overall_completion_code: u32,
    #[serde(default)]
    pub overall_reason_code: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommandResponse {
    pub completion_code: u32,
    pub reason_code: u32,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub message: Vec<String>,
}

impl MqscResponse {
    /// Reason code of the first failed command, if any failed.
    pub fn failed_reason(&self) -> Option<u32> {
        self.command_response
            .iter()
            .find(|r| r.completion_code >= 2)
            .map(|r| r.reason_code)
            .or_else(|| (self.overall_completion_code >= 2).then_some(self.overall_reason_code))
    }

    /// Parameters of every successful response, or the first failure mapped
    /// onto the error taxonomy. A failed command with no per-object response
    /// falls back to the overall reason code.
    pub fn into_parameters(self, kind: ObjectKind, name: &str) -> Result<Vec<Map<String, Value>>, MqError> {
        if let Some(failed) = self.command_response.iter().find(|r| r.completion_code >= 2) {
            return Err(reason_error(failed.reason_code, kind, name, &failed.message.join(" ")));
        }
        if self.command_response.is_empty() && self.overall_completion_code >= 2 {
            return Err(reason_error(self.overall_reason_code, kind, name, ""));
        }
        Ok(self
            .command_response
            .into_iter()
            .map(|r| r.parameters)
            .collect())
    }
}

/// Maps an MQ reason code onto the error taxonomy.
pub fn reason_error(reason: u32, kind: ObjectKind, name: &str, detail: &str) -> MqError {
    match reason {
        MQRC_UNKNOWN_OBJECT_NAME | MQRCCF_CHL_STATUS_NOT_FOUND => MqError::not_found(kind, name),
        MQRC_NOT_AUTHORIZED => MqError::AuthorizationDenied(format!(
            "not authorized for {kind} `{name}` (MQRC 2035)"
        )),
        _ if detail.is_empty() => MqError::transport_msg(format!("MQSC failed with reason {reason}")),
        _ => MqError::transport_msg(format!("MQSC failed with reason {reason}: {detail}")),
    }
}

/// Reads a numeric parameter; runCommandJSON renders some integers as strings.
pub fn param_u64(params: &Map<String, Value>, key: &str) -> Option<u64> {
    match params.get(key)? {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub fn param_str<'a>(params: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    params
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn display_serializes_response_parameters() {
        let command = MqscCommand::display("qlocal", "*", &["curdepth", "maxdepth"]);
        assert_eq!(
            serde_json::to_value(&command).unwrap(),
            json!({
                "type": "runCommandJSON",
                "command": "display",
                "qualifier": "qlocal",
                "name": "*",
                "responseParameters": ["curdepth", "maxdepth"]
            })
        );
        let clear = serde_json::to_value(MqscCommand::new("clear", "qlocal", "Q1")).unwrap();
        assert!(clear.get("responseParameters").is_none());
    }

    #[test]
    fn reason_codes_map_onto_taxonomy() {
        let missing: MqscResponse = serde_json::from_value(json!({
            "commandResponse": [{
                "completionCode": 2,
                "reasonCode": 2085,
                "message": ["AMQ8147E: IBM MQ object NOPE not found."]
            }],
            "overallCompletionCode": 2,
            "overallReasonCode": 3008
        }))
        .unwrap();
        assert!(missing.into_parameters(ObjectKind::Queue, "NOPE").unwrap_err().is_not_found());

        let denied: MqscResponse = serde_json::from_value(json!({
            "commandResponse": [],
            "overallCompletionCode": 2,
            "overallReasonCode": 2035
        }))
        .unwrap();
        assert!(denied
            .into_parameters(ObjectKind::Queue, "*")
            .unwrap_err()
            .is_authorization_denied());
    }

    #[test]
    fn numeric_parameters_accept_strings() {
        let params = json!({"curdepth": 4, "maxdepth": "5000", "descr": "  "});
        let params = params.as_object().unwrap();
        assert_eq!(param_u64(params, "curdepth"), Some(4));
        assert_eq!(param_u64(params, "maxdepth"), Some(5000));
        assert_eq!(param_str(params, "descr"), None);
    }
}
