// Host runtime call dispatch

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::coordinator::PrintCoordinator;
use crate::errors::PrintError;
use crate::options::PrintJobOptions;

/// One call delivered by the host runtime.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeCall {
    pub method: String,
    #[serde(default)]
    pub args: Vec<Value>,
    pub callback_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeError {
    pub kind: String,
    pub message: String,
}

/// The single response owed for a [`BridgeCall`], tagged with its callback id.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResponse {
    pub callback_id: String,
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<BridgeError>,
}

impl BridgeResponse {
    pub fn success(callback_id: String, payload: Value) -> Self {
        Self {
            callback_id,
            ok: true,
            payload: Some(payload),
            error: None,
        }
    }

    pub fn failure(callback_id: String, err: &PrintError) -> Self {
        Self {
            callback_id,
            ok: false,
            payload: None,
            error: Some(BridgeError {
                kind: err.kind().to_string(),
                message: err.to_string(),
            }),
        }
    }
}

pub async fn dispatch(coordinator: &PrintCoordinator, call: BridgeCall) -> BridgeResponse {
    let BridgeCall {
        method,
        args,
        callback_id,
    } = call;
    debug!("Dispatching {} ({} args) for {}", method, args.len(), callback_id);

    let result = match method.to_ascii_lowercase().as_str() {
        "check" => {
            let content = content_arg(args.first()).unwrap_or_default();
            Ok(Value::Bool(coordinator.check(&content).await))
        }
        "types" => Ok(json!(coordinator.types())),
        "available" | "isavailable" => Ok(Value::Bool(coordinator.available().await)),
        "pick" => coordinator
            .pick(PrintJobOptions::from_json(args.first()), &callback_id)
            .await
            .map(|picked| json!({ "printerId": picked.printer_id })),
        "print" => {
            let (content, options) = print_args(&args);
            coordinator
                .print(&content, options, &callback_id)
                .await
                .map(|printed| json!({ "completed": printed.completed }))
        }
        _ => Err(PrintError::UnknownMethod(method.clone())),
    };

    match result {
        Ok(payload) => BridgeResponse::success(callback_id, payload),
        Err(e) => {
            warn!("{} for {} failed: {}", method, callback_id, e);
            BridgeResponse::failure(callback_id, &e)
        }
    }
}

/// Content given either as a bare string or as `{content: ...}`.
fn content_arg(arg: Option<&Value>) -> Option<String> {
    match arg? {
        Value::String(content) => Some(content.clone()),
        Value::Object(map) => map.get("content")?.as_str().map(str::to_string),
        _ => None,
    }
}

/// `[content, options?]`, or a single options object carrying `content`.
fn print_args(args: &[Value]) -> (String, PrintJobOptions) {
    match args.first() {
        Some(Value::Object(_)) => (
            content_arg(args.first()).unwrap_or_default(),
            PrintJobOptions::from_json(args.first()),
        ),
        first => (
            content_arg(first).unwrap_or_default(),
            PrintJobOptions::from_json(args.get(1)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::printers::{MockBehavior, MockPrintInteraction};
    use crate::resolver::ContentResolver;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn coordinator(behavior: MockBehavior) -> (TempDir, PrintCoordinator) {
        let dir = TempDir::new().expect("temp dir");
        std::fs::write(dir.path().join("document.pdf"), b"%PDF-1.4\n").expect("write pdf");
        let coordinator = PrintCoordinator::new(
            ContentResolver::new(dir.path()),
            Arc::new(MockPrintInteraction::new(behavior)),
        )
        .expect("coordinator");
        (dir, coordinator)
    }

    fn call(method: &str, args: Vec<Value>) -> BridgeCall {
        BridgeCall {
            method: method.to_string(),
            args,
            callback_id: "Printer123".to_string(),
        }
    }

    #[tokio::test]
    async fn test_check_and_types() {
        let (_dir, coordinator) = coordinator(MockBehavior::Complete);

        let response = dispatch(&coordinator, call("check", vec![json!("document.pdf")])).await;
        assert!(response.ok);
        assert_eq!(response.payload, Some(json!(true)));
        assert_eq!(response.callback_id, "Printer123");

        let legacy = dispatch(
            &coordinator,
            call("check", vec![json!({ "content": "notes.txt" })]),
        )
        .await;
        assert_eq!(legacy.payload, Some(json!(false)));

        let types = dispatch(&coordinator, call("types", vec![])).await;
        let list = types.payload.expect("types payload");
        assert!(list
            .as_array()
            .expect("array")
            .contains(&json!("com.adobe.pdf")));
    }

    #[tokio::test]
    async fn test_print_payloads() {
        let (_dir, coordinator) = coordinator(MockBehavior::Complete);

        let printed = dispatch(
            &coordinator,
            call("print", vec![json!("document.pdf"), json!({ "name": "Report" })]),
        )
        .await;
        assert_eq!(printed.payload, Some(json!({ "completed": true })));

        let legacy = dispatch(
            &coordinator,
            call("print", vec![json!({ "content": "document.pdf", "copies": 2 })]),
        )
        .await;
        assert_eq!(legacy.payload, Some(json!({ "completed": true })));
    }

    #[tokio::test]
    async fn test_errors_carry_kind_and_message() {
        let (_dir, coordinator) = coordinator(MockBehavior::Complete);

        let missing = dispatch(&coordinator, call("print", vec![json!("missing.pdf")])).await;
        assert!(!missing.ok);
        let error = missing.error.expect("error body");
        assert_eq!(error.kind, "unreadable_content");
        assert!(error.message.contains("missing.pdf"));

        let unknown = dispatch(&coordinator, call("scan", vec![])).await;
        assert_eq!(
            unknown.error.map(|e| e.kind),
            Some("unknown_method".to_string())
        );
    }

    #[tokio::test]
    async fn test_dismissed_pick_serializes_null() {
        let (_dir, coordinator) = coordinator(MockBehavior::Cancel);
        let response = dispatch(&coordinator, call("pick", vec![])).await;
        assert_eq!(response.payload, Some(json!({ "printerId": null })));

        let wire = serde_json::to_value(&response).expect("serializes");
        assert_eq!(wire["callbackId"], "Printer123");
        assert!(wire.get("error").is_none());
    }
}
