use axum::Json;
use serde::Serialize;
use serde_json::{json, Value};

/// Success envelope shared by every endpoint: `{ "success": true, "data": ... }`.
pub fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({
        "success": true,
        "data": data
    }))
}
