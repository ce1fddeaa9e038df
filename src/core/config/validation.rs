use serde_json::{Map, Value};

use crate::core::errors::RagError;

pub fn validate_config(config: &Value) -> Result<(), RagError> {
    let root = config
        .as_object()
        .ok_or_else(|| config_type_error("root", "object"))?;

    if let Some(fga) = expect_optional_object(root, "fga")? {
        validate_url_field(fga, "fga.api_url", "api_url")?;
        validate_optional_string_field(fga, "fga.store_id", "store_id")?;
        validate_optional_string_field(
            fga,
            "fga.authorization_model_id",
            "authorization_model_id",
        )?;
        validate_optional_string_field(fga, "fga.api_token", "api_token")?;
        validate_optional_string_field(fga, "fga.api_token_issuer", "api_token_issuer")?;
        validate_optional_string_field(fga, "fga.api_audience", "api_audience")?;
        validate_optional_string_field(fga, "fga.client_id", "client_id")?;
        validate_optional_string_field(fga, "fga.client_secret", "client_secret")?;
        validate_u64_field(fga, "fga.timeout_secs", "timeout_secs", 1, 3_600)?;
        validate_u64_field(fga, "fga.max_batch_size", "max_batch_size", 1, 1_000)?;
        validate_u64_field(
            fga,
            "fga.max_parallel_requests",
            "max_parallel_requests",
            1,
            100,
        )?;
        validate_enum_field(
            fga,
            "fga.consistency",
            "consistency",
            &["unspecified", "minimize_latency", "higher_consistency"],
        )?;
        validate_credential_pair(fga)?;
    }

    if let Some(llm) = expect_optional_object(root, "llm")? {
        validate_url_field(llm, "llm.base_url", "base_url")?;
        validate_optional_string_field(llm, "llm.api_key", "api_key")?;
        validate_optional_string_field(llm, "llm.chat_model", "chat_model")?;
        validate_optional_string_field(llm, "llm.embedding_model", "embedding_model")?;
        validate_f64_field(llm, "llm.temperature", "temperature", 0.0, 2.0)?;
        validate_u64_field(llm, "llm.max_tokens", "max_tokens", 1, 1_000_000)?;
        validate_u64_field(llm, "llm.timeout_secs", "timeout_secs", 1, 3_600)?;
    }

    if let Some(retrieval) = expect_optional_object(root, "retrieval")? {
        validate_optional_string_field(retrieval, "retrieval.documents_dir", "documents_dir")?;
        validate_u64_field(retrieval, "retrieval.top_k", "top_k", 1, 1_000)?;
        validate_f64_field(
            retrieval,
            "retrieval.score_threshold",
            "score_threshold",
            -1.0,
            1.0,
        )?;
        for key in ["relation", "user_type", "object_type"] {
            validate_identifier_field(retrieval, &format!("retrieval.{}", key), key)?;
        }
        validate_u64_field(
            retrieval,
            "retrieval.max_context_length",
            "max_context_length",
            1,
            10_000_000,
        )?;
        validate_bool_field(retrieval, "retrieval.include_citations", "include_citations")?;
        validate_u64_field(
            retrieval,
            "retrieval.agent_max_steps",
            "agent_max_steps",
            1,
            50,
        )?;
    }

    Ok(())
}

fn expect_optional_object<'a>(
    root: &'a Map<String, Value>,
    key: &str,
) -> Result<Option<&'a Map<String, Value>>, RagError> {
    match root.get(key) {
        Some(Value::Object(map)) => Ok(Some(map)),
        Some(_) => Err(config_type_error(key, "object")),
        None => Ok(None),
    }
}

/// Client credentials only work as a pair.
fn validate_credential_pair(fga: &Map<String, Value>) -> Result<(), RagError> {
    let present = |key: &str| {
        fga.get(key)
            .and_then(Value::as_str)
            .is_some_and(|v| !v.trim().is_empty())
    };
    if present("client_id") != present("client_secret") {
        return Err(RagError::Config(
            "Invalid config at 'fga': client_id and client_secret must be set together"
                .to_string(),
        ));
    }
    Ok(())
}

fn validate_bool_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.as_bool().is_some() {
        return Ok(());
    }
    Err(config_type_error(path, "boolean"))
}

fn validate_u64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: u64,
    max: u64,
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let Some(number) = value.as_u64() else {
        return Err(config_type_error(path, "integer"));
    };
    if number < min || number > max {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_f64_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    min: f64,
    max: f64,
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    if value.is_null() {
        return Ok(());
    }
    let Some(number) = value.as_f64() else {
        return Err(config_type_error(path, "number"));
    };
    if number < min || number > max {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': must be between {} and {}",
            path, min, max
        )));
    }
    Ok(())
}

fn validate_optional_string_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), RagError> {
    match section.get(key) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(config_type_error(path, "string")),
    }
}

fn validate_url_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !(text.starts_with("http://") || text.starts_with("https://")) {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': expected an http(s) URL",
            path
        )));
    }
    Ok(())
}

/// Relation and type names end up inside `type:id` strings, so a colon or
/// whitespace would corrupt every tuple.
fn validate_identifier_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if text.is_empty() || text.contains(':') || text.chars().any(char::is_whitespace) {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': must be a non-empty name without ':' or whitespace",
            path
        )));
    }
    Ok(())
}

fn validate_enum_field(
    section: &Map<String, Value>,
    path: &str,
    key: &str,
    allowed: &[&str],
) -> Result<(), RagError> {
    let Some(value) = section.get(key) else {
        return Ok(());
    };
    let Some(text) = value.as_str() else {
        return Err(config_type_error(path, "string"));
    };
    if !allowed.contains(&text) {
        return Err(RagError::Config(format!(
            "Invalid config at '{}': expected one of {}",
            path,
            allowed.join(", ")
        )));
    }
    Ok(())
}

fn config_type_error(path: &str, expected: &str) -> RagError {
    RagError::Config(format!(
        "Invalid config at '{}': expected {}",
        path, expected
    ))
}
