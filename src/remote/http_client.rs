use super::*;

impl HttpCollectionStore {
    pub(super) fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, self.schema.collection, path)
    }
}

pub(super) fn build_client(timeout: Duration) -> anyhow::Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .user_agent("muster")
        .timeout(timeout)
        .build()
        .context("build reqwest client")
}

/// Sends the request and turns a non-2xx answer into [`ConsoleError::Rejected`].
pub(super) fn send(
    scope: &str,
    req: reqwest::blocking::RequestBuilder,
    label: &str,
) -> ConsoleResult<reqwest::blocking::Response> {
    let resp = req
        .send()
        .map_err(|err| ConsoleError::transport(format!("{} request", label), err))?;
    ensure_ok(scope, resp, label)
}

fn ensure_ok(
    scope: &str,
    resp: reqwest::blocking::Response,
    label: &str,
) -> ConsoleResult<reqwest::blocking::Response> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let is_json = resp
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.contains("json"));
    let body = resp.text().unwrap_or_default();
    let message = rejection_message(status.as_u16(), is_json, &body);
    tracing::warn!(
        scope,
        status = status.as_u16(),
        "{} rejected: {}",
        label,
        message
    );
    Err(ConsoleError::rejected(status.as_u16(), message))
}

/// Empty bodies (204, or 200 with nothing) read as `Value::Null`.
pub(super) fn read_json(resp: reqwest::blocking::Response, label: &str) -> ConsoleResult<Value> {
    let text = resp
        .text()
        .map_err(|err| ConsoleError::transport(format!("read {} response", label), err))?;
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&text)
        .map_err(|err| ConsoleError::format(format!("parse {} response: {}", label, err)))
}

/// What the operator sees for a non-2xx response: the JSON `error` or `message` field, else
/// the body text, else `HTTP {status}`.
pub fn rejection_message(status: u16, is_json: bool, body: &str) -> String {
    if is_json {
        if let Ok(Value::Object(obj)) = serde_json::from_str::<Value>(body) {
            let field = ["error", "message"]
                .iter()
                .find_map(|k| obj.get(*k).and_then(Value::as_str).filter(|m| !m.trim().is_empty()));
            if let Some(msg) = field {
                return msg.to_string();
            }
        }
    }
    let body = body.trim();
    if body.is_empty() {
        format!("HTTP {}", status)
    } else {
        body.to_string()
    }
}

/// Accepts an envelope (`{content, totalPages}` or `{content, page: {totalPages}}`) or a bare
/// list. A bare list is the whole collection and is paged here.
pub fn parse_page(body: Value, index: usize, size: usize) -> ConsoleResult<Page> {
    let size = size.max(1);
    match body {
        Value::Array(items) => {
            let all = into_records(items)?;
            let total_pages = all.len().div_ceil(size);
            let records = all.into_iter().skip(index * size).take(size).collect();
            Ok(Page {
                records,
                index,
                size,
                total_pages,
            })
        }
        Value::Object(mut envelope) => {
            let items = match envelope.remove("content") {
                Some(Value::Array(items)) => items,
                Some(_) => return Err(ConsoleError::format("`content` is not a list")),
                None => return Err(ConsoleError::format("envelope has no `content` list")),
            };
            let mut records = into_records(items)?;
            records.truncate(size);
            let total_pages = envelope
                .get("totalPages")
                .or_else(|| envelope.get("page").and_then(|p| p.get("totalPages")))
                .and_then(Value::as_u64)
                .map(|n| n as usize)
                .unwrap_or(if records.is_empty() { 0 } else { index + 1 });
            Ok(Page {
                records,
                index,
                size,
                total_pages,
            })
        }
        _ => Err(ConsoleError::format(
            "expected a paged envelope or a list of records",
        )),
    }
}

fn into_records(items: Vec<Value>) -> ConsoleResult<Vec<Record>> {
    items.into_iter().map(parse_record).collect()
}

pub(super) fn parse_record(value: Value) -> ConsoleResult<Record> {
    match value {
        Value::Object(map) => Ok(Record::from_map(map)),
        other => Err(ConsoleError::format(format!(
            "expected a record object, got {}",
            kind_of(&other)
        ))),
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "a list",
        Value::Object(_) => "an object",
    }
}
