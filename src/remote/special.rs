//! Server-side unit reports and the chapter unassignment, outside the collection CRUD.

use super::http_client::{build_client, read_json, send};
use super::*;
use crate::error::ValidationError;
use crate::schema::UNITS;

const SPECIAL_PATH: &str = "/api/special-operations";
const SCOPE: &str = "special-operations";

/// One unit found by a name search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NameMatch {
    pub id: RecordId,
    pub name: String,
}

pub trait SpecialOperations: Send + Sync {
    /// `None` when there are no units to average.
    fn average_heart_count(&self) -> ConsoleResult<Option<f64>>;

    /// Units whose health is strictly below `health`.
    fn count_below_health(&self, health: i64) -> ConsoleResult<u64>;

    fn search_by_name(&self, fragment: &str) -> ConsoleResult<Vec<NameMatch>>;

    fn remove_from_chapter(&self, id: RecordId) -> ConsoleResult<()>;
}

/// The health bound must be a positive number.
pub fn check_health_bound(health: i64) -> Result<i64, ValidationError> {
    if health < 1 {
        return Err(ValidationError::new(
            "health",
            "Health bound must be greater than 0",
        ));
    }
    Ok(health)
}

pub fn check_name_fragment(fragment: &str) -> Result<&str, ValidationError> {
    let fragment = fragment.trim();
    if fragment.is_empty() {
        return Err(ValidationError::new("name", "Enter part of a name to search for"));
    }
    Ok(fragment)
}

pub struct HttpSpecialOperations {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl HttpSpecialOperations {
    pub fn new(base_url: &str, timeout: Duration) -> anyhow::Result<Self> {
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: build_client(timeout)?,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, SPECIAL_PATH, path)
    }
}

impl SpecialOperations for HttpSpecialOperations {
    fn average_heart_count(&self) -> ConsoleResult<Option<f64>> {
        let req = self.client.get(self.url("/average-heart-count"));
        let resp = send(SCOPE, req, "average heart count")?;
        parse_average(read_json(resp, "average heart count")?)
    }

    fn count_below_health(&self, health: i64) -> ConsoleResult<u64> {
        let health = check_health_bound(health)?;
        let req = self
            .client
            .get(self.url("/count-by-health"))
            .query(&[("health", health)]);
        let resp = send(SCOPE, req, "count by health")?;
        parse_count(read_json(resp, "count by health")?)
    }

    fn search_by_name(&self, fragment: &str) -> ConsoleResult<Vec<NameMatch>> {
        let fragment = check_name_fragment(fragment)?;
        let req = self
            .client
            .get(self.url("/search-by-name"))
            .query(&[("name", fragment)]);
        let resp = send(SCOPE, req, "search by name")?;
        parse_matches(read_json(resp, "search by name")?)
    }

    fn remove_from_chapter(&self, id: RecordId) -> ConsoleResult<()> {
        let url = format!(
            "{}{}/{}/remove-from-chapter",
            self.base_url, UNITS.collection, id
        );
        let resp = send(SCOPE, self.client.put(url), "remove from chapter")?;
        read_json(resp, "remove from chapter")?;
        tracing::info!(%id, "removed unit from its chapter");
        Ok(())
    }
}

/// `{"average": n}`; a null average means no units.
pub fn parse_average(body: Value) -> ConsoleResult<Option<f64>> {
    match body.get("average") {
        Some(Value::Null) => Ok(None),
        Some(v) => v
            .as_f64()
            .map(Some)
            .ok_or_else(|| ConsoleError::format("`average` is not a number")),
        None => Err(ConsoleError::format("response has no `average`")),
    }
}

pub fn parse_count(body: Value) -> ConsoleResult<u64> {
    body.get("count")
        .and_then(Value::as_u64)
        .ok_or_else(|| ConsoleError::format("response has no `count` number"))
}

/// `{"marines": [[name, id], ...]}`; `{id, name}` objects are accepted too.
pub fn parse_matches(body: Value) -> ConsoleResult<Vec<NameMatch>> {
    let items = match body {
        Value::Object(mut obj) => match obj.remove("marines") {
            Some(Value::Array(items)) => items,
            Some(Value::Null) | None => return Ok(Vec::new()),
            Some(_) => return Err(ConsoleError::format("`marines` is not a list")),
        },
        Value::Array(items) => items,
        _ => return Err(ConsoleError::format("expected a `marines` list")),
    };
    items.iter().map(name_match).collect()
}

fn name_match(item: &Value) -> ConsoleResult<NameMatch> {
    let (name, id) = match item {
        Value::Array(pair) => (pair.first(), pair.get(1)),
        Value::Object(obj) => (obj.get("name"), obj.get("id")),
        _ => (None, None),
    };
    let id = id.and_then(RecordId::from_value);
    match (name.and_then(Value::as_str), id) {
        (Some(name), Some(id)) => Ok(NameMatch {
            id,
            name: name.to_string(),
        }),
        _ => Err(ConsoleError::format(format!("malformed search match {}", item))),
    }
}

/// A report the operator can ask the server for.
#[derive(Clone, Debug, PartialEq)]
pub enum Report {
    AverageHeartCount,
    CountBelowHealth(i64),
    SearchByName(String),
}

#[derive(Clone, Debug, PartialEq)]
pub enum ReportAnswer {
    Average(Option<f64>),
    Count(u64),
    Matches(Vec<NameMatch>),
}

impl Report {
    pub fn run(&self, ops: &dyn SpecialOperations) -> ConsoleResult<ReportAnswer> {
        match self {
            Report::AverageHeartCount => ops.average_heart_count().map(ReportAnswer::Average),
            Report::CountBelowHealth(health) => {
                ops.count_below_health(*health).map(ReportAnswer::Count)
            }
            Report::SearchByName(fragment) => {
                ops.search_by_name(fragment).map(ReportAnswer::Matches)
            }
        }
    }

    /// One line for the notice bar and the CLI.
    pub fn summary(&self, answer: &ReportAnswer) -> String {
        match (self, answer) {
            (_, ReportAnswer::Average(Some(avg))) => format!("Average heart count: {:.2}", avg),
            (_, ReportAnswer::Average(None)) => "Average heart count: no units".to_string(),
            (Report::CountBelowHealth(health), ReportAnswer::Count(n)) => {
                format!("{} units with health below {}", n, health)
            }
            (_, ReportAnswer::Count(n)) => format!("{} units", n),
            (Report::SearchByName(fragment), ReportAnswer::Matches(found)) => {
                format!("{} units match \"{}\"", found.len(), fragment.trim())
            }
            (_, ReportAnswer::Matches(found)) => format!("{} units found", found.len()),
        }
    }
}

impl ReportAnswer {
    /// Detail rows below the summary; only searches have any.
    pub fn lines(&self) -> Vec<String> {
        match self {
            ReportAnswer::Matches(found) => found
                .iter()
                .map(|m| format!("{}\t{}", m.id, m.name))
                .collect(),
            _ => Vec::new(),
        }
    }
}
