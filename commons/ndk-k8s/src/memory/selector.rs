use crate::error::{ClientError, ClientResult};
use serde_json::{Map, Value};

#[derive(Debug, Clone, PartialEq)]
enum Requirement {
    Eq(String, String),
    NotEq(String, String),
    In(String, Vec<String>),
    NotIn(String, Vec<String>),
    Exists(String),
    DoesNotExist(String),
}

/// Parsed label selector in the API server's string syntax.
#[derive(Debug, Clone, Default)]
pub struct LabelSelector {
    requirements: Vec<Requirement>,
}

impl LabelSelector {
    pub fn parse(raw: &str) -> ClientResult<Self> {
        let requirements = split_top_level(raw)
            .into_iter()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(parse_requirement)
            .collect::<ClientResult<Vec<_>>>()?;
        Ok(Self { requirements })
    }

    pub fn matches(&self, labels: Option<&Map<String, Value>>) -> bool {
        let get = |k: &str| {
            labels.and_then(|l| l.get(k)).and_then(Value::as_str)
        };
        self.requirements.iter().all(|r| match r {
            Requirement::Eq(k, v) => get(k) == Some(v.as_str()),
            Requirement::NotEq(k, v) => get(k) != Some(v.as_str()),
            Requirement::In(k, vs) => {
                get(k).is_some_and(|x| vs.iter().any(|v| v == x))
            }
            Requirement::NotIn(k, vs) => {
                get(k).is_none_or(|x| vs.iter().all(|v| v != x))
            }
            Requirement::Exists(k) => get(k).is_some(),
            Requirement::DoesNotExist(k) => get(k).is_none(),
        })
    }
}

fn invalid(raw: &str) -> ClientError {
    ClientError::api(400, "BadRequest", format!("invalid selector: {}", raw))
}

fn split_top_level(raw: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0usize;
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth = depth.saturating_sub(1),
            ',' if depth == 0 => {
                parts.push(&raw[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&raw[start..]);
    parts
}

fn parse_set(raw: &str, full: &str) -> ClientResult<Vec<String>> {
    let inner = raw
        .trim()
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .ok_or_else(|| invalid(full))?;
    Ok(inner
        .split(',')
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .collect())
}

fn parse_requirement(raw: &str) -> ClientResult<Requirement> {
    if let Some(key) = raw.strip_prefix('!') {
        return Ok(Requirement::DoesNotExist(key.trim().to_string()));
    }
    if let Some((key, set)) = raw.split_once(" notin ") {
        return Ok(Requirement::NotIn(key.trim().to_string(), parse_set(set, raw)?));
    }
    if let Some((key, set)) = raw.split_once(" in ") {
        return Ok(Requirement::In(key.trim().to_string(), parse_set(set, raw)?));
    }
    if let Some((key, value)) = raw.split_once("!=") {
        return Ok(Requirement::NotEq(key.trim().into(), value.trim().into()));
    }
    if let Some((key, value)) = raw.split_once("==").or_else(|| raw.split_once('=')) {
        let key = key.trim();
        if key.is_empty() {
            return Err(invalid(raw));
        }
        return Ok(Requirement::Eq(key.into(), value.trim().into()));
    }
    if raw.contains(['(', ')', ' ']) {
        return Err(invalid(raw));
    }
    Ok(Requirement::Exists(raw.to_string()))
}
