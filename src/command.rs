use crate::error::BlacklistError;
use crate::url::is_valid_url;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Add to the filter and the blacklist (`POST`, `ADD`, `1`)
    Add,
    /// Filter check, then exact check when the filter hits (`GET`,
    /// `CONTAIN`, `2`)
    Contain,
    /// Remove from the blacklist only (`DELETE`)
    Delete,
}

impl FromStr for Operation {
    type Err = BlacklistError;

    fn from_str(token: &str) -> Result<Self, Self::Err> {
        match token {
            "POST" | "ADD" | "1" => Ok(Operation::Add),
            "GET" | "CONTAIN" | "2" => Ok(Operation::Contain),
            "DELETE" => Ok(Operation::Delete),
            other => Err(BlacklistError::BadRequest(format!(
                "unknown operation '{other}'"
            ))),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Add => "POST",
            Operation::Contain => "GET",
            Operation::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub operation: Operation,
    pub url: String,
}

impl Request {
    pub fn new(operation: Operation, url: impl Into<String>) -> Self {
        Self {
            operation,
            url: url.into(),
        }
    }

    pub fn add(url: impl Into<String>) -> Self {
        Self::new(Operation::Add, url)
    }

    pub fn contain(url: impl Into<String>) -> Self {
        Self::new(Operation::Contain, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(Operation::Delete, url)
    }
}

/// Parses `<operation> <url>`. Runs of whitespace count as one separator;
/// anything other than exactly two tokens, an unknown operation or a
/// malformed URL is a bad request.
impl FromStr for Request {
    type Err = BlacklistError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut tokens = line.split_whitespace();
        let (Some(operation), Some(url), None) =
            (tokens.next(), tokens.next(), tokens.next())
        else {
            return Err(BlacklistError::BadRequest(
                "expected '<operation> <url>'".into(),
            ));
        };

        let operation = operation.parse()?;
        if !is_valid_url(url) {
            return Err(BlacklistError::BadRequest(format!(
                "malformed url '{url}'"
            )));
        }
        Ok(Request::new(operation, url))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Response {
    Created,
    NoContent,
    NotFound,
    /// `exact_hit` is only looked up when `filter_hit` is true, so
    /// `filter_hit: false` always comes with `exact_hit: false`.
    Contains { filter_hit: bool, exact_hit: bool },
    BadRequest,
    InternalError,
}

impl Response {
    pub fn status_code(&self) -> u16 {
        match self {
            Response::Created => 201,
            Response::NoContent => 204,
            Response::NotFound => 404,
            Response::Contains { .. } => 200,
            Response::BadRequest => 400,
            Response::InternalError => 500,
        }
    }

    /// Confirmed member: both the filter and the exact store agree.
    pub fn is_blacklisted(&self) -> bool {
        matches!(
            self,
            Response::Contains {
                filter_hit: true,
                exact_hit: true
            }
        )
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Response::Created => f.write_str("201 Created"),
            Response::NoContent => f.write_str("204 No Content"),
            Response::NotFound => f.write_str("404 Not Found"),
            Response::Contains {
                filter_hit: false, ..
            } => f.write_str("200 Ok\n\nfalse"),
            Response::Contains {
                filter_hit: true,
                exact_hit,
            } => write!(f, "200 Ok\n\ntrue {exact_hit}"),
            Response::BadRequest => f.write_str("400 Bad Request"),
            Response::InternalError => f.write_str("500 Internal Server Error"),
        }
    }
}
