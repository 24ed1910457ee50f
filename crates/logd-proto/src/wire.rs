use serde::{Deserialize, Serialize};

/// Severity, ordered most-to-least severe. `Error` is declared first so the
/// derived `Ord` directly encodes "at least as severe as": `msg.lvl <= floor`
/// is true exactly when `msg.lvl` is `floor` or more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Level {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
    Options,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CmdName {
    Write,
    Tail,
    Ping,
    Query,
}

/// The log record. `key` is slash-delimited, `/env/service/fn...`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Msg {
    pub t: i64,
    pub key: String,
    pub lvl: Option<Level>,
    pub txt: Option<String>,
    pub http_method: Option<HttpMethod>,
    pub url: Option<String>,
    pub response_status: Option<i32>,
}

impl Msg {
    /// A bare reply datagram under the reserved key, e.g. the `+END` query
    /// sentinel or a `kick` notice. Replies are never signed.
    pub fn reply(txt: impl Into<String>, now_nanos: i64) -> Self {
        Self {
            t: now_nanos,
            key: crate::REPLY_KEY.to_string(),
            lvl: None,
            txt: Some(txt.into()),
            http_method: None,
            url: None,
            response_status: None,
        }
    }

    /// Splits `key` into `(env, service)`, the first two non-empty segments,
    /// which together identify the store partition this message belongs to.
    pub fn store_key(&self) -> Option<String> {
        let mut segments = self.key.split('/').filter(|s| !s.is_empty());
        let env = segments.next()?;
        let service = segments.next()?;
        Some(format!("/{env}/{service}"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QueryParams {
    pub key_prefix: String,
    pub offset: u32,
    pub limit: u32,
    pub t_start: Option<i64>,
    pub t_end: Option<i64>,
    pub lvl: Option<Level>,
    pub txt: Option<String>,
    pub http_method: Option<HttpMethod>,
    pub url: Option<String>,
    pub response_status: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cmd {
    pub name: CmdName,
    pub msg: Option<Msg>,
    pub query_params: Option<QueryParams>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_is_most_severe() {
        assert!(Level::Error < Level::Warn);
        assert!(Level::Warn < Level::Info);
        assert!(Level::Info < Level::Debug);
        assert!(Level::Debug < Level::Trace);
    }

    #[test]
    fn store_key_needs_two_segments() {
        let mut msg = Msg {
            t: 0,
            key: "/prod/api/foo".to_string(),
            lvl: None,
            txt: None,
            http_method: None,
            url: None,
            response_status: None,
        };
        assert_eq!(msg.store_key().as_deref(), Some("/prod/api"));
        msg.key = "/prod".to_string();
        assert_eq!(msg.store_key(), None);
        msg.key = "/".to_string();
        assert_eq!(msg.store_key(), None);
    }
}
