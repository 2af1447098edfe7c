//! Durable out-of-band reporting for side effects the realtime channel could
//! not take.
//!
//! Each job is a single best-effort `POST` against the recording API. Jobs are
//! not retried: a failed write is logged and the record stays unpersisted.

mod queue;

pub use queue::{spawn_fallback_worker, FallbackQueue};

use async_trait::async_trait;
use replay_proto::{CookieAssignment, PageRecord};
use reqwest::Client;
use serde::Serialize;
use thiserror::Error;
use url::Url;

#[derive(Debug, Error)]
pub enum FallbackError {
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected status: {status} body={body}")]
    UnexpectedStatus {
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("fallback transport error: {0}")]
    Transport(String),
}

pub type FallbackResult<T> = Result<T, FallbackError>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CookieBody {
    pub domain: String,
    pub name: String,
    pub rec: String,
    pub value: String,
}

/// One write destined for the durable API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackJob {
    Cookie { user: String, body: CookieBody },
    Page {
        rec: String,
        user: String,
        coll: String,
        record: PageRecord,
    },
    SkipRequest { url: String },
}

impl FallbackJob {
    pub fn cookie(user: &str, rec: Option<&str>, cookie: &CookieAssignment) -> Self {
        FallbackJob::Cookie {
            user: user.to_string(),
            body: CookieBody {
                domain: cookie.domain.clone(),
                name: cookie.name.clone(),
                rec: rec.unwrap_or_default().to_string(),
                value: cookie.value.clone(),
            },
        }
    }

    /// Unencoded path segments below the API base.
    pub fn segments(&self) -> Vec<&str> {
        match self {
            FallbackJob::Cookie { .. } => vec!["auth", "cookie"],
            FallbackJob::Page { rec, .. } => vec!["recording", rec.as_str(), "pages"],
            FallbackJob::SkipRequest { .. } => vec!["auth", "skipreq"],
        }
    }

    /// Full request URL; each segment is percent-encoded on its own.
    pub fn endpoint(&self, api_base: &Url) -> FallbackResult<Url> {
        let mut url = api_base.clone();
        url.path_segments_mut()
            .map_err(|_| FallbackError::Transport(format!("api base {api_base} cannot take a path")))?
            .pop_if_empty()
            .extend(self.segments());
        Ok(url)
    }

    pub fn query(&self) -> Vec<(&'static str, &str)> {
        match self {
            FallbackJob::Cookie { user, .. } => vec![("user", user.as_str())],
            FallbackJob::Page { user, coll, .. } => {
                vec![("user", user.as_str()), ("coll", coll.as_str())]
            }
            FallbackJob::SkipRequest { .. } => Vec::new(),
        }
    }

    pub fn body(&self) -> FallbackResult<serde_json::Value> {
        let value = match self {
            FallbackJob::Cookie { body, .. } => serde_json::to_value(body),
            FallbackJob::Page { record, .. } => serde_json::to_value(record),
            FallbackJob::SkipRequest { url } => Ok(serde_json::json!({ "url": url })),
        };
        value.map_err(|err| FallbackError::Transport(err.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FallbackJob::Cookie { .. } => "cookie",
            FallbackJob::Page { .. } => "page",
            FallbackJob::SkipRequest { .. } => "skipreq",
        }
    }
}

#[async_trait]
pub trait FallbackTransport: Send + Sync {
    async fn deliver(&self, job: &FallbackJob) -> FallbackResult<()>;
}

/// `reqwest` client for the recording API.
#[derive(Clone)]
pub struct HttpFallbackReporter {
    http: Client,
    api_base: Url,
}

impl HttpFallbackReporter {
    pub fn new(api_base: Url) -> Self {
        Self {
            http: Client::new(),
            api_base,
        }
    }

    pub fn api_base(&self) -> &Url {
        &self.api_base
    }
}

#[async_trait]
impl FallbackTransport for HttpFallbackReporter {
    async fn deliver(&self, job: &FallbackJob) -> FallbackResult<()> {
        let url = job.endpoint(&self.api_base)?;
        let res = self
            .http
            .post(url)
            .query(&job.query())
            .json(&job.body()?)
            .send()
            .await?;

        if res.status().is_success() {
            Ok(())
        } else {
            let status = res.status();
            let body = res.text().await.unwrap_or_default();
            Err(FallbackError::UnexpectedStatus { status, body })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cookie_job_defaults_missing_recording_to_empty() {
        let cookie = CookieAssignment {
            name: "sid".into(),
            value: "1".into(),
            domain: "example.com".into(),
        };
        let job = FallbackJob::cookie("alice", None, &cookie);
        assert_eq!(job.segments(), vec!["auth", "cookie"]);
        assert_eq!(job.query(), vec![("user", "alice")]);
        assert_eq!(
            job.body().unwrap(),
            serde_json::json!({"domain": "example.com", "name": "sid", "rec": "", "value": "1"})
        );
    }

    #[test]
    fn page_job_routes_by_recording() {
        let job = FallbackJob::Page {
            rec: "r1".into(),
            user: "alice".into(),
            coll: "default".into(),
            record: PageRecord {
                url: "http://example.com/".into(),
                timestamp: None,
                title: None,
                is_new_page: true,
                is_error: false,
            },
        };
        assert_eq!(job.segments(), vec!["recording", "r1", "pages"]);
        assert_eq!(job.query(), vec![("user", "alice"), ("coll", "default")]);
        assert_eq!(job.kind(), "page");
    }

    fn page_job(rec: &str) -> FallbackJob {
        FallbackJob::Page {
            rec: rec.into(),
            user: "alice".into(),
            coll: "default".into(),
            record: PageRecord {
                url: "http://example.com/".into(),
                timestamp: None,
                title: None,
                is_new_page: true,
                is_error: false,
            },
        }
    }

    #[test]
    fn endpoint_ignores_trailing_slash_on_base() {
        let base = Url::parse("http://localhost:8089/api/v1/").unwrap();
        assert_eq!(
            page_job("r1").endpoint(&base).unwrap().as_str(),
            "http://localhost:8089/api/v1/recording/r1/pages"
        );
        let base = Url::parse("http://localhost:8089/api/v1").unwrap();
        assert_eq!(
            FallbackJob::SkipRequest { url: "http://a/".into() }
                .endpoint(&base)
                .unwrap()
                .as_str(),
            "http://localhost:8089/api/v1/auth/skipreq"
        );
    }

    #[test]
    fn recording_id_cannot_change_the_route() {
        let base = Url::parse("http://localhost:8089/api/v1").unwrap();
        let url = page_job("a/b?c#d").endpoint(&base).unwrap();
        assert_eq!(url.path(), "/api/v1/recording/a%2Fb%3Fc%23d/pages");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn opaque_base_is_rejected() {
        let base = Url::parse("mailto:api@example.com").unwrap();
        assert!(matches!(
            page_job("r1").endpoint(&base),
            Err(FallbackError::Transport(_))
        ));
    }
}
