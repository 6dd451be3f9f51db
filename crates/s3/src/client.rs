//! reqwest-backed transport
//!
//! Sends requests path-style (`{endpoint}/{bucket}/{key}`), signs them when
//! credentials are configured and hands the raw status, headers and body back
//! to the engine. It never retries on its own; that is the engine's job.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Method as HttpMethod};
use url::Url;
use xfer_core::{
    Alias, Error, Method, Request, Response, Result, Transport, TransportError, TransportErrorKind,
};

use crate::signing::Signer;

const DEFAULT_TIMEOUT_SECS: u64 = 300;
const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Builder for [`HttpTransport`]
#[derive(Debug, Clone)]
pub struct TransportBuilder {
    endpoint: String,
    credentials: Option<(String, String)>,
    region: String,
    timeout: Duration,
    connect_timeout: Duration,
}

impl TransportBuilder {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            credentials: None,
            region: "us-east-1".to_string(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
        }
    }

    pub fn credentials(mut self, access_key: impl Into<String>, secret_key: impl Into<String>) -> Self {
        self.credentials = Some((access_key.into(), secret_key.into()));
        self
    }

    pub fn region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }

    /// Upper bound on one whole exchange
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpTransport> {
        let endpoint = Url::parse(self.endpoint.trim_end_matches('/'))
            .map_err(|e| Error::Config(format!("invalid endpoint '{}': {e}", self.endpoint)))?;
        if !matches!(endpoint.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "unsupported endpoint scheme '{}'",
                endpoint.scheme()
            )));
        }

        let client = Client::builder()
            .timeout(self.timeout)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {e}")))?;

        let signer = self
            .credentials
            .as_ref()
            .filter(|(ak, sk)| !ak.is_empty() && !sk.is_empty())
            .map(|(ak, sk)| Signer::new(ak, sk, &self.region));

        Ok(HttpTransport {
            client,
            endpoint,
            signer,
        })
    }
}

/// Transport that talks to an S3-compatible endpoint over HTTP(S)
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    endpoint: Url,
    signer: Option<Signer>,
}

impl HttpTransport {
    /// Transport for a configured alias
    pub fn from_alias(alias: &Alias) -> Result<Self> {
        TransportBuilder::new(&alias.endpoint)
            .credentials(&alias.access_key, &alias.secret_key)
            .region(&alias.region)
            .build()
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Full URL for a request: endpoint path prefix, request path, query
    fn url(&self, request: &Request) -> String {
        let base = self.endpoint.as_str().trim_end_matches('/');
        let mut url = format!("{base}{}", request.path);
        if !request.query.is_empty() {
            let query: Vec<String> = request
                .query
                .iter()
                .map(|(k, v)| {
                    if v.is_empty() {
                        urlencode(k)
                    } else {
                        format!("{}={}", urlencode(k), urlencode(v))
                    }
                })
                .collect();
            url.push('?');
            url.push_str(&query.join("&"));
        }
        url
    }
}

fn urlencode(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

fn http_method(method: Method) -> HttpMethod {
    match method {
        Method::Get => HttpMethod::GET,
        Method::Head => HttpMethod::HEAD,
        Method::Put => HttpMethod::PUT,
        Method::Post => HttpMethod::POST,
        Method::Delete => HttpMethod::DELETE,
    }
}

fn transport_error(error: reqwest::Error) -> TransportError {
    let kind = if error.is_timeout() {
        TransportErrorKind::Timeout
    } else if error.is_connect() {
        TransportErrorKind::Connect
    } else if error.is_body() || error.is_request() {
        TransportErrorKind::Io
    } else {
        TransportErrorKind::Other
    };
    TransportError::new(kind, error.to_string())
}

#[async_trait]
impl Transport for HttpTransport {
    async fn exchange(&self, request: Request) -> std::result::Result<Response, TransportError> {
        let url = self.url(&request);
        let method = request.method;

        let mut headers = request.headers.clone();
        if let Some(signer) = &self.signer {
            let signed = signer
                .sign(method.as_str(), &url, &headers, &request.body)
                .map_err(|e| TransportError::new(TransportErrorKind::Other, e.to_string()))?;
            headers.extend(signed);
        }

        let mut builder = self.client.request(http_method(method), &url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if !request.body.is_empty() || matches!(method, Method::Put | Method::Post) {
            builder = builder.body(request.body);
        }

        tracing::trace!(method = %method, url = %url, "Sending request");

        let response = builder.send().await.map_err(transport_error)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body: Bytes = if method == Method::Head {
            Bytes::new()
        } else {
            response.bytes().await.map_err(transport_error)?
        };

        Ok(Response {
            status,
            headers,
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_building() {
        let transport = TransportBuilder::new("http://localhost:9000/").build().unwrap();
        let request = Request::object(Method::Put, "mybucket", "dir/file name.txt")
            .query("partNumber", "2")
            .query("uploadId", "abc/def+1");
        assert_eq!(
            transport.url(&request),
            "http://localhost:9000/mybucket/dir/file%20name.txt?partNumber=2&uploadId=abc%2Fdef%2B1"
        );

        let initiate = Request::object(Method::Post, "mybucket", "k").query("uploads", "");
        assert_eq!(
            transport.url(&initiate),
            "http://localhost:9000/mybucket/k?uploads"
        );
    }

    #[test]
    fn test_endpoint_with_path_prefix() {
        let transport = TransportBuilder::new("https://gateway.example.com/s3")
            .build()
            .unwrap();
        let request = Request::object(Method::Head, "b", "k");
        assert_eq!(transport.url(&request), "https://gateway.example.com/s3/b/k");
    }

    #[test]
    fn test_invalid_endpoints() {
        assert!(TransportBuilder::new("not a url").build().is_err());
        assert!(TransportBuilder::new("ftp://example.com").build().is_err());
    }

    #[test]
    fn test_signer_only_with_credentials() {
        let anonymous = TransportBuilder::new("http://localhost:9000").build().unwrap();
        assert!(anonymous.signer.is_none());

        let alias = Alias::new("local", "http://localhost:9000", "ak", "sk");
        let signed = HttpTransport::from_alias(&alias).unwrap();
        assert!(signed.signer.is_some());
        assert_eq!(signed.endpoint().as_str(), "http://localhost:9000/");
    }

    #[tokio::test]
    async fn test_connection_refused_is_transport_error() {
        // Port 9 (discard) on localhost is almost never listening
        let transport = TransportBuilder::new("http://127.0.0.1:9")
            .connect_timeout(Duration::from_millis(500))
            .timeout(Duration::from_secs(2))
            .build()
            .unwrap();
        let err = transport
            .exchange(Request::object(Method::Head, "b", "k"))
            .await
            .unwrap_err();
        assert!(matches!(
            err.kind,
            TransportErrorKind::Connect | TransportErrorKind::Timeout
        ));
    }
}
