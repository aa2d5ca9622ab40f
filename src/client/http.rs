use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};

use super::point::encode_batch;
use super::{Point, TimeSeriesClient};
use crate::config::{ClientConfig, WritePrecision};
use crate::error::{Error, Result};

/// InfluxDB v2 write API over HTTP.
///
/// One request per call; retry policy is left to whoever wraps it.
pub struct HttpClient {
    http: reqwest::Client,
    write_url: String,
    token: Option<String>,
    org: Option<String>,
    bucket: Option<String>,
}

impl HttpClient {
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(config.open_timeout)
            .timeout(config.write_timeout + config.read_timeout)
            .build()?;

        let base = config.url.trim_end_matches('/');
        if base.is_empty() {
            return Err(Error::Config("client url is empty".into()));
        }

        Ok(Self {
            http,
            write_url: format!("{base}/api/v2/write"),
            token: config.token.clone(),
            org: config.org.clone(),
            bucket: config.bucket.clone(),
        })
    }

    pub fn write_url(&self) -> &str {
        &self.write_url
    }
}

#[async_trait]
impl TimeSeriesClient for HttpClient {
    async fn write(&self, points: &[Point], precision: WritePrecision) -> Result<()> {
        let body = encode_batch(points);
        if body.is_empty() {
            return Ok(());
        }

        let mut query: Vec<(&str, &str)> = vec![("precision", precision.as_str())];
        if let Some(org) = &self.org {
            query.push(("org", org.as_str()));
        }
        if let Some(bucket) = &self.bucket {
            query.push(("bucket", bucket.as_str()));
        }

        let mut req = self
            .http
            .post(&self.write_url)
            .query(&query)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body);
        if let Some(token) = &self.token {
            req = req.header(AUTHORIZATION, format!("Token {token}"));
        }

        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        Err(Error::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_url_is_derived_from_base_url() {
        let cfg = ClientConfig {
            url: "http://influx.internal:8086/".into(),
            ..ClientConfig::default()
        };
        let client = HttpClient::new(&cfg).unwrap();
        assert_eq!(client.write_url(), "http://influx.internal:8086/api/v2/write");
    }

    #[test]
    fn empty_url_is_rejected() {
        let cfg = ClientConfig {
            url: String::new(),
            ..ClientConfig::default()
        };
        assert!(matches!(HttpClient::new(&cfg), Err(Error::Config(_))));
    }

    #[tokio::test]
    async fn unreachable_server_surfaces_an_http_error() {
        let cfg = ClientConfig {
            // port 9 (discard) on localhost is closed in test environments
            url: "http://127.0.0.1:9".into(),
            open_timeout: std::time::Duration::from_millis(200),
            ..ClientConfig::default()
        };
        let client = HttpClient::new(&cfg).unwrap();
        let mut point = Point {
            measurement: "axum".into(),
            tags: Default::default(),
            fields: Default::default(),
            timestamp: Some(1),
        };
        point.fields.insert("value".into(), 1i64.into());
        assert!(matches!(
            client.write(&[point], WritePrecision::Millisecond).await,
            Err(Error::Http(_))
        ));
    }
}
