use crate::error::{ChartError, ChartResult};
use crate::models::{Anomaly, MetricOffset, PreviewResponse, TimeSeries, ValidatedReport};
use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;
use std::time::Duration;
use url::Url;

/// Detection backend the view reads anomalies, predictions and series from.
#[async_trait]
pub trait DetectionApi: Send + Sync {
    async fn fetch_anomalies_by_alert(&self, alert_id: i64, start: i64, end: i64)
        -> ChartResult<Vec<Anomaly>>;

    /// Evaluates a configuration that has not been saved.
    async fn fetch_yaml_preview_anomalies(
        &self,
        config_yaml: &str,
        start: i64,
        end: i64,
        alert_id: i64,
    ) -> ChartResult<PreviewResponse>;

    /// Evaluates the saved configuration, with diagnostics.
    async fn fetch_bounds(&self, alert_id: i64, start: i64, end: i64) -> ChartResult<PreviewResponse>;

    async fn fetch_metric_timeseries(
        &self,
        urn: &str,
        start: i64,
        end: i64,
        offset: MetricOffset,
        timezone: &str,
    ) -> ChartResult<TimeSeries>;

    async fn report_anomaly(
        &self,
        alert_id: i64,
        metric_urn: &str,
        report: &ValidatedReport,
    ) -> ChartResult<()>;
}

#[derive(Clone)]
pub struct HttpDetectionApi {
    base_url: String,
    http: reqwest::Client,
    timeout: Duration,
}

impl HttpDetectionApi {
    pub fn new(base_url: &str, http: reqwest::Client, timeout: Duration) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
            timeout,
        }
    }

    fn url(&self, path: &str, query: &[(&str, String)]) -> ChartResult<Url> {
        let mut url = Url::parse(&format!("{}{}", self.base_url, path))
            .map_err(|err| ChartError::fetch(format!("invalid url for {path}: {err}")))?;
        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: Url,
        body: Option<String>,
    ) -> ChartResult<T> {
        let mut request = self.http.request(method, url.clone()).timeout(self.timeout);
        if let Some(body) = body {
            request = request
                .header(reqwest::header::CONTENT_TYPE, "text/plain")
                .body(body);
        }
        let resp = request.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ChartError::fetch(format!(
                "{} returned {} {}",
                url.path(),
                status,
                body.trim()
            )));
        }
        resp.json::<T>()
            .await
            .map_err(|err| ChartError::fetch(format!("{} payload: {err}", url.path())))
    }
}

#[async_trait]
impl DetectionApi for HttpDetectionApi {
    async fn fetch_anomalies_by_alert(
        &self,
        alert_id: i64,
        start: i64,
        end: i64,
    ) -> ChartResult<Vec<Anomaly>> {
        let url = self.url(
            &format!("/detection/{alert_id}/anomalies"),
            &[("start", start.to_string()), ("end", end.to_string())],
        )?;
        self.send_json(Method::GET, url, None).await
    }

    async fn fetch_yaml_preview_anomalies(
        &self,
        config_yaml: &str,
        start: i64,
        end: i64,
        alert_id: i64,
    ) -> ChartResult<PreviewResponse> {
        let url = self.url(
            "/yaml/preview",
            &[
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("tuningStart", "0".to_string()),
                ("tuningEnd", "0".to_string()),
                ("alertId", alert_id.to_string()),
            ],
        )?;
        self.send_json(Method::POST, url, Some(config_yaml.to_string()))
            .await
    }

    async fn fetch_bounds(&self, alert_id: i64, start: i64, end: i64) -> ChartResult<PreviewResponse> {
        let url = self.url(
            &format!("/detection/preview/{alert_id}"),
            &[
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("diagnostics", "true".to_string()),
            ],
        )?;
        self.send_json(Method::POST, url, Some(String::new())).await
    }

    async fn fetch_metric_timeseries(
        &self,
        urn: &str,
        start: i64,
        end: i64,
        offset: MetricOffset,
        timezone: &str,
    ) -> ChartResult<TimeSeries> {
        let url = self.url(
            "/rootcause/metric/timeseries",
            &[
                ("urn", urn.to_string()),
                ("start", start.to_string()),
                ("end", end.to_string()),
                ("offset", offset.as_str().to_string()),
                ("timezone", timezone.to_string()),
            ],
        )?;
        self.send_json(Method::GET, url, None).await
    }

    async fn report_anomaly(
        &self,
        alert_id: i64,
        metric_urn: &str,
        report: &ValidatedReport,
    ) -> ChartResult<()> {
        let mut query = vec![("metricUrn".to_string(), metric_urn.to_string())];
        query.extend(report.query_pairs());
        let query: Vec<(&str, String)> = query
            .iter()
            .map(|(key, value)| (key.as_str(), value.clone()))
            .collect();
        let url = self.url(&format!("/detection/report-anomaly/{alert_id}"), &query)?;
        let resp = self
            .http
            .post(url.clone())
            .timeout(self.timeout)
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(ChartError::fetch(format!(
                "{} returned {}",
                url.path(),
                resp.status()
            )));
        }
        Ok(())
    }
}
