//! HTTP client for the path oracle.

use async_trait::async_trait;
use reqwest::StatusCode;
use tracing::debug;

use super::{OracleApi, OracleConfig, Report, ScoringQuery, ScoringResponse};
use crate::error::{OracleError, Result};
use crate::types::{IsdAs, PathFingerprint};

/// `reqwest` backed oracle client.
///
/// Built once at startup and shared by reference between selectors and
/// tracers.
#[derive(Debug, Clone)]
pub struct OracleClient {
    http: reqwest::Client,
    location: String,
}

impl OracleClient {
    pub fn new(config: &OracleConfig) -> Result<Self> {
        if !config.is_configured() {
            return Err(OracleError::NoLocation.into());
        }

        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(OracleError::from)?;

        Ok(Self {
            http,
            location: config.location.clone(),
        })
    }

    fn scoring_url(&self) -> String {
        format!("http://{}/scorings/", self.location)
    }

    fn reporting_url(&self, dst: IsdAs, fp: &PathFingerprint) -> String {
        format!("http://{}/reports/{}/{}/{}/", self.location, dst.isd, dst.asn, fp)
    }
}

fn check_status(status: StatusCode) -> Result<()> {
    if status.is_success() {
        Ok(())
    } else {
        Err(OracleError::Status { status: status.as_u16() }.into())
    }
}

#[async_trait]
impl OracleApi for OracleClient {
    async fn fetch_scores(&self, query: &ScoringQuery) -> Result<ScoringResponse> {
        let res = self
            .http
            .post(self.scoring_url())
            .json(query)
            .send()
            .await
            .map_err(OracleError::from)?;

        check_status(res.status())?;

        let body = res.bytes().await.map_err(OracleError::from)?;
        let scorings = serde_json::from_slice(&body)
            .map_err(|e| OracleError::Malformed(e.to_string()))?;
        Ok(scorings)
    }

    async fn report_stats(&self, report: &Report) -> Result<()> {
        let url = self.reporting_url(report.dst_ia, &report.path_fp);
        debug!(%url, "submitting report");

        let res = self
            .http
            .post(url)
            .json(report)
            .send()
            .await
            .map_err(OracleError::from)?;

        check_status(res.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_requires_location() {
        let err = OracleClient::new(&OracleConfig::default()).unwrap_err();
        assert!(matches!(err, Error::Oracle(OracleError::NoLocation)));
    }

    #[test]
    fn test_urls() {
        let client = OracleClient::new(&OracleConfig::with_location("oracle:8080")).unwrap();
        assert_eq!(client.scoring_url(), "http://oracle:8080/scorings/");

        let dst = IsdAs::new(1, 0xff00_0000_0111);
        assert_eq!(
            client.reporting_url(dst, &"abc".into()),
            format!("http://oracle:8080/reports/1/{}/abc/", 0xff00_0000_0111u64)
        );
    }
}
