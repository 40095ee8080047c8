//! Mock tests for the monitoring client

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::monitoring::{HttpMonitoringClient, MonitoringSource};

    fn client(server: &MockServer) -> HttpMonitoringClient {
        HttpMonitoringClient::new(server.uri(), Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_fetch_summary() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/executions/exec-42/summary"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "totalAlerts": 7,
                "alertsBySeverity": { "critical": 1, "medium": 6 },
                "topPatterns": [
                    { "pattern": "Outbound beacon", "count": 4 },
                    { "pattern": "Privilege escalation", "count": 1 }
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let context = client(&server).fetch("exec-42").await.unwrap();
        assert_eq!(context.total_alerts, 7);
        assert_eq!(context.alerts_by_severity.get("critical"), Some(&1));
        assert_eq!(context.top_patterns.len(), 2);
        assert_eq!(context.top_patterns[0].pattern, "Outbound beacon");
    }

    #[tokio::test]
    async fn test_not_found_is_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/executions/missing/summary"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = client(&server).fetch("missing").await.unwrap_err();
        assert!(err.to_string().contains("HTTP 404"));
    }

    #[tokio::test]
    async fn test_malformed_body_is_unavailable() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/executions/exec-1/summary"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>gateway</html>"))
            .mount(&server)
            .await;

        assert!(client(&server).fetch("exec-1").await.is_err());
    }
}
