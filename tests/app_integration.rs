use anyhow::Result;
use async_trait::async_trait;
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tickerbot::bot::{Broadcaster, ChatPlatform, InboundMessage, TickOutcome};
use tickerbot::core::BotError;
use tickerbot::core::aggregator::PriceAggregator;
use tickerbot::core::cache::RateCache;
use tickerbot::core::converter::CurrencyConverter;
use tickerbot::core::{Currency, CurrencyRateProvider};
use tickerbot::providers::exchangerate_host::ExchangeRateHostProvider;
use tickerbot::providers::yahoo_finance::{YahooCurrencyProvider, YahooFinanceProvider};

mod test_utils {
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub const CHART_3350: &str = r#"{
        "chart": {
            "result": [{
                "meta": { "currency": "JPY" },
                "timestamp": [1717372800, 1717459200],
                "indicators": { "quote": [{ "close": [15000.0, 15300.0] }] }
            }]
        }
    }"#;

    pub async fn mount(server: &MockServer, url_path: &str, status: u16, body: &str) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(server)
            .await;
    }

    /// Yahoo serves the chart but its FX endpoint is down; exchangerate.host answers.
    pub async fn create_mock_server() -> MockServer {
        let server = MockServer::start().await;
        mount(&server, "/v8/finance/chart/3350.T", 200, CHART_3350).await;
        mount(&server, "/v8/finance/chart/JPYUSD=X", 500, "").await;
        mount(
            &server,
            "/latest",
            200,
            r#"{"base": "JPY", "rates": {"USD": "0,0067"}}"#,
        )
        .await;
        server
    }

    pub fn write_config(server_uri: &str, symbol: &str) -> tempfile::NamedTempFile {
        let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
        let config_content = format!(
            r#"
instrument:
  symbol: "{symbol}"
  source: yahoo
  display_currency: USD
session:
  venue: Tokyo
  timezone: Asia/Tokyo
  roll_over_weekends: true
  events:
    - {{ label: "Market Open", at: "09:00" }}
    - {{ label: "Market Close", at: "15:00" }}
providers:
  yahoo:
    base_url: "{server_uri}"
  exchangerate_host:
    base_url: "{server_uri}"
"#
        );
        std::fs::write(config_file.path(), config_content).expect("Failed to write config file");
        config_file
    }
}

#[derive(Default)]
struct PresenceLog(Mutex<Vec<String>>);

#[async_trait]
impl ChatPlatform for PresenceLog {
    async fn set_presence(&self, text: &str) -> Result<()> {
        self.0.lock().unwrap().push(text.to_string());
        Ok(())
    }

    async fn send_message(&self, _channel: &str, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn send_direct_message(&self, _user_id: &str, _text: &str) -> Result<()> {
        Ok(())
    }

    async fn delete_message(&self, _message: &InboundMessage) -> Result<()> {
        Ok(())
    }
}

#[test_log::test(tokio::test)]
async fn test_status_command_with_mock() {
    let mock_server = test_utils::create_mock_server().await;
    let config_file = test_utils::write_config(&mock_server.uri(), "3350.T");

    let result = tickerbot::run_command(
        tickerbot::AppCommand::Status,
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Status failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_status_command_without_history_fails() {
    let mock_server = wiremock::MockServer::start().await;
    test_utils::mount(
        &mock_server,
        "/v8/finance/chart/NEW.T",
        200,
        r#"{"chart": {"result": [{"meta": {"currency": "JPY"}}]}}"#,
    )
    .await;
    let config_file = test_utils::write_config(&mock_server.uri(), "NEW.T");

    let err = tickerbot::run_command(
        tickerbot::AppCommand::Status,
        Some(config_file.path().to_str().unwrap()),
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BotError>(),
        Some(BotError::NoData { observations: 0, .. })
    ));
}

#[test_log::test(tokio::test)]
async fn test_wen_command() {
    let config_file = test_utils::write_config("http://127.0.0.1:9", "3350.T");
    let result = tickerbot::run_command(
        tickerbot::AppCommand::Wen,
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(result.is_ok(), "Wen failed with: {:?}", result.err());
}

#[test_log::test(tokio::test)]
async fn test_invalid_config_is_reported() {
    let config_file = tempfile::NamedTempFile::new().unwrap();
    fs::write(config_file.path(), "instrument: [").unwrap();

    let err = tickerbot::run_command(
        tickerbot::AppCommand::Status,
        Some(config_file.path().to_str().unwrap()),
    )
    .await
    .unwrap_err();
    assert!(err.to_string().contains("Failed to parse config file"));
}

#[test_log::test(tokio::test)]
async fn test_broadcast_pipeline_falls_back_to_secondary_rate() {
    let mock_server = test_utils::create_mock_server().await;
    let uri = mock_server.uri();
    let timeout = Duration::from_secs(5);

    let primary: Arc<dyn CurrencyRateProvider> =
        Arc::new(YahooCurrencyProvider::new(&uri, timeout).unwrap());
    let secondary: Arc<dyn CurrencyRateProvider> =
        Arc::new(ExchangeRateHostProvider::new(&uri, None, timeout).unwrap());
    let converter = Arc::new(CurrencyConverter::new(primary, Some(secondary)));
    let rate_cache = RateCache::new();
    let aggregator = PriceAggregator::new(
        "3350.T",
        Arc::new(YahooFinanceProvider::new(&uri, timeout).unwrap()),
        converter,
        rate_cache.clone(),
    )
    .with_display_currency(Some(Currency::Usd));

    let chat = Arc::new(PresenceLog::default());
    let mut broadcaster = Broadcaster::new(
        Arc::new(aggregator),
        chat.clone(),
        Duration::from_secs(15),
        timeout,
    );

    assert_eq!(broadcaster.tick().await, TickOutcome::Published);
    assert_eq!(broadcaster.tick().await, TickOutcome::Unchanged);
    assert_eq!(
        *chat.0.lock().unwrap(),
        vec!["¥1.53万  $102.51  +2.00%".to_string()]
    );

    let cached = rate_cache.get().await.expect("rate should be cached");
    assert_eq!(cached.from, Currency::Jpy);
    assert_eq!(cached.to, Currency::Usd);
    assert_eq!(cached.rate, 0.0067);
}
