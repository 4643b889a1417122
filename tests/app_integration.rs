use std::fs;
use std::sync::Arc;
use tracing::info;
use walletbook::core::{Clock, SystemClock, Window};

const CHARACTER: i64 = 90000001;
const CORPORATION: i64 = 98000001;

// Adds automatic logging to test
mod test_utils {
    use super::{CHARACTER, CORPORATION};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn entry(id: i64, amount: f64, ref_type: &str, date: &str) -> serde_json::Value {
        json!({
            "id": id,
            "amount": amount,
            "balance": 1_000_000.0,
            "ref_type": ref_type,
            "date": date,
            "description": "integration"
        })
    }

    pub async fn mount_character(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path(format!("/characters/{CHARACTER}/")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({ "corporation_id": CORPORATION })),
            )
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path(format!("/corporations/{CORPORATION}/divisions/")))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "wallet": [{ "division": 1 }, { "division": 2, "name": "Industry" }]
            })))
            .mount(server)
            .await;
    }

    /// Serves division 1 as one page and division 2 as two pages, each fetched once.
    pub async fn create_mock_server() -> MockServer {
        let server = MockServer::start().await;
        mount_character(&server).await;

        Mock::given(method("GET"))
            .and(path(format!("/corporations/{CORPORATION}/wallets/1/journal/")))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Pages", "1")
                    .set_body_json(json!([
                        entry(1, 100.0, "bounty_prizes", "2024-03-02T10:00:00Z"),
                        entry(2, -30.0, "brokers_fee", "2024-03-03T10:00:00Z"),
                        entry(3, 999.0, "bounty_prizes", "2024-02-20T10:00:00Z")
                    ])),
            )
            .expect(1)
            .mount(&server)
            .await;

        let journal_2 = format!("/corporations/{CORPORATION}/wallets/2/journal/");
        Mock::given(method("GET"))
            .and(path(journal_2.clone()))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Pages", "2")
                    .set_body_json(json!([entry(10, -40.0, "manufacturing", "2024-03-04T08:00:00Z")])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(journal_2))
            .and(query_param("page", "2"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Pages", "2")
                    .set_body_json(json!([entry(11, 90.0, "market_transaction", "2024-03-04T09:00:00Z")])),
            )
            .expect(1)
            .mount(&server)
            .await;

        server
    }
}

fn write_config(server_uri: &str, data_dir: &std::path::Path) -> tempfile::NamedTempFile {
    let config_file = tempfile::NamedTempFile::new().expect("Failed to create temp file");
    let config_content = format!(
        r#"
        accounts:
          - character_id: {CHARACTER}
            token: "integration-token"
        providers:
          esi:
            base_url: {server_uri}
        data_path: "{}"
    "#,
        data_dir.display()
    );
    fs::write(config_file.path(), &config_content).expect("Failed to write config file");
    config_file
}

fn march() -> Window {
    Window::parse("2024-03-01", "2024-03-31").unwrap()
}

#[test_log::test(tokio::test)]
async fn test_full_app_flow_with_mock() {
    let server = test_utils::create_mock_server().await;
    let data_dir = tempfile::tempdir().unwrap();
    let config_file = write_config(&server.uri(), data_dir.path());

    let result = walletbook::run_command(
        walletbook::AppCommand::ByDivision(Some(march())),
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    assert!(
        result.is_ok(),
        "Main function failed with: {:?}",
        result.err()
    );
}

#[test_log::test(tokio::test)]
async fn test_reports_share_cached_journals() {
    let server = test_utils::create_mock_server().await;
    let data_dir = tempfile::tempdir().unwrap();
    let config_file = write_config(&server.uri(), data_dir.path());

    let config = walletbook::config::AppConfig::load_from_path(config_file.path()).unwrap();
    let clock: Arc<dyn Clock> = Arc::new(SystemClock);
    let accountant = walletbook::build_accountant(&config, clock).await.unwrap();

    let balance = accountant.balance(Some(march())).await.unwrap();
    info!(?balance, "March balance");
    assert_eq!(balance.income, 190.0);
    assert_eq!(balance.expenses, -70.0);

    // Served from the store: every journal mock expects a single request.
    let by_type = accountant.balance_by_type(Some(march())).await.unwrap();
    assert_eq!(by_type.income_by_type["Krab Tax"], 100.0);
    assert_eq!(by_type.income_by_type["Market Transaction"], 90.0);
    assert_eq!(by_type.expenses_by_type["Market Transaction"], -30.0);
    assert_eq!(by_type.expenses_by_type["Job Costs"], -40.0);

    let by_division = accountant.balance_by_division(Some(march())).await.unwrap();
    assert_eq!(by_division.income_by_division["Main"], 100.0);
    assert_eq!(by_division.income_by_division["Industry"], 90.0);

    let february = Window::parse("2024-02-01", "2024-02-29").unwrap();
    assert_eq!(accountant.balance(Some(february)).await.unwrap().income, 999.0);

    let series = accountant
        .balance_by_day_by_division_by_type(Some(Window::parse("2024-03-01", "2024-03-07").unwrap()))
        .await
        .unwrap();
    assert_eq!(series.len(), 7);
    assert_eq!(series[3].division_balance("Industry"), 50.0);
    assert_eq!(series[6].division_balance("Main"), 0.0);
}

#[test_log::test(tokio::test)]
async fn test_unauthorized_journal_fails_report() {
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, ResponseTemplate};

    let server = wiremock::MockServer::start().await;
    test_utils::mount_character(&server).await;
    Mock::given(method("GET"))
        .and(path_regex(r"^/corporations/\d+/wallets/\d+/journal/$"))
        .respond_with(ResponseTemplate::new(403).set_body_string("token is expired"))
        .mount(&server)
        .await;

    let data_dir = tempfile::tempdir().unwrap();
    let config_file = write_config(&server.uri(), data_dir.path());

    let result = walletbook::run_command(
        walletbook::AppCommand::Balance(Some(march())),
        Some(config_file.path().to_str().unwrap()),
    )
    .await;
    let err = result.expect_err("report should fail");
    assert!(format!("{err:#}").contains("unauthorized"), "{err:#}");
}

#[test_log::test(tokio::test)]
async fn test_missing_config_file() {
    let result = walletbook::run_command(
        walletbook::AppCommand::Status,
        Some("/definitely/not/here/config.yaml"),
    )
    .await;
    assert!(result.unwrap_err().to_string().contains("Failed to read config file"));
}
