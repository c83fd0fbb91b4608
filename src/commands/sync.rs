//! Sync command - reconcile Readwise highlights into the Notion database

use crate::config::Config;
use crate::destination::create_destination;
use crate::error::Result;
use crate::source::create_source;
use crate::state::StateDb;
use crate::sync::{print_sync_stats, run_sync, SyncOptions, SyncReport, SyncWindow};
use chrono::Utc;
use tracing::info;

/// Execute one sync run against the configured services
pub async fn cmd_sync(
    config: &Config,
    db: &StateDb,
    window: SyncWindow,
    show_progress: bool,
) -> Result<SyncReport> {
    let source = create_source(config)?;
    let destination = create_destination(config)?;

    let mut options = SyncOptions::from_config(config, window);
    options.show_progress = show_progress;

    let now = Utc::now();
    info!(?window, "Starting sync");

    run_sync(source.as_ref(), destination.as_ref(), db, &options, now).await
}

/// Print a sync report to console
pub fn print_sync_report(report: &SyncReport) {
    match report.lower_bound {
        Some(bound) => println!("\nWindow: highlights since {}", bound.to_rfc3339()),
        None => println!("\nWindow: full sync"),
    }
    print_sync_stats(&report.stats);
    println!("\nNext sync starts from {}", report.watermark.to_rfc3339());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn mock_config(tmp: &TempDir, readwise: &MockServer, notion: &MockServer) -> Config {
        std::env::set_var("RNS_TEST_SYNC_READWISE_TOKEN", "rw");
        std::env::set_var("RNS_TEST_SYNC_NOTION_TOKEN", "nt");

        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.readwise.base_url = readwise.uri();
        config.readwise.requests_per_minute = 6000;
        config.readwise.token_env = "RNS_TEST_SYNC_READWISE_TOKEN".to_string();
        config.notion.base_url = notion.uri();
        config.notion.token_env = "RNS_TEST_SYNC_NOTION_TOKEN".to_string();
        config.notion.database_id = Some("db-e2e".to_string());
        config.notion.requests_per_second = 50;
        config.sync.days_to_sync = None;
        config
    }

    #[tokio::test]
    async fn test_sync_against_mock_services() {
        let readwise = MockServer::start().await;
        let notion = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/books/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next": null,
                "results": [{
                    "id": 77,
                    "title": "Meditations",
                    "author": "Marcus Aurelius",
                    "category": "books",
                    "num_highlights": 2,
                    "last_highlight_at": "2024-05-01T00:00:00Z"
                }]
            })))
            .mount(&readwise)
            .await;

        Mock::given(method("GET"))
            .and(path("/highlights/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next": null,
                "results": [
                    {"id": 1, "text": "You have power over your mind", "highlighted_at": "2024-04-01T00:00:00Z"},
                    {"id": 2, "text": "The impediment to action advances action", "highlighted_at": "2024-04-02T00:00:00Z"}
                ]
            })))
            .expect(1)
            .mount(&readwise)
            .await;

        Mock::given(method("POST"))
            .and(path("/databases/db-e2e/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [],
                "has_more": false,
                "next_cursor": null
            })))
            .mount(&notion)
            .await;

        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "page-77"})))
            .expect(1)
            .mount(&notion)
            .await;

        let tmp = TempDir::new().unwrap();
        let config = mock_config(&tmp, &readwise, &notion);

        let db = StateDb::connect(&config).await.unwrap();
        let report = cmd_sync(&config, &db, SyncWindow::All, false)
            .await
            .unwrap();

        assert_eq!(report.stats.items_fetched, 1);
        assert_eq!(report.stats.created, 1);
        assert_eq!(report.stats.highlights_appended, 2);
        assert_eq!(db.load_watermark().await.unwrap(), Some(report.watermark));
    }

    #[tokio::test]
    async fn test_unreadable_book_fails_alone() {
        let readwise = MockServer::start().await;
        let notion = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/books/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next": null,
                "results": [
                    {
                        "id": 1,
                        "title": "Walden",
                        "category": "books",
                        "num_highlights": 1,
                        "last_highlight_at": "2024-05-01T00:00:00Z"
                    },
                    {"id": 2, "title": "Broken", "num_highlights": null}
                ]
            })))
            .mount(&readwise)
            .await;

        Mock::given(method("GET"))
            .and(path("/highlights/"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "next": null,
                "results": [{"id": 10, "text": "Simplify, simplify", "highlighted_at": "2024-04-01T00:00:00Z"}]
            })))
            .expect(1)
            .mount(&readwise)
            .await;

        Mock::given(method("POST"))
            .and(path("/databases/db-e2e/query"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "results": [],
                "has_more": false,
                "next_cursor": null
            })))
            .mount(&notion)
            .await;

        Mock::given(method("POST"))
            .and(path("/pages"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "page-1"})))
            .expect(1)
            .mount(&notion)
            .await;

        let tmp = TempDir::new().unwrap();
        let config = mock_config(&tmp, &readwise, &notion);
        let db = StateDb::connect(&config).await.unwrap();

        let report = cmd_sync(&config, &db, SyncWindow::All, false)
            .await
            .unwrap();

        assert_eq!(report.stats.items_fetched, 2);
        assert_eq!(report.stats.created, 1);
        assert_eq!(report.stats.failed, 1);
        assert_eq!(report.stats.failures[0].id, "2");
        assert_eq!(db.load_watermark().await.unwrap(), Some(report.watermark));
    }

    #[tokio::test]
    async fn test_missing_token_is_reported_before_any_request() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.readwise.token_env = "RNS_TEST_SYNC_UNSET_TOKEN".to_string();

        let db = StateDb::connect(&config).await.unwrap();
        let err = cmd_sync(&config, &db, SyncWindow::default(), false)
            .await
            .unwrap_err();
        assert!(err.is_run_level());
        assert!(db.latest_run().await.unwrap().is_none());
    }
}
