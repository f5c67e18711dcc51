use httpmock::prelude::*;
use precon_etl::adapters::{ReqwestTransport, RetryPolicy, RetryingClient};
use precon_etl::core::cache::CacheStore;
use precon_etl::core::catalog::DEFAULT_CATALOG_TTL;
use precon_etl::core::cod;
use precon_etl::domain::model::{DeckRequest, FormatTag, OutputCard};
use precon_etl::domain::ports::ConfigProvider;
use precon_etl::utils::validation::Validate;
use precon_etl::{CatalogFetcher, DeckExportPipeline, ExportEngine, SourceRegistry, TomlConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn pipeline(server: &MockServer, cache_dir: &Path, output_dir: &Path) -> DeckExportPipeline {
    let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
    let client = RetryingClient::new(
        Arc::new(transport),
        RetryPolicy::new(2, Duration::from_millis(10)),
    );
    let fetcher = CatalogFetcher::new(
        CacheStore::open(cache_dir).unwrap(),
        client.clone(),
        &server.url("/api/v5/"),
        DEFAULT_CATALOG_TTL,
    )
    .unwrap();
    let registry = SourceRegistry::with_defaults(
        client,
        &server.url("/moxfield/v2"),
        &server.url("/goldfish"),
    );
    DeckExportPipeline::new(fetcher, registry, output_dir)
}

fn atraxa_detail() -> serde_json::Value {
    let mut main_board: Vec<serde_json::Value> = (0..98)
        .map(|i| {
            serde_json::json!({"name": format!("Test Card {i}"), "count": 1, "setCode": "C16", "number": format!("{}", 100 + i)})
        })
        .collect();
    main_board.push(serde_json::json!({"name": "Sol Ring", "count": 1, "setCode": "C16", "number": "272"}));

    serde_json::json!({
        "data": {
            "name": "Breed Lethality",
            "code": "C16",
            "type": "Commander Deck",
            "commander": [{"name": "Atraxa, Praetors' Voice", "count": 1, "setCode": "C16", "number": "28"}],
            "mainBoard": main_board,
            "sideBoard": []
        }
    })
}

#[tokio::test]
async fn test_commander_precon_exports_to_cod() {
    let temp_dir = TempDir::new().unwrap();
    let output_dir = temp_dir.path().join("decks");
    let server = MockServer::start();
    let detail_mock = server.mock(|when, then| {
        when.method(GET).path("/api/v5/decks/BreedLethality_C16.json");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(atraxa_detail());
    });

    let engine = ExportEngine::new(
        pipeline(&server, &temp_dir.path().join("cache"), &output_dir),
        2,
    );
    let report = engine
        .run(&DeckRequest::Catalog("BreedLethality_C16".to_string()))
        .await
        .unwrap();

    detail_mock.assert_hits(1);
    assert_eq!(report.format, FormatTag::Commander);
    assert_eq!(report.main_cards, 99);
    assert_eq!(report.side_cards, 1);
    assert_eq!(report.path, output_dir.join("Breed_Lethality.cod"));

    let written = cod::read(&report.path).unwrap();
    assert_eq!(written.name, "Breed Lethality");
    assert_eq!(written.banner, "Atraxa, Praetors' Voice");
    assert_eq!(written.main.len(), 99);
    assert_eq!(written.side, vec![OutputCard::new(1, "Atraxa, Praetors' Voice")]);
    let sol_ring = written.main.iter().find(|c| c.name == "Sol Ring").unwrap();
    assert_eq!(sol_ring.set_code.as_deref(), Some("C16"));
    assert_eq!(sol_ring.collector_number.as_deref(), Some("272"));
}

#[tokio::test]
async fn test_double_faced_names_are_cleaned_in_output() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v5/decks/Spirits_ISD.json");
        then.status(200).json_body(serde_json::json!({
            "data": {
                "name": "Spirit Squadron",
                "type": "Intro Pack",
                "commander": [],
                "mainBoard": [
                    {"name": "Delver of Secrets // Insectile Aberration", "count": 4},
                    {"name": "Island", "count": 20}
                ],
                "sideBoard": [{"name": "Negate", "count": 2}]
            }
        }));
    });

    let engine = ExportEngine::new(
        pipeline(&server, &temp_dir.path().join("cache"), temp_dir.path()),
        1,
    );
    let report = engine
        .run(&DeckRequest::Catalog("Spirits_ISD".to_string()))
        .await
        .unwrap();

    let written = cod::read(&report.path).unwrap();
    assert_eq!(written.format, FormatTag::Standard);
    assert!(written.main.contains(&OutputCard::new(4, "Delver of Secrets")));
    assert!(written.side.is_empty());
    assert!(["Delver of Secrets", "Island"].contains(&written.banner.as_str()));
}

#[tokio::test]
async fn test_source_down_writes_no_file() {
    let temp_dir = TempDir::new().unwrap();
    let output_dir = temp_dir.path().join("decks");
    let server = MockServer::start();
    let detail_mock = server.mock(|when, then| {
        when.method(GET).path("/api/v5/decks/Down_C20.json");
        then.status(502);
    });

    let engine = ExportEngine::new(
        pipeline(&server, &temp_dir.path().join("cache"), &output_dir),
        1,
    );
    let err = engine
        .run(&DeckRequest::Catalog("Down_C20".to_string()))
        .await
        .unwrap_err();

    assert!(err.is_source_unavailable());
    detail_mock.assert_hits(2);
    assert!(!output_dir.exists());
}

#[tokio::test]
async fn test_batch_reports_each_deck() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v5/decks/BreedLethality_C16.json");
        then.status(200).json_body(atraxa_detail());
    });
    server.mock(|when, then| {
        when.method(GET).path("/api/v5/decks/Missing_C16.json");
        then.status(404);
    });

    let engine = ExportEngine::new(
        pipeline(&server, &temp_dir.path().join("cache"), temp_dir.path()),
        4,
    );
    let outcomes = engine
        .run_batch(vec![
            DeckRequest::Catalog("Missing_C16".to_string()),
            DeckRequest::Catalog("BreedLethality_C16".to_string()),
            DeckRequest::Locator("https://decks.example.com/1".to_string()),
        ])
        .await;

    assert!(outcomes[0].result.as_ref().unwrap_err().is_not_found());
    assert!(outcomes[1].is_success());
    assert!(outcomes[2].result.as_ref().unwrap_err().is_not_found());
}

#[tokio::test]
async fn test_moxfield_import() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let moxfield_mock = server.mock(|when, then| {
        when.method(GET).path("/moxfield/v2/decks/all/AbC123");
        then.status(200).json_body(serde_json::json!({
            "name": "Tymna Thrasios",
            "format": "commander",
            "commanders": {
                "Thrasios, Triton Hero": {"quantity": 1, "card": {"name": "Thrasios, Triton Hero", "set": "c16"}},
                "Tymna the Weaver": {"quantity": 1, "card": {"name": "Tymna the Weaver", "set": "c16"}}
            },
            "mainboard": {
                "Sol Ring": {"quantity": 1, "card": {"name": "Sol Ring", "set": "c16", "cn": "272"}},
                "Island": {"quantity": 10, "card": {"name": "Island", "set": "c16", "cn": "340"}}
            },
            "sideboard": {}
        }));
    });

    let engine = ExportEngine::new(
        pipeline(&server, &temp_dir.path().join("cache"), temp_dir.path()),
        1,
    );
    let report = engine
        .run(&DeckRequest::Locator(
            "https://www.moxfield.com/decks/AbC123".to_string(),
        ))
        .await
        .unwrap();

    moxfield_mock.assert_hits(1);
    let written = cod::read(&report.path).unwrap();
    assert_eq!(written.format, FormatTag::Commander);
    assert_eq!(written.side.len(), 2);
    assert_eq!(written.banner, written.side[0].name);
    assert_eq!(written.main.len(), 2);
}

#[tokio::test]
async fn test_goldfish_import() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    let goldfish_mock = server.mock(|when, then| {
        when.method(GET).path("/goldfish/deck/arena_download/300499");
        then.status(200).body(
            "<html><body><textarea class=\"copy-paste-box\">Name Izzet Cauldron\nDeck\n4 Opt (ELD) 59\n4 Delver of Secrets // Insectile Aberration\n16 Island\n\nSideboard\n2 Negate\n</textarea></body></html>",
        );
    });

    let engine = ExportEngine::new(
        pipeline(&server, &temp_dir.path().join("cache"), temp_dir.path()),
        1,
    );
    let report = engine
        .run(&DeckRequest::Locator(
            "https://www.mtggoldfish.com/deck/300499#paper".to_string(),
        ))
        .await
        .unwrap();

    goldfish_mock.assert_hits(1);
    assert_eq!(report.path, temp_dir.path().join("Izzet_Cauldron.cod"));

    let written = cod::read(&report.path).unwrap();
    assert_eq!(written.format, FormatTag::Standard);
    assert_eq!(written.main.len(), 3);
    assert!(written.main.contains(&OutputCard::new(4, "Delver of Secrets")));
    assert!(written.side.is_empty());
}

#[tokio::test]
async fn test_empty_goldfish_export_is_rejected() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/goldfish/deck/arena_download/1");
        then.status(200).body("<html><textarea></textarea></html>");
    });

    let err = pipeline(&server, &temp_dir.path().join("cache"), temp_dir.path())
        .registry()
        .fetch("https://www.mtggoldfish.com/deck/1")
        .await
        .unwrap_err();

    assert!(matches!(err, precon_etl::EtlError::MalformedPayload { .. }));
}

#[tokio::test]
async fn test_pipeline_from_toml_config() {
    let temp_dir = TempDir::new().unwrap();
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/api/v5/decks/BreedLethality_C16.json");
        then.status(200).json_body(atraxa_detail());
    });

    let toml_content = format!(
        r#"
[source]
endpoint = "{endpoint}"
timeout_seconds = 5

[cache]
directory = "{cache}"

[export]
output_path = "{output}"
concurrent_requests = 2
"#,
        endpoint = server.url("/api/v5/"),
        cache = temp_dir.path().join("cache").display(),
        output = temp_dir.path().join("out").display(),
    );
    let config = TomlConfig::from_toml_str(&toml_content).unwrap();
    config.validate().unwrap();

    let engine = ExportEngine::new(
        DeckExportPipeline::from_config(&config).unwrap(),
        config.concurrent_requests(),
    );
    let report = engine
        .run(&DeckRequest::Catalog("BreedLethality_C16".to_string()))
        .await
        .unwrap();

    assert!(report.path.starts_with(temp_dir.path().join("out")));
    assert!(temp_dir
        .path()
        .join("cache")
        .join("details")
        .join("BreedLethality_C16.json")
        .exists());
}
