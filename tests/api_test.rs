use axum::body::Body;
use axum::http::{Request, StatusCode};
use chrono::NaiveDate;
use finledger::api::{self, AppState};
use finledger::domain::{
    Adjustment, Contract, ContractId, CurrencyCode, Decimal, FxQuote, IndexCompounding,
    IndexType, Instrument, InstrumentId, Side, Source, Transaction, TransactionId,
};
use finledger::{init_db, Config, Repository};
use serde_json::{json, Value};
use std::sync::Arc;
use tempfile::TempDir;
use tower::util::ServiceExt;

fn d(s: &str) -> Decimal {
    Decimal::from_str_canonical(s).unwrap()
}

async fn setup_test_app() -> (axum::Router, AppState, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir
        .path()
        .join("test.db")
        .to_string_lossy()
        .to_string();

    let pool = init_db(&db_path).await.expect("init_db failed");
    let repo = Arc::new(Repository::new(pool));
    let state = AppState::new(repo, Config::with_database_path(db_path));

    state
        .repo
        .upsert_fx_quote(
            &FxQuote {
                pair: "USD/ARS".parse().unwrap(),
                date: NaiveDate::from_ymd_opt(2023, 1, 2).unwrap(),
                rate: d("180"),
                source: Source::Manual,
            },
            false,
        )
        .await
        .unwrap();

    (api::create_router(state.clone()), state, temp_dir)
}

async fn send(app: axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap()
    };
    (status, value)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn with_json(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn test_health_and_ready() {
    let (app, _state, _temp) = setup_test_app().await;

    let (status, body) = send(app.clone(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");

    let (status, _) = send(app, get("/ready")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_fx_rate_reports_fallback() {
    let (app, _state, _temp) = setup_test_app().await;

    let (status, body) = send(app.clone(), get("/v1/fx/rate?pair=USD/ARS&date=2023-01-02")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fallback"], "exact");

    let (status, body) = send(app.clone(), get("/v1/fx/rate?pair=ARS/USD&date=2023-01-05")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fallback"], "look_back");
    assert_eq!(body["inverted"], true);

    let (status, _) = send(app.clone(), get("/v1/fx/rate?pair=EUR/ARS&date=2023-01-05")).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (status, _) = send(app, get("/v1/fx/rate?pair=USDARS&date=2023-01-05")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_index_point_upload_regenerates_contract() {
    let (app, state, _temp) = setup_test_app().await;
    state
        .orchestrator
        .save_contract(&Contract {
            id: ContractId::new(9),
            name: "Oficina Centro".to_string(),
            start: "2023-01".parse().unwrap(),
            duration_months: 5,
            initial_rent: d("1000"),
            currency: CurrencyCode::new("ARS"),
            adjustment: Adjustment::IndexLinked {
                index_type: IndexType::new("CPI"),
                compounding: IndexCompounding::PriorMonth,
            },
            adjustment_frequency_months: 3,
        })
        .await
        .unwrap();

    for (month, value) in [("2023-01", 2), ("2023-02", 3), ("2023-03", 1)] {
        let (status, body) = send(
            app.clone(),
            with_json(
                "PUT",
                "/v1/index-points",
                json!({"indexType": "cpi", "month": month, "value": value, "source": "scraped"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["decision"], "insert");
        assert_eq!(body["regeneration"]["regenerated"][0], "contract:9");
    }

    let (status, body) = send(app.clone(), get("/v1/contracts/9/cashflows")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["rows"].as_array().unwrap().len(), 5);
    assert_eq!(body["provisionalFrom"], "2023-05");
    assert_eq!(body["reportingCurrencies"], json!(["USD", "ARS"]));

    let (status, _) = send(app, get("/v1/contracts/404/cashflows")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_index_point_at_or_below_minus_hundred_rejected() {
    let (app, state, _temp) = setup_test_app().await;

    for value in [-100, -150] {
        let (status, body) = send(
            app.clone(),
            with_json(
                "PUT",
                "/v1/index-points",
                json!({"indexType": "CPI", "month": "2023-01", "value": value, "source": "manual"}),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("-100"));
    }
    assert!(state
        .repo
        .list_index_points(&IndexType::new("CPI"))
        .await
        .unwrap()
        .is_empty());

    let (status, _) = send(
        app,
        with_json(
            "PUT",
            "/v1/index-points",
            json!({"indexType": "CPI", "month": "2023-01", "value": -99.5, "source": "manual"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_regenerate_endpoint_reports_failures_in_body() {
    let (app, state, _temp) = setup_test_app().await;
    state
        .repo
        .upsert_contract(&Contract {
            id: ContractId::new(1),
            name: "Broken".to_string(),
            start: "2023-01".parse().unwrap(),
            duration_months: 0,
            initial_rent: d("1000"),
            currency: CurrencyCode::new("ARS"),
            adjustment: Adjustment::FixedPercentage { rate: d("5") },
            adjustment_frequency_months: 6,
        })
        .await
        .unwrap();

    let (status, body) = send(
        app,
        with_json("POST", "/v1/regenerate", json!({"scope": "all_contracts"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["failures"][0]["entity"], "contract:1");
    assert!(body["failures"][0]["cause"]
        .as_str()
        .unwrap()
        .contains("duration"));
}

#[tokio::test]
async fn test_position_and_cashflows_for_instrument() {
    let (app, state, _temp) = setup_test_app().await;
    state
        .orchestrator
        .save_instrument(&Instrument {
            id: InstrumentId::new(3),
            ticker: "YPFD".to_string(),
            currency: CurrencyCode::new("ARS"),
            fixed_income: None,
        })
        .await
        .unwrap();
    state
        .orchestrator
        .save_transaction(&Transaction::new(
            TransactionId::new(1),
            InstrumentId::new(3),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            Side::Buy,
            d("10"),
            d("100"),
            d("5"),
            CurrencyCode::new("ARS"),
        ))
        .await
        .unwrap();

    let (status, body) = send(app.clone(), get("/v1/instruments/3/position?price=120")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lots"].as_array().unwrap().len(), 1);
    assert!(body["valuation"].is_object());
    assert!(body["realizedGains"].as_array().unwrap().is_empty());

    let (status, _) = send(app.clone(), get("/v1/instruments/3/position?price=abc")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(app.clone(), get("/v1/instruments/3/cashflows")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["rows"].as_array().unwrap().is_empty());

    let (status, _) = send(app, get("/v1/instruments/3/cashflows?nominal=500")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
