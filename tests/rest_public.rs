// tests/rest_public.rs

mod common;

use mockito::{Matcher, Server};
use serde_json::json;
use zb_connector_rs::rest::Client;
use zb_connector_rs::types::{FuturesAccountType, Interval};
use zb_connector_rs::websocket::events::TradeSide;
use zb_connector_rs::ZbError;

fn ok_body(data: serde_json::Value) -> String {
    json!({ "code": 10000, "desc": "操作成功", "data": data }).to_string()
}

#[tokio::test]
async fn test_get_kline_parses_bars() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/api/public/v1/kline")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "BTC_USDT".into()),
            Matcher::UrlEncoded("period".into(), "15M".into()),
            Matcher::UrlEncoded("size".into(), "2".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ok_body(json!([
            [30000, 30100, 29900, 30050, 12.5, 1690000000],
            [30050, 30200, 30000, 30150, 8.25, 1690000900]
        ])))
        .create_async()
        .await;

    let client = Client::public(Some(server.url().as_str()), None).unwrap();
    let bars = client
        .get_kline("btc_usdt", Interval::Min15, 2)
        .await
        .expect("kline request failed");

    assert_eq!(bars.len(), 2);
    assert_eq!(bars[0].open, 30000.0);
    assert_eq!(bars[1].volume, Some(8.25));
    assert_eq!(bars[1].timestamp, 1690000900);
}

#[tokio::test]
async fn test_get_trade_and_ticker() {
    let mut server = Server::new_async().await;
    let _trades = server
        .mock("GET", "/api/public/v1/trade")
        .match_query(Matcher::UrlEncoded("symbol".into(), "ETH_USDT".into()))
        .with_status(200)
        .with_body(ok_body(json!([[1800.5, 0.3, -1, 1690000001]])))
        .create_async()
        .await;
    let _tickers = server
        .mock("GET", "/api/public/v1/ticker")
        .with_status(200)
        .with_body(ok_body(json!({
            "BTC_USDT": [29000, 31000, 28900, 30500, 1200.5, 5.17, 1690000000]
        })))
        .create_async()
        .await;

    let client = Client::public(Some(server.url().as_str()), None).unwrap();

    let trades = client.get_trade("eth_usdt", 10).await.expect("trade request failed");
    assert_eq!(trades.len(), 1);
    assert_eq!(trades[0].side, TradeSide::Sell);
    assert_eq!(trades[0].price, 1800.5);

    let tickers = client.get_ticker(None).await.expect("ticker request failed");
    let ticker = tickers.get("BTC_USDT").expect("missing ticker");
    assert_eq!(ticker.close, 30500.0);
    assert_eq!(ticker.rate, 5.17);
}

#[tokio::test]
async fn test_qc_markets_use_prefixed_path() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("GET", "/qc/Server/api/v2/config/marketList")
        .match_query(Matcher::UrlEncoded("futuresAccountType".into(), "2".into()))
        .with_status(200)
        .with_body(ok_body(json!([{ "symbol": "BTC_QC" }])))
        .create_async()
        .await;

    let client = Client::public(Some(server.url().as_str()), None).unwrap();
    let markets = client
        .get_market_list(FuturesAccountType::BaseQc)
        .await
        .expect("market list request failed");

    assert_eq!(markets[0]["symbol"], "BTC_QC");
    m.assert_async().await;
}

#[tokio::test]
async fn test_error_envelope_becomes_api_error() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/api/public/v1/depth")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "code": 10005, "desc": "symbol not found" }).to_string())
        .create_async()
        .await;

    let client = Client::public(Some(server.url().as_str()), None).unwrap();
    match client.get_depth("nope_usdt", None, 5).await {
        Err(ZbError::ApiError { code, message }) => {
            assert_eq!(code, 10005);
            assert_eq!(message, "symbol not found");
        }
        other => panic!("expected ApiError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_missing_endpoint_is_not_supported() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/api/public/v1/markPrice")
        .match_query(Matcher::Any)
        .with_status(404)
        .create_async()
        .await;
    let _e = server
        .mock("GET", "/api/public/v1/indexPrice")
        .match_query(Matcher::Any)
        .with_status(502)
        .with_body("bad gateway")
        .create_async()
        .await;

    let client = Client::public(Some(server.url().as_str()), None).unwrap();
    assert!(matches!(
        client.get_mark_price(Some("btc_usdt")).await,
        Err(ZbError::NotSupported(_))
    ));
    match client.get_index_price(None).await {
        Err(ZbError::HttpError { status, body }) => {
            assert_eq!(status.as_u16(), 502);
            assert_eq!(body, "bad gateway");
        }
        other => panic!("expected HttpError, got {:?}", other),
    }
}

#[tokio::test]
async fn test_spot_price_side() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("GET", "/api/public/v1/spotPrice")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "BTC_USDT".into()),
            Matcher::UrlEncoded("side".into(), "asks".into()),
        ]))
        .with_status(200)
        .with_body(ok_body(json!({ "BTC_USDT": "30100.5" })))
        .create_async()
        .await;

    let client = Client::public(Some(server.url().as_str()), None).unwrap();
    let price = client
        .get_spot_price(Some("btc_usdt"), false)
        .await
        .expect("spot price request failed");
    assert_eq!(price["BTC_USDT"], "30100.5");
    m.assert_async().await;
}

#[tokio::test]
#[ignore] // Ignored by default as it requires network access
async fn test_live_get_kline() {
    common::setup();
    let client = Client::public(None, None).expect("Failed to create REST client");

    let result = client.get_kline("btc_usdt", Interval::Min15, 10).await;
    println!("Kline Result: {:?}", result);
    assert!(result.is_ok());
    assert!(!result.unwrap().is_empty());
}
