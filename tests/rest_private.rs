// tests/rest_private.rs

mod common;

use mockito::{Matcher, Server};
use serde_json::json;
use zb_connector_rs::rest::Client;
use zb_connector_rs::types::{Action, FuturesAccountType, OrderIds, OrderSide, PageQuery};
use zb_connector_rs::ZbError;

fn signed_client(url: &str) -> Client {
    Client::new(
        Some("test_key".to_string()),
        Some("test_secret".to_string()),
        Some(url),
        None,
    )
    .expect("Failed to create REST client")
}

fn ok_body(data: serde_json::Value) -> String {
    json!({ "code": 10000, "desc": "操作成功", "data": data }).to_string()
}

#[tokio::test]
async fn test_create_order_is_signed_and_posted_as_json() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("POST", "/Server/api/v2/trade/order")
        .match_header("zb-apikey", "test_key")
        .match_header("zb-timestamp", Matcher::Any)
        .match_header("zb-sign", Matcher::Regex(".+".to_string()))
        .match_header("zb-lan", "cn")
        .match_body(Matcher::Json(json!({
            "symbol": "BTC_USDT",
            "action": 1,
            "price": 30000.5,
            "amount": 0.01,
            "side": 1,
            "entrustType": 1
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(ok_body(json!({ "orderId": "6856937443201916928" })))
        .create_async()
        .await;

    let client = signed_client(&server.url());
    let result = client
        .create_order(
            "BTC_USDT",
            OrderSide::OpenLong,
            0.01,
            30000.5,
            Action::Limit,
            1,
            None,
        )
        .await
        .expect("order request failed");

    assert_eq!(result["orderId"], "6856937443201916928");
    m.assert_async().await;
}

#[tokio::test]
async fn test_order_arguments_are_checked_before_sending() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("POST", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = signed_client(&server.url());
    let result = client
        .create_order(
            "BTC_USDT",
            OrderSide::OpenLong,
            0.01,
            0.0,
            Action::Limit,
            1,
            None,
        )
        .await;
    assert!(matches!(
        result,
        Err(ZbError::ParameterValueError { ref param, .. }) if param == "price"
    ));

    let result = client.cancel_order("BTC_USDT", OrderIds::default()).await;
    assert!(matches!(result, Err(ZbError::ArgumentsRequired { .. })));

    let result = client.batch_cancel_orders("BTC_USDT", &[], &[]).await;
    assert!(matches!(result, Err(ZbError::ArgumentsRequired { .. })));

    m.assert_async().await;
}

#[tokio::test]
async fn test_private_call_without_credentials_fails() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = Client::public(Some(server.url().as_str()), None).unwrap();
    let result = client
        .get_account("usdt", FuturesAccountType::BaseUsdt)
        .await;
    let error = tokio_test::assert_err!(result);
    assert!(matches!(error, ZbError::AuthenticationError(_)));
    m.assert_async().await;
}

#[tokio::test]
async fn test_invalid_sign_code() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/Server/api/v2/Fund/balance")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(json!({ "code": 10014, "desc": "sign error" }).to_string())
        .create_async()
        .await;

    let client = signed_client(&server.url());
    match client.get_balance(Some("usdt"), FuturesAccountType::BaseUsdt).await {
        Err(ZbError::InvalidSign(message)) => assert!(message.contains("sign error")),
        other => panic!("expected InvalidSign, got {:?}", other),
    }
}

#[tokio::test]
async fn test_paged_results_are_unwrapped() {
    let mut server = Server::new_async().await;
    let _m = server
        .mock("GET", "/Server/api/v2/trade/getAllOrders")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("symbol".into(), "ETH_USDT".into()),
            Matcher::UrlEncoded("page".into(), "2".into()),
            Matcher::UrlEncoded("size".into(), "10".into()),
            Matcher::UrlEncoded("startTime".into(), "1690000000000".into()),
        ]))
        .match_header("zb-sign", Matcher::Regex(".+".to_string()))
        .with_status(200)
        .with_body(ok_body(json!({
            "list": [{ "id": "1" }, { "id": "2" }],
            "pageNum": 2,
            "pageSize": 10
        })))
        .create_async()
        .await;

    let client = signed_client(&server.url());
    let page = PageQuery {
        start_time: Some(1690000000000),
        page: 2,
        ..PageQuery::default()
    };
    let orders = client
        .get_all_orders("ETH_USDT", page)
        .await
        .expect("orders request failed");

    assert_eq!(orders.len(), 2);
    assert_eq!(orders[1]["id"], "2");
}

#[tokio::test]
async fn test_qc_account_uses_prefixed_path() {
    let mut server = Server::new_async().await;
    let m = server
        .mock("POST", "/qc/Server/api/v2/setting/setLeverage")
        .match_body(Matcher::PartialJson(json!({
            "symbol": "BTC_QC",
            "leverage": 20
        })))
        .with_status(200)
        .with_body(ok_body(json!({ "leverage": 20 })))
        .create_async()
        .await;

    let client = signed_client(&server.url());
    let result = tokio_test::assert_ok!(
        client
            .set_leverage("BTC_QC", 20, FuturesAccountType::BaseQc)
            .await
    );
    assert_eq!(result["leverage"], 20);
    m.assert_async().await;
}

#[tokio::test]
#[ignore] // Ignored by default as it requires network access and credentials
async fn test_live_get_account() {
    common::setup();
    let api_key = common::get_env_var("ZB_API_KEY");
    let secret = common::get_env_var("ZB_SECRET_KEY");

    let client =
        Client::new(Some(api_key), Some(secret), None, None).expect("Failed to create REST client");

    let result = client
        .get_account("usdt", FuturesAccountType::BaseUsdt)
        .await;
    println!("Account Result: {:?}", result);
    assert!(result.is_ok());
}
