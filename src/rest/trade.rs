use super::client::{take_list, Access, Client};
use super::params;
use crate::error::{Result, ZbError};
use crate::types::{Action, OrderIds, OrderSide, PageQuery};
use reqwest::Method;
use serde_json::{json, Value};

fn check_positive(param: &str, value: f64) -> Result<()> {
    if value > 0.0 {
        Ok(())
    } else {
        Err(ZbError::ParameterValueError {
            param: param.to_string(),
            value: value.to_string(),
        })
    }
}

fn check_ids(ids: &OrderIds) -> Result<()> {
    if ids.is_empty() {
        return Err(ZbError::arguments_required("order_id or client_order_id"));
    }
    Ok(())
}

impl Client {
    /// Places an order and returns its id.
    ///
    /// `entrust_type`: 1 limit, 2 liquidation, 3 take profit, 4 stop loss.
    /// `client_order_id` must match `^[a-zA-Z0-9-_]{1,36}$`.
    /// POST /Server/api/v2/trade/order
    #[allow(clippy::too_many_arguments)]
    pub async fn create_order(
        &self,
        symbol: &str,
        side: OrderSide,
        amount: f64,
        price: f64,
        action: Action,
        entrust_type: i64,
        client_order_id: Option<&str>,
    ) -> Result<Value> {
        check_positive("price", price)?;
        check_positive("amount", amount)?;
        self.request(
            Method::POST,
            "/Server/api/v2/trade/order",
            Access::Private,
            params(json!({
                "symbol": symbol,
                "action": action.value(),
                "price": price,
                "amount": amount,
                "side": side.value(),
                "entrustType": entrust_type,
                "clientOrderId": client_order_id,
            })),
        )
        .await
    }

    /// POST /Server/api/v2/trade/cancelOrder
    pub async fn cancel_order(&self, symbol: &str, ids: OrderIds) -> Result<Value> {
        check_ids(&ids)?;
        self.request(
            Method::POST,
            "/Server/api/v2/trade/cancelOrder",
            Access::Private,
            params(json!({
                "symbol": symbol,
                "orderId": ids.order_id,
                "clientOrderId": ids.client_order_id,
            })),
        )
        .await
    }

    /// Cancels by order ids or client order ids. Returns the orders that
    /// could not be cancelled.
    /// POST /Server/api/v2/trade/batchCancelOrder
    pub async fn batch_cancel_orders(
        &self,
        symbol: &str,
        order_ids: &[String],
        client_order_ids: &[String],
    ) -> Result<Vec<Value>> {
        if order_ids.is_empty() && client_order_ids.is_empty() {
            return Err(ZbError::arguments_required(
                "order_ids or client_order_ids",
            ));
        }
        let mut body = params(json!({ "symbol": symbol }));
        if !order_ids.is_empty() {
            body.insert("orderIds".to_string(), json!(order_ids));
        }
        if !client_order_ids.is_empty() {
            body.insert("clientOrderIds".to_string(), json!(client_order_ids));
        }
        let data: Value = self
            .request(
                Method::POST,
                "/Server/api/v2/trade/batchCancelOrder",
                Access::Private,
                body,
            )
            .await?;
        Ok(match data {
            Value::Array(rows) => rows,
            _ => Vec::new(),
        })
    }

    /// POST /Server/api/v2/trade/cancelAllOrders
    pub async fn cancel_all_orders(&self, symbol: &str) -> Result<Value> {
        self.request(
            Method::POST,
            "/Server/api/v2/trade/cancelAllOrders",
            Access::Private,
            params(json!({ "symbol": symbol })),
        )
        .await
    }

    /// Open orders, one page.
    /// GET /Server/api/v2/trade/getUndoneOrders
    pub async fn get_undone_orders(&self, symbol: &str, page: u32, size: u32) -> Result<Vec<Value>> {
        let data: Value = self
            .request(
                Method::GET,
                "/Server/api/v2/trade/getUndoneOrders",
                Access::Private,
                params(json!({ "symbol": symbol, "page": page, "size": size })),
            )
            .await?;
        take_list(data)
    }

    /// All orders including history. Cancelled orders without fills older
    /// than seven days are not returned by the server.
    /// GET /Server/api/v2/trade/getAllOrders
    pub async fn get_all_orders(&self, symbol: &str, page: PageQuery) -> Result<Vec<Value>> {
        let data: Value = self
            .request(
                Method::GET,
                "/Server/api/v2/trade/getAllOrders",
                Access::Private,
                params(json!({
                    "symbol": symbol,
                    "startTime": page.start_time,
                    "endTime": page.end_time,
                    "page": page.page,
                    "size": page.size,
                })),
            )
            .await?;
        take_list(data)
    }

    /// GET /Server/api/v2/trade/getOrder
    pub async fn get_order(&self, symbol: &str, ids: OrderIds) -> Result<Value> {
        check_ids(&ids)?;
        self.request(
            Method::GET,
            "/Server/api/v2/trade/getOrder",
            Access::Private,
            params(json!({
                "symbol": symbol,
                "orderId": ids.order_id,
                "clientOrderId": ids.client_order_id,
            })),
        )
        .await
    }

    /// Fills of one order, one page.
    /// GET /Server/api/v2/trade/getTradeList
    pub async fn get_trade_list(
        &self,
        symbol: &str,
        order_id: &str,
        page: u32,
        size: u32,
    ) -> Result<Vec<Value>> {
        let data: Value = self
            .request(
                Method::GET,
                "/Server/api/v2/trade/getTradeList",
                Access::Private,
                params(json!({
                    "symbol": symbol,
                    "orderId": order_id,
                    "pageNum": page,
                    "pageSize": size,
                })),
            )
            .await?;
        take_list(data)
    }

    /// GET /Server/api/v2/trade/tradeHistory
    pub async fn get_trade_history(&self, symbol: &str, page: PageQuery) -> Result<Vec<Value>> {
        let data: Value = self
            .request(
                Method::GET,
                "/Server/api/v2/trade/tradeHistory",
                Access::Private,
                params(json!({
                    "symbol": symbol,
                    "startTime": page.start_time,
                    "endTime": page.end_time,
                    "pageNum": page.page,
                    "pageSize": page.size,
                })),
            )
            .await?;
        take_list(data)
    }
}
