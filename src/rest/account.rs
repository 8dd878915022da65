use super::client::{take_list, Access, Client};
use super::params;
use crate::error::Result;
use crate::types::{FuturesAccountType, MarginMode, PageQuery, PositionsMode};
use reqwest::Method;
use serde_json::{json, Value};

impl Client {
    /// Futures account summary. `convert_unit` is the valuation currency
    /// (`cny`, `usd`, `usdt`, `btc`).
    /// GET /Server/api/v2/Fund/getAccount
    pub async fn get_account(
        &self,
        convert_unit: &str,
        futures_account_type: FuturesAccountType,
    ) -> Result<Value> {
        self.request(
            Method::GET,
            "/Server/api/v2/Fund/getAccount",
            Access::Private,
            params(json!({
                "convertUnit": convert_unit,
                "futuresAccountType": futures_account_type.value(),
            })),
        )
        .await
    }

    /// Open positions of one market, optionally one side (`1` long, `0` short).
    /// GET /Server/api/v2/Positions/getPositions
    pub async fn get_positions(
        &self,
        symbol: &str,
        side: Option<i64>,
        futures_account_type: FuturesAccountType,
    ) -> Result<Vec<Value>> {
        self.request(
            Method::GET,
            "/Server/api/v2/Positions/getPositions",
            Access::Private,
            params(json!({
                "symbol": symbol,
                "side": side,
                "futuresAccountType": futures_account_type.value(),
            })),
        )
        .await
    }

    /// Margin limits and estimated liquidation price of a position.
    /// GET /Server/api/v2/Positions/marginInfo
    pub async fn get_margin_info(
        &self,
        positions_id: &str,
        futures_account_type: FuturesAccountType,
    ) -> Result<Value> {
        self.request(
            Method::GET,
            "/Server/api/v2/Positions/marginInfo",
            Access::Private,
            params(json!({
                "positionsId": positions_id,
                "futuresAccountType": futures_account_type.value(),
            })),
        )
        .await
    }

    /// Adds (`margin_type = 1`) or withdraws (`0`) position margin.
    /// POST /Server/api/v2/Positions/updateMargin
    pub async fn update_margin(
        &self,
        positions_id: &str,
        amount: f64,
        margin_type: i64,
        futures_account_type: FuturesAccountType,
    ) -> Result<Value> {
        self.request(
            Method::POST,
            "/Server/api/v2/Positions/updateMargin",
            Access::Private,
            params(json!({
                "positionsId": positions_id,
                "amount": amount,
                "type": margin_type,
                "futuresAccountType": futures_account_type.value(),
            })),
        )
        .await
    }

    /// POST /Server/api/v2/setting/setLeverage
    pub async fn set_leverage(
        &self,
        symbol: &str,
        leverage: u32,
        futures_account_type: FuturesAccountType,
    ) -> Result<Value> {
        self.request(
            Method::POST,
            "/Server/api/v2/setting/setLeverage",
            Access::Private,
            params(json!({
                "symbol": symbol,
                "leverage": leverage,
                "futuresAccountType": futures_account_type.value(),
            })),
        )
        .await
    }

    /// POST /Server/api/v2/setting/setPositionsMode
    pub async fn set_positions_mode(
        &self,
        symbol: &str,
        positions_mode: PositionsMode,
        futures_account_type: FuturesAccountType,
    ) -> Result<Value> {
        self.request(
            Method::POST,
            "/Server/api/v2/setting/setPositionsMode",
            Access::Private,
            params(json!({
                "symbol": symbol,
                "positionsMode": positions_mode.value(),
                "futuresAccountType": futures_account_type.value(),
            })),
        )
        .await
    }

    /// POST /Server/api/v2/setting/setMarginMode
    pub async fn set_margin_mode(
        &self,
        symbol: &str,
        margin_mode: MarginMode,
        futures_account_type: FuturesAccountType,
    ) -> Result<Value> {
        self.request(
            Method::POST,
            "/Server/api/v2/setting/setMarginMode",
            Access::Private,
            params(json!({
                "symbol": symbol,
                "marginMode": margin_mode.value(),
                "futuresAccountType": futures_account_type.value(),
            })),
        )
        .await
    }

    /// Current nominal value on one side (`1` long, `0` short).
    /// GET /Server/api/v2/Positions/getNominalValue
    pub async fn get_nominal_value(
        &self,
        symbol: &str,
        side: i64,
        futures_account_type: FuturesAccountType,
    ) -> Result<Value> {
        self.request(
            Method::GET,
            "/Server/api/v2/Positions/getNominalValue",
            Access::Private,
            params(json!({
                "symbol": symbol,
                "side": side,
                "futuresAccountType": futures_account_type.value(),
            })),
        )
        .await
    }

    /// Account bills, one page.
    /// GET /Server/api/v2/Fund/getBill
    pub async fn get_bill(
        &self,
        currency: Option<&str>,
        bill_type: Option<i64>,
        page: PageQuery,
        futures_account_type: FuturesAccountType,
    ) -> Result<Vec<Value>> {
        let data: Value = self
            .request(
                Method::GET,
                "/Server/api/v2/Fund/getBill",
                Access::Private,
                params(json!({
                    "currencyName": currency,
                    "type": bill_type,
                    "startTime": page.start_time,
                    "endTime": page.end_time,
                    "pageNum": page.page,
                    "pageSize": page.size,
                    "futuresAccountType": futures_account_type.value(),
                })),
            )
            .await?;
        take_list(data)
    }

    /// Leverage, positions mode and margin mode of one market.
    /// GET /Server/api/v2/setting/get
    pub async fn get_setting(
        &self,
        symbol: &str,
        futures_account_type: FuturesAccountType,
    ) -> Result<Value> {
        self.request(
            Method::GET,
            "/Server/api/v2/setting/get",
            Access::Private,
            params(json!({
                "symbol": symbol,
                "futuresAccountType": futures_account_type.value(),
            })),
        )
        .await
    }

    /// GET /Server/api/v2/Fund/balance
    pub async fn get_balance(
        &self,
        currency_name: Option<&str>,
        futures_account_type: FuturesAccountType,
    ) -> Result<Value> {
        self.request(
            Method::GET,
            "/Server/api/v2/Fund/balance",
            Access::Private,
            params(json!({
                "currencyName": currency_name,
                "futuresAccountType": futures_account_type.value(),
            })),
        )
        .await
    }
}
