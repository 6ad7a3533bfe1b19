/*
[INPUT]:  Order requests and order identifiers
[OUTPUT]: Created or cancelled orders
[POS]:    HTTP layer - trading endpoints (require auth + signature)
[UPDATE]: When adding new trading endpoints or changing order flow
*/

use tracing::info;
use uuid::Uuid;

use crate::http::{endpoints, BydfiClient, RequestParams, Result};
use crate::types::{NewOrderRequest, Order, OrderId};

impl BydfiClient {
    /// Place a new order
    ///
    /// POST /api/v1/order
    ///
    /// The request is validated before any I/O. A `newClientOrderId` is
    /// generated when the caller gives none, so the call can be retried
    /// without risking a duplicate order.
    pub async fn create_order(&self, request: NewOrderRequest) -> Result<Order> {
        request.validate()?;

        let mut params = request.to_params();
        if !params.contains_key(endpoints::CLIENT_ORDER_ID_PARAM) {
            params.insert(endpoints::CLIENT_ORDER_ID_PARAM, Uuid::new_v4().simple());
        }

        let order: Order = self.execute(&endpoints::CREATE_ORDER, params).await?;
        info!(
            symbol = %order.symbol,
            order_id = order.order_id,
            client_order_id = %order.client_order_id,
            "order created"
        );
        Ok(order)
    }

    /// Cancel an order by exchange or client id
    ///
    /// DELETE /api/v1/order
    pub async fn cancel_order(&self, symbol: &str, order_id: impl Into<OrderId>) -> Result<Order> {
        let mut params = RequestParams::new().with("symbol", symbol);
        order_id.into().apply(&mut params);
        self.execute(&endpoints::CANCEL_ORDER, params).await
    }

    /// Cancel every open order on a symbol
    ///
    /// DELETE /api/v1/openOrders
    pub async fn cancel_all_orders(&self, symbol: &str) -> Result<Vec<Order>> {
        self.execute(
            &endpoints::CANCEL_ALL_ORDERS,
            RequestParams::new().with("symbol", symbol),
        )
        .await
    }
}
