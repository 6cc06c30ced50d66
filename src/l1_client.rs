//! Concrete `L1Client` (§4.3.1): RPC access to the native-coin node's wallet actions plus
//! a websocket confirmation subscription.
//!
//! No teacher counterpart exists for this node's JSON-RPC shape, so the action names
//! (`account_balance`, `receivable`, `receive`, `send`) follow the account-based
//! pending/receive protocol the address format (`paw_`) implies; the reconnect-loop
//! shape matches §9's "task owns the socket, bounded floor delay" framing used
//! throughout the watcher layer.

use async_trait::async_trait;
use eyre::{eyre, Result, WrapErr};
use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use std::time::Duration;
use tokio_tungstenite::tungstenite::Message;
use tracing::{error, warn};

use crate::bridge::{L1Client, L1Confirmation};
use crate::config::L1Config;
use crate::types::AtomicUnits;

const RECONNECT_FLOOR: Duration = Duration::from_millis(500);

#[derive(Clone)]
pub struct NanoNodeL1Client {
    client: reqwest::Client,
    rpc_url: String,
    ws_url: String,
    hot_wallet: String,
    cold_wallet: String,
    wallet_id: String,
}

impl NanoNodeL1Client {
    pub fn new(config: &L1Config) -> Self {
        NanoNodeL1Client {
            client: reqwest::Client::new(),
            rpc_url: config.rpc_url.clone(),
            ws_url: config.ws_url.clone(),
            hot_wallet: config.hot_wallet.clone(),
            cold_wallet: config.cold_wallet.clone(),
            wallet_id: config.hot_wallet_key.clone(),
        }
    }

    async fn rpc(&self, body: serde_json::Value) -> Result<serde_json::Value> {
        let response = self
            .client
            .post(&self.rpc_url)
            .json(&body)
            .send()
            .await
            .wrap_err("node RPC request failed")?
            .error_for_status()
            .wrap_err("node RPC returned an error status")?;
        let value: serde_json::Value = response.json().await.wrap_err("invalid node RPC response")?;
        if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
            return Err(eyre!("node RPC error: {}", err));
        }
        Ok(value)
    }

    async fn balance_of(&self, account: &str) -> Result<AtomicUnits> {
        let value = self
            .rpc(json!({"action": "account_balance", "account": account}))
            .await?;
        let raw = value
            .get("balance")
            .and_then(|v| v.as_str())
            .ok_or_else(|| eyre!("missing balance field in account_balance response"))?;
        raw.parse()
            .map(AtomicUnits)
            .map_err(|_| eyre!("unparseable balance: {}", raw))
    }

    fn parse_confirmation(text: &str) -> Option<L1Confirmation> {
        let value: serde_json::Value = serde_json::from_str(text).ok()?;
        if value.get("topic")?.as_str()? != "confirmation" {
            return None;
        }
        let message = value.get("message")?;
        let receiver = message.get("account")?.as_str()?.to_string();
        let hash = message.get("hash")?.as_str()?.to_string();
        let amount: u128 = message.get("amount")?.as_str()?.parse().ok()?;
        let sender = message
            .get("block")
            .and_then(|b| b.get("account"))
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();

        Some(L1Confirmation {
            sender,
            receiver,
            raw_amount: amount,
            hash,
        })
    }

    async fn stream_once(
        &self,
        tx: &tokio::sync::mpsc::Sender<L1Confirmation>,
    ) -> Result<()> {
        let (mut socket, _) = tokio_tungstenite::connect_async(&self.ws_url)
            .await
            .wrap_err("failed to connect to L1 node websocket")?;

        let subscribe = json!({
            "action": "subscribe",
            "topic": "confirmation",
            "options": { "accounts": [self.hot_wallet] },
        });
        socket
            .send(Message::Text(subscribe.to_string()))
            .await
            .wrap_err("failed to send subscribe frame")?;

        while let Some(frame) = socket.next().await {
            let frame = frame.wrap_err("websocket read error")?;
            if let Message::Text(text) = frame {
                if let Some(confirmation) = Self::parse_confirmation(&text) {
                    if tx.send(confirmation).await.is_err() {
                        return Ok(());
                    }
                }
            }
        }
        Err(eyre!("L1 node websocket closed"))
    }
}

#[async_trait]
impl L1Client for NanoNodeL1Client {
    fn subscribe_confirmations(&self) -> futures::stream::BoxStream<'static, L1Confirmation> {
        let (tx, rx) = tokio::sync::mpsc::channel(256);
        let this = self.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = this.stream_once(&tx).await {
                    warn!(error = %e, "L1 confirmation stream dropped, reconnecting");
                }
                tokio::time::sleep(RECONNECT_FLOOR).await;
            }
        });
        Box::pin(futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        }))
    }

    async fn list_pending_receivables(&self) -> Result<Vec<L1Confirmation>> {
        let value = self
            .rpc(json!({
                "action": "receivable",
                "account": self.hot_wallet,
                "source": true,
            }))
            .await?;

        let Some(blocks) = value.get("blocks").and_then(|b| b.as_object()) else {
            return Ok(Vec::new());
        };

        let mut out = Vec::with_capacity(blocks.len());
        for (hash, info) in blocks {
            let amount: u128 = info
                .get("amount")
                .and_then(|v| v.as_str())
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| eyre!("receivable entry missing amount"))?;
            let sender = info
                .get("source")
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_string();
            out.push(L1Confirmation {
                sender,
                receiver: self.hot_wallet.clone(),
                raw_amount: amount,
                hash: hash.clone(),
            });
        }
        Ok(out)
    }

    async fn receive(&self, hash: &str) -> Result<()> {
        self.rpc(json!({
            "action": "receive",
            "wallet": self.wallet_id,
            "account": self.hot_wallet,
            "block": hash,
        }))
        .await?;
        Ok(())
    }

    async fn send(&self, to: &str, amount: AtomicUnits) -> Result<String> {
        let value = self
            .rpc(json!({
                "action": "send",
                "wallet": self.wallet_id,
                "source": self.hot_wallet,
                "destination": to,
                "amount": amount.0.to_string(),
            }))
            .await?;
        value
            .get("block")
            .and_then(|v| v.as_str())
            .map(String::from)
            .ok_or_else(|| eyre!("send response missing block hash"))
    }

    async fn hot_balance(&self) -> Result<AtomicUnits> {
        self.balance_of(&self.hot_wallet).await
    }

    async fn cold_balance(&self) -> Result<AtomicUnits> {
        self.balance_of(&self.cold_wallet).await
    }

    async fn transfer_hot_to_cold(&self, amount: AtomicUnits) -> Result<String> {
        let cold_wallet = self.cold_wallet.clone();
        self.send(&cold_wallet, amount).await
    }
}
