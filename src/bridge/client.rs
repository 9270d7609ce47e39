//! Long-lived client for the MT5 bridge subprocess
//!
//! The subprocess speaks one JSON object per line on stdin/stdout.
//! Correlation is by monotonically increasing `request_id`; pending requests
//! wait on oneshot channels and are evicted on timeout. Anything the
//! subprocess prints on stderr is logged, never parsed.

use crate::bridge::protocol::{
    BridgeRequest, BridgeResponse, CloseRequest, CloseResult, PriceUpdate, SymbolInfo, TickQuote,
    TradeRequest, TradeResult, VenuePosition,
};
use crate::bridge::{Venue, retry_transient};
use crate::config::Mt5Credentials;
use crate::constants::{
    DEFAULT_TIMEOUT, MAX_COMMENT_LEN, RETRY_DEVIATION_STEP, TRADE_TIMEOUT, retcode,
};
use crate::error::BrokerError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::process::Stdio;
use std::sync::Mutex as StdMutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::{Mutex, oneshot};
use tracing::{debug, info, warn};

/// Base price deviation (points) for market orders; widened on each retry
const BASE_DEVIATION: u32 = 20;

#[derive(Debug, Clone)]
struct CachedTick {
    quote: TickQuote,
    received: Instant,
}

#[derive(Debug, Deserialize)]
struct RawTick {
    bid: Decimal,
    ask: Decimal,
    spread: Option<Decimal>,
    time: Option<i64>,
}

impl RawTick {
    fn into_quote(self, symbol: &str) -> TickQuote {
        TickQuote {
            symbol: symbol.to_string(),
            bid: self.bid,
            ask: self.ask,
            spread: self.spread.unwrap_or(self.ask - self.bid),
            time: self
                .time
                .and_then(|secs| DateTime::from_timestamp(secs, 0))
                .unwrap_or_else(Utc::now),
        }
    }
}

struct BridgeShared {
    stdin: Mutex<ChildStdin>,
    pending: StdMutex<HashMap<u64, oneshot::Sender<BridgeResponse>>>,
    next_id: AtomicU64,
    ticks: StdMutex<HashMap<String, CachedTick>>,
    symbol_info: Mutex<HashMap<String, SymbolInfo>>,
    connected: AtomicBool,
    credentials: Mt5Credentials,
}

/// Bridge to the MT5 terminal via its RPC subprocess
pub struct Mt5Bridge {
    shared: Arc<BridgeShared>,
    child: Mutex<Child>,
}

impl std::fmt::Debug for Mt5Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mt5Bridge")
            .field("connected", &self.shared.connected.load(Ordering::SeqCst))
            .finish()
    }
}

impl Mt5Bridge {
    /// Spawn the bridge subprocess from a command line such as
    /// `python3 mt5_bridge.py` and start the response reader.
    pub fn spawn(command_line: &str, credentials: Mt5Credentials) -> Result<Self, BrokerError> {
        let mut parts = command_line.split_whitespace();
        let program = parts
            .next()
            .ok_or_else(|| BrokerError::Config("empty bridge command".into()))?;

        let mut child = Command::new(program)
            .args(parts)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| BrokerError::Config(format!("failed to spawn bridge: {e}")))?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| BrokerError::Internal("bridge stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| BrokerError::Internal("bridge stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| BrokerError::Internal("bridge stderr unavailable".into()))?;

        let shared = Arc::new(BridgeShared {
            stdin: Mutex::new(stdin),
            pending: StdMutex::new(HashMap::new()),
            next_id: AtomicU64::new(0),
            ticks: StdMutex::new(HashMap::new()),
            symbol_info: Mutex::new(HashMap::new()),
            connected: AtomicBool::new(false),
            credentials,
        });

        tokio::spawn(read_responses(Arc::clone(&shared), stdout));
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!("bridge stderr: {line}");
            }
        });

        Ok(Self {
            shared,
            child: Mutex::new(child),
        })
    }

    /// Send one request and wait for its correlated response.
    async fn request(
        &self,
        action: &str,
        params: Value,
        timeout_secs: u64,
    ) -> Result<Value, BrokerError> {
        let params = match params {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                return Err(BrokerError::Internal(format!(
                    "bridge params must be an object, got {other}"
                )));
            }
        };

        let request_id = self.shared.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self
                .shared
                .pending
                .lock()
                .unwrap_or_else(|e| e.into_inner());
            pending.insert(request_id, tx);
        }

        let request = BridgeRequest {
            action: action.to_string(),
            request_id,
            params,
        };
        let mut line = match serde_json::to_string(&request) {
            Ok(line) => line,
            Err(err) => {
                self.evict_pending(request_id);
                return Err(err.into());
            }
        };
        line.push('\n');

        let written = {
            let mut stdin = self.shared.stdin.lock().await;
            match stdin.write_all(line.as_bytes()).await {
                Ok(()) => stdin.flush().await,
                Err(err) => Err(err),
            }
        };
        if let Err(err) = written {
            self.evict_pending(request_id);
            return Err(err.into());
        }
        debug!("bridge -> {action} #{request_id}");

        let response = match tokio::time::timeout(Duration::from_secs(timeout_secs), rx).await {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => {
                return Err(BrokerError::Internal("bridge reader dropped".into()));
            }
            Err(_) => {
                self.evict_pending(request_id);
                return Err(BrokerError::Timeout(timeout_secs));
            }
        };

        if response.success {
            Ok(response.data.unwrap_or(Value::Null))
        } else {
            Err(upstream_error(&response))
        }
    }

    fn evict_pending(&self, request_id: u64) {
        let mut pending = self
            .shared
            .pending
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        pending.remove(&request_id);
    }

    /// Resolve the configured symbol against the venue's symbol list,
    /// accepting broker-suffixed variants such as `XAUUSD.x`.
    pub async fn resolve_symbol(&self, symbol: &str) -> Result<String, BrokerError> {
        let data = self
            .request("get_symbols", Value::Null, DEFAULT_TIMEOUT)
            .await?;
        let symbols: Vec<String> = serde_json::from_value(data)?;
        if symbols.iter().any(|s| s == symbol) {
            return Ok(symbol.to_string());
        }
        symbols
            .into_iter()
            .find(|s| s.starts_with(symbol))
            .ok_or_else(|| {
                BrokerError::Validation(format!("symbol {symbol} not offered by the venue"))
            })
    }

    async fn symbol_info_cached(&self, symbol: &str) -> Result<SymbolInfo, BrokerError> {
        {
            let cache = self.shared.symbol_info.lock().await;
            if let Some(info) = cache.get(symbol) {
                return Ok(info.clone());
            }
        }
        let data = self
            .request("get_symbol_info", json!({ "symbol": symbol }), DEFAULT_TIMEOUT)
            .await?;
        let info: SymbolInfo = serde_json::from_value(data)?;
        let mut cache = self.shared.symbol_info.lock().await;
        cache.insert(symbol.to_string(), info.clone());
        Ok(info)
    }

    /// Validate and normalize a trade request against venue symbol metadata.
    fn validate_trade(
        request: &TradeRequest,
        info: &SymbolInfo,
    ) -> Result<(Decimal, Option<String>), BrokerError> {
        if info.trade_mode == 0 {
            return Err(BrokerError::Validation(format!(
                "symbol {} is not tradable",
                request.symbol
            )));
        }

        let step = info.volume_step;
        let volume = if step > Decimal::ZERO {
            (request.volume / step).floor() * step
        } else {
            request.volume
        };
        if volume < info.volume_min || volume > info.volume_max {
            return Err(BrokerError::Validation(format!(
                "volume {} outside venue range [{}, {}]",
                request.volume, info.volume_min, info.volume_max
            )));
        }

        let min_stop = info.point * Decimal::from(info.stops_level);
        for distance in [request.sl_distance, request.tp_distance].into_iter().flatten() {
            if distance < min_stop {
                return Err(BrokerError::Validation(format!(
                    "stop distance {distance} below venue minimum {min_stop}"
                )));
            }
        }

        let comment = request
            .comment
            .as_ref()
            .map(|c| c.chars().take(MAX_COMMENT_LEN).collect());

        Ok((volume, comment))
    }
}

fn upstream_error(response: &BridgeResponse) -> BrokerError {
    let code = response
        .data
        .as_ref()
        .and_then(|data| data.get("retcode"))
        .and_then(Value::as_u64)
        .map(|c| c as u32)
        .unwrap_or(0);
    let message = response
        .error
        .clone()
        .unwrap_or_else(|| "bridge request failed".to_string());
    BrokerError::Upstream {
        retcode: code,
        message,
    }
}

async fn read_responses(
    shared: Arc<BridgeShared>,
    stdout: tokio::process::ChildStdout,
) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        let value: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(_) => {
                warn!("bridge emitted non-JSON line: {line}");
                continue;
            }
        };

        if value.get("request_id").is_some() {
            let response: BridgeResponse = match serde_json::from_value(value) {
                Ok(response) => response,
                Err(e) => {
                    warn!("unparseable bridge response: {e}");
                    continue;
                }
            };
            let Some(id) = response.request_id else {
                continue;
            };
            let sender = {
                let mut pending = shared.pending.lock().unwrap_or_else(|e| e.into_inner());
                pending.remove(&id)
            };
            match sender {
                // The receiver may have timed out; dropping is fine.
                Some(tx) => drop(tx.send(response)),
                None => debug!("late bridge response for evicted request #{id}"),
            }
        } else if value.get("type").and_then(Value::as_str) == Some("price_update") {
            if let Some(data) = value.get("data").cloned()
                && let Ok(update) = serde_json::from_value::<PriceUpdate>(data)
            {
                let quote = TickQuote {
                    symbol: update.symbol.clone(),
                    bid: update.bid,
                    ask: update.ask,
                    spread: update.spread,
                    time: Utc::now(),
                };
                let mut ticks = shared.ticks.lock().unwrap_or_else(|e| e.into_inner());
                ticks.insert(
                    update.symbol,
                    CachedTick {
                        quote,
                        received: Instant::now(),
                    },
                );
            }
        } else {
            debug!("ignoring bridge event: {line}");
        }
    }
    info!("bridge stdout closed");
}

#[async_trait]
impl Venue for Mt5Bridge {
    async fn connect(&self) -> Result<(), BrokerError> {
        if self.shared.connected.load(Ordering::SeqCst) {
            return Ok(());
        }
        let creds = &self.shared.credentials;
        self.request(
            "connect",
            json!({
                "server": creds.server,
                "login": creds.login,
                "password": creds.password,
            }),
            DEFAULT_TIMEOUT,
        )
        .await?;
        self.shared.connected.store(true, Ordering::SeqCst);
        info!("connected to MT5 terminal");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), BrokerError> {
        if !self.shared.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        self.request("disconnect", Value::Null, DEFAULT_TIMEOUT)
            .await?;
        let mut child = self.child.lock().await;
        if let Err(e) = child.start_kill() {
            warn!("bridge subprocess already gone: {e}");
        }
        info!("disconnected from MT5 terminal");
        Ok(())
    }

    async fn get_price(&self, symbol: &str) -> Result<TickQuote, BrokerError> {
        let data = self
            .request("get_price", json!({ "symbol": symbol }), DEFAULT_TIMEOUT)
            .await?;
        let raw: RawTick = serde_json::from_value(data)?;
        let quote = raw.into_quote(symbol);
        let mut ticks = self.shared.ticks.lock().unwrap_or_else(|e| e.into_inner());
        ticks.insert(
            symbol.to_string(),
            CachedTick {
                quote: quote.clone(),
                received: Instant::now(),
            },
        );
        Ok(quote)
    }

    fn is_price_fresh(&self, symbol: &str, max_age_ms: i64) -> bool {
        let ticks = self.shared.ticks.lock().unwrap_or_else(|e| e.into_inner());
        ticks
            .get(symbol)
            .is_some_and(|tick| (tick.received.elapsed().as_millis() as i64) <= max_age_ms)
    }

    async fn get_symbol_info(&self, symbol: &str) -> Result<SymbolInfo, BrokerError> {
        self.symbol_info_cached(symbol).await
    }

    async fn place_trade(&self, request: TradeRequest) -> Result<TradeResult, BrokerError> {
        let info = self.symbol_info_cached(&request.symbol).await?;
        let (volume, comment) = Self::validate_trade(&request, &info)?;

        retry_transient(|attempt| {
            let deviation = BASE_DEVIATION + attempt * RETRY_DEVIATION_STEP;
            let params = json!({
                "symbol": &request.symbol,
                "volume": volume.to_f64().unwrap_or_default(),
                "type": request.side,
                "sl_distance": request.sl_distance.and_then(|d| d.to_f64()),
                "tp_distance": request.tp_distance.and_then(|d| d.to_f64()),
                "comment": &comment,
                "magic": request.magic,
                "deviation": deviation,
            });
            async move {
                let data = self.request("place_trade", params, TRADE_TIMEOUT).await?;
                let result: TradeResult = serde_json::from_value(data)?;
                if result.retcode == retcode::DONE {
                    Ok(result)
                } else {
                    Err(BrokerError::from_retcode(result.retcode))
                }
            }
        })
        .await
    }

    async fn get_positions(&self) -> Result<Vec<VenuePosition>, BrokerError> {
        let data = self
            .request("get_positions", Value::Null, DEFAULT_TIMEOUT)
            .await?;
        Ok(serde_json::from_value(data)?)
    }

    async fn close_trade(&self, request: CloseRequest) -> Result<CloseResult, BrokerError> {
        // The live position is authoritative for volume and side; a missing
        // ticket means the venue already flattened it.
        let positions = self.get_positions().await?;
        let Some(position) = positions.iter().find(|p| p.ticket == request.ticket) else {
            return Ok(CloseResult::already_closed());
        };

        let params = json!({
            "ticket": request.ticket,
            "symbol": position.symbol,
            "volume": position.volume.to_f64().unwrap_or_default(),
            "type": position.side,
        });
        match self.request("close_trade", params, TRADE_TIMEOUT).await {
            Ok(data) => {
                let mut result: CloseResult = serde_json::from_value(data.clone())?;
                result.success = true;
                result.data = Some(data);
                Ok(result)
            }
            Err(BrokerError::Upstream { message, .. })
                if message.contains("Position not found") =>
            {
                Ok(CloseResult::already_closed())
            }
            Err(err) => Err(err),
        }
    }
}
