//! NIP-01 relay client: filtered fetches and event publishing.

use std::collections::BTreeMap;

use anyhow::{anyhow, bail, Result};
use futures_util::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_socks::tcp::Socks5Stream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::{client_async, tungstenite::Message, WebSocketStream};
use tracing::warn;
use url::Url;

use crate::{event::Event, sign::verify_event};

/// Subscription ID used for one-shot fetches.
const SUB_ID: &str = "trendr";

/// Parameters for a Nostr subscription filter.
#[derive(Debug, Clone, Default)]
pub struct Filter {
    /// Restrict to specific event IDs.
    pub ids: Option<Vec<String>>,
    /// Restrict to specific authors.
    pub authors: Option<Vec<String>>,
    /// Restrict to event kinds.
    pub kinds: Option<Vec<u32>>,
    /// Tag filters keyed by tag name (serialized with a `#` prefix).
    pub tags: BTreeMap<String, Vec<String>>,
    /// Lower bound for `created_at`.
    pub since: Option<u64>,
    /// Upper bound for `created_at`.
    pub until: Option<u64>,
    /// Maximum number of events requested.
    pub limit: Option<u32>,
}

impl Filter {
    /// Convert the filter into the JSON object used in REQ messages.
    pub fn to_json(&self) -> serde_json::Map<String, Value> {
        let mut map = serde_json::Map::new();
        if let Some(ids) = &self.ids {
            if !ids.is_empty() {
                map.insert(
                    "ids".into(),
                    Value::Array(ids.iter().cloned().map(Value::String).collect()),
                );
            }
        }
        if let Some(authors) = &self.authors {
            if !authors.is_empty() {
                map.insert(
                    "authors".into(),
                    Value::Array(authors.iter().cloned().map(Value::String).collect()),
                );
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.is_empty() {
                map.insert(
                    "kinds".into(),
                    Value::Array(
                        kinds
                            .iter()
                            .cloned()
                            .map(|k| Value::Number(k.into()))
                            .collect(),
                    ),
                );
            }
        }
        for (tag, values) in &self.tags {
            if values.is_empty() {
                continue;
            }
            let key = if tag.starts_with('#') {
                tag.clone()
            } else {
                format!("#{tag}")
            };
            map.insert(
                key,
                Value::Array(values.iter().cloned().map(Value::String).collect()),
            );
        }
        if let Some(since) = self.since {
            map.insert("since".into(), Value::Number(since.into()));
        }
        if let Some(until) = self.until {
            map.insert("until".into(), Value::Number(until.into()));
        }
        if let Some(limit) = self.limit {
            map.insert("limit".into(), Value::Number(limit.into()));
        }
        map
    }
}

/// Client for a single relay. Each fetch or publish opens its own
/// connection, so failures stay scoped to one request.
#[derive(Debug, Clone)]
pub struct RelayClient {
    url: String,
    tor_socks: Option<String>,
    verify_sig: bool,
}

impl RelayClient {
    /// Create a client for `url`, optionally routed through a SOCKS5 proxy.
    pub fn new(url: String, tor_socks: Option<String>, verify_sig: bool) -> Self {
        Self {
            url,
            tor_socks,
            verify_sig,
        }
    }

    /// Relay URL this client talks to.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Issue one REQ and collect events until EOSE or close.
    ///
    /// Malformed frames are skipped. With signature verification enabled,
    /// events that fail to verify are dropped individually. Callers that
    /// need a deadline race this future and drop it to abort.
    pub async fn fetch(&self, filter: &Filter) -> Result<Vec<Event>> {
        let req = json!(["REQ", SUB_ID, Value::Object(filter.to_json())]);
        let mut ws = connect_ws(&self.url, self.tor_socks.as_deref()).await?;
        ws.send(Message::Text(req.to_string())).await?;
        let mut events = vec![];
        while let Some(msg) = ws.next().await {
            match msg? {
                Message::Text(txt) => {
                    if let Ok(val) = serde_json::from_str::<Value>(&txt) {
                        if let Some(arr) = val.as_array() {
                            match arr.first().and_then(|v| v.as_str()) {
                                Some("EVENT") if arr.len() >= 3 => {
                                    if let Ok(ev) = serde_json::from_value::<Event>(arr[2].clone())
                                    {
                                        if self.verify_sig {
                                            if let Err(e) = verify_event(&ev) {
                                                warn!("dropping event {}: {e}", ev.id);
                                                continue;
                                            }
                                        }
                                        events.push(ev);
                                    }
                                }
                                Some("EOSE") => break,
                                Some("CLOSED") => {
                                    let reason =
                                        arr.get(2).and_then(|v| v.as_str()).unwrap_or("no reason");
                                    bail!("subscription closed by relay: {reason}");
                                }
                                _ => {}
                            }
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        Ok(events)
    }

    /// Send one signed event and wait for the relay's OK verdict.
    pub async fn publish(&self, ev: &Event) -> Result<()> {
        let mut ws = connect_ws(&self.url, self.tor_socks.as_deref()).await?;
        ws.send(Message::Text(json!(["EVENT", ev]).to_string()))
            .await?;
        while let Some(msg) = ws.next().await {
            match msg? {
                Message::Text(txt) => {
                    if let Ok(val) = serde_json::from_str::<Value>(&txt) {
                        if let Some(arr) = val.as_array() {
                            if arr.first().and_then(|v| v.as_str()) == Some("OK")
                                && arr.get(1).and_then(|v| v.as_str()) == Some(ev.id.as_str())
                            {
                                if arr.get(2).and_then(|v| v.as_bool()).unwrap_or(false) {
                                    return Ok(());
                                }
                                let reason =
                                    arr.get(3).and_then(|v| v.as_str()).unwrap_or("rejected");
                                bail!("relay rejected event: {reason}");
                            }
                        }
                    }
                }
                Message::Close(_) => break,
                _ => {}
            }
        }
        bail!("connection closed before OK")
    }
}

/// Broadcast an event to every relay in `relays`, returning how many
/// accepted it. Errors only when no relay accepts.
pub async fn broadcast(relays: &[String], tor_socks: Option<&str>, ev: &Event) -> Result<usize> {
    if relays.is_empty() {
        bail!("no publish relays configured");
    }
    let mut accepted = 0;
    for relay in relays {
        let client = RelayClient::new(relay.clone(), tor_socks.map(|s| s.to_string()), false);
        match client.publish(ev).await {
            Ok(()) => accepted += 1,
            Err(e) => warn!("publish to {relay} failed: {e}"),
        }
    }
    if accepted == 0 {
        bail!("event {} was not accepted by any relay", ev.id);
    }
    Ok(accepted)
}

/// Establish a WebSocket connection, optionally via a SOCKS5 proxy.
async fn connect_ws(
    relay: &str,
    tor_socks: Option<&str>,
) -> Result<WebSocketStream<Box<dyn AsyncReadWrite + Unpin + Send>>> {
    let url = Url::parse(relay)?;
    let host = url.host_str().ok_or_else(|| anyhow!("missing host"))?;
    let port = url
        .port_or_known_default()
        .ok_or_else(|| anyhow!("missing port"))?;
    let req = relay.into_client_request()?;
    let stream: Box<dyn AsyncReadWrite + Unpin + Send> = if let Some(proxy) = tor_socks {
        Box::new(Socks5Stream::connect(proxy, (host, port)).await?)
    } else {
        Box::new(TcpStream::connect((host, port)).await?)
    };
    let (ws, _) = client_async(req, stream).await?;
    Ok(ws)
}

/// Blanket trait for boxed async read/write streams.
trait AsyncReadWrite: AsyncRead + AsyncWrite {}
impl<T: AsyncRead + AsyncWrite> AsyncReadWrite for T {}
