use crate::error::{PhaiError, Result};
use crate::view::input::InputEvent;
use crate::view::{scripts, BrowsingSession, EmbeddedView};
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use serde_json::json;
use std::collections::HashMap;
use std::path::Path;
use std::process::Command;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_tungstenite::{connect_async, tungstenite::Message as WsMessage};

type WsSink = futures::stream::SplitSink<
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    WsMessage,
>;

type PendingResponses = Arc<Mutex<HashMap<u32, tokio::sync::oneshot::Sender<serde_json::Value>>>>;

const COMMAND_TIMEOUT_SECS: u64 = 30;
const CONNECT_RETRIES: u32 = 30;

/// CDP client for one page target, using a raw WebSocket.
pub struct CDPClient {
    ws_tx: Option<Arc<Mutex<WsSink>>>,
    responses: PendingResponses,
    connected: Arc<AtomicBool>,
    /// Chrome process ID, only when we launched it
    chrome_pid: Option<u32>,
    msg_id: AtomicU32,
    cdp_port: u16,
}

impl CDPClient {
    fn new(cdp_port: u16) -> Self {
        Self {
            ws_tx: None,
            responses: Arc::new(Mutex::new(HashMap::new())),
            connected: Arc::new(AtomicBool::new(false)),
            chrome_pid: None,
            msg_id: AtomicU32::new(1),
            cdp_port,
        }
    }

    /// Attach to the first page target of a Chrome already listening on `cdp_port`.
    pub async fn attach(cdp_port: u16) -> std::result::Result<Self, String> {
        let mut client = Self::new(cdp_port);
        client.connect_page_target().await?;
        Ok(client)
    }

    /// Launch Chrome with a persistent profile and connect to its first page.
    pub async fn launch(
        chrome_path: &Path,
        user_data_dir: Option<&Path>,
        cdp_port: u16,
        start_url: &str,
    ) -> std::result::Result<Self, String> {
        let mut cmd = Command::new(chrome_path);

        if let Some(dir) = user_data_dir {
            cmd.arg(format!("--user-data-dir={}", dir.display()));
        }
        cmd.arg(format!("--remote-debugging-port={}", cdp_port));
        cmd.arg("--no-first-run");
        cmd.arg("--no-default-browser-check");
        cmd.arg(start_url);

        let child = cmd
            .spawn()
            .map_err(|e| format!("Failed to launch Chrome: {}", e))?;

        let mut client = Self::new(cdp_port);
        client.chrome_pid = Some(child.id());
        client.connect_page_target().await?;
        Ok(client)
    }

    pub fn is_connected(&self) -> bool {
        self.ws_tx.is_some() && self.connected.load(Ordering::SeqCst)
    }

    /// Poll the DevTools target list until a page target accepts a WebSocket.
    async fn connect_page_target(&mut self) -> std::result::Result<(), String> {
        let list_url = format!("http://127.0.0.1:{}/json/list", self.cdp_port);
        let mut last_error = String::new();

        for retry in 1..=CONNECT_RETRIES {
            match find_page_ws_url(&list_url).await {
                Ok(ws_url) => {
                    tracing::info!("Connecting to page target WebSocket: {}", ws_url);
                    match connect_async(ws_url.as_str()).await {
                        Ok((ws_stream, _)) => {
                            let (tx, rx) = StreamExt::split(ws_stream);
                            self.ws_tx = Some(Arc::new(Mutex::new(tx)));
                            self.connected.store(true, Ordering::SeqCst);
                            spawn_reader(rx, self.responses.clone(), self.connected.clone());

                            self.send_command("Page.enable", json!({})).await?;
                            self.send_command("Runtime.enable", json!({})).await?;
                            self.send_command("Network.enable", json!({})).await?;
                            tracing::info!("CDP client connected on port {}", self.cdp_port);
                            return Ok(());
                        }
                        Err(e) => last_error = format!("Failed to connect WebSocket: {}", e),
                    }
                }
                Err(e) => last_error = e,
            }

            tracing::debug!("Retry {}/{}: {}", retry, CONNECT_RETRIES, last_error);
            tokio::time::sleep(tokio::time::Duration::from_millis(500)).await;
        }

        Err(format!(
            "Failed to connect to Chrome after {} retries: {}",
            CONNECT_RETRIES, last_error
        ))
    }

    /// Send a CDP command and wait for its `result`.
    pub async fn send_command(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> std::result::Result<serde_json::Value, String> {
        let tx = self.ws_tx.as_ref().ok_or("WebSocket not connected")?;

        let id = self.msg_id.fetch_add(1, Ordering::SeqCst);
        let (resp_tx, resp_rx) = tokio::sync::oneshot::channel();
        self.responses.lock().await.insert(id, resp_tx);

        let command = json!({
            "id": id,
            "method": method,
            "params": params
        });

        {
            let mut tx_guard = tx.lock().await;
            if let Err(e) = tx_guard.send(WsMessage::Text(command.to_string())).await {
                self.responses.lock().await.remove(&id);
                return Err(format!("Failed to send command: {}", e));
            }
        }

        let response = match tokio::time::timeout(
            tokio::time::Duration::from_secs(COMMAND_TIMEOUT_SECS),
            resp_rx,
        )
        .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(_)) => return Err("Response channel closed".to_string()),
            Err(_) => {
                self.responses.lock().await.remove(&id);
                return Err(format!("Command timeout: {}", method));
            }
        };

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown error");
            return Err(format!("{} failed: {}", method, message));
        }

        Ok(response
            .get("result")
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    /// Evaluate an expression, awaiting promises, and return it by value.
    pub async fn evaluate(&self, expression: &str) -> std::result::Result<serde_json::Value, String> {
        let result = self
            .send_command(
                "Runtime.evaluate",
                json!({
                    "expression": expression,
                    "returnByValue": true,
                    "awaitPromise": true
                }),
            )
            .await?;

        if let Some(details) = result.get("exceptionDetails") {
            let text = details
                .get("exception")
                .and_then(|e| e.get("description"))
                .or_else(|| details.get("text"))
                .and_then(|t| t.as_str())
                .unwrap_or("uncaught exception");
            return Err(format!("Script threw: {}", text));
        }

        Ok(result
            .get("result")
            .and_then(|r| r.get("value"))
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    /// Cookies the browser would send to `url`, as a `Cookie` header value.
    pub async fn cookie_header(&self, url: &str) -> std::result::Result<Option<String>, String> {
        let result = self
            .send_command("Network.getCookies", json!({ "urls": [url] }))
            .await?;

        let pairs: Vec<String> = result
            .get("cookies")
            .and_then(|c| c.as_array())
            .map(|cookies| {
                cookies
                    .iter()
                    .filter_map(|c| {
                        let name = c.get("name")?.as_str()?;
                        let value = c.get("value")?.as_str()?;
                        Some(format!("{}={}", name, value))
                    })
                    .collect()
            })
            .unwrap_or_default();

        if pairs.is_empty() {
            Ok(None)
        } else {
            Ok(Some(pairs.join("; ")))
        }
    }
}

#[async_trait]
impl EmbeddedView for CDPClient {
    async fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        tracing::trace!("Evaluating {}", scripts::tag_of(script).unwrap_or("script"));
        self.evaluate(script).await.map_err(PhaiError::Script)
    }

    async fn send_input_event(&self, event: &InputEvent) -> Result<()> {
        let (method, params) = event.to_cdp();
        self.send_command(method, params)
            .await
            .map(|_| ())
            .map_err(PhaiError::Cdp)
    }

    async fn session_context(&self, url: &str) -> Result<BrowsingSession> {
        let cookie_header = self.cookie_header(url).await.map_err(PhaiError::Cdp)?;
        let user_agent = self
            .evaluate(&scripts::user_agent())
            .await
            .map_err(PhaiError::Script)?
            .as_str()
            .map(|s| s.to_string());
        Ok(BrowsingSession {
            cookie_header,
            user_agent,
        })
    }

    /// Close the connection. A Chrome we launched is killed when the client drops.
    async fn close(&self) {
        if let Some(tx) = &self.ws_tx {
            let _ = tx.lock().await.close().await;
        }
        self.connected.store(false, Ordering::SeqCst);
        tracing::info!("CDP client closed on port {}", self.cdp_port);
    }
}

impl Drop for CDPClient {
    fn drop(&mut self) {
        if let Some(pid) = self.chrome_pid {
            kill_process(pid);
        }
    }
}

async fn find_page_ws_url(list_url: &str) -> std::result::Result<String, String> {
    let response = reqwest::get(list_url)
        .await
        .map_err(|e| format!("Connection error: {}", e))?;
    if !response.status().is_success() {
        return Err(format!("HTTP error: {}", response.status()));
    }
    let targets: serde_json::Value = response
        .json()
        .await
        .map_err(|e| format!("Failed to parse targets response: {}", e))?;
    page_ws_url(&targets).ok_or_else(|| "No page target found".to_string())
}

/// WebSocket URL of the first `page` target in a `/json/list` response.
fn page_ws_url(targets: &serde_json::Value) -> Option<String> {
    targets
        .as_array()?
        .iter()
        .filter(|t| t.get("type").and_then(|v| v.as_str()) == Some("page"))
        .find_map(|t| t.get("webSocketDebuggerUrl").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
}

/// Route responses to waiting senders by message id; events are ignored.
fn spawn_reader(
    mut rx: futures::stream::SplitStream<
        tokio_tungstenite::WebSocketStream<
            tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
        >,
    >,
    responses: PendingResponses,
    connected: Arc<AtomicBool>,
) {
    tokio::spawn(async move {
        while let Some(msg) = StreamExt::next(&mut rx).await {
            match msg {
                Ok(WsMessage::Text(text)) => {
                    let Ok(json) = serde_json::from_str::<serde_json::Value>(&text) else {
                        continue;
                    };
                    if let Some(id) = json.get("id").and_then(|i| i.as_u64()) {
                        if let Some(sender) = responses.lock().await.remove(&(id as u32)) {
                            let _ = sender.send(json);
                        }
                    }
                    tracing::trace!("WS received: {}", text.chars().take(100).collect::<String>());
                }
                Ok(WsMessage::Close(_)) => {
                    tracing::debug!("WebSocket closed");
                    break;
                }
                Err(e) => {
                    tracing::debug!("WebSocket error: {:?}", e);
                    break;
                }
                _ => {}
            }
        }
        connected.store(false, Ordering::SeqCst);
        // Dropping the senders fails every pending command with "channel closed".
        responses.lock().await.clear();
    });
}

fn kill_process(pid: u32) {
    #[cfg(unix)]
    {
        let _ = Command::new("kill").arg(pid.to_string()).spawn();
    }
    #[cfg(windows)]
    {
        let _ = Command::new("taskkill")
            .args(["/PID", &pid.to_string(), "/F"])
            .spawn();
    }
}
