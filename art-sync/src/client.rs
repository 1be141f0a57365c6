//! # Vendor websocket client (CLI <-> Core)
//!
//! Bridges the core [`ArtDevice`] capability trait to the vendor's art-app
//! channel: a TLS websocket on port 8002 carrying JSON envelopes, a REST
//! device-info endpoint on port 8001 for the power state, and a side-channel
//! TCP socket for the image bytes of an upload.
//!
//! Displays present a self-signed certificate, so certificate validation is
//! disabled for the channel. Pairing tokens handed out on first connect are
//! persisted per device under the token directory and replayed on later
//! connects so the user is not re-prompted on the device.
//!
//! All transport, serialization, and error handling is encapsulated here;
//! the reconciler only sees the trait.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::timeout;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream};
use tracing::{debug, info, warn};
use uuid::Uuid;

use art_sync_core::config::{SyncConfig, API_TIMEOUT, CONNECTION_TIMEOUT};
use art_sync_core::contract::{
    ArtDevice, DeviceConnector, DeviceError, PowerAndMode, SlideshowKind, SlideshowSettings,
    UploadRequest, UPLOADED_CATEGORY,
};
use art_sync_core::mapping::sanitize_address;

const ART_CHANNEL_PORT: u16 = 8002;
const DEVICE_INFO_PORT: u16 = 8001;
const APP_NAME: &str = "art-sync";

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Produces [`FrameDevice`] sessions with the configured connect timeout.
pub struct FrameConnector {
    config: Arc<SyncConfig>,
}

impl FrameConnector {
    pub fn new(config: Arc<SyncConfig>) -> Self {
        FrameConnector { config }
    }
}

#[async_trait]
impl DeviceConnector for FrameConnector {
    type Device = FrameDevice;

    async fn connect(&self, address: &str) -> Result<FrameDevice, DeviceError> {
        timeout(CONNECTION_TIMEOUT, FrameDevice::open(address, &self.config))
            .await
            .map_err(|_| -> DeviceError {
                format!("connection to {address} timed out (device may be off)").into()
            })?
    }
}

/// One live session on a display's art-app channel.
pub struct FrameDevice {
    address: String,
    ws: Mutex<WsStream>,
    http: reqwest::Client,
    token_path: PathBuf,
}

impl FrameDevice {
    async fn open(address: &str, config: &SyncConfig) -> Result<Self, DeviceError> {
        let token_path = config
            .token_dir
            .join(format!("tv_{}_token.txt", sanitize_address(address)));
        let token = std::fs::read_to_string(&token_path)
            .ok()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty());

        let mut url = format!(
            "wss://{address}:{ART_CHANNEL_PORT}/api/v2/channels/com.samsung.art-app?name={}",
            BASE64.encode(APP_NAME)
        );
        if let Some(token) = &token {
            url.push_str("&token=");
            url.push_str(token);
        }

        // Displays ship a self-signed certificate.
        let tls = native_tls::TlsConnector::builder()
            .danger_accept_invalid_certs(true)
            .build()?;
        let (ws, _response) =
            connect_async_tls_with_config(url.as_str(), None, false, Some(Connector::NativeTls(tls)))
                .await?;

        let device = FrameDevice {
            address: address.to_string(),
            ws: Mutex::new(ws),
            http: reqwest::Client::new(),
            token_path,
        };
        device.await_channel_ready().await?;
        // Probe the art capability now so an unsupported model fails at
        // connect time instead of mid-pass.
        device.art_request(json!({ "request": "get_api_version" })).await?;
        info!(device = %device.address, "Connected to art channel");
        Ok(device)
    }

    /// Consume channel frames until the connect handshake completes,
    /// persisting a newly issued pairing token when one is handed out.
    async fn await_channel_ready(&self) -> Result<(), DeviceError> {
        let mut ws = self.ws.lock().await;
        let handshake = async {
            loop {
                let message = ws
                    .next()
                    .await
                    .ok_or_else(|| -> DeviceError { "channel closed during handshake".into() })??;
                let Message::Text(text) = message else { continue };
                let Ok(frame) = serde_json::from_str::<Value>(&text) else {
                    continue;
                };
                match frame["event"].as_str() {
                    Some("ms.channel.connect") | Some("ms.channel.ready") => {
                        if let Some(token) = frame["data"]["token"].as_str() {
                            self.persist_token(token);
                        }
                        return Ok(());
                    }
                    Some("ms.channel.unauthorized") => {
                        return Err("device rejected the pairing token".into());
                    }
                    _ => continue,
                }
            }
        };
        timeout(CONNECTION_TIMEOUT, handshake)
            .await
            .map_err(|_| -> DeviceError { "channel handshake timed out".into() })?
    }

    fn persist_token(&self, token: &str) {
        if let Some(parent) = self.token_path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(path = %self.token_path.display(), error = %e, "Failed to create token directory");
                return;
            }
        }
        match std::fs::write(&self.token_path, token) {
            Ok(()) => debug!(path = %self.token_path.display(), "Persisted pairing token"),
            Err(e) => warn!(path = %self.token_path.display(), error = %e, "Failed to persist pairing token"),
        }
    }

    fn envelope(body: &Value) -> String {
        json!({
            "method": "ms.channel.emit",
            "params": {
                "event": "art_app_request",
                "to": "host",
                "data": body.to_string(),
            }
        })
        .to_string()
    }

    /// Send one art-app request and wait for the correlated reply.
    async fn art_request(&self, mut body: Value) -> Result<Value, DeviceError> {
        let request_id = Uuid::new_v4().to_string();
        body["id"] = json!(request_id);
        let mut ws = self.ws.lock().await;
        ws.send(Message::Text(Self::envelope(&body))).await?;
        timeout(API_TIMEOUT, Self::wait_for_reply(&mut ws, &request_id))
            .await
            .map_err(|_| -> DeviceError {
                format!("device {} did not answer within {API_TIMEOUT:?}", self.address).into()
            })?
    }

    /// Send one art-app request without waiting for an acknowledgement;
    /// firmware acks for these vary by model.
    async fn art_send(&self, mut body: Value) -> Result<(), DeviceError> {
        body["id"] = json!(Uuid::new_v4().to_string());
        let mut ws = self.ws.lock().await;
        ws.send(Message::Text(Self::envelope(&body))).await?;
        Ok(())
    }

    async fn wait_for_reply(ws: &mut WsStream, request_id: &str) -> Result<Value, DeviceError> {
        loop {
            let Some(inner) = Self::next_art_message(ws).await? else {
                continue;
            };
            if inner["id"] != request_id && inner["request_id"] != request_id {
                continue;
            }
            if inner["event"] == "error" {
                return Err(format!(
                    "device returned error {} for request {request_id}",
                    inner["error_code"]
                )
                .into());
            }
            return Ok(inner);
        }
    }

    async fn wait_for_event(ws: &mut WsStream, event: &str) -> Result<Value, DeviceError> {
        loop {
            let Some(inner) = Self::next_art_message(ws).await? else {
                continue;
            };
            if inner["event"] == event {
                return Ok(inner);
            }
        }
    }

    /// Next decoded art-app payload off the channel, skipping frames that
    /// are not `d2d_service_message` or that fail to parse.
    async fn next_art_message(ws: &mut WsStream) -> Result<Option<Value>, DeviceError> {
        let message = ws
            .next()
            .await
            .ok_or_else(|| -> DeviceError { "channel closed".into() })??;
        let Message::Text(text) = message else {
            return Ok(None);
        };
        let Ok(frame) = serde_json::from_str::<Value>(&text) else {
            return Ok(None);
        };
        if frame["event"] != "d2d_service_message" {
            return Ok(None);
        }
        let Some(data) = frame["params"]["data"].as_str() else {
            return Ok(None);
        };
        Ok(serde_json::from_str(data).ok())
    }

    /// Push the image bytes over the side-channel socket the device opened
    /// for this transfer.
    async fn stream_image(
        conn_info: &Value,
        req: &UploadRequest<'_>,
    ) -> Result<(), DeviceError> {
        let ip = conn_info["ip"]
            .as_str()
            .ok_or("upload conn_info is missing ip")?;
        let port = match &conn_info["port"] {
            Value::Number(n) => n.as_u64().unwrap_or(0),
            Value::String(s) => s.parse().unwrap_or(0),
            _ => 0,
        };
        if port == 0 {
            return Err("upload conn_info is missing port".into());
        }
        let key = conn_info["key"].as_str().unwrap_or_default();

        let header = json!({
            "num": 0,
            "total": 1,
            "fileLength": req.data.len(),
            "fileName": req.filename,
            "fileType": req.file_type.as_wire(),
            "secKey": key,
            "version": "0.0.1",
        })
        .to_string();

        let mut socket = TcpStream::connect((ip, port as u16)).await?;
        socket.write_all(&(header.len() as u32).to_be_bytes()).await?;
        socket.write_all(header.as_bytes()).await?;
        socket.write_all(req.data).await?;
        socket.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ArtDevice for FrameDevice {
    fn address(&self) -> &str {
        &self.address
    }

    async fn list_inventory(&self) -> Result<Vec<String>, DeviceError> {
        let reply = self
            .art_request(json!({
                "request": "get_content_list",
                "category": UPLOADED_CATEGORY,
            }))
            .await?;
        // The listing arrives as a JSON string inside the payload.
        let raw = reply["content_list"].as_str().unwrap_or("[]");
        let items: Vec<Value> = serde_json::from_str(raw).unwrap_or_default();
        let ids = items
            .iter()
            .filter(|item| {
                item["category_id"]
                    .as_str()
                    .map(|c| c == UPLOADED_CATEGORY)
                    .unwrap_or(true)
            })
            .filter_map(|item| item["content_id"].as_str().map(str::to_string))
            .collect();
        Ok(ids)
    }

    async fn upload<'a>(&self, req: UploadRequest<'a>) -> Result<String, DeviceError> {
        let ready = self
            .art_request(json!({
                "request": "send_image",
                "file_type": req.file_type.as_wire(),
                "file_size": req.data.len(),
                "matte_id": req.matte.unwrap_or("none"),
                "conn_info": { "d2d_mode": "socket" },
            }))
            .await?;
        let conn_raw = ready["conn_info"]
            .as_str()
            .ok_or("ready_to_use reply is missing conn_info")?;
        let conn_info: Value = serde_json::from_str(conn_raw)?;

        Self::stream_image(&conn_info, &req).await?;

        // The device announces the stored image on the channel once the
        // transfer is complete.
        let mut ws = self.ws.lock().await;
        let added = timeout(API_TIMEOUT, Self::wait_for_event(&mut ws, "image_added"))
            .await
            .map_err(|_| -> DeviceError {
                format!("device {} never acknowledged the upload", self.address).into()
            })??;
        added["content_id"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| "image_added event is missing content_id".into())
    }

    async fn delete_batch(&self, content_ids: &[String]) -> Result<(), DeviceError> {
        let list: Vec<Value> = content_ids
            .iter()
            .map(|id| json!({ "content_id": id }))
            .collect();
        self.art_request(json!({
            "request": "delete_image_list",
            "content_id_list": list,
        }))
        .await?;
        Ok(())
    }

    async fn select_content(&self, content_id: &str, show: bool) -> Result<(), DeviceError> {
        self.art_send(json!({
            "request": "select_image",
            "category_id": UPLOADED_CATEGORY,
            "content_id": content_id,
            "show": show,
        }))
        .await
    }

    async fn get_slideshow(&self) -> Result<Option<SlideshowSettings>, DeviceError> {
        let reply = self
            .art_request(json!({ "request": "get_slideshow_status" }))
            .await?;
        let value = reply["value"].as_str().unwrap_or("off");
        if value.is_empty() || value == "off" {
            return Ok(None);
        }
        Ok(Some(SlideshowSettings {
            value: value.to_string(),
            kind: SlideshowKind::from_wire(reply["type"].as_str().unwrap_or("shuffleslideshow")),
            category: reply["category_id"]
                .as_str()
                .unwrap_or(UPLOADED_CATEGORY)
                .to_string(),
        }))
    }

    async fn set_slideshow(&self, settings: &SlideshowSettings) -> Result<(), DeviceError> {
        self.art_request(json!({
            "request": "set_slideshow_status",
            "value": settings.value.as_str(),
            "category_id": settings.category.as_str(),
            "type": settings.kind.as_wire(),
        }))
        .await?;
        Ok(())
    }

    async fn set_brightness(&self, level: u8) -> Result<(), DeviceError> {
        self.art_send(json!({
            "request": "set_brightness",
            "value": level,
        }))
        .await
    }

    async fn power_and_mode(&self) -> Result<PowerAndMode, DeviceError> {
        let url = format!("http://{}:{DEVICE_INFO_PORT}/api/v2/", self.address);
        let info: Value = self
            .http
            .get(&url)
            .timeout(API_TIMEOUT)
            .send()
            .await?
            .json()
            .await?;
        // Older firmware omits PowerState entirely; treat that as on.
        let powered_on = info["device"]["PowerState"]
            .as_str()
            .map(|state| state == "on")
            .unwrap_or(true);

        let art_mode = match self.art_request(json!({ "request": "get_artmode_status" })).await {
            Ok(reply) => reply["value"].as_str().map(|v| v == "on"),
            Err(e) => {
                debug!(device = %self.address, error = %e, "Art-mode status not readable on this model");
                None
            }
        };
        Ok(PowerAndMode {
            powered_on,
            art_mode,
        })
    }

    async fn close(&self) {
        let mut ws = self.ws.lock().await;
        if let Err(e) = ws.close(None).await {
            debug!(device = %self.address, error = %e, "Error closing art channel");
        }
    }
}
