//! HTTP client for a realtime-database style REST store.
//!
//! The store exposes the device tree as JSON documents:
//!
//! - `GET {base}/{root}.json` returns every device with its readings
//! - `GET {base}/{root}/{device}/readings.json` returns one device's readings
//! - the same collection URL with `Accept: text/event-stream` streams
//!   server-sent events (`put`, `patch`, `keep-alive`, `cancel`,
//!   `auth_revoked`) whenever the tree changes
//!
//! # Example
//!
//! ```no_run
//! use aquamon_core::http::HttpStore;
//! use aquamon_core::store::ReadingSource;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = HttpStore::new("https://example-db.firebaseio.com")?;
//! let devices = store.fetch_all_devices().await?;
//! println!("{} devices", devices.len());
//! # Ok(())
//! # }
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::header::ACCEPT;
use reqwest::{Client, Url};
use serde_json::Value;
use tracing::{debug, trace};

use aquamon_types::RawRecord;

use crate::error::{Error, Result};
use crate::store::{
    ChangeEvent, ChangeFeed, ChangeStream, DeviceRecords, READINGS_COLLECTION, ReadingSource,
    devices_from_tree, records_from_collection,
};

/// Default name of the node holding all devices.
pub const DEFAULT_ROOT: &str = "devices";

/// Default timeout for one-shot reads.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for establishing a connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection options for [`HttpStore`].
#[derive(Debug, Clone)]
pub struct HttpStoreOptions {
    /// Node holding the device tree.
    pub root: String,
    /// Total timeout of one-shot reads. The change stream has none.
    pub request_timeout: Duration,
    /// Timeout for establishing a connection, for reads and subscriptions alike.
    pub connect_timeout: Duration,
}

impl Default for HttpStoreOptions {
    fn default() -> Self {
        Self {
            root: DEFAULT_ROOT.to_string(),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }
}

impl HttpStoreOptions {
    /// Set the root node.
    #[must_use]
    pub fn root(mut self, root: impl Into<String>) -> Self {
        self.root = root.into();
        self
    }

    /// Set the read timeout.
    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect timeout.
    #[must_use]
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// REST client for the reading store.
#[derive(Debug, Clone)]
pub struct HttpStore {
    client: Client,
    base_url: String,
    options: HttpStoreOptions,
}

impl HttpStore {
    /// Create a store client with default options.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Base URL of the database (e.g. "https://my-db.firebaseio.com")
    pub fn new(base_url: &str) -> Result<Self> {
        Self::with_options(base_url, HttpStoreOptions::default())
    }

    /// Create a store client with custom options.
    pub fn with_options(base_url: &str, options: HttpStoreOptions) -> Result<Self> {
        let base_url = normalize_base_url(base_url)?;

        let client = Client::builder()
            .connect_timeout(options.connect_timeout)
            .build()
            .map_err(Error::Request)?;

        Ok(Self {
            client,
            base_url,
            options,
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get the root node name.
    pub fn root(&self) -> &str {
        &self.options.root
    }

    /// URL of the whole device tree.
    pub fn tree_url(&self) -> Result<Url> {
        let root: Vec<&str> = self.root_segments().collect();
        let Some((last, parents)) = root.split_last() else {
            return self.build_url(&[".json"]);
        };
        let last = format!("{last}.json");
        let mut segments: Vec<&str> = parents.to_vec();
        segments.push(&last);
        self.build_url(&segments)
    }

    /// URL of one device's readings collection.
    pub fn device_url(&self, device: &str) -> Result<Url> {
        let readings = format!("{READINGS_COLLECTION}.json");
        let mut segments: Vec<&str> = self.root_segments().collect();
        segments.push(device);
        segments.push(&readings);
        self.build_url(&segments)
    }

    fn root_segments(&self) -> impl Iterator<Item = &str> {
        self.options.root.split('/').filter(|s| !s.is_empty())
    }

    fn build_url(&self, segments: &[&str]) -> Result<Url> {
        let mut url =
            Url::parse(&self.base_url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", self.base_url)))?;
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(format!("cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    // ======================================================================
    // Internal HTTP helpers
    // ======================================================================

    async fn get_json(&self, url: Url) -> Result<Value> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url.clone())
            .timeout(self.options.request_timeout)
            .send()
            .await
            .map_err(|e| Error::NotReachable {
                url: url.to_string(),
                source: e,
            })?;

        self.handle_response(response).await
    }

    async fn handle_response(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Status {
                status: status.as_u16(),
                url: response.url().to_string(),
            });
        }

        let body = response.bytes().await.map_err(Error::Request)?;
        if body.is_empty() {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&body)?)
    }
}

fn normalize_base_url(base_url: &str) -> Result<String> {
    // Normalize URL (remove trailing slash)
    let base_url = base_url.trim().trim_end_matches('/').to_string();

    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(Error::InvalidUrl(format!(
            "URL must start with http:// or https://, got: {}",
            base_url
        )));
    }

    Url::parse(&base_url).map_err(|e| Error::InvalidUrl(format!("{base_url}: {e}")))?;
    Ok(base_url)
}

#[async_trait]
impl ReadingSource for HttpStore {
    async fn fetch_all_devices(&self) -> Result<Vec<DeviceRecords>> {
        let tree = self.get_json(self.tree_url()?).await?;
        Ok(devices_from_tree(tree))
    }

    async fn fetch_device(&self, device: &str) -> Result<Vec<RawRecord>> {
        let collection = self.get_json(self.device_url(device)?).await?;
        Ok(records_from_collection(device, collection))
    }
}

#[async_trait]
impl ChangeFeed for HttpStore {
    async fn subscribe(&self) -> Result<ChangeStream> {
        let url = self.tree_url()?;
        debug!("Subscribing to {url}");

        let response = self
            .client
            .get(url.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| Error::NotReachable {
                url: url.to_string(),
                source: e,
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Subscription(format!(
                "{url} answered HTTP {}",
                status.as_u16()
            )));
        }

        let state = FeedState {
            body: Box::pin(response.bytes_stream().map(|chunk| chunk.map(|b| b.to_vec()))),
            decoder: SseDecoder::default(),
            pending: VecDeque::new(),
            finished: false,
        };

        let stream = futures::stream::unfold(state, |mut state| async move {
            loop {
                if let Some(item) = state.pending.pop_front() {
                    return Some((item, state));
                }
                if state.finished {
                    return None;
                }

                match state.body.next().await {
                    Some(Ok(chunk)) => {
                        for frame in state.decoder.push(&chunk) {
                            match frame.classify() {
                                FeedItem::Change(event) => state.pending.push_back(Ok(event)),
                                FeedItem::KeepAlive => trace!("keep-alive"),
                                FeedItem::Closed(reason) => {
                                    state.pending.push_back(Err(Error::Subscription(reason)));
                                    state.finished = true;
                                    break;
                                }
                            }
                        }
                    }
                    Some(Err(e)) => {
                        state.pending.push_back(Err(Error::Request(e)));
                        state.finished = true;
                    }
                    None => state.finished = true,
                }
            }
        });

        Ok(Box::pin(stream))
    }
}

type BodyStream = std::pin::Pin<Box<dyn futures::Stream<Item = reqwest::Result<Vec<u8>>> + Send>>;

struct FeedState {
    body: BodyStream,
    decoder: SseDecoder,
    pending: VecDeque<Result<ChangeEvent>>,
    finished: bool,
}

// ==========================================================================
// Server-sent events
// ==========================================================================

/// One decoded server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseFrame {
    /// Value of the `event:` field.
    pub event: String,
    /// Joined `data:` lines.
    pub data: String,
}

/// What a frame means for the change stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedItem {
    /// The tree changed.
    Change(ChangeEvent),
    /// Heartbeat or an event type with no meaning here.
    KeepAlive,
    /// The server ended the subscription.
    Closed(String),
}

impl SseFrame {
    /// Interpret the frame.
    pub fn classify(&self) -> FeedItem {
        match self.event.as_str() {
            "put" | "patch" => FeedItem::Change(ChangeEvent {
                exists: change_exists(&self.data),
            }),
            "cancel" => FeedItem::Closed(format!("subscription cancelled: {}", self.data)),
            "auth_revoked" => FeedItem::Closed("credential expired".to_string()),
            _ => FeedItem::KeepAlive,
        }
    }
}

/// Whether the tree holds data after a `put`/`patch` with this payload.
///
/// A `put` of `null` at the root clears the tree; anything else leaves data behind.
fn change_exists(data: &str) -> bool {
    match serde_json::from_str::<Value>(data) {
        Ok(payload) => {
            let at_root = payload.get("path").and_then(Value::as_str) == Some("/");
            let cleared = payload.get("data").is_none_or(Value::is_null);
            !(at_root && cleared)
        }
        Err(_) => true,
    }
}

/// Longest line the decoder buffers. Longer lines are dropped.
pub const MAX_LINE_BYTES: usize = 64 * 1024;

/// Most `data:` bytes one frame may carry. Larger frames are dropped.
pub const MAX_FRAME_BYTES: usize = 1024 * 1024;

/// Incremental decoder for a `text/event-stream` body.
///
/// Lines may end in `\n`, `\r\n` or a bare `\r`, and chunk boundaries may
/// fall anywhere, including between `\r` and `\n` or inside a UTF-8
/// sequence. Memory is bounded by [`MAX_LINE_BYTES`] and [`MAX_FRAME_BYTES`].
#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    /// The last byte was `\r`; a following `\n` belongs to it.
    after_cr: bool,
    /// The current line overflowed and is skipped up to its terminator.
    skipping_line: bool,
    event: String,
    data: Vec<String>,
    data_len: usize,
    /// The current frame overflowed and is dropped at its blank line.
    oversized: bool,
}

impl SseDecoder {
    /// Feed a chunk and return the frames it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseFrame> {
        let mut frames = Vec::new();

        for &byte in chunk {
            let after_cr = std::mem::replace(&mut self.after_cr, false);
            match byte {
                b'\n' if after_cr => {}
                b'\n' | b'\r' => {
                    self.after_cr = byte == b'\r';
                    if let Some(frame) = self.end_line() {
                        frames.push(frame);
                    }
                }
                _ if self.skipping_line => {}
                _ if self.line.len() >= MAX_LINE_BYTES => {
                    debug!("Dropping event-stream line over {MAX_LINE_BYTES} bytes");
                    self.line.clear();
                    self.skipping_line = true;
                }
                _ => self.line.push(byte),
            }
        }

        frames
    }

    fn end_line(&mut self) -> Option<SseFrame> {
        if std::mem::take(&mut self.skipping_line) {
            return None;
        }
        let line = std::mem::take(&mut self.line);
        if line.is_empty() {
            return self.dispatch();
        }

        let line = String::from_utf8_lossy(&line);
        if line.starts_with(':') {
            return None;
        }
        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (&*line, ""),
        };
        match field {
            "event" => self.event = value.to_string(),
            "data" if !self.oversized => {
                self.data_len += value.len();
                if self.data_len > MAX_FRAME_BYTES {
                    debug!("Dropping event-stream frame over {MAX_FRAME_BYTES} bytes");
                    self.data.clear();
                    self.oversized = true;
                } else {
                    self.data.push(value.to_string());
                }
            }
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseFrame> {
        let event = std::mem::take(&mut self.event);
        let data = std::mem::take(&mut self.data);
        self.data_len = 0;
        if std::mem::take(&mut self.oversized) || (event.is_empty() && data.is_empty()) {
            return None;
        }
        Some(SseFrame {
            event,
            data: data.join("\n"),
        })
    }
}
