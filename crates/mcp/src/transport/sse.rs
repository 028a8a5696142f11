//! HTTP+SSE transport.
//!
//! The server announces a POST endpoint as the first `endpoint` event on a
//! long-lived `text/event-stream` response. Client messages are POSTed to
//! that endpoint; server messages arrive as `message` events on the stream.

use std::collections::HashMap;

use futures::stream::BoxStream;
use futures::{StreamExt, TryStreamExt};
use reqwest::Url;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::codec::{FramedRead, LinesCodec};
use tokio_util::io::StreamReader;
use tracing::debug;

use super::{MAX_MESSAGE_SIZE, line_error};
use crate::error::{Error, Result};

/// Buffered server messages waiting for the session to read them.
const INBOUND_CAPACITY: usize = 64;

type LineStream = BoxStream<'static, Result<String>>;

/// One dispatched server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder, fed one line at a time.
#[derive(Debug, Default)]
pub struct SseEventParser {
    event: Option<String>,
    data: Vec<String>,
}

impl SseEventParser {
    /// Feed one line (without its terminator). Returns an event when a
    /// blank line dispatches one.
    pub fn push_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_string()),
            "data" => self.data.push(value.to_string()),
            // id and retry carry no meaning for this transport
            _ => {}
        }
        None
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let event = self.event.take();
        if self.data.is_empty() {
            return None;
        }
        let data = std::mem::take(&mut self.data).join("\n");
        Some(SseEvent {
            event: event.unwrap_or_else(|| "message".to_string()),
            data,
        })
    }
}

/// Connection to an SSE server.
pub struct SseTransport {
    http: reqwest::Client,
    endpoint: Url,
    headers: HeaderMap,
    inbound: Mutex<mpsc::Receiver<Result<String>>>,
    reader: JoinHandle<()>,
}

impl SseTransport {
    /// Open the event stream and wait for the endpoint announcement.
    pub async fn connect(url: &str, headers: &HashMap<String, String>) -> Result<Self> {
        let base = Url::parse(url).map_err(|e| Error::Url(format!("{url}: {e}")))?;
        let headers = header_map(headers)?;
        let http = reqwest::Client::new();

        let response = http
            .get(base.clone())
            .headers(headers.clone())
            .header(ACCEPT, "text/event-stream")
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        let mut lines: LineStream = FramedRead::new(
            StreamReader::new(response.bytes_stream().map_err(std::io::Error::other)),
            LinesCodec::new_with_max_length(MAX_MESSAGE_SIZE),
        )
        .map_err(line_error)
        .boxed();
        let mut parser = SseEventParser::default();

        let endpoint = loop {
            match next_event(&mut lines, &mut parser).await {
                Some(Ok(event)) if event.event == "endpoint" => {
                    let target = event.data.trim();
                    break base
                        .join(target)
                        .map_err(|e| Error::Url(format!("{target}: {e}")))?;
                }
                Some(Ok(event)) => {
                    debug!(event = %event.event, "ignoring event before endpoint");
                }
                Some(Err(e)) => return Err(e),
                None => return Err(Error::NoEndpoint),
            }
        };
        debug!(%endpoint, "event stream connected");

        let (tx, rx) = mpsc::channel(INBOUND_CAPACITY);
        let reader = tokio::spawn(forward_messages(lines, parser, tx));

        Ok(Self {
            http,
            endpoint,
            headers,
            inbound: Mutex::new(rx),
            reader,
        })
    }

    pub async fn send(&self, message: &str) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .headers(self.headers.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(message.to_string())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }

    pub async fn recv(&self) -> Result<String> {
        let mut inbound = self.inbound.lock().await;
        inbound.recv().await.unwrap_or(Err(Error::ServerExited))
    }

    /// Stop reading the event stream.
    pub fn close(&self) {
        self.reader.abort();
    }
}

impl Drop for SseTransport {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

async fn next_event(
    lines: &mut LineStream,
    parser: &mut SseEventParser,
) -> Option<Result<SseEvent>> {
    while let Some(line) = lines.next().await {
        match line {
            Ok(line) => {
                if let Some(event) = parser.push_line(&line) {
                    return Some(Ok(event));
                }
            }
            Err(e) => return Some(Err(e)),
        }
    }
    None
}

async fn forward_messages(
    mut lines: LineStream,
    mut parser: SseEventParser,
    tx: mpsc::Sender<Result<String>>,
) {
    while let Some(event) = next_event(&mut lines, &mut parser).await {
        let forwarded = match event {
            Ok(event) if event.event == "message" => tx.send(Ok(event.data)).await,
            Ok(event) => {
                debug!(event = %event.event, "ignoring event");
                Ok(())
            }
            Err(e) => {
                let _ = tx.send(Err(e)).await;
                return;
            }
        };
        if forwarded.is_err() {
            return;
        }
    }
    debug!("event stream ended");
}

fn header_map(headers: &HashMap<String, String>) -> Result<HeaderMap> {
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
        let value =
            HeaderValue::from_str(value).map_err(|e| Error::InvalidHeader(format!("{name}: {e}")))?;
        map.insert(name, value);
    }
    Ok(map)
}
