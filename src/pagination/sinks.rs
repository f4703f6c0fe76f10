use crate::entity::Entity;
use crate::errors::AdapterError;
use async_trait::async_trait;
use std::io::{BufWriter, Write};
use tokio::sync::mpsc;

/// Receives a result set chunk by chunk.
#[async_trait]
pub trait EntitySink: Send {
    async fn write(&mut self, chunk: Vec<Entity>) -> Result<(), AdapterError>;
    async fn end(&mut self) -> Result<(), AdapterError>;
}

/// Collects chunks in memory.
#[derive(Debug, Default)]
pub struct VecSink {
    chunks: Vec<Vec<Entity>>,
    ends: usize,
}

impl VecSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn chunks(&self) -> &[Vec<Entity>] {
        &self.chunks
    }

    /// All entities, flattened in arrival order.
    #[must_use]
    pub fn entities(&self) -> Vec<Entity> {
        self.chunks.iter().flatten().cloned().collect()
    }

    #[must_use]
    pub const fn end_count(&self) -> usize {
        self.ends
    }
}

#[async_trait]
impl EntitySink for VecSink {
    async fn write(&mut self, chunk: Vec<Entity>) -> Result<(), AdapterError> {
        self.chunks.push(chunk);
        Ok(())
    }

    async fn end(&mut self) -> Result<(), AdapterError> {
        self.ends += 1;
        Ok(())
    }
}

/// Forwards chunks over a bounded channel; `end` closes it.
pub struct ChannelSink {
    tx: Option<mpsc::Sender<Vec<Entity>>>,
}

impl ChannelSink {
    #[must_use]
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<Vec<Entity>>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx: Some(tx) }, rx)
    }
}

#[async_trait]
impl EntitySink for ChannelSink {
    async fn write(&mut self, chunk: Vec<Entity>) -> Result<(), AdapterError> {
        let tx = self.tx.as_ref().ok_or_else(|| AdapterError::Sink("write after end".into()))?;
        tx.send(chunk).await.map_err(|_| AdapterError::Sink("receiver dropped".into()))
    }

    async fn end(&mut self) -> Result<(), AdapterError> {
        self.tx = None;
        Ok(())
    }
}

/// Writes one JSON object per line.
pub struct NdjsonSink<W: Write + Send> {
    w: BufWriter<W>,
}

impl<W: Write + Send> NdjsonSink<W> {
    pub fn new(inner: W) -> Self {
        Self { w: BufWriter::new(inner) }
    }

    /// # Errors
    /// `Io` if buffered output cannot be flushed.
    pub fn into_inner(self) -> Result<W, AdapterError> {
        self.w.into_inner().map_err(|e| AdapterError::Io(e.error().to_string()))
    }
}

#[async_trait]
impl<W: Write + Send> EntitySink for NdjsonSink<W> {
    async fn write(&mut self, chunk: Vec<Entity>) -> Result<(), AdapterError> {
        for e in &chunk {
            let s = serde_json::to_string(e)?;
            writeln!(self.w, "{s}").map_err(|e| AdapterError::Io(e.to_string()))?;
        }
        Ok(())
    }

    async fn end(&mut self) -> Result<(), AdapterError> {
        self.w.flush().map_err(|e| AdapterError::Io(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_sink_closes_on_end() {
        let (mut sink, mut rx) = ChannelSink::new(4);
        sink.write(vec![Entity::with_keys("p", "1")]).await.unwrap();
        sink.end().await.unwrap();
        assert_eq!(rx.recv().await.unwrap().len(), 1);
        assert!(rx.recv().await.is_none());
        assert!(matches!(sink.write(Vec::new()).await, Err(AdapterError::Sink(_))));
    }

    #[tokio::test]
    async fn ndjson_one_line_per_entity() {
        let mut sink = NdjsonSink::new(Vec::new());
        sink.write(vec![Entity::with_keys("p", "1"), Entity::with_keys("p", "2")]).await.unwrap();
        sink.end().await.unwrap();
        let out = String::from_utf8(sink.into_inner().unwrap()).unwrap();
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1], r#"{"PartitionKey":"p","RowKey":"2"}"#);
    }
}
