//! Landmark sources

use crate::frame::{unix_millis, Landmark, LandmarkFrame, Observation};
use crate::LandmarkError;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::VecDeque;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::{debug, info};

/// Supplier of one observation per sampling tick
///
/// `next_frame` may block until the next tick is available. Callers bound the
/// wait themselves, so implementations must be cancel-safe at the await
/// point.
#[async_trait]
pub trait LandmarkSource: Send {
    /// Wait for the next tick
    async fn next_frame(&mut self) -> Result<Observation, LandmarkError>;
}

/// Replays a fixed sequence of observations
pub struct ScriptedSource {
    queue: VecDeque<Observation>,
}

impl ScriptedSource {
    /// Create a source that yields `observations` back to back
    pub fn new<I>(observations: I) -> Self
    where
        I: IntoIterator<Item = Observation>,
    {
        Self {
            queue: observations.into_iter().collect(),
        }
    }

    /// Observations not yet replayed
    pub fn remaining(&self) -> usize {
        self.queue.len()
    }
}

#[async_trait]
impl LandmarkSource for ScriptedSource {
    async fn next_frame(&mut self) -> Result<Observation, LandmarkError> {
        self.queue.pop_front().ok_or(LandmarkError::SourceExhausted)
    }
}

/// Line format produced by an external face-mesh process
#[derive(Debug, Deserialize)]
struct WireObservation {
    #[serde(default)]
    t_ms: Option<u64>,
    #[serde(default)]
    landmarks: Option<Vec<Landmark>>,
}

/// Reads newline-delimited JSON observations from an async reader
///
/// Each line is `{"t_ms": 1700000000000, "landmarks": [[x, y, z], ...]}`,
/// with `"landmarks": null` (or absent) for ticks without a face. Lines
/// without `t_ms` are stamped on receipt.
pub struct JsonLinesSource<R> {
    lines: Lines<R>,
    line_no: usize,
    clock: fn() -> u64,
}

impl<R> JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    /// Create a source stamped with wall-clock time
    pub fn new(reader: R) -> Self {
        Self::with_clock(reader, unix_millis)
    }

    /// Create a source with a custom timestamp clock
    pub fn with_clock(reader: R, clock: fn() -> u64) -> Self {
        info!("Reading landmark observations as JSON lines");
        Self {
            lines: reader.lines(),
            line_no: 0,
            clock,
        }
    }

    fn decode(&self, line: &str) -> Result<Observation, LandmarkError> {
        let wire: WireObservation =
            serde_json::from_str(line).map_err(|e| LandmarkError::Decode {
                line: self.line_no,
                message: e.to_string(),
            })?;

        let timestamp_ms = wire.t_ms.unwrap_or_else(self.clock);
        Ok(match wire.landmarks {
            Some(points) if !points.is_empty() => {
                Observation::face(timestamp_ms, LandmarkFrame::from_dense(points))
            }
            _ => Observation::no_face(timestamp_ms),
        })
    }
}

#[async_trait]
impl<R> LandmarkSource for JsonLinesSource<R>
where
    R: AsyncBufRead + Unpin + Send,
{
    async fn next_frame(&mut self) -> Result<Observation, LandmarkError> {
        loop {
            let line = match self.lines.next_line().await? {
                Some(line) => line,
                None => {
                    debug!("Landmark stream closed after {} lines", self.line_no);
                    return Err(LandmarkError::SourceExhausted);
                }
            };
            self.line_no += 1;

            if line.trim().is_empty() {
                continue;
            }
            return self.decode(&line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    fn fixed_clock() -> u64 {
        42
    }

    #[tokio::test]
    async fn test_scripted_source_replays_then_exhausts() {
        let mut source = ScriptedSource::new(vec![
            Observation::no_face(0),
            Observation::face(100, LandmarkFrame::new().with(1, Landmark::new(1.0, 2.0))),
        ]);

        assert!(!source.next_frame().await.unwrap().has_face());
        assert!(source.next_frame().await.unwrap().has_face());
        assert!(matches!(
            source.next_frame().await,
            Err(LandmarkError::SourceExhausted)
        ));
    }

    #[tokio::test]
    async fn test_json_lines_decoding() {
        let input = "{\"t_ms\": 5, \"landmarks\": [[0.0, 0.0], [1.0, 1.0, 0.5]]}\n\
                     \n\
                     {\"t_ms\": 10, \"landmarks\": null}\n\
                     {\"landmarks\": []}\n";
        let mut source = JsonLinesSource::with_clock(BufReader::new(input.as_bytes()), fixed_clock);

        let first = source.next_frame().await.unwrap();
        assert_eq!(first.timestamp_ms, 5);
        let frame = first.face.unwrap();
        assert_eq!(frame.len(), 2);
        assert_eq!(frame.get(1), Some(&Landmark::with_depth(1.0, 1.0, 0.5)));

        let second = source.next_frame().await.unwrap();
        assert_eq!(second, Observation::no_face(10));

        let third = source.next_frame().await.unwrap();
        assert_eq!(third, Observation::no_face(42));

        assert!(matches!(
            source.next_frame().await,
            Err(LandmarkError::SourceExhausted)
        ));
    }

    #[tokio::test]
    async fn test_json_lines_reports_bad_line() {
        let input = "{\"t_ms\": 1}\nnot json\n";
        let mut source = JsonLinesSource::with_clock(BufReader::new(input.as_bytes()), fixed_clock);

        assert!(source.next_frame().await.is_ok());
        match source.next_frame().await {
            Err(LandmarkError::Decode { line, .. }) => assert_eq!(line, 2),
            other => panic!("expected decode error, got {:?}", other),
        }
    }
}
