//! Frame sources
//!
//! The landmark detector runs outside this crate. Its output reaches the
//! state machines through a [`FrameSource`]: one [`HandFrame`] per video
//! frame, in order. A source error is terminal for the session.

use crate::hand::HandFrame;
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

/// Most hands kept per frame
pub const MAX_HANDS_PER_FRAME: usize = 2;

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("Failed to open frame source {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read frame source: {0}")]
    Read(#[from] std::io::Error),

    #[error("Invalid frame on line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// A stream of hand frames
pub trait FrameSource {
    /// Next frame; `Ok(None)` at a clean end of stream
    fn next_frame(&mut self) -> Result<Option<HandFrame>, SourceError>;
}

/// Reads one JSON frame per line
///
/// ```text
/// {"t_ms": 0, "hands": [{"handedness": "right", "landmarks": [{"x": 640, "y": 360}, ...]}]}
/// ```
pub struct JsonlFrameSource<R> {
    reader: R,
    line_number: usize,
    buffer: String,
}

impl<R: BufRead> JsonlFrameSource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            line_number: 0,
            buffer: String::new(),
        }
    }

    /// Lines consumed so far, including blank ones
    pub fn line_number(&self) -> usize {
        self.line_number
    }
}

impl JsonlFrameSource<BufReader<File>> {
    pub fn open(path: &Path) -> Result<Self, SourceError> {
        let file = File::open(path).map_err(|source| SourceError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::info!("Reading frames from {}", path.display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> FrameSource for JsonlFrameSource<R> {
    fn next_frame(&mut self) -> Result<Option<HandFrame>, SourceError> {
        loop {
            self.buffer.clear();
            if self.reader.read_line(&mut self.buffer)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let line = self.buffer.trim();
            if line.is_empty() {
                continue;
            }

            let mut frame: HandFrame =
                serde_json::from_str(line).map_err(|source| SourceError::Parse {
                    line: self.line_number,
                    source,
                })?;

            if frame.hands.len() > MAX_HANDS_PER_FRAME {
                tracing::debug!(
                    "Frame at {} ms has {} hands, keeping {}",
                    frame.timestamp_ms,
                    frame.hands.len(),
                    MAX_HANDS_PER_FRAME
                );
                frame.hands.truncate(MAX_HANDS_PER_FRAME);
            }

            return Ok(Some(frame));
        }
    }
}

/// In-memory frames, served in order
#[derive(Debug, Clone, Default)]
pub struct VecFrameSource {
    frames: VecDeque<HandFrame>,
}

impl VecFrameSource {
    pub fn new(frames: Vec<HandFrame>) -> Self {
        Self {
            frames: frames.into(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.frames.len()
    }
}

impl From<Vec<HandFrame>> for VecFrameSource {
    fn from(frames: Vec<HandFrame>) -> Self {
        Self::new(frames)
    }
}

impl FrameSource for VecFrameSource {
    fn next_frame(&mut self) -> Result<Option<HandFrame>, SourceError> {
        Ok(self.frames.pop_front())
    }
}
