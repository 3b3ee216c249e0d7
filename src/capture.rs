//! Capture-side collaborator interfaces: the pose landmark source and the
//! recording device. The server treats encoded video as opaque bytes, so
//! nothing here is persisted except through an upload; these types exist so
//! client binaries have a seam to implement against.

use bytes::Bytes;
use chrono::{DateTime, Utc};
use crossbeam_channel::Receiver;

use crate::session::UploadMetadata;

/// A single tracked body landmark in normalized image coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub visibility: f32,
}

/// One frame worth of landmarks plus the skeleton edges to draw between
/// them. Rendered as an overlay only.
#[derive(Debug, Clone)]
pub struct PoseFrame {
    pub landmarks: Vec<Landmark>,
    pub connections: Vec<(u16, u16)>,
}

/// Per-frame landmark producer, e.g. a pose estimation model.
pub trait LandmarkSource {
    type Frame;

    /// Landmarks for one frame, or None when no body is detected.
    fn process(&mut self, frame: &Self::Frame) -> Option<PoseFrame>;
}

/// Events a recording device emits while a capture runs.
#[derive(Debug, Clone)]
pub enum CaptureEvent {
    /// A chunk of the encoded video stream became available
    ChunkAvailable(Bytes),
    /// The device stopped delivering data
    RecordingStopped,
}

/// A capture device delivers encoded video chunks over a channel. The
/// encoding is opaque (video/webm or equivalent).
pub trait CaptureDevice {
    fn start_recording(&mut self) -> Receiver<CaptureEvent>;
    fn stop_recording(&mut self);
}

/// Recorder lifecycle. One capture moves forward through
/// Idle -> Recording -> Finalizing -> Idle; there are no other transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
    Finalizing,
}

#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum RecorderError {
    #[error("recording already in progress")]
    AlreadyRecording,
    #[error("no recording in progress")]
    NotRecording,
    #[error("recording has not been stopped yet")]
    NotFinalizing,
}

/// A finished capture, ready to be turned into an upload.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedClip {
    pub data: Vec<u8>,
    pub started_at: DateTime<Utc>,
    pub stopped_at: DateTime<Utc>,
}

impl RecordedClip {
    /// Duration as measured on the capturing side; the server never
    /// recomputes it from the stored timestamps.
    pub fn duration_ms(&self) -> i64 {
        (self.stopped_at - self.started_at).num_milliseconds().max(0)
    }

    /// Upload metadata plus the encoded bytes for the multipart request.
    pub fn into_upload(
        self,
        session_id: String,
        patient_id: String,
        assessment: String,
    ) -> (UploadMetadata, Vec<u8>) {
        let metadata = UploadMetadata {
            session_id: Some(session_id),
            patient_id,
            assessment,
            start_time: self.started_at.to_rfc3339(),
            end_time: self.stopped_at.to_rfc3339(),
            duration_ms: self.duration_ms(),
        };
        (metadata, self.data)
    }
}

/// Explicit state machine that accumulates device events into one clip.
pub struct Recorder {
    state: RecorderState,
    chunks: Vec<Bytes>,
    started_at: Option<DateTime<Utc>>,
}

impl Recorder {
    pub fn new() -> Self {
        Recorder {
            state: RecorderState::Idle,
            chunks: Vec::new(),
            started_at: None,
        }
    }

    pub fn state(&self) -> RecorderState {
        self.state
    }

    /// Idle -> Recording. Starting twice is an error, not a silent restart.
    pub fn start(&mut self, started_at: DateTime<Utc>) -> Result<(), RecorderError> {
        if self.state != RecorderState::Idle {
            return Err(RecorderError::AlreadyRecording);
        }
        self.state = RecorderState::Recording;
        self.chunks.clear();
        self.started_at = Some(started_at);
        Ok(())
    }

    /// Feed one device event. Chunks are only accepted while recording;
    /// RecordingStopped moves to Finalizing.
    pub fn handle(&mut self, event: CaptureEvent) -> Result<(), RecorderError> {
        if self.state != RecorderState::Recording {
            return Err(RecorderError::NotRecording);
        }
        match event {
            CaptureEvent::ChunkAvailable(chunk) => self.chunks.push(chunk),
            CaptureEvent::RecordingStopped => self.state = RecorderState::Finalizing,
        }
        Ok(())
    }

    /// Drain device events until the stream stops. A disconnected channel
    /// counts as a stop signal from the device.
    pub fn collect_events(&mut self, events: &Receiver<CaptureEvent>) -> Result<(), RecorderError> {
        for event in events.iter() {
            let stopped = matches!(event, CaptureEvent::RecordingStopped);
            self.handle(event)?;
            if stopped {
                break;
            }
        }
        if self.state == RecorderState::Recording {
            self.handle(CaptureEvent::RecordingStopped)?;
        }
        Ok(())
    }

    /// Finalizing -> Idle, yielding the clip.
    pub fn finalize(&mut self, stopped_at: DateTime<Utc>) -> Result<RecordedClip, RecorderError> {
        if self.state != RecorderState::Finalizing {
            return Err(RecorderError::NotFinalizing);
        }
        let started_at = self.started_at.take().ok_or(RecorderError::NotFinalizing)?;

        let mut data = Vec::with_capacity(self.chunks.iter().map(Bytes::len).sum());
        for chunk in self.chunks.drain(..) {
            data.extend_from_slice(&chunk);
        }

        self.state = RecorderState::Idle;
        Ok(RecordedClip {
            data,
            started_at,
            stopped_at,
        })
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}
