//! Scripted viewer sessions.
//!
//! A session script describes a viewport, an image, the labels the server
//! already knows and a list of steps: inputs, request completions, clock
//! advances and finally an optional unmount. Replaying it drives an
//! [`ImageViewer`] on a virtual clock, so recorded interactions can be
//! reproduced without a UI or a server.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use web_time::Instant;

use crate::coordinate_space::{ImageMetrics, Size};
use crate::error::{RequestError, ViewerError};
use crate::label::{Label, LabelId};
use crate::viewer::{
    HostEffect, ImageViewer, LabelRequest, Notice, RequestId, RequestOutcome, ViewerConfig,
    ViewerInput, ViewerSnapshot,
};

/// One step of a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum SessionStep {
    /// Feed an input to the viewer
    Input { input: ViewerInput },
    /// Complete a request. `error` wins over `server_id`; neither means success.
    Complete {
        request: RequestId,
        #[serde(default)]
        server_id: Option<LabelId>,
        #[serde(default)]
        error: Option<RequestError>,
    },
    /// Move the virtual clock forward and let the viewer catch up
    Advance { ms: u64 },
    Unmount,
}

impl SessionStep {
    fn completion(
        server_id: &Option<LabelId>,
        error: &Option<RequestError>,
    ) -> Result<RequestOutcome, RequestError> {
        match (error, server_id) {
            (Some(error), _) => Err(error.clone()),
            (None, Some(server_id)) => Ok(RequestOutcome::Created {
                server_id: server_id.clone(),
            }),
            (None, None) => Ok(RequestOutcome::Done),
        }
    }
}

/// A recorded viewer session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionScript {
    pub viewport: Size,
    /// Loaded before the first step when present
    #[serde(default)]
    pub image: Option<ImageMetrics>,
    #[serde(default)]
    pub labels: Vec<Label>,
    #[serde(default)]
    pub steps: Vec<SessionStep>,
}

impl SessionScript {
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        Ok(serde_json::from_str(json)?)
    }

    #[cfg(not(target_arch = "wasm32"))]
    pub fn load(path: &std::path::Path) -> Result<Self, SessionError> {
        let json = std::fs::read_to_string(path)?;
        let script = Self::from_json(&json)?;
        log::info!(
            "Loaded session {:?} with {} steps",
            path,
            script.steps.len()
        );
        Ok(script)
    }
}

/// Everything the viewer produced during a replay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionReport {
    pub requests: Vec<LabelRequest>,
    pub notices: Vec<Notice>,
    pub effects: Vec<HostEffect>,
    pub snapshot: ViewerSnapshot,
}

/// Errors that can occur while loading or replaying a session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Failed to read session: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse session: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Step {index} failed: {source}")]
    Step {
        index: usize,
        #[source]
        source: ViewerError,
    },
}

/// Replay a script against a fresh viewer.
///
/// Stops at the first step the viewer rejects.
pub fn replay(script: &SessionScript, config: ViewerConfig) -> Result<SessionReport, SessionError> {
    let start = Instant::now();
    let mut elapsed = Duration::ZERO;
    let mut viewer = ImageViewer::new(script.viewport, config);
    let mut requests = Vec::new();
    let mut notices = Vec::new();
    let mut effects = Vec::new();

    if let Some(image) = script.image {
        let input = ViewerInput::ImageLoaded {
            width: image.natural_width,
            height: image.natural_height,
        };
        viewer
            .handle(input, start)
            .map_err(|source| SessionError::Step { index: 0, source })?;
    }
    viewer.set_labels(script.labels.clone());

    for (index, step) in script.steps.iter().enumerate() {
        let now = start + elapsed;
        log::debug!("Step {}: {:?}", index, step);
        let result = match step {
            SessionStep::Input { input } => viewer.handle(input.clone(), now),
            SessionStep::Complete {
                request,
                server_id,
                error,
            } => viewer.complete(*request, SessionStep::completion(server_id, error)),
            SessionStep::Advance { ms } => {
                elapsed += Duration::from_millis(*ms);
                viewer.tick(start + elapsed);
                Ok(())
            }
            SessionStep::Unmount => {
                requests.extend(viewer.unmount());
                Ok(())
            }
        };
        result.map_err(|source| SessionError::Step { index, source })?;

        requests.extend(viewer.take_requests());
        notices.extend(viewer.take_notices());
        effects.extend(viewer.take_effects());
    }

    log::info!(
        "Replayed {} steps: {} requests, {} notices",
        script.steps.len(),
        requests.len(),
        notices.len()
    );
    Ok(SessionReport {
        requests,
        notices,
        effects,
        snapshot: viewer.snapshot(),
    })
}
