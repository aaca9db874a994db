//! Simulated storyboard asset generation.
//!
//! Stands in for the calls to the generative service: each task sleeps for a
//! latency derived from the shot and either returns an asset path or fails
//! the way a rate-limited API would.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Serialize;
use task_actors::{JobCategory, JobRequest, Task, TaskError};
use task_core::ConfigError;

/// Environment variable for the number of shots in the demo episode.
pub const ENV_SHOTS: &str = "STUDIO_SHOTS";

const DEFAULT_SHOTS: u32 = 8;

/// A shot in an episode's script.
#[derive(Debug, Clone)]
pub struct Shot {
    pub number: u32,
    pub prompt: String,
    pub dialogue: Option<String>,
}

/// Build a demo episode with `count` shots; every third shot is silent.
pub fn demo_episode(count: u32) -> Vec<Shot> {
    (1..=count)
        .map(|number| Shot {
            number,
            prompt: format!("Wide establishing shot {number}, dusk, rain on neon"),
            dialogue: (number % 3 != 0).then(|| format!("Line spoken in shot {number}")),
        })
        .collect()
}

/// Read the episode length through `lookup`, defaulting when unset or blank.
pub fn shot_count_from<F>(lookup: F) -> Result<u32, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(ENV_SHOTS).filter(|v| !v.trim().is_empty()) else {
        return Ok(DEFAULT_SHOTS);
    };
    let count: u32 = raw.trim().parse().map_err(|_| ConfigError::Parse {
        key: ENV_SHOTS,
        value: raw.clone(),
    })?;
    if count == 0 {
        return Err(ConfigError::Invalid {
            field: "shots",
            reason: "must be at least 1".into(),
        });
    }
    Ok(count)
}

/// Which asset of a shot to generate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    StartFrame,
    Audio,
}

impl AssetKind {
    fn category(self) -> JobCategory {
        match self {
            AssetKind::StartFrame => JobCategory::ImageGeneration,
            AssetKind::Audio => JobCategory::AudioGeneration,
        }
    }
}

/// Generated asset paths per shot, filled in by completion callbacks.
#[derive(Debug, Default, Clone, Serialize)]
pub struct ShotAssets {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_frame: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,
}

/// Shared project state the completion callbacks merge results into.
#[derive(Debug, Default, Clone)]
pub struct AssetBoard {
    shots: Arc<Mutex<BTreeMap<u32, ShotAssets>>>,
}

impl AssetBoard {
    fn store(&self, shot: u32, kind: AssetKind, path: String) {
        let mut shots = self.shots.lock().unwrap_or_else(PoisonError::into_inner);
        let assets = shots.entry(shot).or_default();
        match kind {
            AssetKind::StartFrame => assets.start_frame = Some(path),
            AssetKind::Audio => assets.audio = Some(path),
        }
    }

    pub fn snapshot(&self) -> BTreeMap<u32, ShotAssets> {
        self.shots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

/// One simulated call to the generation service.
pub struct GenerateAsset {
    shot: u32,
    kind: AssetKind,
    prompt: String,
    latency: Duration,
}

impl Task for GenerateAsset {
    type Output = String;

    async fn run(self) -> Result<String, TaskError> {
        tracing::debug!("Generating {:?} for shot {}: {}", self.kind, self.shot, self.prompt);
        tokio::time::sleep(self.latency).await;
        if self.shot % 5 == 0 {
            return Err(TaskError::new("429: rate limited by generation service"));
        }
        Ok(match self.kind {
            AssetKind::StartFrame => format!("assets/shot-{:03}/start.png", self.shot),
            AssetKind::Audio => format!("assets/shot-{:03}/line.wav", self.shot),
        })
    }
}

/// Request generating `kind` for `shot`, storing the result on `board`.
pub fn asset_request(shot: &Shot, kind: AssetKind, board: &AssetBoard) -> JobRequest<GenerateAsset> {
    let label = match kind {
        AssetKind::StartFrame => "Start Frame",
        AssetKind::Audio => "Audio",
    };
    let task = GenerateAsset {
        shot: shot.number,
        kind,
        prompt: shot.prompt.clone(),
        latency: Duration::from_millis(150 + u64::from(shot.number % 4) * 100),
    };
    let board = board.clone();
    let number = shot.number;

    JobRequest::new(kind.category(), format!("{label} for Shot {number}"), task)
        .on_complete(move |path| board.store(number, kind, path))
}
