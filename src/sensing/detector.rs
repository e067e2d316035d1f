use std::{fs, io::ErrorKind, path::PathBuf};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reading of the presence signal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresenceSample {
    pub present: bool,
    pub sampled_at: DateTime<Utc>,
}

impl PresenceSample {
    pub fn new(present: bool, sampled_at: DateTime<Utc>) -> Self {
        Self { present, sampled_at }
    }

    pub fn from_face_count(faces: usize, sampled_at: DateTime<Utc>) -> Self {
        Self::new(faces > 0, sampled_at)
    }

    pub fn from_token(token: &str, sampled_at: DateTime<Utc>) -> Self {
        Self::new(parse_presence_token(token), sampled_at)
    }
}

/// Lenient reading of a presence value. A positive face count or one of the
/// affirmative words means present; anything else, including garbage, means
/// absent.
pub fn parse_presence_token(token: &str) -> bool {
    let token = token.trim();
    if let Ok(count) = token.parse::<i64>() {
        return count > 0;
    }
    matches!(
        token.to_ascii_lowercase().as_str(),
        "true" | "yes" | "y" | "on" | "present" | "face"
    )
}

/// Source of face counts. Implementations may block; the sensing loop runs
/// them on a blocking worker.
pub trait FaceDetector: Send {
    fn estimate_faces(&mut self) -> Result<usize>;
}

/// Reads the presence value an external detector process writes to a file.
/// A missing file counts as nobody present.
pub struct FlagFileDetector {
    path: PathBuf,
}

impl FlagFileDetector {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl FaceDetector for FlagFileDetector {
    fn estimate_faces(&mut self) -> Result<usize> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => {
                let token = contents.trim();
                Ok(match token.parse::<usize>() {
                    Ok(count) => count,
                    Err(_) => usize::from(parse_presence_token(token)),
                })
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(0),
            Err(err) => Err(err)
                .with_context(|| format!("failed to read presence file {}", self.path.display())),
        }
    }
}
