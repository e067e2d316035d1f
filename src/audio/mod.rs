#[cfg(feature = "sound")]
pub mod chime;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum ClipId {
    LowAlarm,
    HighAlarm,
    Connected,
    Disconnected,
}

impl ClipId {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipId::LowAlarm => "low_alarm",
            ClipId::HighAlarm => "high_alarm",
            ClipId::Connected => "connected",
            ClipId::Disconnected => "disconnected",
        }
    }

    /// Playback volume relative to the engine volume.
    pub fn volume(&self) -> f32 {
        match self {
            ClipId::LowAlarm => 0.7,
            ClipId::HighAlarm => 0.8,
            ClipId::Connected | ClipId::Disconnected => 0.5,
        }
    }
}

/// Best-effort sound output supplied by the host.
pub trait SoundPlayer: Send + Sync {
    fn play(&self, clip: ClipId) -> Result<(), String>;
}

/// Logs instead of playing; used when no audio output is compiled in.
pub struct SilentPlayer;

impl SoundPlayer for SilentPlayer {
    fn play(&self, clip: ClipId) -> Result<(), String> {
        log::debug!("(silent) would play {}", clip.as_str());
        Ok(())
    }
}

#[cfg(feature = "sound")]
pub fn default_player() -> Arc<dyn SoundPlayer> {
    Arc::new(engine::AudioEngineHandle::new())
}

#[cfg(not(feature = "sound"))]
pub fn default_player() -> Arc<dyn SoundPlayer> {
    Arc::new(SilentPlayer)
}

#[cfg(feature = "sound")]
pub use engine::AudioEngineHandle;

#[cfg(feature = "sound")]
mod engine {
    use super::chime::Chime;
    use super::{ClipId, SoundPlayer};

    use rodio::{OutputStream, Sink};
    use std::sync::{
        mpsc::{self, Sender},
        Arc, Mutex,
    };
    use std::thread;

    /// Plays chimes on a dedicated thread that owns the non-`Send` output stream.
    pub struct AudioEngineHandle {
        tx: Arc<Mutex<Option<Sender<ClipId>>>>,
    }

    impl AudioEngineHandle {
        pub fn new() -> Self {
            Self {
                tx: Arc::new(Mutex::new(None)),
            }
        }

        fn ensure_thread(&self) -> Result<Sender<ClipId>, String> {
            if let Some(tx) = self.tx.lock().map_err(|e| e.to_string())?.as_ref() {
                return Ok(tx.clone());
            }

            let (tx, rx) = mpsc::channel::<ClipId>();

            thread::Builder::new()
                .name("audio-engine".to_string())
                .spawn(move || {
                    let mut _stream: Option<OutputStream> = None;
                    let mut sink: Option<Sink> = None;

                    fn ensure_sink(
                        stream: &mut Option<OutputStream>,
                        sink: &mut Option<Sink>,
                    ) -> Result<(), String> {
                        if sink.is_none() {
                            let (s, handle) = OutputStream::try_default()
                                .map_err(|e| format!("Failed to create audio output stream: {}", e))?;
                            let new_sink = Sink::try_new(&handle)
                                .map_err(|e| format!("Failed to create audio sink: {}", e))?;
                            *stream = Some(s);
                            *sink = Some(new_sink);
                        }
                        Ok(())
                    }

                    while let Ok(clip) = rx.recv() {
                        if let Err(err) = ensure_sink(&mut _stream, &mut sink) {
                            log::warn!("Cannot play {}: {}", clip.as_str(), err);
                            continue;
                        }
                        if let Some(ref s) = sink {
                            s.append(Chime::for_clip(clip));
                        }
                    }
                })
                .map_err(|e| e.to_string())?;

            let tx_clone = tx.clone();
            *self.tx.lock().map_err(|e| e.to_string())? = Some(tx);
            Ok(tx_clone)
        }
    }

    impl SoundPlayer for AudioEngineHandle {
        fn play(&self, clip: ClipId) -> Result<(), String> {
            let tx = self.ensure_thread()?;
            tx.send(clip).map_err(|e| e.to_string())
        }
    }
}
