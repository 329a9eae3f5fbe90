use super::{ CaptureError, PlaybackError, PlaybackEvent, PlaybackId, SpeechPlatform, Utterance };
use crate::speech::data_uri::audio_data_uri;
use crate::speech::voice::VoiceInfo;
use async_trait::async_trait;
use log::{ debug, info, warn };
use std::io::ErrorKind;
use std::process::Stdio;
use std::sync::atomic::{ AtomicU64, Ordering };
use std::sync::Mutex as StdMutex;
use std::time::Duration;
use tempfile::NamedTempFile;
use tokio::io::AsyncWriteExt;
use tokio::process::{ Child, Command };
use tokio::sync::{ mpsc, oneshot, Mutex };

const RECORDER_STOP_GRACE: Duration = Duration::from_secs(2);

#[derive(Debug, Clone)]
pub struct SystemPlatformConfig {
    /// Recorder command; the output WAV path is appended.
    pub recorder: String,
    /// Player command; the audio file path is appended.
    pub player: String,
    /// espeak-compatible narrator: invoked as `<narrator> -v <voice> --stdin` with the text on
    /// stdin, and as `<narrator> --voices`.
    pub narrator: String,
}

impl Default for SystemPlatformConfig {
    fn default() -> Self {
        Self {
            recorder: "arecord -q -f S16_LE -r 16000 -c 1 -t wav".to_string(),
            player: "aplay -q".to_string(),
            narrator: "espeak-ng".to_string(),
        }
    }
}

struct CaptureSession {
    child: Child,
    file: NamedTempFile,
}

struct ActivePlayback {
    id: PlaybackId,
    cancel: oneshot::Sender<()>,
}

/// Drives the host's recorder, audio player and narrator as child processes.
pub struct SystemPlatform {
    config: SystemPlatformConfig,
    capture: Mutex<Option<CaptureSession>>,
    playback: StdMutex<Option<ActivePlayback>>,
    next_playback: AtomicU64,
    events: mpsc::UnboundedSender<PlaybackEvent>,
}

fn split_command(command: &str) -> Option<(String, Vec<String>)> {
    let mut parts = command.split_whitespace().map(str::to_string);
    let program = parts.next()?;
    Some((program, parts.collect()))
}

fn extension_for(mime: &str) -> &'static str {
    match mime {
        "audio/wav" | "audio/x-wav" | "audio/wave" => ".wav",
        "audio/mpeg" | "audio/mp3" => ".mp3",
        "audio/ogg" => ".ogg",
        "audio/webm" => ".webm",
        _ => ".audio",
    }
}

/// Parses `espeak-ng --voices` output (`Pty Language Age/Gender VoiceName File ...`).
pub(crate) fn parse_espeak_voices(listing: &str) -> Vec<VoiceInfo> {
    listing
        .lines()
        .skip(1)
        .filter_map(|line| {
            let columns: Vec<&str> = line.split_whitespace().collect();
            if columns.len() < 4 {
                return None;
            }
            let gender = match columns[2].rsplit('/').next() {
                Some("F") => " (female)",
                Some("M") => " (male)",
                _ => "",
            };
            Some(VoiceInfo {
                name: format!("{}{}", columns[3].replace('_', " "), gender),
                lang: columns[1].to_string(),
                is_default: false,
                id: columns.get(4).map(|file| file.to_string()),
            })
        })
        .collect()
}

impl SystemPlatform {
    pub fn new(config: SystemPlatformConfig) -> (Self, mpsc::UnboundedReceiver<PlaybackEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let platform = Self {
            config,
            capture: Mutex::new(None),
            playback: StdMutex::new(None),
            next_playback: AtomicU64::new(1),
            events,
        };
        (platform, rx)
    }

    fn take_playback(&self) -> Option<ActivePlayback> {
        self.playback.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take()
    }

    /// Spawns `command`, feeds it `input` on stdin and reports its exit on the event
    /// channel unless cancelled first.
    fn launch(
        &self,
        mut command: Command,
        keep_alive: Option<NamedTempFile>,
        input: Option<String>
    ) -> Result<PlaybackId, PlaybackError> {
        let stdin = if input.is_some() { Stdio::piped() } else { Stdio::null() };
        let mut child = command
            .stdin(stdin)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => PlaybackError::Unavailable(e.to_string()),
                _ => PlaybackError::Failed(e.to_string()),
            })?;

        let id = PlaybackId(self.next_playback.fetch_add(1, Ordering::Relaxed));
        let (cancel, cancelled) = oneshot::channel();
        let events = self.events.clone();

        tokio::spawn(async move {
            let _keep_alive = keep_alive;
            if let (Some(text), Some(mut stdin)) = (input, child.stdin.take()) {
                if let Err(e) = stdin.write_all(text.as_bytes()).await {
                    debug!("Failed to hand text to playback {:?}: {}", id, e);
                }
            }
            tokio::select! {
                status = child.wait() => {
                    let event = match status {
                        Ok(s) if s.success() => PlaybackEvent::Finished(id),
                        Ok(s) => PlaybackEvent::Failed(id, format!("player exited with {}", s)),
                        Err(e) => PlaybackEvent::Failed(id, e.to_string()),
                    };
                    let _ = events.send(event);
                }
                _ = cancelled => {
                    if let Err(e) = child.kill().await {
                        debug!("Failed to stop playback {:?}: {}", id, e);
                    }
                }
            }
        });

        let previous = self.playback
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .replace(ActivePlayback { id, cancel });
        if let Some(previous) = previous {
            let _ = previous.cancel.send(());
        }
        Ok(id)
    }

    async fn stop_recorder(child: &mut Child) {
        if let Some(pid) = child.id() {
            // SIGINT lets arecord finalize the WAV header.
            let interrupted = Command::new("kill")
                .arg("-INT")
                .arg(pid.to_string())
                .status().await
                .map(|s| s.success())
                .unwrap_or(false);
            if interrupted && tokio::time::timeout(RECORDER_STOP_GRACE, child.wait()).await.is_ok() {
                return;
            }
        }
        if let Err(e) = child.kill().await {
            warn!("Failed to stop recorder: {}", e);
        }
    }
}

#[async_trait]
impl SpeechPlatform for SystemPlatform {
    async fn start_capture(&self) -> Result<(), CaptureError> {
        let mut guard = self.capture.lock().await;
        if guard.is_some() {
            return Err(CaptureError::AlreadyRecording);
        }

        let (program, args) = split_command(&self.config.recorder).ok_or_else(||
            CaptureError::Unsupported("no recorder command configured".to_string())
        )?;
        let file = tempfile::Builder::new()
            .prefix("tfiber-capture-")
            .suffix(".wav")
            .tempfile()
            .map_err(|e| CaptureError::Failed(e.to_string()))?;

        let child = Command::new(&program)
            .args(&args)
            .arg(file.path())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound =>
                    CaptureError::Unsupported(format!("recorder '{}' not found", program)),
                ErrorKind::PermissionDenied => CaptureError::PermissionDenied,
                _ => CaptureError::Failed(e.to_string()),
            })?;

        info!("Recording started with '{}'", program);
        *guard = Some(CaptureSession { child, file });
        Ok(())
    }

    async fn stop_capture(&self) -> Result<Option<String>, CaptureError> {
        // The session leaves the slot before anything can fail, so the microphone is always released.
        let session = self.capture.lock().await.take();
        let Some(mut session) = session else {
            return Ok(None);
        };

        Self::stop_recorder(&mut session.child).await;
        let bytes = tokio::fs::read(session.file.path()).await
            .map_err(|e| CaptureError::Failed(format!("Failed to read audio data: {}", e)))?;
        if bytes.is_empty() {
            return Err(CaptureError::Failed("no audio was captured".to_string()));
        }
        info!("Recording stopped ({} bytes)", bytes.len());
        Ok(Some(audio_data_uri("audio/wav", &bytes)))
    }

    async fn play_audio(&self, mime: &str, bytes: &[u8]) -> Result<PlaybackId, PlaybackError> {
        let (program, args) = split_command(&self.config.player).ok_or_else(||
            PlaybackError::Unavailable("no audio player configured".to_string())
        )?;
        let mut file = tempfile::Builder::new()
            .prefix("tfiber-playback-")
            .suffix(extension_for(mime))
            .tempfile()
            .map_err(|e| PlaybackError::Failed(e.to_string()))?;
        std::io::Write::write_all(&mut file, bytes).map_err(|e| PlaybackError::Failed(e.to_string()))?;

        let mut command = Command::new(program);
        command.args(args).arg(file.path());
        self.launch(command, Some(file), None)
    }

    async fn speak(&self, utterance: &Utterance) -> Result<PlaybackId, PlaybackError> {
        let (program, args) = split_command(&self.config.narrator).ok_or_else(||
            PlaybackError::Unavailable("no narrator configured".to_string())
        )?;
        let voice = utterance.voice
            .as_ref()
            .map(|v| v.id.clone().unwrap_or_else(|| v.lang.clone()))
            .unwrap_or_else(|| utterance.lang_tag.to_lowercase());

        // Text goes through stdin so a leading '-' is never read as an option.
        let mut command = Command::new(program);
        command.args(args).arg("-v").arg(voice).arg("--stdin");
        self.launch(command, None, Some(utterance.text.clone()))
    }

    async fn cancel_playback(&self) {
        if let Some(active) = self.take_playback() {
            debug!("Cancelling playback {:?}", active.id);
            let _ = active.cancel.send(());
        }
    }

    async fn voices(&self) -> Vec<VoiceInfo> {
        let Some((program, args)) = split_command(&self.config.narrator) else {
            return Vec::new();
        };
        match Command::new(program).args(args).arg("--voices").output().await {
            Ok(output) if output.status.success() =>
                parse_espeak_voices(&String::from_utf8_lossy(&output.stdout)),
            Ok(output) => {
                debug!("Narrator voice listing exited with {}", output.status);
                Vec::new()
            }
            Err(e) => {
                debug!("Narrator voice listing unavailable: {}", e);
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_espeak_listing() {
        let listing = "Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  en-us           --/M      English_(America)  gmw/en-US
 5  te              --/F      Telugu             dra/te
";
        let voices = parse_espeak_voices(listing);
        assert_eq!(voices.len(), 2);
        assert_eq!(voices[0].name, "English (America) (male)");
        assert_eq!(voices[0].id.as_deref(), Some("gmw/en-US"));
        assert_eq!(voices[1].lang, "te");
        assert!(voices[1].name.contains("female"));
    }

    /// Writes a shell narrator that lists `listing` for `--voices` and otherwise records
    /// its arguments and stdin next to itself.
    fn fake_narrator(dir: &std::path::Path, listing: &str) -> String {
        std::fs::write(dir.join("voices.txt"), listing).unwrap();
        let script = dir.join("narrator.sh");
        std::fs::write(
            &script,
            format!(
                "dir='{}'\nif [ \"$1\" = \"--voices\" ]; then cat \"$dir/voices.txt\"; exit 0; fi\n\
                 printf '%s\\n' \"$@\" > \"$dir/args\"\ncat > \"$dir/stdin\"\n",
                dir.display()
            )
        ).unwrap();
        format!("sh {}", script.display())
    }

    async fn finished(events: &mut mpsc::UnboundedReceiver<PlaybackEvent>, id: PlaybackId) {
        let event = tokio::time::timeout(Duration::from_secs(10), events.recv()).await.unwrap();
        assert_eq!(event, Some(PlaybackEvent::Finished(id)));
    }

    #[tokio::test]
    async fn test_speak_uses_selected_voice_identifier() {
        let dir = tempfile::tempdir().unwrap();
        let listing = "Pty Language       Age/Gender VoiceName          File                 Other Languages
 5  en-us           --/M      English_(America)  gmw/en-US
 5  en-us           --/F      us-mbrola-1        mb/mb-us1
";
        let (platform, mut events) = SystemPlatform::new(SystemPlatformConfig {
            narrator: fake_narrator(dir.path(), listing),
            ..SystemPlatformConfig::default()
        });

        let voices = platform.voices().await;
        let selection = crate::speech::voice::select_voice(crate::language::LanguageCode::English, &voices);
        assert_eq!(selection.voice.as_ref().and_then(|v| v.id.as_deref()), Some("mb/mb-us1"));

        let id = platform
            .speak(&Utterance {
                text: "Hello! I am TeRA".to_string(),
                lang_tag: selection.lang_tag.to_string(),
                voice: selection.voice,
            }).await
            .unwrap();
        finished(&mut events, id).await;

        let args = std::fs::read_to_string(dir.path().join("args")).unwrap();
        assert_eq!(args.lines().collect::<Vec<_>>(), vec!["-v", "mb/mb-us1", "--stdin"]);
        assert_eq!(std::fs::read_to_string(dir.path().join("stdin")).unwrap(), "Hello! I am TeRA");
    }

    #[tokio::test]
    async fn test_speak_keeps_leading_dash_out_of_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let (platform, mut events) = SystemPlatform::new(SystemPlatformConfig {
            narrator: fake_narrator(dir.path(), ""),
            ..SystemPlatformConfig::default()
        });

        let text = "- Visit the website for plans";
        let id = platform
            .speak(&Utterance { text: text.to_string(), lang_tag: "te-IN".to_string(), voice: None }).await
            .unwrap();
        finished(&mut events, id).await;

        let args = std::fs::read_to_string(dir.path().join("args")).unwrap();
        assert_eq!(args.lines().collect::<Vec<_>>(), vec!["-v", "te-in", "--stdin"]);
        assert_eq!(std::fs::read_to_string(dir.path().join("stdin")).unwrap(), text);
    }

    #[test]
    fn test_split_command() {
        let (program, args) = split_command("aplay -q").unwrap();
        assert_eq!(program, "aplay");
        assert_eq!(args, vec!["-q".to_string()]);
        assert!(split_command("   ").is_none());
    }

    #[tokio::test]
    async fn test_missing_recorder_is_unsupported() {
        let (platform, _events) = SystemPlatform::new(SystemPlatformConfig {
            recorder: "definitely-not-a-recorder-binary".to_string(),
            ..SystemPlatformConfig::default()
        });
        let err = platform.start_capture().await.unwrap_err();
        assert!(matches!(err, CaptureError::Unsupported(_)));
        assert_eq!(platform.stop_capture().await.unwrap(), None);
    }
}
