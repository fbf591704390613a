use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use kinetograph::{
    AudioTrack, DecodedFrame, EngineSettings, FileResourceLoader, FrameRate, GifFrameDecoder,
    LifecycleEvent, Media, MonotonicTime, PlaybackState, Renderer, SilentTrack, TimeSource,
};

const USAGE: &str = "usage: kinetograph <file.gif> [--fps N] [--loops N] [--audio-secs S]";

/// Upper bound on a single sleep so the loop stays responsive to audio signals.
const MAX_IDLE: Duration = Duration::from_millis(20);

struct Options {
    path: PathBuf,
    fps: Option<f64>,
    loops: u32,
    audio_secs: Option<f64>,
}

fn parse_args() -> Result<Options> {
    let mut args = std::env::args().skip(1);
    let mut path = None;
    let mut fps = None;
    let mut loops = 1;
    let mut audio_secs = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--fps" => {
                let v = args.next().context("--fps needs a value")?;
                fps = Some(v.parse().with_context(|| format!("bad --fps value: {v}"))?);
            }
            "--loops" => {
                let v = args.next().context("--loops needs a value")?;
                loops = v.parse().with_context(|| format!("bad --loops value: {v}"))?;
            }
            "--audio-secs" => {
                let v = args.next().context("--audio-secs needs a value")?;
                audio_secs = Some(v.parse().with_context(|| format!("bad --audio-secs value: {v}"))?);
            }
            "-h" | "--help" => {
                println!("{USAGE}");
                std::process::exit(0);
            }
            other if other.starts_with('-') => bail!("unknown option {other}\n{USAGE}"),
            other => path = Some(PathBuf::from(other)),
        }
    }

    let Some(path) = path else {
        bail!("{USAGE}");
    };
    if fps.is_some_and(|f: f64| !(f.is_finite() && f > 0.0)) {
        bail!("--fps must be a positive number");
    }
    if loops == 0 {
        log::warn!("--loops 0 plays forever; stop with Ctrl-C");
    }
    Ok(Options {
        path,
        fps,
        loops,
        audio_secs,
    })
}

/// Logs each presented frame instead of drawing it.
#[derive(Default)]
struct LogRenderer {
    frames_shown: usize,
}

impl Renderer for LogRenderer {
    fn media_attached(&mut self) {
        log::info!("Renderer attached");
    }

    fn media_detached(&mut self) {
        log::info!("Renderer detached ({} frames shown)", self.frames_shown);
    }

    fn render(&mut self, frame: &Arc<DecodedFrame>, index: usize) {
        self.frames_shown += 1;
        log::debug!("Frame {index} ({}x{})", frame.width, frame.height);
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let options = parse_args()?;
    let settings = EngineSettings::load();

    let time = MonotonicTime::new();
    let mut media = Media::with_time_source(Box::new(time)).with_settings(settings);
    let events = media.subscribe();

    if let Some(fps) = options.fps {
        media.set_frame_rate(FrameRate::from_fps(fps))?;
    }
    media.set_repeat_count(options.loops)?;
    media.set_resource_loader(Box::new(FileResourceLoader::new(vec![options.path.clone()])))?;
    media.set_frame_decoder(Box::new(GifFrameDecoder::new()))?;
    if let Some(secs) = options.audio_secs {
        let duration = Duration::try_from_secs_f64(secs).context("bad --audio-secs value")?;
        let track: Arc<dyn AudioTrack> = Arc::new(SilentTrack::new(duration));
        media.set_audio_track(Some(track))?;
    }

    let renderer = Rc::new(RefCell::new(LogRenderer::default()));
    media.attach_to_renderer(&renderer);

    media.prepare_to_animate()?;
    media.start_animator()?;

    loop {
        media.tick();

        for event in events.try_iter() {
            println!("{}", serde_json::to_string(&event)?);
            if let LifecycleEvent::LoadFailed(reason) = event {
                bail!("failed to load {}: {reason}", options.path.display());
            }
        }

        if let PlaybackState::Stopped { .. } = media.state() {
            break;
        }

        let idle = match media.next_deadline() {
            Some(deadline) => deadline.saturating_sub(time.now()).min(MAX_IDLE),
            None => MAX_IDLE,
        };
        thread::sleep(idle);
    }

    media.done_animator();
    for event in events.try_iter() {
        println!("{}", serde_json::to_string(&event)?);
    }
    println!("{}", serde_json::to_string_pretty(&media.status())?);
    Ok(())
}
