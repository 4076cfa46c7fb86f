use anyhow::Result;
use callscribe::cli::{Cli, Commands, RecordArgs};
use callscribe::config::{Config, default_config_path};
use clap::Parser;
use std::path::PathBuf;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = load_config(cli.config)?;

    match cli.command {
        Commands::Record(args) => run_record(config, args).await,
        Commands::Devices => list_audio_devices(),
        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn load_config(explicit: Option<PathBuf>) -> Result<Config> {
    match explicit {
        Some(path) => Ok(Config::load(&path)?),
        None => match default_config_path() {
            Some(path) => Ok(Config::load_or_default(&path)?),
            None => Ok(Config::default()),
        },
    }
}

#[cfg(feature = "cpal-audio")]
fn list_audio_devices() -> Result<()> {
    let devices = callscribe::audio::capture::list_devices()?;
    if devices.is_empty() {
        eprintln!("callscribe: no capture devices found");
        return Ok(());
    }
    for device in devices {
        println!("{device}");
    }
    Ok(())
}

#[cfg(not(feature = "cpal-audio"))]
fn list_audio_devices() -> Result<()> {
    anyhow::bail!("built without the cpal-audio feature; no capture backend available")
}

#[cfg(feature = "cpal-audio")]
async fn run_record(mut config: Config, args: RecordArgs) -> Result<()> {
    use callscribe::audio::capture::CpalAudioDevice;
    use callscribe::audio::device::AudioDevice;
    use callscribe::{Recorder, RecorderConfig, RecorderDeps, RecordingState};
    use std::time::{Duration, Instant};

    if let Some(silence) = args.silence {
        config.vad.silence_duration_ms = silence.as_millis() as u32;
    }
    if let Some(max_chunk) = args.max_chunk {
        config.chunking.max_chunk_ms = max_chunk.as_millis() as u32;
    }
    if let Some(min_recording) = args.min_recording {
        config.vad.min_recording_ms = min_recording.as_millis() as u32;
    }
    config.validate()?;

    let device_name = args.device.clone().or_else(|| config.audio.device.clone());
    let sample_rate = config.audio.sample_rate;
    let recorder_config = RecorderConfig::from(&config);

    let deps = RecorderDeps::new(
        move || {
            CpalAudioDevice::new(device_name.as_deref())
                .map(|d| Box::new(d.with_sample_rate(sample_rate)) as Box<dyn AudioDevice>)
        },
        recorder_config,
    );
    let recorder = Recorder::new(deps);

    recorder.on_state_change(|state| eprintln!("callscribe: state -> {state}"));
    recorder.start()?;
    eprintln!("callscribe: recording; auto-stops after sustained silence");

    let started = Instant::now();
    while recorder.state() != RecordingState::Stopped {
        if let Some(limit) = args.limit
            && started.elapsed() >= limit
        {
            recorder.stop()?;
            break;
        }
        if args.verbose {
            render_meter(recorder.audio_level());
        }
        std::thread::sleep(Duration::from_millis(100));
    }
    if args.verbose {
        eprintln!();
    }

    if let Some(error) = recorder.last_error() {
        eprintln!("callscribe: recording ended with error: {error}");
    }

    let bundle = recorder.bundle()?;
    save_bundle(&args.output, &bundle)?;

    println!(
        "recorded {:.1}s in {} chunk(s) -> {}",
        bundle.duration.as_secs_f64(),
        bundle.chunks.len(),
        args.output.display()
    );

    if args.persist {
        persist_recording(&config, &args, &recorder).await?;
    } else {
        recorder.discard()?;
    }
    Ok(())
}

#[cfg(feature = "cpal-audio")]
async fn persist_recording(
    config: &Config,
    args: &RecordArgs,
    recorder: &callscribe::Recorder,
) -> Result<()> {
    use callscribe::persist::{RestAnalyzer, RestConversationStore};
    use callscribe::ConversationPersister;
    use std::sync::Arc;

    let Some(base_url) = config.persistence.base_url.as_deref() else {
        anyhow::bail!("--persist requires persistence.base_url in the configuration");
    };
    let analyzer_url = config.persistence.analyzer_url.as_deref().unwrap_or(base_url);

    let mut store = RestConversationStore::new(base_url);
    let mut analyzer = RestAnalyzer::new(analyzer_url);
    if let Some(token) = config.persistence.auth_token.as_deref() {
        store = store.with_auth_token(token);
        analyzer = analyzer.with_auth_token(token);
    }
    let store = Arc::new(store);
    let persister = ConversationPersister::new(store.clone(), store, Arc::new(analyzer));

    let owner = args.owner.as_deref().unwrap_or_default();
    match recorder.persist(&persister, owner, &args.participant).await {
        Ok(id) => {
            println!("persisted conversation {id}");
            Ok(())
        }
        Err(callscribe::CallscribeError::EmptyTranscript) => {
            eprintln!(
                "callscribe: transcript is empty (no recognizer configured); record kept locally"
            );
            recorder.discard()?;
            Ok(())
        }
        Err(e) => {
            eprintln!("callscribe: persist failed, bundle retained for retry: {e}");
            Err(e.into())
        }
    }
}

#[cfg(not(feature = "cpal-audio"))]
async fn run_record(_config: Config, _args: RecordArgs) -> Result<()> {
    anyhow::bail!("built without the cpal-audio feature; no capture backend available")
}

/// Stderr level meter: filled blocks up to the current level.
#[cfg(feature = "cpal-audio")]
fn render_meter(level: f32) {
    use std::io::Write;

    const BAR_WIDTH: usize = 30;
    let filled = (level * BAR_WIDTH as f32) as usize;
    let bar: String = (0..BAR_WIDTH)
        .map(|i| if i < filled { '█' } else { '░' })
        .collect();
    eprint!("\r[{}] {:.3}  ", bar, level);
    let _ = std::io::stderr().flush();
}

#[cfg(feature = "cpal-audio")]
fn save_bundle(output: &std::path::Path, bundle: &callscribe::RecordingBundle) -> Result<()> {
    use serde_json::json;
    use std::fs;

    fs::create_dir_all(output)?;

    let mut chunk_files = Vec::new();
    for chunk in &bundle.chunks {
        let name = format!("chunk-{:04}.wav", chunk.sequence);
        fs::write(output.join(&name), &chunk.payload)?;
        chunk_files.push(json!({
            "sequence": chunk.sequence,
            "duration_ms": chunk.duration_ms,
            "file": name,
        }));
    }

    let meta = json!({
        "duration_secs": bundle.duration.as_secs_f64(),
        "transcript": bundle.transcript,
        "chunks": chunk_files,
    });
    fs::write(
        output.join("meta.json"),
        serde_json::to_string_pretty(&meta)?,
    )?;
    Ok(())
}
