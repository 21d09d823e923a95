use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::mpsc;

use savi::{
    Engine, EngineEvent, FrameIndex, FrameRgba, NormPoint, PointLabel, RleMask, ServiceConfig,
    SessionClient,
};

#[derive(Parser, Debug)]
#[command(name = "savi", version)]
struct Cli {
    /// Base URL of the segmentation service.
    #[arg(long, default_value = "http://localhost:8000")]
    service: String,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create a session, prompt one object, and write the composited frame
    /// as a PNG.
    Annotate(AnnotateArgs),
    /// Prompt one object, track it through the whole video, and export the
    /// server's mask JSON.
    Track(TrackArgs),
    /// Decode an RLE mask JSON file to a PNG (debugging aid).
    Decode(DecodeArgs),
}

#[derive(Parser, Debug)]
struct AnnotateArgs {
    /// Video link handed to the service (downloaded server-side).
    #[arg(long)]
    video: String,

    /// Frame to prompt on (0-based).
    #[arg(long, default_value_t = 0)]
    frame: u64,

    /// Prompt point as normalized "x,y" in [0,1].
    #[arg(long)]
    point: String,

    /// Prompt label.
    #[arg(long, value_enum, default_value_t = LabelChoice::Positive)]
    label: LabelChoice,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Parser, Debug)]
struct TrackArgs {
    /// Video link handed to the service (downloaded server-side).
    #[arg(long)]
    video: String,

    /// Prompt point as normalized "x,y" in [0,1], placed on frame 0.
    #[arg(long)]
    point: String,

    /// Prompt label.
    #[arg(long, value_enum, default_value_t = LabelChoice::Positive)]
    label: LabelChoice,

    /// Where to write the exported mask JSON.
    #[arg(long)]
    out: PathBuf,

    /// Also write the last composited frame as a PNG.
    #[arg(long)]
    out_frame: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct DecodeArgs {
    /// Input mask JSON ({"size": [rows, cols], "counts": [...]}).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LabelChoice {
    Positive,
    Negative,
}

impl From<LabelChoice> for PointLabel {
    fn from(choice: LabelChoice) -> Self {
        match choice {
            LabelChoice::Positive => PointLabel::Positive,
            LabelChoice::Negative => PointLabel::Negative,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Annotate(args) => cmd_annotate(&cli.service, args).await,
        Command::Track(args) => cmd_track(&cli.service, args).await,
        Command::Decode(args) => cmd_decode(args),
    }
}

fn parse_point(raw: &str) -> anyhow::Result<NormPoint> {
    let (x, y) = raw
        .split_once(',')
        .with_context(|| format!("expected 'x,y', got '{raw}'"))?;
    let x: f64 = x.trim().parse().with_context(|| "parse point x")?;
    let y: f64 = y.trim().parse().with_context(|| "parse point y")?;
    Ok(NormPoint::new(x, y)?)
}

async fn boot_engine(
    service_url: &str,
    video: &str,
) -> anyhow::Result<(Engine<SessionClient>, mpsc::UnboundedReceiver<EngineEvent>)> {
    let config = ServiceConfig::new(service_url);
    let fps = config.fps;
    let client = SessionClient::new(config)?;
    let session = client.create_session(video).await?;
    eprintln!(
        "session {} ({} frames, {}x{})",
        session.id,
        session.total_frames(),
        session.canvas.width,
        session.canvas.height
    );
    let (events_tx, events_rx) = mpsc::unbounded_channel();
    Ok((Engine::new(client, session, fps, events_tx), events_rx))
}

fn write_png(path: &Path, frame: &FrameRgba) -> anyhow::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        path,
        &frame.data,
        frame.width,
        frame.height,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", path.display()))?;
    Ok(())
}

async fn cmd_annotate(service_url: &str, args: AnnotateArgs) -> anyhow::Result<()> {
    let point = parse_point(&args.point)?;
    let (mut engine, _events) = boot_engine(service_url, &args.video).await?;

    engine.create_object()?;
    engine.seek_to(FrameIndex(args.frame));
    engine.add_point(args.label.into(), point).await?;

    let frame = engine.composite_current()?;
    write_png(&args.out, &frame)?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}

async fn cmd_track(service_url: &str, args: TrackArgs) -> anyhow::Result<()> {
    let point = parse_point(&args.point)?;
    let (mut engine, mut events) = boot_engine(service_url, &args.video).await?;

    engine.create_object()?;
    engine.add_point(args.label.into(), point).await?;

    let delivered = engine.track(FrameIndex(0)).await?;
    // Show the last few timeline updates the stream produced.
    let mut last_timecode = None;
    while let Ok(ev) = events.try_recv() {
        if let EngineEvent::Timeline { timecode, .. } = ev {
            last_timecode = Some(timecode);
        }
    }
    eprintln!(
        "tracked {delivered} frames (ended at {})",
        last_timecode.as_deref().unwrap_or("00:00")
    );

    let masks = engine.export().await?;
    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    std::fs::write(&args.out, serde_json::to_string_pretty(&masks)?)
        .with_context(|| format!("write masks '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());

    if let Some(out_frame) = args.out_frame {
        let frame = engine.composite_current()?;
        write_png(&out_frame, &frame)?;
        eprintln!("wrote {}", out_frame.display());
    }
    Ok(())
}

fn cmd_decode(args: DecodeArgs) -> anyhow::Result<()> {
    let raw = std::fs::read(&args.in_path)
        .with_context(|| format!("read mask '{}'", args.in_path.display()))?;
    let rle: RleMask = serde_json::from_slice(&raw).with_context(|| "parse mask JSON")?;
    let mask = rle.decode()?;

    let pixels: Vec<u8> = mask.data().iter().map(|&b| b * 255).collect();
    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    image::save_buffer_with_format(
        &args.out,
        &pixels,
        mask.cols(),
        mask.rows(),
        image::ColorType::L8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;
    eprintln!("wrote {}", args.out.display());
    Ok(())
}
