use std::path::{Path, PathBuf};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

use montage::{
    ChannelLayout, EffectRegistry, Fraction, FrameMapper, ImageSequenceWriter, Keyframe,
    MapperTarget, PulldownMode, ReaderInfo, ReaderRegistry, RenderThreading, Settings,
    Timeline, Writer, WriterConfig,
};

#[derive(Parser, Debug)]
#[command(name = "montage", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Composite a single timeline frame into a PNG.
    Frame(FrameArgs),
    /// Composite a frame range into a PNG sequence.
    Render(RenderArgs),
    /// Print the frame-rate mapping between two rates.
    Mapping(MappingArgs),
    /// Print the values of a keyframe curve.
    Keyframe(KeyframeArgs),
}

#[derive(Parser, Debug)]
struct FrameArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Frame number (1-based).
    #[arg(long)]
    frame: u64,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,

    /// Engine settings JSON.
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input project JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output directory for `frame_NNNNNN.png` files.
    #[arg(long)]
    out_dir: PathBuf,

    /// First frame (1-based).
    #[arg(long, default_value_t = 1)]
    start: u64,

    /// Last frame (inclusive); defaults to the end of the last clip.
    #[arg(long)]
    end: Option<u64>,

    /// Render chunks on a worker pool.
    #[arg(long)]
    parallel: bool,

    /// Worker threads for `--parallel`.
    #[arg(long)]
    threads: Option<usize>,

    /// Frames per chunk.
    #[arg(long)]
    chunk_size: Option<usize>,

    /// Engine settings JSON.
    #[arg(long)]
    settings: Option<PathBuf>,
}

#[derive(Parser, Debug)]
struct MappingArgs {
    /// Source rate, e.g. `24` or `30000/1001`.
    #[arg(long)]
    from: Fraction,

    /// Target rate.
    #[arg(long)]
    to: Fraction,

    /// Pulldown mode: classic, advanced or none.
    #[arg(long, default_value = "classic")]
    pulldown: PulldownMode,

    /// Source length in frames.
    #[arg(long, default_value_t = 24)]
    length: u64,
}

#[derive(Parser, Debug)]
struct KeyframeArgs {
    /// Keyframe JSON (`{"Points": [...]}`).
    #[arg(long = "in")]
    in_path: PathBuf,

    /// First X to print.
    #[arg(long, default_value_t = 1)]
    start: i64,

    /// Last X to print (inclusive).
    #[arg(long, default_value_t = 50)]
    end: i64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.cmd {
        Command::Frame(args) => cmd_frame(args),
        Command::Render(args) => cmd_render(args),
        Command::Mapping(args) => cmd_mapping(args),
        Command::Keyframe(args) => cmd_keyframe(args),
    }
}

fn load_settings(path: Option<&Path>) -> anyhow::Result<Settings> {
    match path {
        Some(p) => {
            Settings::from_path(p).with_context(|| format!("load settings '{}'", p.display()))
        }
        None => Ok(Settings::default()),
    }
}

fn load_timeline(path: &Path, settings: Settings) -> anyhow::Result<Timeline> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("open project '{}'", path.display()))?;
    let timeline = Timeline::from_json_str(
        &text,
        settings,
        &ReaderRegistry::with_builtins(),
        &EffectRegistry::with_builtins(),
    )
    .context("parse project JSON")?;
    timeline.open()?;
    Ok(timeline)
}

fn cmd_frame(args: FrameArgs) -> anyhow::Result<()> {
    let settings = load_settings(args.settings.as_deref())?;
    let timeline = load_timeline(&args.in_path, settings)?;
    let frame = timeline.get_frame(args.frame)?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    let straight = frame
        .to_straight_rgba()
        .with_context(|| format!("frame {} has no image", args.frame))?;
    image::save_buffer_with_format(
        &args.out,
        &straight,
        frame.width(),
        frame.height(),
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!(
        "wrote {} (fingerprint {:016x})",
        args.out.display(),
        frame.fingerprint()
    );
    timeline.close();
    Ok(())
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let settings = load_settings(args.settings.as_deref())?;
    let timeline = load_timeline(&args.in_path, settings)?;
    let end = args.end.unwrap_or_else(|| timeline.max_frame().max(1));

    let mut threading = RenderThreading::from_settings(timeline.settings());
    threading.parallel = args.parallel;
    if let Some(t) = args.threads {
        threading.threads = Some(t);
    }
    if let Some(c) = args.chunk_size {
        threading.chunk_size = c;
    }

    let mut writer = ImageSequenceWriter::new(&args.out_dir);
    writer.open(WriterConfig::from_reader(&timeline))?;
    let stats = timeline.write_range(&mut writer, args.start, end, &threading)?;
    writer.close()?;
    timeline.close();

    eprintln!(
        "wrote {} frames to {} ({} rendered, {} cached)",
        stats.frames_total,
        args.out_dir.display(),
        stats.frames_rendered,
        stats.frames_cached
    );
    Ok(())
}

fn cmd_mapping(args: MappingArgs) -> anyhow::Result<()> {
    let duration = args.length as f64 / args.from.to_f64();
    let mut source = ReaderInfo::new(1, 1, args.from, 48_000, ChannelLayout::Stereo, duration);
    source.video_length = args.length;
    let target = MapperTarget::new(args.to, args.pulldown, 48_000, ChannelLayout::Stereo);
    let mapper = FrameMapper::new(source, target)?;

    println!(
        "{} -> {} ({:?}): {} source frames, {} target frames",
        args.from,
        args.to,
        args.pulldown,
        args.length,
        mapper.len()
    );
    for line in mapper.mapping_lines() {
        println!("{line}");
    }
    Ok(())
}

fn cmd_keyframe(args: KeyframeArgs) -> anyhow::Result<()> {
    let text = std::fs::read_to_string(&args.in_path)
        .with_context(|| format!("open keyframe '{}'", args.in_path.display()))?;
    let curve = Keyframe::from_json_str(&text)?;
    println!("{:>6} {:>12} {:>5} {:>8} {:>8}", "x", "value", "dir", "repeat", "delta");
    for x in args.start..=args.end {
        let value = curve.get_value(x as f64)?;
        let dir = if curve.is_increasing(x)? { "up" } else { "down" };
        println!(
            "{x:>6} {value:>12.4} {dir:>5} {:>8} {:>8.2}",
            curve.repeat_fraction(x)?.to_string(),
            curve.get_delta(x)?
        );
    }
    Ok(())
}
