//! liquid - translate a scene to RIB files and a render script.

use std::path::PathBuf;

use anyhow::Context as _;
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use liquid_rib::prelude::*;
use liquid_rib::translator::parse_frame_sequence;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "liquid", version, about = "Scene to RenderMan RIB translator")]
struct Cli {
    /// More logging (-v debug, -vv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Only warnings and errors.
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write RIB files and a render script for a scene.
    Render(RenderArgs),
    /// Print the frames of a sequence such as `1-10@2,20`.
    Frames {
        sequence: String,
    },
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScriptArg {
    Alfred,
    Xml,
    None,
}

impl From<ScriptArg> for ScriptFormat {
    fn from(arg: ScriptArg) -> Self {
        match arg {
            ScriptArg::Alfred => ScriptFormat::Alfred,
            ScriptArg::Xml => ScriptFormat::Xml,
            ScriptArg::None => ScriptFormat::None,
        }
    }
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Scene JSON (may carry animation channels).
    scene: PathBuf,

    /// Render globals JSON.
    #[arg(short, long)]
    globals: Option<PathBuf>,

    /// Frame sequence, overriding the globals.
    #[arg(short, long)]
    frames: Option<String>,

    /// Project directory output paths are relative to.
    #[arg(short, long)]
    project: Option<PathBuf>,

    /// Render camera path.
    #[arg(long)]
    camera: Option<String>,

    /// Render layer.
    #[arg(long)]
    layer: Option<String>,

    /// Motion samples; enables transformation and deformation blur.
    #[arg(long)]
    samples: Option<usize>,

    /// Render script format.
    #[arg(long, value_enum)]
    script: Option<ScriptArg>,

    /// Gzip RIB files.
    #[arg(long)]
    compress: bool,

    /// Generate frames in parallel.
    #[arg(long)]
    parallel: bool,

    /// Run the renderer on every RIB once written.
    #[arg(long)]
    launch: bool,
}

fn init_logging(verbose: u8, quiet: bool) {
    let default = match (quiet, verbose) {
        (true, _) => "warn",
        (false, 0) => "info",
        (false, 1) => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("LIQUID_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
        Command::Frames { sequence } => cmd_frames(&sequence),
    }
}

fn cmd_frames(sequence: &str) -> anyhow::Result<()> {
    let frames = parse_frame_sequence(sequence)?;
    let text: Vec<String> = frames.iter().map(i64::to_string).collect();
    println!("{}", text.join(" "));
    Ok(())
}

fn context(args: &RenderArgs) -> anyhow::Result<RenderContext> {
    let mut ctx = match &args.globals {
        Some(path) => RenderContext::load(path).with_context(|| format!("loading globals {}", path.display()))?,
        None => RenderContext::default(),
    };
    if let Some(frames) = &args.frames {
        ctx.frames = FrameSpec::Text(frames.clone());
    }
    if let Some(project) = &args.project {
        ctx.output.project_dir = project.display().to_string();
    }
    if let Some(camera) = &args.camera {
        ctx.camera = camera.clone();
    }
    if let Some(layer) = &args.layer {
        ctx.layer = layer.clone();
    }
    if let Some(samples) = args.samples {
        ctx.motion.samples = samples;
        ctx.motion.transformation_blur = samples > 1;
        ctx.motion.deformation_blur = samples > 1;
    }
    if let Some(script) = args.script {
        ctx.script_format = script.into();
    }
    ctx.output.compress |= args.compress;
    ctx.parallel_frames |= args.parallel;
    ctx.job.launch |= args.launch;
    ctx.validate()?;
    Ok(ctx)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let ctx = context(&args)?;
    let scene = AnimatedScene::load(&args.scene).with_context(|| format!("loading scene {}", args.scene.display()))?;
    let loader = GeneratorRegistry::default();

    let report = Translator::new(&ctx, &loader).run(&scene)?;
    for skipped in &report.skipped {
        tracing::warn!(frame = skipped.frame, object = %skipped.path, reason = %skipped.reason, "skipped");
    }
    for rib in &report.rib_files {
        println!("{}", rib.display());
    }
    if let Some(script) = &report.script {
        println!("{}", script.display());
    }
    if report.cancelled {
        anyhow::bail!("cancelled after {} frame(s)", report.frames_done.len());
    }

    if ctx.job.launch {
        for rib in &report.rib_files {
            let mut launcher = RenderLauncher::render(&ctx, rib);
            match launcher.wait() {
                LaunchStatus::Finished(Some(0)) => {}
                LaunchStatus::Failed(e) => anyhow::bail!("{}: {e}", launcher.program()),
                status => anyhow::bail!("{} failed on {}: {status:?}", launcher.program(), rib.display()),
            }
        }
    }
    Ok(())
}
