use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use anyhow::Context as _;
use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "rasterpad", version)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Replay a stroke script and write the rendered canvas as a PNG.
    Render(RenderArgs),
}

#[derive(Parser, Debug)]
struct RenderArgs {
    /// Input stroke-script JSON.
    #[arg(long = "in")]
    in_path: PathBuf,

    /// Output PNG path.
    #[arg(long)]
    out: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    match cli.cmd {
        Command::Render(args) => cmd_render(args),
    }
}

fn read_script(path: &Path) -> anyhow::Result<rasterpad::StrokeScript> {
    let f = File::open(path).with_context(|| format!("open script '{}'", path.display()))?;
    let r = BufReader::new(f);
    let script: rasterpad::StrokeScript =
        serde_json::from_reader(r).with_context(|| "parse stroke-script JSON")?;
    Ok(script)
}

fn cmd_render(args: RenderArgs) -> anyhow::Result<()> {
    let script = read_script(&args.in_path)?;
    let session = rasterpad::replay(&script)?;
    let canvas = session.render()?;

    if let Some(parent) = args.out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }

    image::save_buffer_with_format(
        &args.out,
        canvas.data(),
        canvas.width() as u32,
        canvas.height() as u32,
        image::ColorType::Rgba8,
        image::ImageFormat::Png,
    )
    .with_context(|| format!("write png '{}'", args.out.display()))?;

    eprintln!("wrote {}", args.out.display());
    Ok(())
}
