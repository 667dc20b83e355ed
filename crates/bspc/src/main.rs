//! `bspc`: compiles a JSON scene into binary level data.

mod scene;

use std::error::Error;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::PathBuf;

use argh::FromArgs;
use bsp_compiler::{
    read_level_data, write_level_data, CompileOutcome, Compiler, CompilerOptions, ConsoleLogger,
};
use log::{info, warn, LevelFilter};

use scene::Scene;

/// Compile a scene into a BSP tree with portals and visibility.
#[derive(Debug, FromArgs)]
struct Args {
    /// scene description (JSON)
    #[argh(positional)]
    scene: PathBuf,
    /// level data to write
    #[argh(positional)]
    output: PathBuf,
    /// compiler options (JSON), overriding any embedded in the scene
    #[argh(option)]
    options: Option<PathBuf>,
    /// read the written file back and check it against the compiled tree
    #[argh(switch)]
    verify: bool,
    /// verbose level: off, error, warn, info, debug, trace
    #[argh(option)]
    verbose: Option<LevelFilter>,
}

fn main() -> Result<(), Box<dyn Error>> {
    let args: Args = argh::from_env();
    env_logger::Builder::new()
        .filter_level(args.verbose.unwrap_or(LevelFilter::Info))
        .init();

    let scene = Scene::from_reader(BufReader::new(File::open(&args.scene)?))?;
    let options = match &args.options {
        Some(path) => serde_json::from_reader::<_, CompilerOptions>(BufReader::new(File::open(path)?))?,
        None => scene.options.unwrap_or_default(),
    };

    let mut compiler = Compiler::new(options);
    compiler.set_logger(Some(Box::new(ConsoleLogger::new())));
    if compiler.compile_scene(scene.faces)? == CompileOutcome::Cancelled {
        warn!("compile cancelled, nothing written");
        return Ok(());
    }

    let tree = compiler.tree();
    info!(
        "{} planes, {} nodes, {} leaves, {} portals, {} pvs bytes",
        tree.planes().len(),
        tree.nodes().len(),
        tree.leaves().len(),
        tree.portals().len(),
        tree.pvs().data.len()
    );

    write_level_data(tree, BufWriter::new(File::create(&args.output)?))?;
    info!("wrote {}", args.output.display());

    if args.verify {
        let level = read_level_data(BufReader::new(File::open(&args.output)?))?;
        let matches = level.planes.len() == tree.planes().len()
            && level.nodes == tree.nodes()
            && level.leaves == tree.leaves()
            && level.portals.len() == tree.portals().len()
            && level.pvs == *tree.pvs();
        if !matches {
            return Err(format!("{} does not match the compiled tree", args.output.display()).into());
        }
        info!("verified {}", args.output.display());
    }
    Ok(())
}
