use std::path::PathBuf;

use anyhow::{Result, anyhow};
use effect_gate::{
    BackendKind,
    config::GateConfig,
    runner::{RunOptions, Runner, split_patterns},
};

const USAGE: &str = "\
usage: effect-gate --backend <webgl2|webgpu> [options] [pattern...]

  --backend <b>        webgl2 (also --webgl2, --glsl) or webgpu (also --webgpu, --wgsl)
  --effects <csv>      effect ids or wildcards, e.g. classicBasics/*,*/noise
  --all                enable every optional check below
  --benchmark          measure FPS against the target
  --uniforms           check parameter responsiveness
  --structure          run the static analyzer before compiling
  --structure-only     static analysis only, no browser
  --alg-equiv          ask the vision model whether GLSL and WGSL agree
  --passthrough        check filter effects are not no-ops
  --no-vision          skip the vision frame check
  --headless           run the primary browser headless
  --verbose            print more detail per failure
  --config <path>      configuration file (default: effect-gate.toml)";

#[derive(Debug, Default, Clone)]
struct Cli {
    backend: Option<String>,
    patterns: Vec<String>,
    all: bool,
    benchmark: bool,
    uniforms: bool,
    structure: bool,
    structure_only: bool,
    alg_equiv: bool,
    passthrough: bool,
    no_vision: bool,
    headless: bool,
    verbose: bool,
    config: Option<PathBuf>,
    help: bool,
}

fn value_after(args: &[String], i: usize, name: &str) -> Result<String> {
    args.get(i + 1)
        .cloned()
        .ok_or_else(|| anyhow!("missing value for {name}"))
}

fn parse_cli(args: &[String]) -> Result<Cli> {
    let mut cli = Cli::default();
    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--backend" => {
                cli.backend = Some(value_after(args, i, "--backend")?);
                i += 1;
            }
            "--webgl2" | "--glsl" => cli.backend = Some("webgl2".into()),
            "--webgpu" | "--wgsl" => cli.backend = Some("webgpu".into()),
            "--effects" => {
                cli.patterns.extend(split_patterns(&value_after(args, i, "--effects")?));
                i += 1;
            }
            "--config" => {
                cli.config = Some(PathBuf::from(value_after(args, i, "--config")?));
                i += 1;
            }
            "--all" => cli.all = true,
            "--benchmark" => cli.benchmark = true,
            "--uniforms" => cli.uniforms = true,
            "--structure" => cli.structure = true,
            "--structure-only" => {
                cli.structure_only = true;
                cli.structure = true;
            }
            "--alg-equiv" => cli.alg_equiv = true,
            "--passthrough" => cli.passthrough = true,
            "--no-vision" => cli.no_vision = true,
            "--headless" => cli.headless = true,
            "--verbose" => cli.verbose = true,
            "-h" | "--help" => cli.help = true,
            other if other.starts_with("--") => {
                return Err(anyhow!("unknown argument: {other}\n\n{USAGE}"));
            }
            pattern => cli.patterns.push(pattern.to_string()),
        }
        i += 1;
    }
    Ok(cli)
}

fn run_options(cli: &Cli, backend: BackendKind, headless_default: bool) -> RunOptions {
    let mut opts = RunOptions::new(backend);
    opts.patterns = cli.patterns.clone();
    opts.benchmark = cli.benchmark;
    opts.uniforms = cli.uniforms;
    opts.structure = cli.structure;
    opts.structure_only = cli.structure_only;
    opts.alg_equiv = cli.alg_equiv;
    opts.passthrough = cli.passthrough;
    opts.skip_vision = cli.no_vision;
    opts.headless = cli.headless || headless_default;
    opts.verbose = cli.verbose;
    if cli.all {
        opts.enable_all();
    }
    opts
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = parse_cli(&args)?;
    if cli.help {
        println!("{USAGE}");
        return Ok(());
    }

    let Some(backend) = cli.backend.as_deref() else {
        eprintln!("ERROR: Backend flag is REQUIRED.");
        eprintln!("  Use --backend webgl2 or --webgl2 or --glsl for WebGL2/GLSL");
        eprintln!("  Use --backend webgpu or --webgpu or --wgsl for WebGPU/WGSL");
        std::process::exit(1);
    };
    let backend: BackendKind = backend.parse()?;

    let cwd = std::env::current_dir()?;
    let cfg = GateConfig::load_or_default(cli.config.as_deref(), &cwd)?;
    let opts = run_options(&cli, backend, cfg.browser.headless);

    let summary = Runner::new(cfg, opts)?.run()?;
    if !summary.all_passed() {
        println!("\n❌ TEST RUN FAILED - fix the issues above");
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn aliases_and_patterns() {
        let cli = parse_cli(&args("--wgsl --effects a/b,c/* extra/one --structure-only")).unwrap();
        assert_eq!(cli.backend.as_deref(), Some("webgpu"));
        assert_eq!(cli.patterns, vec!["a/b", "c/*", "extra/one"]);
        assert!(cli.structure && cli.structure_only);
    }

    #[test]
    fn all_turns_on_optional_checks() {
        let cli = parse_cli(&args("--backend webgl2 --all --no-vision")).unwrap();
        let opts = run_options(&cli, BackendKind::Raster, false);
        assert!(opts.benchmark && opts.uniforms && opts.structure && opts.alg_equiv && opts.passthrough);
        assert!(opts.skip_vision);
    }

    #[test]
    fn unknown_flag_and_missing_value_fail() {
        assert!(parse_cli(&args("--frobnicate")).is_err());
        assert!(parse_cli(&args("--effects")).is_err());
    }
}
