use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    config_dir: Option<PathBuf>,
    paths: Vec<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    tunelist::app::run_with_startup(tunelist::app::AppStartupOptions {
        config_dir: args.config_dir,
        paths: args.paths,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--config-dir" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--config-dir requires a directory");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--config-dir cannot be empty");
                }
                out.config_dir = Some(PathBuf::from(value.trim()));
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "--" => {
                out.paths
                    .extend(args[index + 1..].iter().map(PathBuf::from));
                break;
            }
            other if other.starts_with('-') => anyhow::bail!("unknown argument {other}"),
            path => out.paths.push(PathBuf::from(path)),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("TuneList");
    println!("  tunelist [options] [files or folders...]");
    println!("  --config-dir <dir>  Store playlists, settings and logs in <dir>");
    println!("  -h, --help          Show this help");
    println!();
    println!("Files and folders given on the command line are added to the current playlist.");
    println!("Set TUNELIST_LOG to override the log filter, e.g. TUNELIST_LOG=debug.");
}
