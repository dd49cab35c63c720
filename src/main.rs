use log::{error, info, warn};
use std::env;
use std::ffi::OsString;
use std::process;

use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};

use addrgen::Config;

fn app() -> Command {
    Command::new("addrgen")
        .about("Generate Wishbone register interfaces and address maps from XML block descriptions")
        .arg(
            Arg::new("input")
                .help("Top-level description file")
                .short('i')
                .action(ArgAction::Set)
                .value_name("FILE"),
        )
        .arg(
            Arg::new("base_dir")
                .long("base-dir")
                .short('b')
                .help("Directory the input file is relative to")
                .action(ArgAction::Set)
                .value_name("DIR"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .short('c')
                .help("Config TOML file")
                .action(ArgAction::Set)
                .value_name("TOML_FILE"),
        )
        .arg(
            Arg::new("hdl")
                .long("hdl")
                .help("Directory for the VHDL interface modules and packages")
                .action(ArgAction::Set)
                .value_name("DIR"),
        )
        .arg(
            Arg::new("header")
                .long("header")
                .help("Directory for the C headers")
                .action(ArgAction::Set)
                .value_name("DIR"),
        )
        .arg(
            Arg::new("html")
                .long("html")
                .help("Directory for the HTML address map")
                .action(ArgAction::Set)
                .value_name("DIR"),
        )
        .arg(
            Arg::new("map")
                .long("map")
                .help("Absolute address map file (.json, .yaml or .yml)")
                .action(ArgAction::Set)
                .value_name("FILE"),
        )
        .arg(
            Arg::new("ipbus")
                .long("ipbus")
                .help("Directory for the IPbus address tables")
                .action(ArgAction::Set)
                .value_name("DIR"),
        )
        .arg(
            Arg::new("fusesoc")
                .long("fusesoc")
                .help("FuseSoC core file listing the VHDL outputs (needs --hdl)")
                .action(ArgAction::Set)
                .value_name("FILE"),
        )
        .arg(
            Arg::new("fusesoc_vlnv")
                .long("fusesoc-vlnv")
                .help("VLNV of the FuseSoC core")
                .action(ArgAction::Set)
                .value_name("VLNV"),
        )
        .arg(
            Arg::new("top")
                .long("top")
                .help("Top block, overriding the `top` attribute of the description")
                .action(ArgAction::Set)
                .value_name("BLOCK"),
        )
        .arg(
            Arg::new("registered")
                .long("registered")
                .action(ArgAction::SetTrue)
                .help("Register the crossbar outputs"),
        )
        .arg(
            Arg::new("iface_version")
                .long("iface-version")
                .help("Interface version word (default: checksum of the description)")
                .action(ArgAction::Set)
                .value_name("WORD"),
        )
        .arg(
            Arg::new("log_level")
                .long("log")
                .short('l')
                .help(format!(
                    "Choose which messages to log (overrides {})",
                    env_logger::DEFAULT_FILTER_ENV
                ))
                .action(ArgAction::Set)
                .value_parser(["off", "error", "warn", "info", "debug", "trace"]),
        )
        .version(concat!(
            env!("CARGO_PKG_VERSION"),
            include_str!(concat!(env!("OUT_DIR"), "/commit-info.txt"))
        ))
}

/// Command-line arguments first, then the TOML file named by `--config`.
fn load_config<I, T>(args: I) -> Result<Config>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString>,
{
    use irx_config::parsers::{cmd, toml};
    use irx_config::ConfigBuilder;

    let irxconfig = ConfigBuilder::default()
        .append_parser(
            cmd::ParserBuilder::new(app())
                .args(args)
                .exit_on_error(true)
                .build()?,
        )
        .append_parser(
            toml::ParserBuilder::default()
                .default_path("addrgen.toml")
                .path_option("config")
                .ignore_missing_file(true)
                .build()?,
        )
        .load()?;

    Ok(irxconfig.get()?)
}

fn run() -> Result<()> {
    let config = load_config(env::args_os())?;

    setup_logging(config.log_level.as_deref());

    if !config.has_outputs() {
        warn!("No output selected, only checking the description");
    }

    let artifacts = addrgen::compile(&config).with_context(|| {
        format!(
            "Error compiling {}",
            config
                .input
                .as_deref()
                .map(|p| p.display().to_string())
                .unwrap_or_default()
        )
    })?;
    info!("Generated {} files", artifacts.len());

    Ok(())
}

fn setup_logging(log_level: Option<&str>) {
    // * Log at info by default.
    // * Allow users the option of setting complex logging filters using
    //   env_logger's `RUST_LOG` environment variable.
    // * Override both of those if the logging level is set via the `--log`
    //   command line argument.
    let env = env_logger::Env::default().filter_or(env_logger::DEFAULT_FILTER_ENV, "info");
    let mut builder = env_logger::Builder::from_env(env);
    builder.format_timestamp(None);

    let log_lvl_from_env = env::var_os(env_logger::DEFAULT_FILTER_ENV).is_some();

    if log_lvl_from_env {
        log::set_max_level(log::LevelFilter::Trace);
    } else {
        let level = match log_level {
            Some(lvl) => lvl.parse().unwrap_or(log::LevelFilter::Info),
            None => log::LevelFilter::Info,
        };
        log::set_max_level(level);
        builder.filter_level(level);
    }

    builder.init();
}

fn main() {
    if let Err(ref e) = run() {
        error!("{:?}", e);

        process::exit(1);
    }
}
