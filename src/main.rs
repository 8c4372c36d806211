mod browse;
mod collectors;
mod config;
mod error;
mod models;
mod util;

use anyhow::{bail, Context, Result};
use clap::{ArgAction, Parser};
use collectors::lsblk::{LsblkQuery, LsblkSource};
use collectors::udev::UdevDatabase;
use collectors::usb::{DeviceFilter, DeviceSource, UsbVolumes};
use collectors::{capacity, df, lsblk, mounts};
use config::{Config, SourceKind};
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use util::human::{fmt_bytes, fmt_bytes_opt, fmt_pct};

#[derive(Parser, Debug)]
#[command(name = "usbvol", about = "List USB storage volumes and where they are mounted", version)]
struct Cli {
    /// Include USB volumes that are not mounted
    #[arg(long, conflicts_with = "only_mounted")]
    all: bool,

    /// Show only USB volumes that are mounted
    #[arg(long)]
    only_mounted: bool,

    /// Device enumeration backend
    #[arg(short, long, value_enum)]
    source: Option<SourceKind>,

    /// Print the parsed mount table and exit
    #[arg(long)]
    mounts: bool,

    /// Print disk usage (optionally for the given paths only) and exit
    #[arg(long, num_args = 0.., value_name = "PATH")]
    df: Option<Vec<PathBuf>>,

    /// Print lsblk rows for the configured columns (or only the row keyed KEY) and exit
    #[arg(long, num_args = 0..=1, value_name = "KEY")]
    lsblk: Option<Option<String>>,

    /// Match only partitions bound to the usb-storage driver (excludes UAS)
    #[arg(long)]
    usb_storage: bool,

    /// List a directory, or the root of a mounted USB volume given by device node
    #[arg(long, value_name = "PATH")]
    browse: Option<PathBuf>,

    /// Recurse into subdirectories (used with --browse)
    #[arg(short, long, requires = "browse")]
    recursive: bool,

    /// Include dot-files (used with --browse)
    #[arg(long)]
    hidden: bool,

    /// Print a one-shot JSON snapshot of volumes, mounts and disk usage and exit
    #[arg(long)]
    json: bool,

    /// Print config file path and current values, then exit
    #[arg(long)]
    config: bool,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut cfg = Config::load();
    if cli.all          { cfg.general.only_mounted = false; }
    if cli.only_mounted { cfg.general.only_mounted = true; }
    if let Some(source) = cli.source { cfg.general.source = source; }
    if cli.hidden       { cfg.browse.show_hidden = true; }
    if cli.usb_storage  { cfg.filter = DeviceFilter::usb_storage(); }

    if cli.config {
        return run_print_config(&cfg);
    }
    if cli.mounts {
        return run_mounts(&cfg);
    }
    if let Some(paths) = &cli.df {
        return run_df(paths);
    }
    if let Some(key) = &cli.lsblk {
        return run_lsblk(&cfg, key.as_deref());
    }
    if cli.json {
        return run_json_snapshot(&cfg);
    }
    if let Some(path) = &cli.browse {
        return run_browse(&cfg, path, cli.recursive);
    }
    run_volumes(&cfg)
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        _ => EnvFilter::new("debug"),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn device_source(cfg: &Config) -> Box<dyn DeviceSource> {
    match cfg.general.source {
        SourceKind::Udev  => Box::new(UdevDatabase::new(cfg.udev.sys_root.clone(), cfg.udev.udev_data.clone())),
        SourceKind::Lsblk => Box::new(LsblkSource::new()),
    }
}

fn usb_volumes(cfg: &Config) -> UsbVolumes {
    UsbVolumes::new(
        device_source(cfg),
        cfg.filter.clone(),
        cfg.general.mounts_path.clone(),
        cfg.general.only_mounted,
    )
}

fn run_volumes(cfg: &Config) -> Result<()> {
    let mut vols = usb_volumes(cfg);
    let source = vols.source_name();
    let list = vols
        .volumes()
        .with_context(|| format!("listing USB volumes via {}", source))?;

    if list.is_empty() {
        println!("No USB volumes found.");
        return Ok(());
    }

    println!("{:<12} {:<16} {:<6} {:>9} {:>5}  {}", "DEVICE", "LABEL", "FS", "SIZE", "USE", "MOUNT POINT");
    for v in list {
        let used = match v.mount_point() {
            Some(mp) => match capacity::capacity(mp) {
                Ok(c)  => fmt_pct(c.use_pct()),
                Err(e) => {
                    debug!(mount = %mp.display(), error = %e, "statvfs failed");
                    "—".to_string()
                }
            },
            None => "—".to_string(),
        };
        let mount = match (&v.mount_point, &v.mount) {
            (Some(p), Some(m)) if m.is_read_only() => format!("{} (ro)", p.display()),
            (Some(p), _) => p.display().to_string(),
            (None, _)    => "(not mounted)".to_string(),
        };
        println!(
            "{:<12} {:<16} {:<6} {:>9} {:>5}  {}",
            v.device,
            v.display_name(),
            v.fs_type.as_deref().unwrap_or("—"),
            fmt_bytes_opt(v.size_bytes),
            used,
            mount,
        );
    }
    Ok(())
}

fn run_mounts(cfg: &Config) -> Result<()> {
    let table = mounts::read_mount_table(&cfg.general.mounts_path)?;
    for entry in &table {
        println!("{}", entry);
    }
    Ok(())
}

fn run_df(paths: &[PathBuf]) -> Result<()> {
    let paths: Vec<&Path> = paths.iter().map(PathBuf::as_path).collect();
    let rows = df::read_disk_usage(&paths)?;
    println!("{:<24} {:>10} {:>10} {:>10} {:>5}  {}", "FILESYSTEM", "SIZE", "USED", "AVAIL", "USE%", "MOUNTED ON");
    for r in &rows {
        println!(
            "{:<24} {:>10} {:>10} {:>10} {:>5}  {}",
            r.source,
            fmt_bytes(r.size_bytes),
            fmt_bytes(r.used_bytes),
            fmt_bytes(r.available_bytes),
            r.use_pct().map(fmt_pct).unwrap_or_else(|| r.use_percent.clone()),
            r.target.display(),
        );
    }
    Ok(())
}

fn run_lsblk(cfg: &Config, key: Option<&str>) -> Result<()> {
    let query = if cfg.lsblk.usb_only {
        LsblkQuery::usb(cfg.lsblk.columns.clone())
    } else {
        LsblkQuery::new(cfg.lsblk.columns.clone())
    };
    let devs = lsblk::run_lsblk(&query)?;
    let columns = query.effective_columns();

    if let Some(key) = key {
        let rec = match devs.by_key(key) {
            Some(r) => r,
            None    => bail!("no lsblk row with {} = {}", columns.first().map_or("key", String::as_str), key),
        };
        for c in &columns {
            println!("{:<12} {}", c, rec.get_str(c).unwrap_or_default());
        }
        return Ok(());
    }

    if devs.is_empty() {
        println!("No matching block devices.");
        return Ok(());
    }
    // Column-major: one Vec per column, rows by index.
    let cells: Vec<Vec<String>> = columns
        .iter()
        .map(|c| devs.column(c).into_iter().map(Option::unwrap_or_default).collect())
        .collect();
    let widths: Vec<usize> = columns
        .iter()
        .zip(&cells)
        .map(|(c, vals)| vals.iter().map(|v| v.chars().count()).max().unwrap_or(0).max(c.len()))
        .collect();

    let header: Vec<String> = columns.iter().zip(&widths).map(|(c, w)| format!("{:<w$}", c.to_uppercase(), w = *w)).collect();
    println!("{}", header.join("  ").trim_end());
    for row in 0..devs.records().len() {
        let line: Vec<String> = cells.iter().zip(&widths).map(|(vals, w)| format!("{:<w$}", vals[row], w = *w)).collect();
        println!("{}", line.join("  ").trim_end());
    }
    Ok(())
}

fn run_browse(cfg: &Config, target: &Path, recursive: bool) -> Result<()> {
    // A device node names a USB volume; browse where it is mounted.
    let dir = if target.starts_with("/dev") {
        let mut vols = usb_volumes(cfg);
        let node = target.to_string_lossy();
        let vol = vols
            .volumes()?
            .iter()
            .find(|v| v.device == node)
            .cloned();
        match vol {
            Some(v) => match v.mount_point {
                Some(mp) => mp,
                None     => bail!("{} is not mounted", node),
            },
            None => bail!("{} is not a USB volume", node),
        }
    } else {
        target.to_path_buf()
    };

    let entries = if recursive {
        browse::walk(&dir, cfg.browse.show_hidden)?
    } else {
        browse::list_dir(&dir, cfg.browse.show_hidden)?
    };
    for e in &entries {
        let rel = e.path.strip_prefix(&dir).unwrap_or(&e.path);
        let size = if e.kind == browse::EntryKind::File { fmt_bytes(e.size) } else { String::new() };
        println!("{:<5} {:>10}  {}", e.kind.label(), size, rel.display());
    }
    Ok(())
}

fn run_json_snapshot(cfg: &Config) -> Result<()> {
    use serde_json::json;

    let mut vols = usb_volumes(cfg);
    let table = mounts::read_mount_table(&cfg.general.mounts_path)?;
    let usage = df::read_disk_usage(&[])?;

    let volumes: Vec<serde_json::Value> = vols
        .volumes()?
        .iter()
        .map(|v| {
            let cap = v.mount_point().and_then(|mp| capacity::capacity(mp).ok());
            json!({
                "device":      v.device,
                "mount_point": v.mount_point,
                "mounted":     v.mounted(),
                "label":       v.label,
                "uuid":        v.uuid,
                "model":       v.model,
                "fstype":      v.fs_type,
                "size":        v.size_bytes,
                "size_hr":     fmt_bytes_opt(v.size_bytes),
                "capacity":    cap,
            })
        })
        .collect();

    let snapshot = json!({
        "usbvol_version": env!("CARGO_PKG_VERSION"),
        "timestamp":      chrono::Local::now().to_rfc3339(),
        "source":         vols.source_name(),
        "volumes":        volumes,
        "mounts":         table,
        "disk_usage":     usage,
    });

    println!("{}", serde_json::to_string_pretty(&snapshot)?);
    Ok(())
}

fn run_print_config(cfg: &Config) -> Result<()> {
    let path = Config::config_path()
        .map(|p| p.to_string_lossy().into_owned())
        .unwrap_or_else(|| "(unknown)".to_string());
    let opt = |v: &Option<String>| v.clone().filter(|s| !s.is_empty()).unwrap_or_else(|| "(any)".to_string());
    println!("Config: {}", path);
    println!();
    println!("[general]");
    println!("  only_mounted = {}", cfg.general.only_mounted);
    println!("  source       = {:?}", cfg.general.source);
    println!("  mounts_path  = {}", cfg.general.mounts_path.display());
    println!();
    println!("[filter]");
    println!("  devtype   = {}", opt(&cfg.filter.devtype));
    println!("  subsystem = {}", opt(&cfg.filter.subsystem));
    println!("  driver    = {}", opt(&cfg.filter.driver));
    println!();
    println!("[lsblk]");
    println!("  columns  = {:?}", cfg.lsblk.columns);
    println!("  usb_only = {}", cfg.lsblk.usb_only);
    println!();
    println!("[udev]");
    println!("  sys_root  = {}", cfg.udev.sys_root.display());
    println!("  udev_data = {}", cfg.udev.udev_data.display());
    println!();
    println!("[browse]");
    println!("  show_hidden = {}", cfg.browse.show_hidden);
    Ok(())
}
