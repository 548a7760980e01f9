//! Check engine availability.

use greensub_command_builder::encoder::ENCODERS;
use greensub_common::config::{config_file_path, AppConfig};
use greensub_process_runner::locate_program;

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("GreenSub System Check");
    println!("{}", "=".repeat(50));

    let mut ready = true;
    for (label, program) in [
        ("Engine", &config.engine.ffmpeg),
        ("Probe", &config.engine.ffprobe),
    ] {
        match locate_program(program) {
            Ok(path) => println!("[OK] {label}: {}", path.display()),
            Err(err) => {
                ready = false;
                println!("[FAIL] {label}: {err}");
            }
        }
    }

    println!();
    println!("Config file: {}", config_file_path().display());
    println!(
        "Runner: grace {}ms, stall timeout {}s ({:?}), preview limit {}s",
        config.runner.grace_period_ms,
        config.runner.stall_timeout_secs,
        config.runner.stall_policy,
        config.runner.preview_timeout_secs
    );

    println!();
    println!("Encoders:");
    for profile in ENCODERS {
        let accel = profile
            .hwaccel
            .map(|h| format!(" (hwaccel {h})"))
            .unwrap_or_default();
        println!("  {:<14} {}{accel}", profile.id, profile.codec);
    }

    println!();
    if ready {
        println!("Engine is available. GreenSub is ready.");
    } else {
        println!("The engine is missing. Install ffmpeg or set GREENSUB_FFMPEG / GREENSUB_FFPROBE.");
    }
    Ok(())
}
