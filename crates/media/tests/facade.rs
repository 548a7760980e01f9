//! Facade behaviour against shell scripts standing in for the engine and
//! its probe tool.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use greensub_common::config::RunnerSettings;
use greensub_common::error::GreensubError;
use greensub_job_model::{JobSpec, SubtitleFormat, SubtitleTrack};
use greensub_media::{MediaFacade, MediaProbe, RenderEvent};
use greensub_process_runner::ProcessRunner;

/// Writes an executable script. `$out` is the engine's output argument
/// without its `file:` prefix and `$dir` is the script's directory.
fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    let text = format!(
        "#!/bin/sh\ndir=\"$(dirname \"$0\")\"\nfor last; do :; done\nout=\"${{last#file:}}\"\n{body}\n"
    );
    std::fs::write(&path, text).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

const FIXTURE_PREVIEW: &str = r#"cp "$dir/fixture.png" "$out""#;

/// Engine that answers previews with `fixture.png` and runs `render_body`
/// for renders.
fn facade(dir: &Path, render_body: &str) -> MediaFacade {
    facade_with(dir, FIXTURE_PREVIEW, render_body, RunnerSettings::default())
}

fn facade_with(
    dir: &Path,
    preview_body: &str,
    render_body: &str,
    settings: RunnerSettings,
) -> MediaFacade {
    image::RgbaImage::from_pixel(64, 36, image::Rgba([0, 255, 0, 255]))
        .save(dir.join("fixture.png"))
        .unwrap();
    let engine = script(
        dir,
        "fake-ffmpeg",
        &format!(
            "printf '%s\\n' \"$@\" > \"$dir/args.txt\"\n\
             case \"$*\" in\n*image2*)\n{preview_body}\nexit 0;;\nesac\n\
             {render_body}"
        ),
    );
    let probe = script(dir, "fake-ffprobe", r#"printf '{"format":{"duration":"2.0"}}'"#);
    MediaFacade::new(
        ProcessRunner::new(engine, settings),
        MediaProbe::new(probe),
    )
}

fn process_alive(pid: &str) -> bool {
    std::process::Command::new("kill")
        .args(["-0", pid])
        .stderr(std::process::Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

struct Inputs {
    source: PathBuf,
    subtitle: PathBuf,
    output: PathBuf,
}

fn inputs(dir: &Path) -> Inputs {
    let source = dir.join("clip.mp4");
    let subtitle = dir.join("clip.srt");
    std::fs::write(&source, b"not really video").unwrap();
    std::fs::write(&subtitle, "1\r\n00:00:00,5 --> 00:00:01,0\r\nHi\r\n").unwrap();
    Inputs {
        source,
        subtitle,
        output: dir.join("out").join("render.mp4"),
    }
}

fn render_spec(inputs: &Inputs) -> JobSpec {
    std::fs::create_dir_all(inputs.output.parent().unwrap()).unwrap();
    let mut spec = JobSpec::render(inputs.source.clone(), inputs.output.clone());
    spec.subtitle = Some(SubtitleTrack::new(inputs.subtitle.clone(), SubtitleFormat::Srt));
    spec
}

fn recorded_filter_graph(dir: &Path) -> String {
    let args = std::fs::read_to_string(dir.join("args.txt")).unwrap();
    let lines: Vec<&str> = args.lines().collect();
    let at = lines.iter().position(|l| *l == "-filter_complex").unwrap();
    lines[at + 1].to_string()
}

async fn next_event(stream: &mut greensub_media::RenderStream) -> RenderEvent {
    tokio::time::timeout(Duration::from_secs(20), stream.next())
        .await
        .expect("render did not finish in time")
        .expect("stream closed before completion")
}

#[tokio::test]
async fn test_render_streams_progress_and_cleans_up() {
    let dir = tempfile::tempdir().unwrap();
    let facade = facade(
        dir.path(),
        r#"
printf 'out_time_us=1000000\nprogress=continue\n'
printf 'rendered' > "$out"
printf 'out_time_us=2000000\nprogress=end\n'"#,
    );
    let inputs = inputs(dir.path());

    let mut stream = facade.request_render(render_spec(&inputs)).await.unwrap();
    assert_eq!(facade.active_render(), Some(stream.id()));

    let mut ratios = Vec::new();
    let result = loop {
        match next_event(&mut stream).await {
            RenderEvent::Progress(p) => ratios.push(p.ratio),
            RenderEvent::Stalled { .. } => panic!("unexpected stall"),
            RenderEvent::Finished(result) => break result,
        }
    };
    assert!(stream.next().await.is_none());

    // The probed duration is the denominator.
    assert_eq!(ratios, vec![0.5, 1.0]);
    assert_eq!(result.unwrap(), inputs.output);
    assert_eq!(std::fs::read_to_string(&inputs.output).unwrap(), "rendered");
    assert_eq!(facade.active_render(), None);

    let graph = recorded_filter_graph(dir.path());
    let staged = graph
        .split("filename=")
        .nth(1)
        .and_then(|rest| rest.split(':').next())
        .unwrap();
    assert!(staged.contains("/sub_") && staged.ends_with(".srt"), "{graph}");
    assert!(!graph.contains("clip.srt"));
    assert!(!Path::new(staged).exists(), "staged subtitle left behind");
}

#[tokio::test]
async fn test_second_render_is_busy_until_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let facade = facade(
        dir.path(),
        r#"
printf 'partial' > "$out"
exec sleep 30"#,
    );
    let inputs = inputs(dir.path());

    let first = facade.request_render(render_spec(&inputs)).await.unwrap();
    let second = facade.request_render(render_spec(&inputs)).await;
    assert!(matches!(second, Err(GreensubError::Busy)));

    // Previews do not need the render slot.
    let frame = facade
        .request_preview(JobSpec::preview(inputs.source.clone(), 0.5))
        .await
        .unwrap();
    assert_eq!(frame.width, 64);

    assert!(facade.cancel_active_render());
    let result = tokio::time::timeout(Duration::from_secs(20), first.finish())
        .await
        .unwrap();
    assert!(matches!(result, Err(GreensubError::Cancelled)));
    assert!(!inputs.output.exists());
    assert_eq!(facade.active_render(), None);
    assert!(!facade.cancel_active_render());

    // The slot is free again.
    let third = facade.request_render(render_spec(&inputs)).await.unwrap();
    facade.cancel_active_render();
    let _ = tokio::time::timeout(Duration::from_secs(20), third.finish()).await;
}

#[tokio::test]
async fn test_unreadable_source_is_rejected_before_spawn() {
    let dir = tempfile::tempdir().unwrap();
    let facade = facade(dir.path(), r#"touch "$dir/spawned""#);
    let inputs = inputs(dir.path());
    std::fs::remove_file(&inputs.source).unwrap();

    let err = facade
        .request_render(render_spec(&inputs))
        .await
        .unwrap_err();
    match err {
        GreensubError::Validation { field, .. } => assert_eq!(field, "source"),
        other => panic!("expected validation error, got {other:?}"),
    }
    assert_eq!(facade.active_render(), None);
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert!(!dir.path().join("spawned").exists());
    assert!(!dir.path().join("args.txt").exists());
}

#[tokio::test]
async fn test_engine_failure_surfaces_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let facade = facade(
        dir.path(),
        r#"
echo "Unknown encoder 'h264_videotoolbox'" >&2
exit 1"#,
    );
    let inputs = inputs(dir.path());

    let stream = facade.request_render(render_spec(&inputs)).await.unwrap();
    let err = tokio::time::timeout(Duration::from_secs(20), stream.finish())
        .await
        .unwrap()
        .unwrap_err();
    match err {
        GreensubError::Runtime { code, excerpt } => {
            assert_eq!(code, Some(1));
            assert!(excerpt.contains("Unknown encoder"), "{excerpt}");
        }
        other => panic!("expected runtime error, got {other:?}"),
    }
    assert!(!inputs.output.exists());
}

#[tokio::test]
async fn test_preview_decodes_frame() {
    let dir = tempfile::tempdir().unwrap();
    let facade = facade(dir.path(), "exit 1");
    let inputs = inputs(dir.path());

    let mut spec = JobSpec::preview(inputs.source.clone(), 1.25);
    spec.subtitle = Some(SubtitleTrack::new(inputs.subtitle.clone(), SubtitleFormat::Srt));
    let frame = facade.request_preview(spec).await.unwrap();

    assert_eq!((frame.width, frame.height), (64, 36));
    assert_eq!(frame.at_secs, 1.25);
    assert_eq!(frame.pixels.get_pixel(3, 3).0, [0, 255, 0, 255]);

    let args = std::fs::read_to_string(dir.path().join("args.txt")).unwrap();
    assert!(args.lines().any(|l| l == "1.250"));

    let saved = dir.path().join("saved.png");
    frame.save_png(&saved).unwrap();
    assert_eq!(image::open(&saved).unwrap().width(), 64);
}

#[tokio::test]
async fn test_mode_mismatch_is_validation() {
    let dir = tempfile::tempdir().unwrap();
    let facade = facade(dir.path(), "exit 0");
    let inputs = inputs(dir.path());

    let err = facade
        .request_preview(render_spec(&inputs))
        .await
        .unwrap_err();
    assert!(err.is_validation());

    let err = facade
        .request_render(JobSpec::preview(inputs.source.clone(), 0.0))
        .await
        .unwrap_err();
    assert!(err.is_validation());
}

#[tokio::test]
async fn test_preview_without_frame_is_runtime_error() {
    let dir = tempfile::tempdir().unwrap();
    let facade = facade_with(dir.path(), "exit 0", "exit 0", RunnerSettings::default());
    let inputs = inputs(dir.path());

    let err = facade
        .request_preview(JobSpec::preview(inputs.source.clone(), 99.0))
        .await
        .unwrap_err();
    match err {
        GreensubError::Runtime { code, excerpt } => {
            assert_eq!(code, Some(0));
            assert!(excerpt.contains("no frame"), "{excerpt}");
        }
        other => panic!("expected runtime error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_hung_preview_hits_time_limit() {
    let dir = tempfile::tempdir().unwrap();
    let settings = RunnerSettings {
        preview_timeout_secs: 1,
        grace_period_ms: 200,
        ..Default::default()
    };
    let facade = facade_with(dir.path(), "exec sleep 60", "exit 0", settings);
    let inputs = inputs(dir.path());

    let result = tokio::time::timeout(
        Duration::from_secs(20),
        facade.request_preview(JobSpec::preview(inputs.source.clone(), 0.5)),
    )
    .await
    .expect("preview was not bounded");
    assert!(
        matches!(result, Err(GreensubError::Stalled { idle_secs: 1 })),
        "{result:?}"
    );
}

#[tokio::test]
async fn test_abandoned_preview_stops_engine() {
    let dir = tempfile::tempdir().unwrap();
    let facade = facade_with(
        dir.path(),
        r#"echo $$ > "$dir/preview.pid"
exec sleep 60"#,
        "exit 0",
        RunnerSettings {
            grace_period_ms: 200,
            ..Default::default()
        },
    );
    let inputs = inputs(dir.path());

    let abandoned = tokio::time::timeout(
        Duration::from_secs(2),
        facade.request_preview(JobSpec::preview(inputs.source.clone(), 0.5)),
    )
    .await;
    assert!(abandoned.is_err(), "preview should still be running");

    let pid_file = dir.path().join("preview.pid");
    let pid = std::fs::read_to_string(&pid_file).expect("engine never started");
    let pid = pid.trim();

    let mut alive = true;
    for _ in 0..100 {
        alive = process_alive(pid);
        if !alive {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    assert!(!alive, "engine {pid} outlived the abandoned preview");
}
