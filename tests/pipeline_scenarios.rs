// End-to-end runs of small pick-and-place style pipelines.

use image::{DynamicImage, GrayImage, Luma};
use pnp_vision::core_modules::stages::{Capture, FileSource, Recall, StaticSource, Threshold};
use pnp_vision::pipeline::{ColorSpace, Pipeline, PipelineError, RunState};
use pnp_vision::{PipelineDocument, StageRegistry};

fn board_frame() -> DynamicImage {
    let mut frame = GrayImage::new(6, 4);
    for (x, _, pixel) in frame.enumerate_pixels_mut() {
        *pixel = Luma([(x * 50) as u8]);
    }
    DynamicImage::ImageLuma8(frame)
}

fn capture(name: &str) -> Capture {
    Capture::new(name)
        .with_source(StaticSource::new(board_frame()))
        .with_color_space(ColorSpace::Gray)
}

#[test]
fn recall_reaches_back_past_the_threshold() {
    let pipeline = Pipeline::new()
        .with_stage(capture("raw"))
        .unwrap()
        .with_stage(Threshold::new("mask").with_threshold(100))
        .unwrap()
        .with_stage(Recall::new("echo").with_image_stage_name("raw"))
        .unwrap();

    let outcome = pipeline.run().unwrap();
    assert_eq!(pipeline.state(), RunState::Completed);

    let raw = pipeline.get_expected_result("raw").unwrap();
    let mask = pipeline.get_expected_result("mask").unwrap();
    let echo = pipeline.get_expected_result("echo").unwrap();

    // The echo is the raw frame, not the mask that ran in between.
    assert_eq!(echo.image().unwrap().as_bytes(), raw.image().unwrap().as_bytes());
    assert_ne!(echo.image().unwrap().as_bytes(), mask.image().unwrap().as_bytes());
    assert_eq!(echo.color_space(), raw.color_space());
    // A copy, not a shared buffer.
    assert_ne!(
        echo.image().unwrap().as_bytes().as_ptr(),
        raw.image().unwrap().as_bytes().as_ptr()
    );
    assert_eq!(outcome.results.names().collect::<Vec<_>>(), vec!["raw", "mask", "echo"]);
}

#[test]
fn empty_recall_completes_with_no_result() {
    let pipeline = Pipeline::new()
        .with_stage(capture("raw"))
        .unwrap()
        .with_stage(Recall::new("echo").with_image_stage_name(""))
        .unwrap();

    pipeline.run().unwrap();

    assert_eq!(pipeline.state(), RunState::Completed);
    assert!(matches!(
        pipeline.get_expected_result("echo"),
        Err(PipelineError::MissingResult(name)) if name == "echo"
    ));
}

#[test]
fn recall_of_an_unknown_stage_fails_the_run() {
    let pipeline = Pipeline::new()
        .with_stage(capture("raw"))
        .unwrap()
        .with_stage(Recall::new("echo").with_image_stage_name("missing"))
        .unwrap();

    let err = pipeline.run().unwrap_err();

    assert_eq!(err.failing_stage(), Some("echo"));
    assert_eq!(err.missing_result(), Some("missing"));
    assert_eq!(pipeline.state(), RunState::Failed);
    // What ran before the failure can still be inspected.
    assert!(pipeline.get_expected_result("raw").is_ok());
}

#[test]
fn lone_empty_recall_completes() {
    let pipeline = Pipeline::new()
        .with_stage(Recall::new("echo").with_image_stage_name(""))
        .unwrap();

    let outcome = pipeline.run().unwrap();

    assert_eq!(pipeline.state(), RunState::Completed);
    assert!(outcome.results.contains("echo"));
    assert!(outcome.last_result().is_none());
}

#[test]
fn lone_recall_of_a_missing_stage_fails() {
    let pipeline = Pipeline::new()
        .with_stage(Recall::new("echo").with_image_stage_name("missing"))
        .unwrap();

    let err = pipeline.run().unwrap_err();

    assert_eq!(pipeline.state(), RunState::Failed);
    assert_eq!(err.failing_stage(), Some("echo"));
    assert_eq!(err.missing_result(), Some("missing"));
    assert!(pipeline.last_results().unwrap().is_empty());
}

#[test]
fn disabling_a_stage_is_transparent_to_unrelated_recalls() {
    let mut pipeline = Pipeline::new()
        .with_stage(capture("raw"))
        .unwrap()
        .with_stage(Threshold::new("mask"))
        .unwrap()
        .with_stage(Recall::new("echo").with_image_stage_name("raw"))
        .unwrap();
    pipeline.set_enabled("mask", false).unwrap();

    let outcome = pipeline.run().unwrap();

    assert!(pipeline.get_expected_result("mask").is_err());
    assert!(!outcome.results.contains("mask"));
    assert!(pipeline.get_expected_result("echo").is_ok());
}

#[test]
fn yaml_pipeline_reads_and_writes_files() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("board.png");
    let output = dir.path().join("mask.png");
    board_frame().save(&input).unwrap();

    let yaml = format!(
        r#"
name: fiducial-check
stages:
  - type: Capture
    name: raw
    file: {input}
  - type: Threshold
    name: mask
    threshold: 120
  - type: ImageWrite
    name: dump
    file: {output}
  - type: ImageRecall
    name: echo
    imageStageName: raw
"#,
        input = input.display(),
        output = output.display(),
    );

    let pipeline = PipelineDocument::from_yaml_str(&yaml)
        .unwrap()
        .build(&StageRegistry::with_defaults())
        .unwrap();
    let outcome = pipeline.run().unwrap();

    // The sink publishes nothing, so the echo sits at the end.
    assert_eq!(outcome.last_result().unwrap().image().unwrap().width(), 6);
    assert_eq!(outcome.reports.len(), 4);

    let written = image::open(&output).unwrap().to_luma8();
    assert_eq!(written.get_pixel(2, 0).0, [0]);
    assert_eq!(written.get_pixel(3, 0).0, [255]);
}

#[test]
fn registry_override_injects_the_camera() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("frame.png");
    board_frame().save(&input).unwrap();

    let mut registry = StageRegistry::with_defaults();
    let camera = input.clone();
    registry.register("Capture", move |name| {
        Box::new(Capture::new(name).with_source(FileSource::new(camera.clone())))
    });

    let yaml = "stages:\n  - type: Capture\n    name: raw\n";
    let pipeline = PipelineDocument::from_yaml_str(yaml).unwrap().build(&registry).unwrap();
    pipeline.run().unwrap();

    let raw = pipeline.get_expected_result("raw").unwrap();
    assert_eq!(raw.color_space(), ColorSpace::Gray);
    assert_eq!(raw.image().unwrap().height(), 4);
}
