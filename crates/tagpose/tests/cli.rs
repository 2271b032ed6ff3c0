#![cfg(feature = "cli")]

use std::fs;

use assert_cmd::Command;
use nalgebra::Isometry3;
use predicates::prelude::*;
use tagpose::{
    object_points, write_frames, FrameHeader, RawDetection, RecordedDetection, RecordedFrame,
    TagDetectionArray,
};
use tagpose_core::CameraIntrinsics;

const CONFIG: &str = r#"{
    "camera_frame": "cam0",
    "publish_tf": true,
    "standalone_tags": [ { "id": 5, "size": 0.1, "name": "dock" } ],
    "tag_bundles": [
        { "name": "B", "layout": [
            { "id": 1, "size": 0.1 },
            { "id": 2, "size": 0.1, "x": 0.5 }
        ] }
    ]
}"#;

fn recorded(id: i32, tag_to_camera: &Isometry3<f64>, k: &CameraIntrinsics) -> RecordedDetection {
    let corners = object_points(0.1, &Isometry3::identity())
        .map(|p| k.project(&(tag_to_camera * p)).expect("in front"));
    let raw = RawDetection::from_corners(id, corners).expect("detection");
    RecordedDetection {
        id,
        corners: raw.corners,
        center: None,
        homography: None,
    }
}

fn frames() -> Vec<RecordedFrame> {
    let k = CameraIntrinsics::new(600.0, 600.0, 320.0, 240.0);
    let bundle = Isometry3::translation(-0.25, 0.1, 1.5);
    vec![
        RecordedFrame {
            header: FrameHeader {
                seq: 1,
                stamp: 1.5,
                frame_id: "cam0".into(),
            },
            intrinsics: k,
            detections: vec![recorded(5, &Isometry3::translation(0.0, 0.0, 0.2), &k)],
        },
        RecordedFrame {
            header: FrameHeader {
                seq: 2,
                stamp: 1.6,
                frame_id: "cam0".into(),
            },
            intrinsics: k,
            detections: vec![
                recorded(1, &bundle, &k),
                recorded(2, &(bundle * Isometry3::translation(0.5, 0.0, 0.0)), &k),
                recorded(9, &Isometry3::translation(0.0, -0.1, 0.8), &k),
                recorded(9, &Isometry3::translation(0.0, 0.1, 0.8), &k),
            ],
        },
    ]
}

#[test]
fn replays_frames_as_json_lines() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("detector.json");
    let frames_path = dir.path().join("frames.json");
    fs::write(&config, CONFIG).expect("write config");
    write_frames(&frames_path, &frames()).expect("write frames");

    let output = Command::cargo_bin("tagpose")
        .expect("binary")
        .args(["--config", config.to_str().expect("utf8")])
        .args(["--frames", frames_path.to_str().expect("utf8")])
        .args(["--log-level", "warn"])
        .output()
        .expect("run");
    assert!(output.status.success(), "{:?}", output);

    let stdout = String::from_utf8(output.stdout).expect("utf8");
    let arrays: Vec<TagDetectionArray> = stdout
        .lines()
        .map(|l| serde_json::from_str(l).expect("json line"))
        .collect();
    assert_eq!(arrays.len(), 2);

    assert_eq!(arrays[0].header.seq, 1);
    assert_eq!(arrays[0].detections[0].frame_name, "dock");
    assert!((arrays[0].detections[0].pose.position.z - 0.2).abs() < 1e-6);

    assert_eq!(arrays[1].len(), 1);
    assert_eq!(arrays[1].detections[0].ids, vec![1, 2]);

    let stderr = String::from_utf8(output.stderr).expect("utf8");
    assert!(stderr.contains("removing tag ID 9"));
}

#[test]
fn missing_config_fails() {
    let dir = tempfile::tempdir().expect("tempdir");
    let frames_path = dir.path().join("frames.json");
    write_frames(&frames_path, &frames()).expect("write frames");

    Command::cargo_bin("tagpose")
        .expect("binary")
        .args(["--config", "does-not-exist.json"])
        .args(["--frames", frames_path.to_str().expect("utf8")])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load config"));
}

#[test]
fn pretty_output_is_indented() {
    let dir = tempfile::tempdir().expect("tempdir");
    let config = dir.path().join("detector.json");
    let frames_path = dir.path().join("frames.json");
    fs::write(&config, "{}").expect("write config");
    write_frames(&frames_path, &frames()[..1]).expect("write frames");

    Command::cargo_bin("tagpose")
        .expect("binary")
        .args(["--config", config.to_str().expect("utf8")])
        .args(["--frames", frames_path.to_str().expect("utf8")])
        .arg("--pretty")
        .args(["--log-level", "off"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\n  \"detections\": []"));
}
