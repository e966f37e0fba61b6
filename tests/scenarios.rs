//! End-to-end translation runs writing into temporary project directories.

use liquid_rib::prelude::*;
use liquid_rib::scene::{CameraShape, EdgeCrease, Key, LightKind, LightShape, Mesh};
use liquid_rib::translator::parse_frame_sequence;
use liquid_rib::util::{DMat4, DVec3, Vec3};
use std::path::Path;

fn cube() -> Mesh {
    let points = vec![
        Vec3::new(-1.0, -1.0, -1.0),
        Vec3::new(1.0, -1.0, -1.0),
        Vec3::new(1.0, 1.0, -1.0),
        Vec3::new(-1.0, 1.0, -1.0),
        Vec3::new(-1.0, -1.0, 1.0),
        Vec3::new(1.0, -1.0, 1.0),
        Vec3::new(1.0, 1.0, 1.0),
        Vec3::new(-1.0, 1.0, 1.0),
    ];
    Mesh {
        points,
        face_counts: vec![4; 6],
        face_vertices: vec![
            0, 3, 2, 1, 4, 5, 6, 7, 0, 1, 5, 4, 1, 2, 6, 5, 2, 3, 7, 6, 3, 0, 4, 7,
        ],
        ..Default::default()
    }
}

fn scene(cube_node: SceneNode) -> Scene {
    Scene {
        name: "shot".into(),
        camera: "|cam".into(),
        nodes: vec![
            SceneNode::with_shape("cam", Shape::Camera(CameraShape::default()))
                .transformed(DMat4::from_translation(DVec3::new(0.0, 0.0, 10.0))),
            SceneNode::with_shape(
                "lamp",
                Shape::Light(LightShape {
                    kind: LightKind::Point,
                    ..Default::default()
                }),
            )
            .transformed(DMat4::from_translation(DVec3::new(2.0, 4.0, 2.0))),
            cube_node,
        ],
        ..Default::default()
    }
}

fn context(project: &Path) -> RenderContext {
    let mut ctx = RenderContext::default();
    ctx.output.project_dir = project.display().to_string();
    ctx
}

fn count(rib: &str, keyword: &str) -> usize {
    rib.lines().filter(|l| l.trim_start().starts_with(keyword)).count()
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn test_static_cube_with_point_light() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let loader = GeneratorRegistry::default();
    let report = Translator::new(&ctx, &loader)
        .run(&scene(SceneNode::with_shape("box", Shape::Mesh(cube()))))
        .unwrap();

    assert_eq!(report.rib_files.len(), 1);
    assert!(report.rib_files[0].ends_with("rib/shot.0001.rib"));
    let rib = read(&report.rib_files[0]);
    assert_eq!(count(&rib, "WorldBegin"), 1);
    assert_eq!(count(&rib, "WorldEnd"), 1);
    assert_eq!(count(&rib, "LightSource"), 1);
    assert_eq!(count(&rib, "LightSource \"liquidpoint\""), 1);
    assert_eq!(count(&rib, "PointsGeneralPolygons"), 1);
    assert_eq!(count(&rib, "MotionBegin"), 0);
    assert!(count(&rib, "Transform [") >= 1);
}

#[test]
fn test_transformation_blur_with_moving_camera() {
    let dir = tempfile::tempdir().unwrap();
    let mut ctx = context(dir.path());
    ctx.motion.samples = 2;
    ctx.motion.transformation_blur = true;
    let source = AnimatedScene::new(scene(SceneNode::with_shape("box", Shape::Mesh(cube())))).with_channel(
        "|cam",
        vec![
            Key {
                time: 0.0,
                translate: Some(DVec3::new(0.0, 0.0, 10.0)),
                ..Default::default()
            },
            Key {
                time: 2.0,
                translate: Some(DVec3::new(4.0, 0.0, 10.0)),
                ..Default::default()
            },
        ],
    );
    let loader = GeneratorRegistry::default();
    let report = Translator::new(&ctx, &loader).run(&source).unwrap();
    let rib = read(&report.rib_files[0]);

    // 144 degree shutter opening on frame 1
    assert!(rib.contains("Shutter 1 1.4"));
    assert_eq!(count(&rib, "MotionBegin [1 1.4]"), 1);
    let lines: Vec<&str> = rib.lines().map(str::trim_start).collect();
    let begin = lines.iter().position(|l| l.starts_with("MotionBegin")).unwrap();
    assert!(lines[begin + 1].starts_with("Transform"));
    assert!(lines[begin + 2].starts_with("Transform"));
    assert_eq!(lines[begin + 3], "MotionEnd");
    // static geometry is written once, after the motion block
    let geometry = lines.iter().position(|l| l.starts_with("PointsGeneralPolygons")).unwrap();
    assert!(geometry > begin + 3);
    assert_eq!(count(&rib, "PointsGeneralPolygons"), 1);
}

#[test]
fn test_subdivision_crease_tags() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = context(dir.path());
    let mut node = SceneNode::with_shape("box", Shape::Mesh(cube()));
    node.attributes.subdivision.enabled = true;
    node.attributes.subdivision.creases = vec![EdgeCrease {
        edge: [3, 7],
        sharpness: 5.0,
    }];
    let loader = GeneratorRegistry::default();
    let report = Translator::new(&ctx, &loader).run(&scene(node)).unwrap();
    let rib = read(&report.rib_files[0]);

    let line = rib
        .lines()
        .map(str::trim_start)
        .find(|l| l.starts_with("SubdivisionMesh"))
        .unwrap();
    assert!(line.starts_with("SubdivisionMesh \"catmull-clark\" [4 4 4 4 4 4]"));
    assert!(line.contains("[\"crease\" \"interpolateboundary\"] [2 1 1 0] [3 7 1] [5]"));
}

#[test]
fn test_leaf_dependency_script() {
    let mut script = RenderScript::new("shot");
    let main = script.add_job(Job::new("main"), 0).unwrap();
    script.add_leaf_dependency(&Job::new("finalize"));

    let job = script.job(main).unwrap();
    assert_eq!(job.children.len(), 1);
    assert_eq!(job.children[0].title, "finalize");

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shot.alf");
    script.write_alf(&path).unwrap();
    let alf = read(&path);
    let squashed = alf.split_whitespace().collect::<Vec<_>>().join(" ");
    assert!(squashed.contains("Task -title {main} -subtasks { Task -title {finalize} }"));
}

#[test]
fn test_frame_sequence_expansion() {
    assert_eq!(parse_frame_sequence("1-5@2").unwrap(), vec![1, 3, 5]);
    assert_eq!(parse_frame_sequence("1-5@2").unwrap(), parse_frame_sequence("1-5@2").unwrap());
}

#[test]
fn test_scene_and_globals_from_json() {
    let dir = tempfile::tempdir().unwrap();
    let scene_path = dir.path().join("turntable.json");
    std::fs::write(
        &scene_path,
        r#"{
            "camera": "|cam",
            "nodes": [
                { "name": "cam", "transform": { "translate": [0, 0, 10] }, "shape": { "type": "camera" } },
                { "name": "tri", "shape": {
                    "type": "mesh",
                    "points": [[0, 0, 0], [1, 0, 0], [0, 1, 0]],
                    "face_counts": [3],
                    "face_vertices": [0, 1, 2]
                } }
            ],
            "channels": [
                { "path": "|tri", "keys": [
                    { "time": 1, "rotate": [0, 0, 0] },
                    { "time": 3, "rotate": [0, 90, 0] }
                ] }
            ]
        }"#,
    )
    .unwrap();
    let globals_path = dir.path().join("globals.json");
    std::fs::write(
        &globals_path,
        format!(
            r#"{{ "frames": "1-3", "output": {{ "project_dir": "{}", "compress": false }}, "script_format": "xml" }}"#,
            dir.path().display()
        ),
    )
    .unwrap();

    let ctx = RenderContext::load(&globals_path).unwrap();
    let source = AnimatedScene::load(&scene_path).unwrap();
    let loader = GeneratorRegistry::default();
    let report = Translator::new(&ctx, &loader).run(&source).unwrap();

    assert_eq!(report.frames_done, vec![1, 2, 3]);
    assert!(report.rib_files[2].ends_with("rib/turntable.0003.rib"));
    let script = report.script.unwrap();
    assert!(script.ends_with("rmantmp/turntable.xml"));
    let xml = read(&script);
    assert!(xml.contains("<title>turntable</title>"));
    assert_eq!(xml.matches("<task>").count(), 3);
}
