use cv_core::{Homography, Raster};
use cv_features::{FastBriefConfig, FastBriefEngine};
use cv_io::ImageHandle;
use cv_photo::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

fn texture(width: u32, height: u32, block: u32, seed: u64) -> Raster {
    let mut rng = StdRng::seed_from_u64(seed);
    let bw = width.div_ceil(block);
    let bh = height.div_ceil(block);
    let blocks: Vec<u8> = (0..bw * bh).map(|_| rng.gen_range(20..=235)).collect();
    let mut r = Raster::new(width, height);
    for y in 0..height {
        for x in 0..width {
            let v = blocks[((y / block) * bw + x / block) as usize];
            r.put_pixel(x, y, [v, v / 2 + 10, 255 - v]);
        }
    }
    r
}

fn crop(scene: &Raster, x0: u32, width: u32) -> Raster {
    let mut r = Raster::new(width, scene.height());
    r.copy_from_clipped(scene, -(x0 as i64), 0);
    r
}

fn solid(w: u32, h: u32, c: [u8; 3]) -> Raster {
    let mut r = Raster::new(w, h);
    for y in 0..h {
        for x in 0..w {
            r.put_pixel(x, y, c);
        }
    }
    r
}

fn small_patch_stitcher(config: StitchConfig) -> Stitcher {
    let engine = FastBriefEngine::new(
        FastBriefConfig::default()
            .with_patch_size(9)
            .with_blur_sigma(None),
    );
    Stitcher::new(config).unwrap().with_engine(Arc::new(engine))
}

#[test]
fn test_identity_composition_is_exact() {
    let a = texture(64, 48, 4, 1);
    let c = compose(&a, &a, &Homography::identity(), 4000).unwrap();
    assert_eq!(c.dimensions(), (64, 48));
    assert_eq!(c.offset, (0, 0));
    let blended = OverlapAverage.blend(&c.warped, &c.placed).unwrap();
    assert_eq!(blended, a);
}

#[test]
fn test_canvas_never_exceeds_limit() {
    let a = solid(40, 40, [9, 9, 9]);
    for h in [
        Homography::scaling(500.0, 0.5).unwrap(),
        Homography::from_rows([[1.0, 0.0, 0.0], [0.0, 1.0, 0.0], [0.0, -0.025, 1.0]]).unwrap(),
        Homography::translation(1e7, -1e7),
    ] {
        let c = compose(&a, &a, &h, 256).unwrap();
        let (w, hgt) = c.dimensions();
        assert!(w <= 256 && hgt <= 256, "{}x{} for {}", w, hgt, h);
        assert!(c.clamped);
    }
}

#[test]
fn test_disjoint_blend_is_union_for_both_policies() {
    let mut a = Raster::new(30, 10);
    let mut b = Raster::new(30, 10);
    a.copy_from_clipped(&solid(12, 10, [50, 60, 70]), 0, 0);
    b.copy_from_clipped(&solid(12, 10, [90, 80, 70]), 18, 0);

    for blender in [StitchConfig::default().blender(), Box::new(FeatherBlend::new(4.0)) as Box<dyn Blender>] {
        let out = blender.blend(&a, &b).unwrap();
        assert_eq!(out.pixel(3, 5), [50, 60, 70], "{}", blender.name());
        assert_eq!(out.pixel(15, 5), [0, 0, 0], "{}", blender.name());
        assert_eq!(out.pixel(25, 5), [90, 80, 70], "{}", blender.name());
    }
}

#[test]
fn test_stitch_rasters_recovers_translation() {
    let scene = texture(200, 100, 4, 2);
    let a = crop(&scene, 0, 120);
    let b = crop(&scene, 80, 120);

    let outcome = small_patch_stitcher(StitchConfig::default()).stitch_rasters(&[a, b]).unwrap();
    let (w, h) = outcome.panorama.dimensions();
    assert!((199..=202).contains(&w), "width {}", w);
    assert!((100..=102).contains(&h), "height {}", h);

    let pair = &outcome.report.pairs[0];
    assert!(pair.is_stitched());
    if let PairOutcome::Stitched { inliers, .. } = pair.outcome {
        assert!(inliers >= 4);
    }
}

#[test]
fn test_feathered_run_produces_same_canvas() {
    let scene = texture(200, 100, 4, 3);
    let rasters = [crop(&scene, 0, 120), crop(&scene, 80, 120)];

    let average = small_patch_stitcher(StitchConfig::default()).stitch_rasters(&rasters).unwrap();
    let feather = small_patch_stitcher(StitchConfig::default().with_blend_mode(BlendMode::FeatheredLinear))
        .stitch_rasters(&rasters)
        .unwrap();
    assert_eq!(average.panorama.dimensions(), feather.panorama.dimensions());
}

#[test]
fn test_flat_image_is_reported_as_skipped() {
    let scene = texture(120, 100, 4, 4);
    let flat = solid(120, 100, [128, 128, 128]);

    let outcome = small_patch_stitcher(StitchConfig::default())
        .stitch_rasters(&[scene.clone(), flat])
        .unwrap();
    assert_eq!(outcome.panorama, scene);
    assert_eq!(outcome.report.skipped().count(), 1);

    let summary = outcome.report.to_string();
    assert!(summary.contains("0 of 1 pairs stitched, 1 skipped"), "{}", summary);
    assert!(summary.contains("0 -> 1: skipped (image 1 has 0 keypoints"), "{}", summary);
}

#[test]
fn test_two_pass_stitch_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let scene = texture(200, 100, 8, 5);
    let paths = [dir.path().join("a.png"), dir.path().join("b.png")];
    crop(&scene, 0, 120).as_rgb().save(&paths[0]).unwrap();
    crop(&scene, 80, 120).as_rgb().save(&paths[1]).unwrap();

    let sources: Vec<ImageHandle> = paths.iter().map(|p| ImageHandle::open(p).unwrap()).collect();
    let sink = Arc::new(MemorySink::new());
    let stitcher = small_patch_stitcher(StitchConfig::default().with_downscale_factor(0.5)).with_sink(sink.clone());

    let plan = stitcher.estimate(&sources).unwrap();
    assert_eq!(plan.scale, 0.5);
    let h = plan.pairs[0].homography.unwrap();
    let (x, _) = h.project(50.0, 25.0).unwrap();
    assert!((x - 10.0).abs() < 1.0, "x = {}", x);

    let outcome = stitcher.compose_plan(&sources, &plan).unwrap();
    let (w, hgt) = outcome.panorama.dimensions();
    assert!((198..=203).contains(&w), "width {}", w);
    assert!((100..=102).contains(&hgt), "height {}", hgt);

    let names = sink.names();
    assert!(names.contains(&"matches_1.png".to_string()));
    assert!(names.contains(&"homography_1.svg".to_string()));
    assert!(names.contains(&"panorama.png".to_string()));
    assert!(!names.iter().any(|n| n.starts_with("panorama_step_")));
}

#[test]
fn test_missing_file_aborts_run() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("a.png");
    solid(20, 20, [1, 2, 3]).as_rgb().save(&path).unwrap();
    let a = ImageHandle::open(&path).unwrap();
    std::fs::remove_file(&path).unwrap();

    let result = Stitcher::default().stitch(&[a]);
    assert!(matches!(result, Err(Error::ImageLoad { .. })));
}
