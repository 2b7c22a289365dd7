//! Shared fixtures for unit tests: a deterministic in-process engine and
//! synthetic LED strips.
#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use nalgebra::Vector2;
use parking_lot::Mutex;

use crate::database::CorrespondenceDatabase;
use crate::engine::{
    ArtifactImage, ArtifactPoint, EngineError, EngineJob, ReconstructionArtifact,
    ReconstructionEngine, TrackElement,
};
use crate::io::led_csv::OBSERVATION_PREFIX;
use crate::map::{ImageId, LedId, LedMap2D};

/// What the fake engine does when invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FakeMode {
    /// Triangulate every track onto the z = 0 plane at its keypoint.
    Reconstruct,
    /// Succeed without writing a model.
    NoModel,
    /// Fail without writing a model.
    Error,
    Panic,
}

/// Engine that chains matches into tracks and places each track's point at
/// its first keypoint's coordinates, so results are exact and predictable.
pub(crate) struct FakeEngine {
    mode: Mutex<FakeMode>,
    calls: AtomicUsize,
    saw_images: AtomicBool,
    last_database: Mutex<Option<CorrespondenceDatabase>>,
}

impl FakeEngine {
    pub fn new() -> Self {
        Self::with_mode(FakeMode::Reconstruct)
    }

    pub fn with_mode(mode: FakeMode) -> Self {
        Self {
            mode: Mutex::new(mode),
            calls: AtomicUsize::new(0),
            saw_images: AtomicBool::new(false),
            last_database: Mutex::new(None),
        }
    }

    pub fn set_mode(&self, mode: FakeMode) {
        *self.mode.lock() = mode;
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Whether every placeholder image existed on the last call.
    pub fn saw_images(&self) -> bool {
        self.saw_images.load(Ordering::SeqCst)
    }

    pub fn last_database(&self) -> Option<CorrespondenceDatabase> {
        self.last_database.lock().clone()
    }
}

impl ReconstructionEngine for FakeEngine {
    fn reconstruct(&self, job: &EngineJob<'_>) -> Result<(), EngineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let database = CorrespondenceDatabase::read_json(job.database_path)?;
        let images_present = database
            .images
            .iter()
            .all(|image| job.image_path.join(&image.name).is_file());
        self.saw_images.store(images_present, Ordering::SeqCst);
        *self.last_database.lock() = Some(database.clone());

        let mode = *self.mode.lock();
        match mode {
            FakeMode::Reconstruct => {}
            FakeMode::NoModel => return Ok(()),
            FakeMode::Error => return Err(EngineError::Other("degenerate configuration".into())),
            FakeMode::Panic => panic!("fake engine crashed"),
        }

        let min_track_len = if job.options.ignore_two_view_tracks { 3 } else { 2 };
        let artifact = fake_reconstruction(&database, min_track_len);
        if !artifact.points3d.is_empty() {
            artifact.write_to(job.output_path)?;
        }
        Ok(())
    }
}

type Node = (u32, u32);

fn find(parent: &mut HashMap<Node, Node>, node: Node) -> Node {
    let mut root = node;
    while let Some(&p) = parent.get(&root) {
        if p == root {
            break;
        }
        root = p;
    }
    parent.insert(node, root);
    root
}

/// Chain pairwise matches into tracks and place one point per track.
fn fake_reconstruction(
    database: &CorrespondenceDatabase,
    min_track_len: usize,
) -> ReconstructionArtifact {
    let mut parent: HashMap<Node, Node> = HashMap::new();
    for pair in &database.pairs {
        for &[a, b] in &pair.matches {
            let na = (pair.image_a.0, a);
            let nb = (pair.image_b.0, b);
            parent.entry(na).or_insert(na);
            parent.entry(nb).or_insert(nb);
            let (ra, rb) = (find(&mut parent, na), find(&mut parent, nb));
            if ra != rb {
                parent.insert(ra.max(rb), ra.min(rb));
            }
        }
    }

    let nodes: Vec<Node> = parent.keys().copied().collect();
    let mut tracks: BTreeMap<Node, Vec<Node>> = BTreeMap::new();
    for node in nodes {
        let root = find(&mut parent, node);
        tracks.entry(root).or_default().push(node);
    }

    let mut artifact = ReconstructionArtifact::default();
    let mut registered: BTreeSet<u32> = BTreeSet::new();

    for (id, mut track) in tracks.into_values().enumerate() {
        if track.len() < min_track_len {
            continue;
        }
        track.sort();
        let (image, keypoint) = track[0];
        let Some([u, v]) = database
            .image(ImageId::new(image))
            .and_then(|img| img.keypoints.get(keypoint as usize))
            .copied()
        else {
            continue;
        };

        for &(image, _) in &track {
            registered.insert(image);
        }
        artifact.points3d.push(ArtifactPoint {
            point3d_id: id as u64 + 1,
            xyz: [u, v, 0.0],
            error: 0.1,
            track: track
                .into_iter()
                .map(|(image, keypoint)| TrackElement {
                    image_id: ImageId::new(image),
                    keypoint_idx: keypoint,
                })
                .collect(),
        });
    }

    artifact.images = registered
        .into_iter()
        .filter_map(|image| database.image(ImageId::new(image)))
        .map(|image| ArtifactImage {
            image_id: image.image_id,
            name: image.name.clone(),
            rotation: [1.0, 0.0, 0.0, 0.0],
            translation: [-(image.image_id.0 as f64), 0.0, -5.0],
        })
        .collect();

    artifact
}

/// Image coordinate of LED `id` on the synthetic strip.
pub(crate) fn strip_point(id: u32) -> Vector2<f64> {
    Vector2::new(id as f64 * 0.01, 0.5)
}

/// A view of the synthetic strip that sees `ids`.
pub(crate) fn strip_view(name: &str, ids: impl IntoIterator<Item = u32>) -> LedMap2D {
    LedMap2D::from_points(
        name,
        ids.into_iter().map(|id| (LedId::new(id), strip_point(id))),
    )
}

/// Write a strip view as an observation file in `dir`.
///
/// The file appears atomically so a polling worker never sees it half written.
pub(crate) fn write_view(dir: &Path, name: &str, ids: impl IntoIterator<Item = u32>) -> PathBuf {
    let path = dir.join(format!("{}{}.csv", OBSERVATION_PREFIX, name));
    let partial = dir.join(format!(".{}.partial", name));
    let mut contents = String::from("index,u,v\n");
    for id in ids {
        let p = strip_point(id);
        contents.push_str(&format!("{},{},{}\n", id, p.x, p.y));
    }
    fs::write(&partial, contents).expect("write observation file");
    fs::rename(&partial, &path).expect("publish observation file");
    path
}
