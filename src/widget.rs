//! Interactive 3D widget that shows one project model.
//!
//! A mounted widget owns exactly one [`SceneSession`]. Mounting clears the
//! container, builds the scene, camera, lights and surface, registers the
//! pointer and resize listeners and resolves the displayed content. Content
//! is either a procedural shape, inserted immediately, or an authored model
//! fetched through the platform with a two-step fallback chain ending in a
//! procedural cube.
//!
//! Every asynchronous callback holds a weak reference to the session and
//! checks its `active` flag before touching anything, so completions that
//! arrive after unmount are dropped on the floor.

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::{Rc, Weak};

use glam::{EulerRot, Quat, Vec2, Vec3};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};

use crate::config::SiteConfig;
use crate::error::ViewerResult;
use crate::geometry::{Aabb, Primitive};
use crate::model::{DecodedModel, ExternalBuffer, ModelDocument, ModelNode};
use crate::paths::resolve_relative;
use crate::platform::{normalize_pointer, FetchProgress, Platform, PointerEvent, ProgressHandler};
use crate::projects::{ModelType, FALLBACK_MODEL};
use crate::render::RenderSurface;
use crate::resources::{MaterialId, ResourceLedger};
use crate::scene::{
    aspect_ratio, hex_color, Light, Material, MaterialRange, MaterialSlot, MeshBinding,
    PerspectiveCamera, Scene, SceneNode,
};

/// Largest dimension of a fitted model at multiplier 1.
pub const TARGET_SIZE: f32 = 2.0;
/// Radians added per frame for a pointer at the container edge.
pub const ROTATION_SPEED: f32 = 0.01;
pub const BACKGROUND: u32 = 0xf1f5f9;

/// Inputs of a widget. A change to either field remounts it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WidgetProps {
    pub model: ModelType,
    pub scale: f32,
}

impl WidgetProps {
    pub fn new(model: ModelType) -> Self {
        Self { model, scale: 1.0 }
    }

    /// Non-positive or non-finite multipliers are replaced by 1.
    pub fn with_scale(mut self, scale: f32) -> Self {
        self.scale = sanitize_scale(scale);
        self
    }
}

impl Default for WidgetProps {
    fn default() -> Self {
        Self::new(ModelType::default())
    }
}

fn sanitize_scale(scale: f32) -> f32 {
    if scale.is_finite() && scale > 0.0 {
        scale
    } else {
        warn!("invalid scale multiplier {scale}; using 1");
        1.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    Initializing,
    ResolvingContent,
    Running,
    Disposed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStage {
    Primary,
    Fallback,
}

/// URLs tried for an authored model, and the shape shown if both fail.
#[derive(Debug, Clone, PartialEq)]
pub struct AuthoredPlan {
    pub primary: String,
    pub fallback: String,
    pub cube: Primitive,
}

impl AuthoredPlan {
    fn url(&self, stage: LoadStage) -> &str {
        match stage {
            LoadStage::Primary => &self.primary,
            LoadStage::Fallback => &self.fallback,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContentPlan {
    Procedural(Primitive),
    Authored(AuthoredPlan),
}

/// Decides what a widget with `props` will display. Asset URLs are resolved
/// against `config`.
pub fn plan_content(props: &WidgetProps, config: &SiteConfig) -> ContentPlan {
    match props.model.asset() {
        Some(path) => ContentPlan::Authored(AuthoredPlan {
            primary: config.asset_path(path),
            fallback: config.asset_path(FALLBACK_MODEL),
            cube: ModelType::Cube.shape(props.scale),
        }),
        None => ContentPlan::Procedural(props.model.shape(props.scale)),
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum DisplayedContent {
    Procedural {
        shape: Primitive,
    },
    Model {
        url: String,
        meshes: usize,
        triangles: usize,
    },
}

impl DisplayedContent {
    pub fn describe(&self) -> String {
        match self {
            Self::Procedural { shape } => format!("{} ({:.2})", shape.kind(), shape.characteristic_size()),
            Self::Model {
                url,
                meshes,
                triangles,
            } => format!("model {url} ({meshes} meshes, {triangles} triangles)"),
        }
    }
}

/// Read-only view of a mounted session.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub session: u64,
    pub phase: Phase,
    pub props: WidgetProps,
    pub displayed: Option<DisplayedContent>,
    /// Top-level objects in the scene graph.
    pub scene_objects: usize,
    /// Model documents requested so far, in order. Buffer files fetched
    /// for a document are not listed.
    pub attempted: Vec<String>,
    /// Accumulated rotation about x and y, in radians.
    pub rotation: Vec2,
    pub pointer: Vec2,
    pub aspect: f32,
    pub surface_size: (u32, u32),
    pub live_resources: usize,
    pub bounds: Aabb,
    pub triangles: usize,
    pub frames: u64,
}

struct Displayed {
    content: DisplayedContent,
    index: usize,
}

struct SceneSession<P: Platform> {
    id: u64,
    active: bool,
    phase: Phase,
    props: WidgetProps,
    scene: Scene,
    camera: PerspectiveCamera,
    surface: P::Surface,
    ledger: ResourceLedger,
    displayed: Option<Displayed>,
    spin: Vec2,
    pointer: Vec2,
    frames: u64,
    attempted: Vec<String>,
    listeners: Vec<P::Listener>,
    frame: Option<P::FrameRequest>,
    // the request whose callback may currently be executing
    retired_frame: Option<P::FrameRequest>,
}

type WeakSession<P> = Weak<RefCell<SceneSession<P>>>;

/// Handles released by [`SceneSession::dispose`] and dropped once no session
/// borrow is held.
type Detached<P> = (
    Vec<<P as Platform>::Listener>,
    Option<<P as Platform>::FrameRequest>,
    Option<<P as Platform>::FrameRequest>,
);

fn default_lights() -> Vec<Light> {
    vec![
        Light::Ambient {
            color: Vec3::ONE,
            intensity: 0.6,
        },
        Light::Directional {
            color: Vec3::ONE,
            intensity: 0.8,
            position: Vec3::splat(5.0),
        },
    ]
}

impl<P: Platform> SceneSession<P> {
    fn show(&mut self, node: SceneNode, content: DisplayedContent) {
        if let Some(previous) = self.displayed.take() {
            warn!("session {}: replacing {}", self.id, previous.content.describe());
            self.scene.objects.remove(previous.index);
        }
        info!("session {}: showing {}", self.id, content.describe());
        let index = self.scene.add(node);
        self.displayed = Some(Displayed { content, index });
        self.phase = Phase::Running;
    }

    fn show_shape(&mut self, shape: Primitive) {
        let mesh = shape.mesh();
        let geometry = self.ledger.upload_geometry(&mut self.surface, &mesh);
        let material = self
            .ledger
            .create_material(&mut self.surface, &Material::standard());
        let binding = MeshBinding {
            geometry,
            material: MaterialSlot::Single(material),
            bounds: mesh.bounds(),
            triangles: mesh.triangle_count(),
        };
        self.show(
            SceneNode::with_mesh(shape.kind(), binding),
            DisplayedContent::Procedural { shape },
        );
    }

    /// Uploads `model` scaled and centred under a pivot at the origin, so
    /// rotating the pivot spins the model about its own centre.
    fn show_model(&mut self, url: &str, model: &DecodedModel) -> ViewerResult<()> {
        let fit = model.fit(TARGET_SIZE * self.props.scale)?;
        let mut fitted = SceneNode::group("fit");
        fitted.transform = fit.transform();
        for root in &model.roots {
            let node = self.upload_node(root);
            fitted.children.push(node);
        }
        debug!(
            "session {}: fitted {url} with scale {:.4}",
            self.id, fit.scale
        );
        self.show(
            SceneNode::group(url).with_child(fitted),
            DisplayedContent::Model {
                url: url.to_string(),
                meshes: model.mesh_count(),
                triangles: model.triangle_count(),
            },
        );
        Ok(())
    }

    fn upload_node(&mut self, node: &ModelNode) -> SceneNode {
        let mut out = SceneNode::group(node.name.clone().unwrap_or_default());
        out.transform = node.transform;

        if let Some(mesh) = &node.mesh {
            let geometry = self.ledger.upload_geometry(&mut self.surface, &mesh.geometry);
            let mut materials: Vec<MaterialId> = Vec::with_capacity(mesh.materials.len());
            for material in &mesh.materials {
                materials.push(self.ledger.create_material(&mut self.surface, material));
            }
            let slot = if mesh.is_multi_material() {
                MaterialSlot::Multi(
                    mesh.groups
                        .iter()
                        .filter_map(|group| {
                            materials.get(group.material).map(|&material| MaterialRange {
                                start: group.start,
                                count: group.count,
                                material,
                            })
                        })
                        .collect(),
                )
            } else {
                let id = match materials.first() {
                    Some(&id) => id,
                    None => self
                        .ledger
                        .create_material(&mut self.surface, &Material::standard()),
                };
                MaterialSlot::Single(id)
            };
            out.mesh = Some(MeshBinding {
                geometry,
                material: slot,
                bounds: mesh.geometry.bounds(),
                triangles: mesh.geometry.triangle_count(),
            });
        }

        for child in &node.children {
            let child = self.upload_node(child);
            out.children.push(child);
        }
        out
    }

    fn advance(&mut self) {
        if let Some(displayed) = &self.displayed {
            self.spin.x += self.pointer.y * ROTATION_SPEED;
            self.spin.y += self.pointer.x * ROTATION_SPEED;
            if let Some(object) = self.scene.objects.get_mut(displayed.index) {
                object.transform.rotation =
                    Quat::from_euler(EulerRot::XYZ, self.spin.x, self.spin.y, 0.0);
            }
        }
        if let Err(err) = self.surface.render(&self.scene, &self.camera) {
            warn!("session {}: frame failed: {err}", self.id);
        }
        self.frames += 1;
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.camera.set_aspect(aspect_ratio(width, height));
        self.surface.resize(width, height);
        debug!("session {}: resized to {width}x{height}", self.id);
    }

    fn dispose(&mut self) -> Detached<P> {
        self.active = false;
        self.phase = Phase::Disposed;
        let released = self.ledger.release_all(&mut self.surface);
        self.surface.dispose();
        self.scene.clear();
        self.displayed = None;
        debug!("session {} disposed ({released} resources released)", self.id);
        (
            std::mem::take(&mut self.listeners),
            self.frame.take(),
            self.retired_frame.take(),
        )
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session: self.id,
            phase: self.phase,
            props: self.props,
            displayed: self.displayed.as_ref().map(|d| d.content.clone()),
            scene_objects: self.scene.objects.len(),
            attempted: self.attempted.clone(),
            rotation: self.spin,
            pointer: self.pointer,
            aspect: self.camera.aspect,
            surface_size: self.surface.size(),
            live_resources: self.ledger.len(),
            bounds: self.scene.world_bounds(),
            triangles: self.scene.triangle_count(),
            frames: self.frames,
        }
    }
}

/// A scene widget bound to one container of platform `P`.
pub struct SceneWidget<P: Platform> {
    platform: Rc<P>,
    props: WidgetProps,
    config: SiteConfig,
    session: Option<Rc<RefCell<SceneSession<P>>>>,
    sessions: u64,
}

impl<P: Platform> SceneWidget<P> {
    pub fn new(platform: Rc<P>, props: WidgetProps, config: SiteConfig) -> Self {
        Self {
            platform,
            props: props.with_scale(props.scale),
            config,
            session: None,
            sessions: 0,
        }
    }

    pub fn platform(&self) -> &Rc<P> {
        &self.platform
    }

    pub fn props(&self) -> WidgetProps {
        self.props
    }

    pub fn is_mounted(&self) -> bool {
        self.session.is_some()
    }

    /// Builds a fresh session, disposing the current one first. Fails only
    /// when no surface can be created, in which case nothing is drawn.
    pub fn mount(&mut self) -> ViewerResult<()> {
        self.unmount();
        self.platform.clear_container();

        let (width, height) = self.platform.container_bounds().pixel_size();
        let surface = self.platform.create_surface(width, height)?;
        self.sessions += 1;
        let id = self.sessions;

        let mut scene = Scene::new(hex_color(BACKGROUND));
        scene.lights = default_lights();
        let session = Rc::new(RefCell::new(SceneSession::<P> {
            id,
            active: true,
            phase: Phase::Initializing,
            props: self.props,
            scene,
            camera: PerspectiveCamera::for_size(width, height),
            surface,
            ledger: ResourceLedger::new(),
            displayed: None,
            spin: Vec2::ZERO,
            pointer: Vec2::ZERO,
            frames: 0,
            attempted: Vec::new(),
            listeners: Vec::new(),
            frame: None,
            retired_frame: None,
        }));
        info!(
            "mounting session {id}: {} x{} at {width}x{height}",
            self.props.model, self.props.scale
        );

        let listeners = self.listen(&session);
        {
            let mut session = session.borrow_mut();
            session.listeners = listeners;
            session.phase = Phase::ResolvingContent;
        }

        match plan_content(&self.props, &self.config) {
            ContentPlan::Procedural(shape) => session.borrow_mut().show_shape(shape),
            ContentPlan::Authored(plan) => {
                start_load(&Rc::downgrade(&session), &self.platform, Rc::new(plan), LoadStage::Primary)
            }
        }

        schedule_frame(Rc::downgrade(&session), Rc::downgrade(&self.platform));
        self.session = Some(session);
        Ok(())
    }

    fn listen(&self, session: &Rc<RefCell<SceneSession<P>>>) -> Vec<P::Listener> {
        let weak_session = Rc::downgrade(session);
        let weak_platform = Rc::downgrade(&self.platform);
        let pointer = self.platform.listen_pointer(Box::new(move |event: PointerEvent| {
            let (Some(session), Some(platform)) = (weak_session.upgrade(), weak_platform.upgrade())
            else {
                return;
            };
            let bounds = platform.container_bounds();
            let mut session = session.borrow_mut();
            if !session.active {
                return;
            }
            if let Some(pointer) = normalize_pointer(event.client, bounds) {
                session.pointer = pointer;
            }
        }));

        let weak_session = Rc::downgrade(session);
        let weak_platform = Rc::downgrade(&self.platform);
        let resize = self.platform.listen_resize(Box::new(move || {
            let (Some(session), Some(platform)) = (weak_session.upgrade(), weak_platform.upgrade())
            else {
                return;
            };
            let (width, height) = platform.container_bounds().pixel_size();
            let mut session = session.borrow_mut();
            if session.active {
                session.resize(width, height);
            }
        }));

        vec![pointer, resize]
    }

    /// Stops the frame loop, removes the listeners and releases every
    /// resource of the current session. Does nothing when not mounted.
    pub fn unmount(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        let detached = session.borrow_mut().dispose();
        drop(detached);
    }

    /// Shows a different model. Unchanged input keeps the current session.
    pub fn set_model_type(&mut self, model: ModelType) -> ViewerResult<()> {
        if model == self.props.model {
            return Ok(());
        }
        self.props.model = model;
        self.remount()
    }

    pub fn set_scale(&mut self, scale: f32) -> ViewerResult<()> {
        let scale = sanitize_scale(scale);
        if scale == self.props.scale {
            return Ok(());
        }
        self.props.scale = scale;
        self.remount()
    }

    fn remount(&mut self) -> ViewerResult<()> {
        if self.is_mounted() {
            self.mount()
        } else {
            Ok(())
        }
    }

    pub fn snapshot(&self) -> Option<SessionSnapshot> {
        self.session
            .as_ref()
            .map(|session| session.borrow().snapshot())
    }
}

impl<P: Platform> Drop for SceneWidget<P> {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn schedule_frame<P: Platform>(session: WeakSession<P>, platform: Weak<P>) {
    let (Some(strong_session), Some(strong_platform)) = (session.upgrade(), platform.upgrade())
    else {
        return;
    };
    if !strong_session.borrow().active {
        return;
    }

    let next_session = session.clone();
    let request = strong_platform.request_frame(Box::new(move || {
        let Some(current) = next_session.upgrade() else {
            return;
        };
        {
            let mut current = current.borrow_mut();
            if !current.active {
                return;
            }
            current.advance();
        }
        schedule_frame(next_session, platform);
    }));

    let mut strong_session = strong_session.borrow_mut();
    let previous = strong_session.frame.replace(request);
    strong_session.retired_frame = previous;
}

fn is_active<P: Platform>(session: &WeakSession<P>, url: &str) -> bool {
    match session.upgrade() {
        Some(shared) => {
            let shared = shared.borrow();
            let active = shared.active;
            if !active {
                debug!("session {} is disposed; ignoring {url}", shared.id);
            }
            active
        }
        None => {
            debug!("{url} arrived after its widget was dropped");
            false
        }
    }
}

fn log_progress(url: &str) -> ProgressHandler {
    let url = url.to_string();
    Box::new(move |progress: FetchProgress| match progress.percent() {
        Some(percent) => debug!("{url}: {percent:.0}% loaded"),
        None => debug!("{url}: {} bytes loaded", progress.loaded),
    })
}

fn start_load<P: Platform>(
    session: &WeakSession<P>,
    platform: &Rc<P>,
    plan: Rc<AuthoredPlan>,
    stage: LoadStage,
) {
    let url = plan.url(stage).to_string();
    {
        let Some(shared) = session.upgrade() else {
            return;
        };
        let mut shared = shared.borrow_mut();
        if !shared.active {
            return;
        }
        shared.attempted.push(url.clone());
        info!("session {}: loading {url} ({stage:?})", shared.id);
    }

    let weak_session = session.clone();
    let weak_platform = Rc::downgrade(platform);
    let loaded_url = url.clone();
    let on_complete = Box::new(move |result: ViewerResult<Vec<u8>>| {
        let load = PendingModel {
            plan,
            stage,
            url: loaded_url,
        };
        if !is_active(&weak_session, &load.url) {
            return;
        }
        match result.and_then(|bytes| ModelDocument::parse(&bytes)) {
            Ok(document) => {
                let mut missing = document.external_buffers();
                missing.reverse();
                fetch_buffers(weak_session, weak_platform, load, document, missing, HashMap::new());
            }
            Err(err) => finish_load(weak_session, weak_platform, load, Err(err)),
        }
    });
    platform.fetch(&url, log_progress(&url), on_complete);
}

/// One model document being loaded for a session stage.
struct PendingModel {
    plan: Rc<AuthoredPlan>,
    stage: LoadStage,
    url: String,
}

/// Fetches the buffers in `missing` one after another, relative to the
/// document URL, then decodes the document.
fn fetch_buffers<P: Platform>(
    session: WeakSession<P>,
    platform: Weak<P>,
    load: PendingModel,
    document: ModelDocument,
    mut missing: Vec<ExternalBuffer>,
    mut loaded: HashMap<usize, Vec<u8>>,
) {
    if !is_active(&session, &load.url) {
        return;
    }
    let Some(buffer) = missing.pop() else {
        let model = document.decode(&loaded);
        finish_load(session, platform, load, model);
        return;
    };
    let Some(strong_platform) = platform.upgrade() else {
        return;
    };

    let buffer_url = resolve_relative(&load.url, &buffer.uri);
    debug!("{}: fetching buffer {} from {buffer_url}", load.url, buffer.index);
    let progress = log_progress(&buffer_url);
    let on_complete = Box::new(move |result: ViewerResult<Vec<u8>>| match result {
        Ok(bytes) => {
            loaded.insert(buffer.index, bytes);
            fetch_buffers(session, platform, load, document, missing, loaded);
        }
        Err(err) => finish_load(session, platform, load, Err(err)),
    });
    strong_platform.fetch(&buffer_url, progress, on_complete);
}

fn finish_load<P: Platform>(
    session: WeakSession<P>,
    platform: Weak<P>,
    load: PendingModel,
    result: ViewerResult<DecodedModel>,
) {
    let PendingModel { plan, stage, url } = load;
    let Some(shared) = session.upgrade() else {
        debug!("{url} arrived after its widget was dropped");
        return;
    };
    let retry = {
        let mut shared = shared.borrow_mut();
        if !shared.active {
            debug!("session {} is disposed; ignoring {url}", shared.id);
            return;
        }
        let err = match result.and_then(|model| shared.show_model(&url, &model)) {
            Ok(()) => return,
            Err(err) => err,
        };
        if err.is_asset_failure() {
            warn!("session {}: {url} is unusable: {err}", shared.id);
        } else {
            error!("session {}: could not show {url}: {err}", shared.id);
        }
        match stage {
            LoadStage::Primary => {
                info!("session {}: trying {}", shared.id, plan.fallback);
                true
            }
            LoadStage::Fallback => {
                info!("session {}: showing a cube", shared.id);
                shared.show_shape(plan.cube);
                false
            }
        }
    };

    if retry {
        if let Some(platform) = platform.upgrade() {
            start_load(&session, &platform, plan, LoadStage::Fallback);
        }
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::model::fixtures::{box_glb, cyclic_gltf, external_triangle, triangle_glb};
    use crate::paths::DeployMode;
    use crate::platform::HeadlessPlatform;
    use crate::scene::SceneNode;

    const WING: &str = "/models/kagome.gltf";
    const WING_BUFFER: &str = "/models/kagome.bin";
    const PROJET2: &str = "/models/projet2/projet2.gltf";
    const FALLBACK: &str = "/models/projet1.glb";

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    fn platform() -> Rc<HeadlessPlatform> {
        Rc::new(HeadlessPlatform::new(400, 300))
    }

    fn widget(platform: &Rc<HeadlessPlatform>, model: ModelType, scale: f32) -> SceneWidget<HeadlessPlatform> {
        SceneWidget::new(
            platform.clone(),
            WidgetProps::new(model).with_scale(scale),
            SiteConfig::default(),
        )
    }

    fn mounted(platform: &Rc<HeadlessPlatform>, model: ModelType, scale: f32) -> SceneWidget<HeadlessPlatform> {
        let mut widget = widget(platform, model, scale);
        widget.mount().unwrap();
        platform.settle_fetches();
        widget
    }

    fn offset_box() -> Vec<u8> {
        box_glb(Vec3::ZERO, Vec3::new(4.0, 2.0, 1.0), [10.0, -3.0, 2.0], false)
    }

    fn fallback_cube() -> Option<DisplayedContent> {
        Some(DisplayedContent::Procedural {
            shape: Primitive::Box { size: 2.0 },
        })
    }

    /// Asserts every geometry and material bound in the scene tree is held
    /// by the session ledger and returns how many ids were checked.
    fn assert_scene_is_tracked(widget: &SceneWidget<HeadlessPlatform>) -> usize {
        let session = widget.session.as_ref().expect("mounted").borrow();
        let mut checked = 0;
        let mut pending: Vec<&SceneNode> = session.scene.objects.iter().collect();
        while let Some(node) = pending.pop() {
            if let Some(mesh) = &node.mesh {
                assert!(
                    session.ledger.contains_geometry(mesh.geometry),
                    "{} geometry {:?}",
                    node.name,
                    mesh.geometry
                );
                checked += 1;
                for material in mesh.material.ids() {
                    assert!(
                        session.ledger.contains_material(material),
                        "{} material {material:?}",
                        node.name
                    );
                    checked += 1;
                }
            }
            pending.extend(node.children.iter());
        }
        assert_eq!(checked, session.ledger.len());
        checked
    }

    #[test]
    fn every_model_type_settles_to_exactly_one_object() {
        for model in ModelType::ALL {
            let platform = platform();
            let widget = mounted(&platform, model, 1.0);
            platform.run_frames();
            let snapshot = widget.snapshot().unwrap();
            assert_eq!(snapshot.scene_objects, 1, "{model}");
            assert!(snapshot.displayed.is_some(), "{model}");
            assert_eq!(snapshot.phase, Phase::Running, "{model}");
        }
    }

    #[test]
    fn donut_is_a_torus_sized_by_the_multiplier() {
        let platform = platform();
        let widget = mounted(&platform, ModelType::Donut, 1.5);
        let snapshot = widget.snapshot().unwrap();
        assert_eq!(
            snapshot.displayed,
            Some(DisplayedContent::Procedural {
                shape: Primitive::Torus {
                    radius: 1.5,
                    tube: 0.6,
                    radial_segments: 16,
                    tubular_segments: 100,
                }
            })
        );
        assert!(platform.requested_urls().is_empty());
    }

    #[test]
    fn loaded_model_is_centred_and_fitted() {
        let platform = platform();
        platform.insert_asset(WING, offset_box());
        let widget = mounted(&platform, ModelType::Wing, 2.0);
        let snapshot = widget.snapshot().unwrap();

        assert_eq!(snapshot.attempted, vec![WING.to_string()]);
        assert!(matches!(
            snapshot.displayed,
            Some(DisplayedContent::Model { ref url, meshes: 1, triangles: 12 }) if url == WING
        ));
        let center = snapshot.bounds.center();
        assert!(center.length() < 1e-4, "{center:?}");
        assert!(approx(snapshot.bounds.max_dimension(), 4.0));
        assert!(approx(snapshot.bounds.size().y, 2.0));
    }

    #[test]
    fn primary_failure_uses_the_fallback_model() {
        let platform = platform();
        platform.insert_asset(PROJET2, b"definitely not gltf".to_vec());
        platform.insert_asset(FALLBACK, offset_box());
        let widget = mounted(&platform, ModelType::Projet2, 1.0);
        let snapshot = widget.snapshot().unwrap();

        assert_eq!(platform.requested_urls(), vec![PROJET2, FALLBACK]);
        assert!(matches!(
            snapshot.displayed,
            Some(DisplayedContent::Model { ref url, .. }) if url == FALLBACK
        ));
        assert!(approx(snapshot.bounds.max_dimension(), 2.0));
    }

    #[test]
    fn both_failures_end_in_a_scaled_cube() {
        let platform = platform();
        let widget = mounted(&platform, ModelType::Wing, 0.5);
        let snapshot = widget.snapshot().unwrap();

        assert_eq!(platform.requested_urls(), vec![WING, FALLBACK]);
        assert_eq!(
            snapshot.displayed,
            Some(DisplayedContent::Procedural {
                shape: Primitive::Box { size: 1.0 }
            })
        );
        assert_eq!(snapshot.scene_objects, 1);
    }

    #[test]
    fn content_is_absent_until_the_load_resolves() {
        let platform = platform();
        platform.insert_asset(WING, offset_box());
        let mut widget = widget(&platform, ModelType::Wing, 1.0);
        widget.mount().unwrap();

        let snapshot = widget.snapshot().unwrap();
        assert_eq!(snapshot.phase, Phase::ResolvingContent);
        assert_eq!(snapshot.scene_objects, 0);
        // frames run while loading
        platform.run_frames();
        assert_eq!(widget.snapshot().unwrap().frames, 1);

        platform.settle_fetches();
        assert_eq!(widget.snapshot().unwrap().phase, Phase::Running);
    }

    #[test]
    fn production_urls_are_prefixed_once() {
        let platform = platform();
        let config = SiteConfig::default().with_deploy(DeployMode::Production);
        let mut widget = SceneWidget::new(platform.clone(), WidgetProps::new(ModelType::Wing), config);
        widget.mount().unwrap();
        platform.settle_fetches();
        assert_eq!(
            platform.requested_urls(),
            vec![
                "/dimitry-portfolio/models/kagome.gltf",
                "/dimitry-portfolio/models/projet1.glb"
            ]
        );
    }

    #[test]
    fn repeated_mounts_keep_a_single_set_of_listeners() {
        let platform = platform();
        let mut widget = widget(&platform, ModelType::Cube, 1.0);
        for _ in 0..5 {
            widget.mount().unwrap();
            widget.unmount();
        }
        assert_eq!(platform.listener_count(), 0);

        for model in [ModelType::Donut, ModelType::Triangle, ModelType::Carousel] {
            widget.mount().unwrap();
            widget.set_model_type(model).unwrap();
        }
        widget.mount().unwrap();
        assert_eq!(platform.listener_count(), 2);
        assert_eq!(platform.pending_frames(), 1);
        assert_eq!(platform.stats().live_surfaces, 1);

        widget.unmount();
        widget.unmount();
        let stats = platform.stats();
        assert_eq!(platform.listener_count(), 0);
        assert_eq!(platform.pending_frames(), 0);
        assert_eq!(stats.live_surfaces, 0);
        assert_eq!(stats.live_geometries, 0);
        assert_eq!(stats.live_materials, 0);
    }

    #[test]
    fn unmounting_mid_load_ignores_the_completion() {
        let platform = platform();
        platform.insert_asset(WING, offset_box());
        let mut widget = widget(&platform, ModelType::Wing, 1.0);
        widget.mount().unwrap();
        assert_eq!(platform.pending_fetches(), 1);

        widget.unmount();
        assert_eq!(platform.deliver_fetches(), 1);
        assert_eq!(platform.pending_fetches(), 0);
        assert!(widget.snapshot().is_none());
        assert_eq!(platform.requested_urls(), vec![WING]);
        let stats = platform.stats();
        assert_eq!(stats.live_geometries, 0);
        assert_eq!(stats.live_materials, 0);
    }

    #[test]
    fn late_failure_after_remount_does_not_touch_the_new_session() {
        let platform = platform();
        let mut widget = widget(&platform, ModelType::Wing, 1.0);
        widget.mount().unwrap();
        widget.set_model_type(ModelType::Donut).unwrap();

        platform.settle_fetches();
        let snapshot = widget.snapshot().unwrap();
        assert_eq!(snapshot.session, 2);
        assert_eq!(snapshot.scene_objects, 1);
        assert!(snapshot.attempted.is_empty());
        // the wing session never asked for its fallback
        assert_eq!(platform.requested_urls(), vec![WING]);
    }

    #[test]
    fn pointer_offset_drives_rotation() {
        let platform = platform();
        platform.set_container_offset(100.0, 50.0);
        let widget = mounted(&platform, ModelType::Cube, 1.0);

        // top-right corner of the container
        platform.move_pointer(glam::Vec2::new(500.0, 50.0));
        let snapshot = widget.snapshot().unwrap();
        assert_eq!(snapshot.pointer, Vec2::new(1.0, 1.0));
        assert_eq!(snapshot.frames, 0);

        platform.run_frames();
        platform.run_frames();
        let rotation = widget.snapshot().unwrap().rotation;
        assert!(approx(rotation.x, 0.02) && approx(rotation.y, 0.02), "{rotation:?}");

        platform.move_pointer(glam::Vec2::new(100.0, 350.0));
        platform.run_frames();
        let rotation = widget.snapshot().unwrap().rotation;
        assert!(approx(rotation.x, 0.01) && approx(rotation.y, 0.01), "{rotation:?}");
    }

    #[test]
    fn resize_keeps_rotation_and_content() {
        let platform = platform();
        let widget = mounted(&platform, ModelType::Triangle, 1.0);
        platform.move_pointer(glam::Vec2::new(400.0, 150.0));
        platform.run_frames();
        let before = widget.snapshot().unwrap();
        assert!(approx(before.aspect, 4.0 / 3.0));

        platform.resize(800, 200);
        let after = widget.snapshot().unwrap();
        assert!(approx(after.aspect, 4.0));
        assert_eq!(after.surface_size, (800, 200));
        assert_eq!(after.rotation, before.rotation);
        assert_eq!(after.displayed, before.displayed);
        assert_eq!(after.session, before.session);
    }

    #[test]
    fn unchanged_model_type_keeps_the_session() {
        let platform = platform();
        let mut widget = mounted(&platform, ModelType::Donut, 1.0);
        widget.set_model_type(ModelType::Donut).unwrap();
        assert_eq!(widget.snapshot().unwrap().session, 1);
        assert_eq!(platform.container_clears(), 1);

        widget.set_model_type(ModelType::Carousel).unwrap();
        let snapshot = widget.snapshot().unwrap();
        assert_eq!(snapshot.session, 2);
        assert_eq!(platform.container_clears(), 2);
        assert!(matches!(
            snapshot.displayed,
            Some(DisplayedContent::Procedural { shape: Primitive::Cylinder { .. } })
        ));
    }

    #[test]
    fn multi_material_models_are_fully_tracked() {
        let platform = platform();
        platform.insert_asset(
            WING,
            box_glb(Vec3::splat(-1.0), Vec3::splat(1.0), [0.0; 3], true),
        );
        let mut widget = mounted(&platform, ModelType::Wing, 1.0);
        let snapshot = widget.snapshot().unwrap();
        assert_eq!(snapshot.live_resources, 3);
        let stats = platform.stats();
        assert_eq!(stats.live_geometries, 1);
        assert_eq!(stats.live_materials, 2);

        widget.unmount();
        let stats = platform.stats();
        assert_eq!(stats.live_geometries, 0);
        assert_eq!(stats.live_materials, 0);
    }

    #[test]
    fn scene_resources_are_all_in_the_ledger() {
        let platform = platform();
        let donut = mounted(&platform, ModelType::Donut, 1.0);
        assert_eq!(assert_scene_is_tracked(&donut), 2);

        let platform = self::platform();
        platform.insert_asset(
            WING,
            box_glb(Vec3::splat(-1.0), Vec3::splat(1.0), [0.0; 3], true),
        );
        let multi = mounted(&platform, ModelType::Wing, 1.0);
        assert_eq!(assert_scene_is_tracked(&multi), 3);

        let platform = self::platform();
        let cube = mounted(&platform, ModelType::Projet2, 1.0);
        assert_eq!(cube.snapshot().unwrap().displayed, fallback_cube());
        assert_eq!(assert_scene_is_tracked(&cube), 2);
    }

    #[test]
    fn cyclic_node_graph_falls_back_to_the_cube() {
        let platform = platform();
        platform.insert_asset(WING, cyclic_gltf());
        let widget = mounted(&platform, ModelType::Wing, 1.0);

        assert_eq!(platform.requested_urls(), vec![WING, FALLBACK]);
        let snapshot = widget.snapshot().unwrap();
        assert_eq!(snapshot.displayed, fallback_cube());
        assert_eq!(snapshot.phase, Phase::Running);
    }

    #[test]
    fn malformed_documents_end_in_the_cube() {
        let documents = [
            triangle_glb(r#"{"attributes": {"POSITION": 0}, "indices": 1}"#, [0, 1, 5]),
            triangle_glb(r#"{"attributes": {"NORMAL": 0}}"#, [0, 1, 2]),
            triangle_glb(
                r#"{"attributes": {"POSITION": 0}, "indices": 1, "mode": 1}"#,
                [0, 1, 2],
            ),
        ];
        for document in documents {
            let platform = platform();
            platform.insert_asset(WING, document.clone());
            platform.insert_asset(FALLBACK, document);
            let widget = mounted(&platform, ModelType::Wing, 1.0);
            assert_eq!(platform.requested_urls(), vec![WING, FALLBACK]);
            assert_eq!(widget.snapshot().unwrap().displayed, fallback_cube());
        }
    }

    #[test]
    fn external_buffer_is_fetched_next_to_the_document() {
        let platform = platform();
        let (document, buffer) = external_triangle("kagome.bin");
        platform.insert_asset(WING, document);
        platform.insert_asset(WING_BUFFER, buffer);
        let widget = mounted(&platform, ModelType::Wing, 1.0);

        assert_eq!(platform.requested_urls(), vec![WING, WING_BUFFER]);
        let snapshot = widget.snapshot().unwrap();
        assert_eq!(snapshot.attempted, vec![WING.to_string()]);
        assert_eq!(
            snapshot.displayed,
            Some(DisplayedContent::Model {
                url: WING.into(),
                meshes: 1,
                triangles: 1,
            })
        );
        assert!(approx(snapshot.bounds.max_dimension(), 2.0));
        assert_eq!(assert_scene_is_tracked(&widget), 2);
    }

    #[test]
    fn production_buffers_keep_the_deployment_prefix() {
        let platform = platform();
        let (document, buffer) = external_triangle("kagome.bin");
        platform.insert_asset("/dimitry-portfolio/models/kagome.gltf", document);
        platform.insert_asset("/dimitry-portfolio/models/kagome.bin", buffer);
        let config = SiteConfig::default().with_deploy(DeployMode::Production);
        let mut widget = SceneWidget::new(platform.clone(), WidgetProps::new(ModelType::Wing), config);
        widget.mount().unwrap();
        platform.settle_fetches();

        assert_eq!(
            platform.requested_urls(),
            vec![
                "/dimitry-portfolio/models/kagome.gltf",
                "/dimitry-portfolio/models/kagome.bin"
            ]
        );
        assert!(matches!(
            widget.snapshot().unwrap().displayed,
            Some(DisplayedContent::Model { .. })
        ));
    }

    #[test]
    fn missing_buffer_uses_the_fallback_model() {
        let platform = platform();
        let (document, _) = external_triangle("kagome.bin");
        platform.insert_asset(WING, document);
        platform.insert_asset(FALLBACK, offset_box());
        let widget = mounted(&platform, ModelType::Wing, 1.0);

        assert_eq!(platform.requested_urls(), vec![WING, WING_BUFFER, FALLBACK]);
        assert!(matches!(
            widget.snapshot().unwrap().displayed,
            Some(DisplayedContent::Model { ref url, .. }) if url == FALLBACK
        ));
    }

    #[test]
    fn unmounting_while_a_buffer_loads_stops_the_chain() {
        let platform = platform();
        let (document, buffer) = external_triangle("kagome.bin");
        platform.insert_asset(WING, document);
        platform.insert_asset(WING_BUFFER, buffer);
        let mut widget = widget(&platform, ModelType::Wing, 1.0);
        widget.mount().unwrap();

        assert_eq!(platform.deliver_fetches(), 1);
        assert_eq!(platform.pending_fetches(), 1);
        widget.unmount();
        platform.settle_fetches();

        assert_eq!(platform.requested_urls(), vec![WING, WING_BUFFER]);
        let stats = platform.stats();
        assert_eq!(stats.live_geometries, 0);
        assert_eq!(stats.live_materials, 0);
    }

    #[test]
    fn frames_render_the_displayed_shape() {
        let platform = platform();
        let widget = mounted(&platform, ModelType::Cube, 1.0);
        assert_eq!(platform.run_frames(), 1);
        let stats = platform.stats();
        assert_eq!(stats.frames_rendered, 1);
        assert!(stats.last_triangles > 0);
        assert_eq!(widget.snapshot().unwrap().triangles, 12);
    }

    #[test]
    fn surface_failure_leaves_nothing_behind() {
        let platform = platform();
        platform.set_surface_failure(true);
        let mut widget = widget(&platform, ModelType::Cube, 1.0);
        assert!(widget.mount().is_err());
        assert!(!widget.is_mounted());
        assert_eq!(platform.listener_count(), 0);
        assert_eq!(platform.pending_frames(), 0);
    }

    #[test]
    fn dropping_the_widget_disposes_it() {
        let platform = platform();
        let widget = mounted(&platform, ModelType::Donut, 1.0);
        drop(widget);
        assert_eq!(platform.listener_count(), 0);
        assert_eq!(platform.pending_frames(), 0);
        assert_eq!(platform.stats().live_surfaces, 0);
    }

    #[test]
    fn invalid_multipliers_fall_back_to_one() {
        assert_eq!(WidgetProps::new(ModelType::Cube).with_scale(-2.0).scale, 1.0);
        assert_eq!(WidgetProps::new(ModelType::Cube).with_scale(f32::NAN).scale, 1.0);
        assert_eq!(WidgetProps::new(ModelType::Cube).with_scale(0.25).scale, 0.25);
    }

    #[test]
    fn plans_resolve_assets_through_the_config() {
        let config = SiteConfig::default();
        assert_eq!(
            plan_content(&WidgetProps::new(ModelType::Projet3), &config),
            ContentPlan::Procedural(Primitive::Box { size: 2.0 })
        );
        let ContentPlan::Authored(plan) =
            plan_content(&WidgetProps::new(ModelType::Projet2).with_scale(3.0), &config)
        else {
            panic!("projet2 loads an authored model");
        };
        assert_eq!(plan.primary, PROJET2);
        assert_eq!(plan.fallback, FALLBACK);
        assert_eq!(plan.cube, Primitive::Box { size: 6.0 });
    }
}
