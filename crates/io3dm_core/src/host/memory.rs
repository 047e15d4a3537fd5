//! In-memory scene host.
//!
//! Resources live in per-kind arenas addressed by index. Deleted slots are
//! never reused, so a stale handle resolves to `None` instead of aliasing a
//! newer resource.

use std::collections::{HashMap, HashSet};

use super::{Overwrite, SceneHost, Severity};
use crate::curve::Curve;
use crate::mesh::Mesh;
use crate::scene::{
    Camera, CameraId, Container, ContainerId, CurveId, Material, MaterialId, MeshId, Object,
    ObjectData, ObjectId, ProjectState, Resource,
};

#[derive(Clone, Debug)]
struct Entry<T> {
    name: String,
    value: T,
    keep_alive: bool,
}

#[derive(Clone, Debug)]
struct Arena<T> {
    slots: Vec<Option<Entry<T>>>,
    by_name: HashMap<String, usize>,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            by_name: HashMap::new(),
        }
    }
}

impl<T> Arena<T> {
    fn find(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    fn insert(&mut self, name: &str, value: T) -> usize {
        let index = self.slots.len();
        self.slots.push(Some(Entry {
            name: name.to_string(),
            value,
            keep_alive: false,
        }));
        self.by_name.insert(name.to_string(), index);
        index
    }

    fn remove(&mut self, index: usize) -> Option<Entry<T>> {
        let entry = self.slots.get_mut(index)?.take()?;
        if self.by_name.get(&entry.name) == Some(&index) {
            self.by_name.remove(&entry.name);
        }
        Some(entry)
    }

    /// Move the entry to the first free `<name>.old[.NNN]` name.
    fn rename_aside(&mut self, index: usize) {
        let Some(entry) = self.slots.get_mut(index).and_then(Option::as_mut) else {
            return;
        };
        let mut candidate = format!("{}.old", entry.name);
        let mut n = 1;
        while self.by_name.contains_key(&candidate) {
            candidate = format!("{}.old.{:03}", entry.name, n);
            n += 1;
        }
        self.by_name.remove(&entry.name);
        self.by_name.insert(candidate.clone(), index);
        entry.name = candidate;
    }

    fn entry(&self, index: usize) -> Option<&Entry<T>> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    fn entry_mut(&mut self, index: usize) -> Option<&mut Entry<T>> {
        self.slots.get_mut(index).and_then(Option::as_mut)
    }

    fn get(&self, index: usize) -> Option<&T> {
        self.entry(index).map(|e| &e.value)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.entry_mut(index).map(|e| &mut e.value)
    }

    fn live(&self) -> impl Iterator<Item = (usize, &Entry<T>)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (i, e)))
    }

    fn len(&self) -> usize {
        self.by_name.len()
    }

    /// Get-or-create. Returns the index and the index of a deleted entry.
    fn obtain(
        &mut self,
        name: &str,
        overwrite: Overwrite,
        make: impl FnOnce() -> T,
    ) -> (usize, Option<usize>) {
        match (self.find(name), overwrite) {
            (Some(index), Overwrite::Keep) => (index, None),
            (Some(index), Overwrite::Rename) => {
                self.rename_aside(index);
                (self.insert(name, make()), None)
            }
            (Some(index), Overwrite::Replace) => {
                self.remove(index);
                (self.insert(name, make()), Some(index))
            }
            (None, _) => (self.insert(name, make()), None),
        }
    }
}

/// A complete [`SceneHost`] kept in memory.
#[derive(Clone, Debug)]
pub struct MemoryHost {
    unit_scale: f64,
    containers: Arena<Container>,
    materials: Arena<Material>,
    meshes: Arena<Mesh>,
    curves: Arena<Curve>,
    cameras: Arena<Camera>,
    objects: Arena<Object>,
    scene_root: Vec<ContainerId>,
    projects: HashMap<ContainerId, ProjectState>,
    messages: Vec<(Severity, String)>,
}

impl Default for MemoryHost {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl MemoryHost {
    /// Create an empty host whose scene unit is `unit_scale` meters.
    pub fn new(unit_scale: f64) -> Self {
        Self {
            unit_scale,
            containers: Arena::default(),
            materials: Arena::default(),
            meshes: Arena::default(),
            curves: Arena::default(),
            cameras: Arena::default(),
            objects: Arena::default(),
            scene_root: Vec::new(),
            projects: HashMap::new(),
            messages: Vec::new(),
        }
    }

    /// Containers linked directly into the scene.
    pub fn scene_root(&self) -> &[ContainerId] {
        &self.scene_root
    }

    /// Messages passed to `report`, oldest first.
    pub fn messages(&self) -> &[(Severity, String)] {
        &self.messages
    }

    pub fn container_count(&self) -> usize {
        self.containers.len()
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    pub fn curve_count(&self) -> usize {
        self.curves.len()
    }

    pub fn camera_count(&self) -> usize {
        self.cameras.len()
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Handles of every live object.
    pub fn object_ids(&self) -> Vec<ObjectId> {
        self.objects.live().map(|(i, _)| ObjectId(i)).collect()
    }

    /// Names of every live material, sorted.
    pub fn material_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.materials.live().map(|(_, e)| e.name.as_str()).collect();
        names.sort_unstable();
        names
    }

    /// Objects in `container` and all of its descendants.
    pub fn objects_recursive(&self, container: ContainerId) -> Vec<ObjectId> {
        let mut out = Vec::new();
        let mut stack = vec![container];
        let mut seen = HashSet::new();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(c) = self.containers.get(id.0) {
                out.extend(c.objects.iter().copied());
                stack.extend(c.children.iter().rev().copied());
            }
        }
        out
    }

    /// Drop every reference to a deleted resource.
    fn scrub(&mut self, resource: Resource) {
        match resource {
            Resource::Container(id) => {
                self.scene_root.retain(|c| *c != id);
                for slot in self.containers.slots.iter_mut().flatten() {
                    slot.value.children.retain(|c| *c != id);
                }
                self.clear_object_data(|d| d == ObjectData::Instance(id));
                self.projects.remove(&id);
                for state in self.projects.values_mut() {
                    for field in [&mut state.layers, &mut state.cameras, &mut state.blocks] {
                        if *field == Some(id) {
                            *field = None;
                        }
                    }
                }
            }
            Resource::Object(id) => {
                for slot in self.containers.slots.iter_mut().flatten() {
                    slot.value.objects.retain(|o| *o != id);
                }
            }
            Resource::Mesh(id) => self.clear_object_data(|d| d == ObjectData::Mesh(id)),
            Resource::Curve(id) => self.clear_object_data(|d| d == ObjectData::Curve(id)),
            Resource::Camera(id) => self.clear_object_data(|d| d == ObjectData::Camera(id)),
            // Slots keep the stale handle; lookups through it yield None
            Resource::Material(_) => {}
        }
    }

    fn clear_object_data(&mut self, matches: impl Fn(ObjectData) -> bool) {
        for slot in self.objects.slots.iter_mut().flatten() {
            if matches(slot.value.data) {
                slot.value.data = ObjectData::Empty;
            }
        }
    }

    /// One purge sweep. Returns the resources deleted.
    fn purge_once(&mut self) -> Vec<Resource> {
        let mut containers: HashSet<ContainerId> = self.scene_root.iter().copied().collect();
        let mut objects = HashSet::new();
        let mut meshes = HashSet::new();
        let mut curves = HashSet::new();
        let mut cameras = HashSet::new();
        let mut materials = HashSet::new();

        for (_, entry) in self.containers.live() {
            containers.extend(entry.value.children.iter().copied());
            objects.extend(entry.value.objects.iter().copied());
        }
        for state in self.projects.values() {
            containers.extend(state.referenced_containers());
            objects.extend(state.referenced_objects());
        }
        for (_, entry) in self.objects.live() {
            match entry.value.data {
                ObjectData::Empty => {}
                ObjectData::Mesh(id) => {
                    meshes.insert(id);
                }
                ObjectData::Curve(id) => {
                    curves.insert(id);
                }
                ObjectData::Camera(id) => {
                    cameras.insert(id);
                }
                ObjectData::Instance(id) => {
                    containers.insert(id);
                }
            }
        }
        for (_, entry) in self.meshes.live() {
            materials.extend(entry.value.materials.iter().copied());
        }
        for (_, entry) in self.curves.live() {
            materials.extend(entry.value.materials.iter().copied());
        }

        fn orphans<T, I: Eq + std::hash::Hash>(
            arena: &Arena<T>,
            used: &HashSet<I>,
            handle: impl Fn(usize) -> I,
        ) -> Vec<usize> {
            arena
                .live()
                .filter(|(i, e)| !e.keep_alive && !used.contains(&handle(*i)))
                .map(|(i, _)| i)
                .collect()
        }

        let mut deleted = Vec::new();
        deleted.extend(
            orphans(&self.containers, &containers, ContainerId)
                .into_iter()
                .map(|i| Resource::Container(ContainerId(i))),
        );
        deleted.extend(
            orphans(&self.objects, &objects, ObjectId)
                .into_iter()
                .map(|i| Resource::Object(ObjectId(i))),
        );
        deleted.extend(
            orphans(&self.meshes, &meshes, MeshId)
                .into_iter()
                .map(|i| Resource::Mesh(MeshId(i))),
        );
        deleted.extend(
            orphans(&self.curves, &curves, CurveId)
                .into_iter()
                .map(|i| Resource::Curve(CurveId(i))),
        );
        deleted.extend(
            orphans(&self.cameras, &cameras, CameraId)
                .into_iter()
                .map(|i| Resource::Camera(CameraId(i))),
        );
        deleted.extend(
            orphans(&self.materials, &materials, MaterialId)
                .into_iter()
                .map(|i| Resource::Material(MaterialId(i))),
        );

        for resource in &deleted {
            self.delete(*resource);
        }
        deleted
    }

    fn delete(&mut self, resource: Resource) {
        let removed = match resource {
            Resource::Container(id) => self.containers.remove(id.0).is_some(),
            Resource::Object(id) => self.objects.remove(id.0).is_some(),
            Resource::Material(id) => self.materials.remove(id.0).is_some(),
            Resource::Mesh(id) => self.meshes.remove(id.0).is_some(),
            Resource::Curve(id) => self.curves.remove(id.0).is_some(),
            Resource::Camera(id) => self.cameras.remove(id.0).is_some(),
        };
        if removed {
            self.scrub(resource);
        }
    }
}

impl SceneHost for MemoryHost {
    fn scene_unit_scale(&self) -> f64 {
        self.unit_scale
    }

    fn report(&mut self, severity: Severity, message: &str) {
        match severity {
            Severity::Info => log::info!("{}", message),
            Severity::Warning => log::warn!("{}", message),
            Severity::Error => log::error!("{}", message),
        }
        self.messages.push((severity, message.to_string()));
    }

    fn get_or_create_container(&mut self, name: &str, overwrite: Overwrite) -> ContainerId {
        let (index, deleted) = self.containers.obtain(name, overwrite, Container::default);
        if let Some(old) = deleted {
            self.scrub(Resource::Container(ContainerId(old)));
        }
        ContainerId(index)
    }

    fn get_or_create_material(&mut self, name: &str, overwrite: Overwrite) -> MaterialId {
        let (index, deleted) = self.materials.obtain(name, overwrite, Material::default);
        if let Some(old) = deleted {
            self.scrub(Resource::Material(MaterialId(old)));
        }
        MaterialId(index)
    }

    fn get_or_create_mesh(&mut self, name: &str, overwrite: Overwrite) -> MeshId {
        let (index, deleted) = self.meshes.obtain(name, overwrite, Mesh::default);
        if let Some(old) = deleted {
            self.scrub(Resource::Mesh(MeshId(old)));
        }
        MeshId(index)
    }

    fn get_or_create_curve(&mut self, name: &str, overwrite: Overwrite) -> CurveId {
        let (index, deleted) = self.curves.obtain(name, overwrite, Curve::default);
        if let Some(old) = deleted {
            self.scrub(Resource::Curve(CurveId(old)));
        }
        CurveId(index)
    }

    fn get_or_create_camera(&mut self, name: &str, overwrite: Overwrite) -> CameraId {
        let (index, deleted) = self.cameras.obtain(name, overwrite, Camera::default);
        if let Some(old) = deleted {
            self.scrub(Resource::Camera(CameraId(old)));
        }
        CameraId(index)
    }

    fn get_or_create_object(
        &mut self,
        name: &str,
        data: ObjectData,
        overwrite: Overwrite,
    ) -> ObjectId {
        let (index, deleted) = self.objects.obtain(name, overwrite, || Object {
            data,
            ..Default::default()
        });
        if let Some(old) = deleted {
            self.scrub(Resource::Object(ObjectId(old)));
        }
        ObjectId(index)
    }

    fn find_container(&self, name: &str) -> Option<ContainerId> {
        self.containers.find(name).map(ContainerId)
    }

    fn find_material(&self, name: &str) -> Option<MaterialId> {
        self.materials.find(name).map(MaterialId)
    }

    fn find_mesh(&self, name: &str) -> Option<MeshId> {
        self.meshes.find(name).map(MeshId)
    }

    fn find_object(&self, name: &str) -> Option<ObjectId> {
        self.objects.find(name).map(ObjectId)
    }

    fn name_of(&self, resource: Resource) -> Option<&str> {
        let name = match resource {
            Resource::Container(id) => self.containers.entry(id.0).map(|e| &e.name),
            Resource::Object(id) => self.objects.entry(id.0).map(|e| &e.name),
            Resource::Material(id) => self.materials.entry(id.0).map(|e| &e.name),
            Resource::Mesh(id) => self.meshes.entry(id.0).map(|e| &e.name),
            Resource::Curve(id) => self.curves.entry(id.0).map(|e| &e.name),
            Resource::Camera(id) => self.cameras.entry(id.0).map(|e| &e.name),
        };
        name.map(String::as_str)
    }

    fn container(&self, id: ContainerId) -> Option<&Container> {
        self.containers.get(id.0)
    }

    fn material(&self, id: MaterialId) -> Option<&Material> {
        self.materials.get(id.0)
    }

    fn material_mut(&mut self, id: MaterialId) -> Option<&mut Material> {
        self.materials.get_mut(id.0)
    }

    fn mesh(&self, id: MeshId) -> Option<&Mesh> {
        self.meshes.get(id.0)
    }

    fn mesh_mut(&mut self, id: MeshId) -> Option<&mut Mesh> {
        self.meshes.get_mut(id.0)
    }

    fn curve(&self, id: CurveId) -> Option<&Curve> {
        self.curves.get(id.0)
    }

    fn curve_mut(&mut self, id: CurveId) -> Option<&mut Curve> {
        self.curves.get_mut(id.0)
    }

    fn camera(&self, id: CameraId) -> Option<&Camera> {
        self.cameras.get(id.0)
    }

    fn camera_mut(&mut self, id: CameraId) -> Option<&mut Camera> {
        self.cameras.get_mut(id.0)
    }

    fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id.0)
    }

    fn object_mut(&mut self, id: ObjectId) -> Option<&mut Object> {
        self.objects.get_mut(id.0)
    }

    fn link_container(&mut self, parent: ContainerId, child: ContainerId) {
        if parent == child || self.containers.get(child.0).is_none() {
            return;
        }
        if let Some(c) = self.containers.get_mut(parent.0) {
            if !c.children.contains(&child) {
                c.children.push(child);
            }
        }
    }

    fn link_object(&mut self, container: ContainerId, object: ObjectId) {
        if self.objects.get(object.0).is_none() {
            return;
        }
        if let Some(c) = self.containers.get_mut(container.0) {
            if !c.objects.contains(&object) {
                c.objects.push(object);
            }
        }
    }

    fn unlink_object(&mut self, container: ContainerId, object: ObjectId) {
        if let Some(c) = self.containers.get_mut(container.0) {
            c.objects.retain(|id| *id != object);
        }
    }

    fn empty_container(&mut self, container: ContainerId, recursive: bool) {
        let mut pending = vec![container];
        let mut seen = HashSet::new();
        while let Some(id) = pending.pop() {
            if !seen.insert(id) {
                continue;
            }
            if let Some(c) = self.containers.get_mut(id.0) {
                c.objects.clear();
                let children = std::mem::take(&mut c.children);
                if recursive {
                    pending.extend(children);
                }
            }
        }
    }

    fn link_to_scene(&mut self, container: ContainerId) {
        if self.containers.get(container.0).is_some() && !self.scene_root.contains(&container) {
            self.scene_root.push(container);
        }
    }

    fn unlink_from_scene(&mut self, container: ContainerId) {
        self.scene_root.retain(|id| *id != container);
    }

    fn is_in_scene(&self, container: ContainerId) -> bool {
        self.scene_root.contains(&container)
    }

    fn set_keep_alive(&mut self, resource: Resource, keep_alive: bool) {
        let flag = match resource {
            Resource::Container(id) => self.containers.entry_mut(id.0).map(|e| &mut e.keep_alive),
            Resource::Object(id) => self.objects.entry_mut(id.0).map(|e| &mut e.keep_alive),
            Resource::Material(id) => self.materials.entry_mut(id.0).map(|e| &mut e.keep_alive),
            Resource::Mesh(id) => self.meshes.entry_mut(id.0).map(|e| &mut e.keep_alive),
            Resource::Curve(id) => self.curves.entry_mut(id.0).map(|e| &mut e.keep_alive),
            Resource::Camera(id) => self.cameras.entry_mut(id.0).map(|e| &mut e.keep_alive),
        };
        if let Some(flag) = flag {
            *flag = keep_alive;
        }
    }

    fn purge_orphans(&mut self) -> usize {
        let mut total = 0;
        loop {
            let deleted = self.purge_once();
            if deleted.is_empty() {
                break;
            }
            log::debug!("Purged {} orphaned resources", deleted.len());
            total += deleted.len();
        }
        total
    }

    fn project_state(&self, project: ContainerId) -> Option<&ProjectState> {
        self.projects.get(&project)
    }

    fn project_state_mut(&mut self, project: ContainerId) -> &mut ProjectState {
        self.projects.entry(project).or_default()
    }
}
