//! Layer tree builder.
//!
//! Rebuilds the layer hierarchy from the flat, parent-referencing layer
//! table. Parents are built on demand before their children, so the table
//! order does not matter. The nil identifier maps to the synthetic top
//! container. Hidden layers, and every layer below one, are left out.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use crate::host::{Overwrite, SceneHost};
use crate::import::{ImportError, ImportResult};
use crate::scene::ContainerId;
use crate::source::{SourceFile, SourceLayer};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Built {
    Visible(ContainerId),
    Hidden,
}

/// Layer identifier to container mapping produced by [`LayerTree::build`].
#[derive(Clone, Debug)]
pub struct LayerTree {
    top: ContainerId,
    layers: HashMap<Uuid, ContainerId>,
    hidden: HashSet<Uuid>,
}

impl LayerTree {
    /// An empty tree rooted at `top`; every layer lookup misses.
    pub fn empty(top: ContainerId) -> Self {
        Self {
            top,
            layers: HashMap::new(),
            hidden: HashSet::new(),
        }
    }

    /// Build the containers of every visible layer under `top`.
    ///
    /// Containers are named `<project>:<layer>`. A layer whose parent is
    /// missing from the table is attached to `top`; a parent cycle is an
    /// error.
    pub fn build(
        host: &mut dyn SceneHost,
        file: &SourceFile,
        top: ContainerId,
        project: &str,
    ) -> ImportResult<LayerTree> {
        let mut builder = Builder {
            host,
            file,
            project,
            tree: LayerTree::empty(top),
            visiting: HashSet::new(),
            names: HashSet::new(),
        };
        for layer in file.layers() {
            builder.build_layer(layer)?;
        }
        Ok(builder.tree)
    }

    /// Container of a visible layer.
    pub fn container(&self, id: Uuid) -> Option<ContainerId> {
        self.layers.get(&id).copied()
    }

    /// Container of the layer at a table index; `None` for hidden or
    /// unknown layers.
    pub fn container_for_index(&self, file: &SourceFile, index: i32) -> Option<ContainerId> {
        file.layer(index).and_then(|layer| self.container(layer.id))
    }

    fn is_hidden(&self, id: Uuid) -> bool {
        self.hidden.contains(&id)
    }

    /// Number of visible layers.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

struct Builder<'a> {
    host: &'a mut dyn SceneHost,
    file: &'a SourceFile,
    project: &'a str,
    tree: LayerTree,
    /// Layers on the current parent chain
    visiting: HashSet<Uuid>,
    names: HashSet<String>,
}

impl Builder<'_> {
    fn build_layer(&mut self, layer: &SourceLayer) -> ImportResult<Built> {
        if let Some(container) = self.tree.container(layer.id) {
            return Ok(Built::Visible(container));
        }
        if self.tree.is_hidden(layer.id) {
            return Ok(Built::Hidden);
        }
        if !self.visiting.insert(layer.id) {
            return Err(ImportError::LayerCycle(layer.id));
        }

        let file = self.file;
        let parent = if layer.parent_id.is_nil() {
            Built::Visible(self.tree.top)
        } else {
            match file.find_layer(layer.parent_id) {
                Some(parent) => self.build_layer(parent)?,
                None => {
                    log::warn!(
                        "Layer '{}' has unknown parent {}, attaching to top",
                        layer.name,
                        layer.parent_id
                    );
                    Built::Visible(self.tree.top)
                }
            }
        };
        self.visiting.remove(&layer.id);

        let parent = match parent {
            Built::Visible(parent) if layer.visible => parent,
            _ => {
                log::debug!("Skipping hidden layer '{}'", layer.name);
                self.tree.hidden.insert(layer.id);
                return Ok(Built::Hidden);
            }
        };

        let name = self.container_name(layer);
        let container = self.host.get_or_create_container(&name, Overwrite::Keep);
        self.host.link_container(parent, container);
        self.tree.layers.insert(layer.id, container);
        Ok(Built::Visible(container))
    }

    /// `<project>:<layer>`, qualified by the layer id when the name is
    /// already taken in this pass.
    fn container_name(&mut self, layer: &SourceLayer) -> String {
        let mut name = format!("{}:{}", self.project, layer.name);
        if self.names.contains(&name) {
            name = format!("{}:{}.{}", self.project, layer.name, layer.id.simple());
        }
        self.names.insert(name.clone());
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;
    use crate::scene::Resource;
    use crate::source::Settings;

    fn layer(id: u128, parent: u128, name: &str, visible: bool) -> SourceLayer {
        SourceLayer {
            id: Uuid::from_u128(id),
            parent_id: Uuid::from_u128(parent),
            name: name.into(),
            visible,
            ..Default::default()
        }
    }

    /// Parent of every container reachable from `top`, asserting a tree.
    fn parents(host: &MemoryHost, top: ContainerId) -> HashMap<ContainerId, ContainerId> {
        let mut parents = HashMap::new();
        let mut stack = vec![top];
        while let Some(id) = stack.pop() {
            for &child in &host.container(id).unwrap().children {
                assert!(parents.insert(child, id).is_none(), "{child:?} has two parents");
                stack.push(child);
            }
        }
        parents
    }

    #[test]
    fn test_layer_tree_closure() {
        let mut file = SourceFile::new(Settings::default());
        // child listed before its parent
        file.add_layer(layer(3, 2, "Child", true));
        file.add_layer(layer(2, 1, "Parent", true));
        file.add_layer(layer(1, 0, "Root", true));
        file.add_layer(layer(4, 1, "Hidden", false));
        file.add_layer(layer(5, 4, "UnderHidden", true));
        file.add_layer(layer(6, 99, "Dangling", true));

        let mut host = MemoryHost::default();
        let top = host.get_or_create_container("P#Layers", Overwrite::Keep);
        let tree = LayerTree::build(&mut host, &file, top, "P").unwrap();

        assert_eq!(tree.len(), 4);
        assert!(tree.container(Uuid::from_u128(4)).is_none());
        assert!(tree.container(Uuid::from_u128(5)).is_none());
        assert!(tree.is_hidden(Uuid::from_u128(5)));

        let parents = parents(&host, top);
        for id in [1, 2, 3, 6] {
            let container = tree.container(Uuid::from_u128(id)).unwrap();
            // walk up to the top without revisiting
            let mut current = container;
            let mut steps = 0;
            while current != top {
                current = parents[&current];
                steps += 1;
                assert!(steps < 10);
            }
        }
        assert_eq!(
            parents[&tree.container(Uuid::from_u128(3)).unwrap()],
            tree.container(Uuid::from_u128(2)).unwrap()
        );
        assert_eq!(parents[&tree.container(Uuid::from_u128(6)).unwrap()], top);
        let root = tree.container(Uuid::from_u128(1)).unwrap();
        assert_eq!(host.name_of(Resource::Container(root)), Some("P:Root"));
    }

    #[test]
    fn test_layer_cycle_is_an_error() {
        let mut file = SourceFile::new(Settings::default());
        file.add_layer(layer(1, 2, "A", true));
        file.add_layer(layer(2, 1, "B", true));

        let mut host = MemoryHost::default();
        let top = host.get_or_create_container("P#Layers", Overwrite::Keep);
        let err = LayerTree::build(&mut host, &file, top, "P").unwrap_err();
        assert!(matches!(err, ImportError::LayerCycle(_)));
    }

    #[test]
    fn test_duplicate_names_stay_separate() {
        let mut file = SourceFile::new(Settings::default());
        file.add_layer(layer(1, 0, "A", true));
        file.add_layer(layer(2, 1, "Walls", true));
        file.add_layer(layer(3, 0, "B", true));
        file.add_layer(layer(4, 3, "Walls", true));

        let mut host = MemoryHost::default();
        let top = host.get_or_create_container("P#Layers", Overwrite::Keep);
        let tree = LayerTree::build(&mut host, &file, top, "P").unwrap();

        assert_ne!(
            tree.container(Uuid::from_u128(2)),
            tree.container(Uuid::from_u128(4))
        );
        parents(&host, top);
    }

    #[test]
    fn test_index_lookup() {
        let mut file = SourceFile::new(Settings::default());
        file.add_layer(layer(1, 0, "Visible", true));
        file.add_layer(layer(2, 0, "Hidden", false));

        let mut host = MemoryHost::default();
        let top = host.get_or_create_container("P#Layers", Overwrite::Keep);
        let tree = LayerTree::build(&mut host, &file, top, "P").unwrap();

        assert!(tree.container_for_index(&file, 0).is_some());
        assert!(tree.container_for_index(&file, 1).is_none());
        assert!(tree.container_for_index(&file, -1).is_none());
    }
}
