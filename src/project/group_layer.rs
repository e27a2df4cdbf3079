use crate::errors::CommandError;
use crate::layer;
use crate::progress::ProgressObserver;
use crate::typed_map::features::TypedFeature as _;
use crate::typed_map::fields::IdRef;

layer!(
    /// Layer tree groups of the project. Each row places a layer in a group.
    LayerGroup["layer_groups"] {
        /// The name of the group.
        #[set(allow(dead_code))] group_name: String,
        /// The name of a layer in the group.
        #[set(allow(dead_code))] layer_name: String,
        /// Position of the layer in the group, 0 is the top.
        position: i64,
    }
);

#[derive(Clone,PartialEq,Eq,Debug)]
pub(crate) struct LayerGroupEntry {
    pub(crate) fid: IdRef,
    pub(crate) group_name: String,
    pub(crate) layer_name: String,
    pub(crate) position: i64
}

impl<'impl_life> TryFrom<LayerGroupFeature<'impl_life>> for LayerGroupEntry {
    type Error = CommandError;

    fn try_from(value: LayerGroupFeature<'impl_life>) -> Result<Self,Self::Error> {
        Ok(Self {
            fid: value.fid()?,
            group_name: value.group_name()?,
            layer_name: value.layer_name()?,
            position: value.position()?
        })
    }
}

impl LayerGroupLayer<'_> {

    pub(crate) fn read_entries<Progress: ProgressObserver>(&mut self, progress: &mut Progress) -> Result<Vec<LayerGroupEntry>,CommandError> {
        self.read_features().into_entities_vec(progress)
    }

    /// Returns the layers in the group, top first.
    pub(crate) fn group_layers<Progress: ProgressObserver>(&mut self, group_name: &str, progress: &mut Progress) -> Result<Vec<String>,CommandError> {
        let mut entries: Vec<LayerGroupEntry> = self.read_entries(progress)?.into_iter().filter(|entry| entry.group_name == group_name).collect();
        entries.sort_by_key(|entry| entry.position);
        Ok(entries.into_iter().map(|entry| entry.layer_name).collect())
    }

    /// Puts the layer at the top of the group, moving the others down. A layer already in the group is moved to the top.
    pub(crate) fn insert_layer<Progress: ProgressObserver>(&mut self, group_name: &str, layer_name: &str, progress: &mut Progress) -> Result<(),CommandError> {
        let mut entries: Vec<LayerGroupEntry> = self.read_entries(progress)?.into_iter().filter(|entry| entry.group_name == group_name).collect();
        entries.sort_by_key(|entry| entry.position);

        let existing = entries.iter().position(|entry| entry.layer_name == layer_name);
        let existing = existing.map(|index| entries.remove(index));

        for (entry,position) in entries.iter().zip(1..) {
            if entry.position != position {
                let mut feature = self.try_feature_by_id(entry.fid)?;
                feature.set_position(&position)?;
                self.update_feature(feature)?;
            }
        }

        if let Some(existing) = existing {
            let mut feature = self.try_feature_by_id(existing.fid)?;
            feature.set_position(&0)?;
            self.update_feature(feature)?;
        } else {
            _ = self.add_struct(&NewLayerGroup {
                group_name: group_name.to_owned(),
                layer_name: layer_name.to_owned(),
                position: 0
            })?;
        }
        Ok(())
    }

}
