use core::marker::PhantomData;

use gdal::vector::Feature;
use gdal::vector::FeatureIterator;

use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::progress::WatchableIterator as _;
use crate::typed_map::fields::IdRef;
use crate::typed_map::layers::Schema;

/// A gdal feature wrapped with getters and setters for the fields of its table.
pub(crate) trait TypedFeature<'data_life>: From<Feature<'data_life>> {

    type Schema: Schema;

    fn fid(&self) -> Result<IdRef,CommandError>;

    fn into_feature(self) -> Feature<'data_life>;

}

pub(crate) struct TypedFeatureIterator<'data_life, Typed: TypedFeature<'data_life>> {
    features: FeatureIterator<'data_life>,
    _phantom: PhantomData<Typed>
}

impl<'impl_life, Typed: TypedFeature<'impl_life>> From<FeatureIterator<'impl_life>> for TypedFeatureIterator<'impl_life,Typed> {

    fn from(features: FeatureIterator<'impl_life>) -> Self {
        Self {
            features,
            _phantom: PhantomData
        }
    }
}

impl<'impl_life, Typed: TypedFeature<'impl_life>> Iterator for TypedFeatureIterator<'impl_life,Typed> {
    type Item = Typed;

    fn next(&mut self) -> Option<Self::Item> {
        self.features.next().map(Typed::from)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.features.size_hint()
    }
}

impl<'impl_life, Typed: TypedFeature<'impl_life>> TypedFeatureIterator<'impl_life,Typed> {

    pub(crate) fn into_entities_vec<Progress: ProgressObserver, Data: TryFrom<Typed,Error=CommandError>>(self, progress: &mut Progress) -> Result<Vec<Data>,CommandError> {
        let layer_name = <Typed::Schema as Schema>::LAYER_NAME;
        let mut result = Vec::new();
        for feature in self.watch(progress,format!("Reading {layer_name}."),format!("{layer_name} read.")) {
            result.push(Data::try_from(feature)?);
        }
        Ok(result)
    }

    /// The ids of the features the predicate accepts. The features can't be edited while the layer is being read, so this is how edits find their targets.
    pub(crate) fn ids_where<Predicate: FnMut(&Typed) -> Result<bool,CommandError>>(self, mut predicate: Predicate) -> Result<Vec<IdRef>,CommandError> {
        let mut result = Vec::new();
        for feature in self {
            if predicate(&feature)? {
                result.push(feature.fid()?);
            }
        }
        Ok(result)
    }

}
