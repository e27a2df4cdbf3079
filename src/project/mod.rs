/*!
The project file: a GeoPackage holding the template layers, the styles QGIS shows them with, and a table recording which group each layer belongs to.
*/

use std::path::Path;

use gdal::Dataset;
use gdal::DatasetOptions;
use gdal::DriverManager;
use gdal::GdalOpenFlags;
use gdal::spatial_ref::SpatialRef;
use gdal::vector::LayerAccess as _;
use gdal::vector::Transaction;

use crate::algorithms::templates::materialize_template;
use crate::algorithms::templates::TemplateDescriptor;
use crate::errors::CommandError;
use crate::gdal_fixes::DatasetFix as _;
use crate::progress::ProgressObserver;

pub(crate) mod group_layer;
pub(crate) mod style_layer;

use group_layer::LayerGroupLayer;
use style_layer::LayerStyleLayer;

pub(crate) struct Project {
    dataset: Dataset
}

impl Project {

    const GDAL_DRIVER: &'static str = "GPKG";

    const fn new(dataset: Dataset) -> Self {
        Self {
            dataset
        }
    }

    fn open_dataset<FilePath: AsRef<Path>>(path: &FilePath) -> Result<Dataset, CommandError> {
        Ok(Dataset::open_ex(path, DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_UPDATE | GdalOpenFlags::GDAL_OF_VECTOR,
            ..Default::default()
        })?)
    }

    pub(crate) fn edit<FilePath: AsRef<Path>>(path: &FilePath) -> Result<Self,CommandError> {
        Ok(Self::new(Self::open_dataset(path)?))
    }

    pub(crate) fn create_or_edit<FilePath: AsRef<Path>>(path: &FilePath) -> Result<Self,CommandError> {
        if path.as_ref().exists() {
            Self::edit(path)
        } else {
            let driver = DriverManager::get_driver_by_name(Self::GDAL_DRIVER)?;
            let dataset = driver.create_vector_only(path)?;
            Ok(Self::new(dataset))
        }

    }

    pub(crate) fn with_transaction<ResultType, Callback: FnOnce(&mut ProjectTransaction) -> Result<ResultType,CommandError>>(&mut self, callback: Callback) -> Result<ResultType,CommandError> {
        let transaction = self.dataset.start_transaction()?;
        let mut transaction = ProjectTransaction::new(transaction);
        match callback(&mut transaction) {
            Ok(result) => {
                transaction.dataset.commit()?;
                Ok(result)
            },
            Err(err) => {
                transaction.dataset.rollback()?;
                Err(err)
            },
        }

    }

    pub(crate) fn save<Progress: ProgressObserver>(&mut self, progress: &mut Progress) -> Result<(),CommandError> {
        progress.start_unknown_endpoint(|| "Saving project.");
        self.dataset.flush_cache()?;
        progress.finish(|| "Project saved.");
        Ok(())
    }

    pub(crate) fn groups_layer(&self) -> Result<LayerGroupLayer,CommandError> {
        LayerGroupLayer::open_from_dataset(&self.dataset)
    }

    #[cfg(test)]
    pub(crate) fn styles_layer(&self) -> Result<LayerStyleLayer,CommandError> {
        LayerStyleLayer::open_from_dataset(&self.dataset)
    }

    #[cfg(test)]
    pub(crate) const fn dataset(&self) -> &Dataset {
        &self.dataset
    }

}

pub(crate) struct ProjectTransaction<'data_life> {
    dataset: Transaction<'data_life>
}

impl<'impl_life> ProjectTransaction<'impl_life> {

    const fn new(dataset: Transaction<'impl_life>) -> Self {
        Self {
            dataset
        }
    }

    pub(crate) fn create_template_layer(&mut self, template: &TemplateDescriptor, srs: &SpatialRef, overwrite: bool) -> Result<String,CommandError> {
        materialize_template(&mut self.dataset, template, srs, overwrite)
    }

    pub(crate) fn edit_groups_layer(&mut self) -> Result<LayerGroupLayer,CommandError> {
        LayerGroupLayer::open_or_create_from_dataset(&mut self.dataset)
    }

    pub(crate) fn edit_styles_layer(&mut self) -> Result<LayerStyleLayer,CommandError> {
        LayerStyleLayer::open_or_create_from_dataset(&mut self.dataset)
    }

    /// Removes a layer created earlier in the transaction.
    pub(crate) fn discard_layer(&mut self, layer_name: &str) -> Result<(),CommandError> {
        Ok(self.dataset.delete_layer_by_name(layer_name)?)
    }

    /// Stores the QML document as the default style of the layer.
    pub(crate) fn load_style(&mut self, layer_name: &str, qml: String) -> Result<(),CommandError> {
        let geometry_column = self.dataset.layer_by_name(layer_name)?.defn().geom_fields().next().map(|field| field.name()).unwrap_or_default();
        self.edit_styles_layer()?.load_style(layer_name, &geometry_column, layer_name, qml)
    }

}
