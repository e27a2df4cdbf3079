/*!
Text attribute access to a layer of any vector dataset, used by commands that edit attributes of layers this program didn't create.
*/

use std::path::Path;

use gdal::Dataset;
use gdal::DatasetOptions;
use gdal::GdalOpenFlags;
use gdal::vector::LayerAccess as _;

use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::progress::WatchableIterator as _;

pub(crate) type TextRow = (u64,Vec<Option<String>>);

pub(crate) trait AttributeTable {

    fn name(&self) -> &str;

    fn field_names(&self) -> Result<Vec<String>,CommandError>;

    /// Reads the values of the given fields from every feature, as text. Null values are None.
    fn read_text<Progress: ProgressObserver>(&mut self, fields: &[&str], progress: &mut Progress) -> Result<Vec<TextRow>,CommandError>;

    /// Writes (fid, field, value) in one edit. Either all of the values are written or none of them are.
    fn write_text<Progress: ProgressObserver>(&mut self, values: &[(u64,&str,&str)], progress: &mut Progress) -> Result<(),CommandError>;

}

pub(crate) fn open_for_update(path: &Path) -> Result<Dataset,CommandError> {
    Ok(Dataset::open_ex(path, DatasetOptions {
        open_flags: GdalOpenFlags::GDAL_OF_UPDATE | GdalOpenFlags::GDAL_OF_VECTOR,
        ..Default::default()
    })?)
}

/// Picks the layer to work on. A requested layer has to exist, otherwise the dataset must have only one layer.
pub(crate) fn select_layer_name(dataset: &Dataset, path: &Path, requested: Option<&str>) -> Result<String,CommandError> {
    let mut names: Vec<String> = dataset.layers().map(|layer| layer.name()).collect();
    if let Some(requested) = requested {
        if names.iter().any(|name| name == requested) {
            Ok(requested.to_owned())
        } else {
            Err(CommandError::LayerNotFound(requested.to_owned()))
        }
    } else {
        match names.len() {
            0 => Err(CommandError::NoVectorLayers(path.to_path_buf())),
            1 => Ok(names.remove(0)),
            _ => Err(CommandError::LayerRequired(names))
        }
    }
}

/// Runs the callback inside a transaction, committing if it succeeds and rolling back if it fails. Some drivers, like shapefiles, can't do transactions, those are edited directly.
pub(crate) fn with_edit_scope<ResultType, Progress: ProgressObserver, Callback: FnOnce(&mut Dataset) -> Result<ResultType,CommandError>>(dataset: &mut Dataset, progress: &Progress, callback: Callback) -> Result<ResultType,CommandError> {
    let unsupported = match dataset.start_transaction() {
        Ok(mut transaction) => {
            return match callback(&mut *transaction) {
                Ok(result) => {
                    transaction.commit()?;
                    Ok(result)
                },
                Err(err) => {
                    transaction.rollback()?;
                    Err(err)
                }
            }
        },
        Err(err) => err
    };
    progress.warning(|| format!("The dataset does not support transactions, changes are written directly ({unsupported})."));
    let result = callback(dataset)?;
    dataset.flush_cache()?;
    Ok(result)
}

pub(crate) struct GdalAttributeTable<'data_life> {
    dataset: &'data_life mut Dataset,
    name: String
}

impl<'data_life> GdalAttributeTable<'data_life> {

    pub(crate) const fn new(dataset: &'data_life mut Dataset, name: String) -> Self {
        Self {
            dataset,
            name
        }
    }

}

impl AttributeTable for GdalAttributeTable<'_> {

    fn name(&self) -> &str {
        &self.name
    }

    fn field_names(&self) -> Result<Vec<String>,CommandError> {
        let layer = self.dataset.layer_by_name(&self.name)?;
        let names = layer.defn().fields().map(|field| field.name()).collect();
        Ok(names)
    }

    fn read_text<Progress: ProgressObserver>(&mut self, fields: &[&str], progress: &mut Progress) -> Result<Vec<TextRow>,CommandError> {
        let mut layer = self.dataset.layer_by_name(&self.name)?;
        let mut result = Vec::new();
        for feature in layer.features().watch(progress,format!("Reading {}.",self.name),format!("{} read.",self.name)) {
            let fid = feature.fid().ok_or(CommandError::MissingField("fid"))?;
            let mut values = Vec::with_capacity(fields.len());
            for field in fields {
                values.push(feature.field_as_string_by_name(field)?);
            }
            result.push((fid,values));
        }
        Ok(result)
    }

    fn write_text<Progress: ProgressObserver>(&mut self, values: &[(u64,&str,&str)], progress: &mut Progress) -> Result<(),CommandError> {
        let name = &self.name;
        with_edit_scope(self.dataset, progress, |dataset| {
            let layer = dataset.layer_by_name(name)?;
            for (fid,field,value) in values {
                let mut feature = layer.feature(*fid).ok_or_else(|| CommandError::MissingFeature(name.clone(),*fid))?;
                feature.set_field_string(field, value)?;
                layer.set_feature(feature)?;
            }
            Ok(())
        })
    }

}
