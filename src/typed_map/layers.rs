use gdal::Dataset;
use gdal::vector::LayerOptions;
use gdal::vector::FieldValue;
use gdal::vector::Layer;
use gdal::vector::LayerAccess as _;
use gdal::vector::OGRFieldType;
use gdal::vector::OGRwkbGeometryType;

use crate::errors::CommandError;
use crate::typed_map::fields::FieldTypeDocumentation;
use crate::typed_map::fields::IdRef;

/// The name and fields of a table. Implemented by `layer!`.
pub(crate) trait Schema {

    const LAYER_NAME: &'static str;

    fn get_field_defs() -> &'static [(&'static str,OGRFieldType::Type)];

}

pub(crate) struct FieldDocumentation {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) field_type: FieldTypeDocumentation
}

pub(crate) struct LayerDocumentation {
    pub(crate) name: String,
    pub(crate) description: String,
    pub(crate) fields: Vec<FieldDocumentation>
}

#[macro_export]
macro_rules! count_ids {
    () => {
        0
    };
    ($prop: ident) => {
        1
    };
    ($prop: ident, $($props: ident),+) => {
        $($crate::count_ids!($props)+)+ $crate::count_ids!($prop)
    };
}

#[macro_export]
/// Field names default to the property name, but some tables belong to other programs and use names that aren't snake case.
macro_rules! field_name {
    ($prop: ident) => {
        stringify!($prop)
    };
    ($prop: ident $name: literal) => {
        $name
    };
}

#[macro_export]
macro_rules! layer {
    ($(#[doc = $layer_doc_attr: literal])* $name: ident [$layer_name: literal] {$(
        $(#[doc = $field_doc_attr: literal])* $(#[get($get_attr: meta)])* $(#[set($set_attr: meta)])* $prop: ident $([$field_name: literal])?: $prop_type: ty
    ),*$(,)?}) => {

        paste::paste!{
            pub(crate) struct [<$name Feature>]<'data_life> {

                feature: gdal::vector::Feature<'data_life>
            }

        }

        paste::paste!{
            impl<'impl_life> From<gdal::vector::Feature<'impl_life>> for [<$name Feature>]<'impl_life> {

                fn from(feature: gdal::vector::Feature<'impl_life>) -> Self {
                    Self {
                        feature
                    }
                }
            }

        }

        paste::paste!{
            $(#[doc = $layer_doc_attr])*
            pub(crate) struct [<$name Schema>];
        }

        paste::paste!{
            impl [<$name Schema>] {
                // constant field names
                $(pub(crate) const [<FIELD_ $prop:snake:upper>]: &'static str = $crate::field_name!($prop $($field_name)?);)*

                // field definitions
                const FIELD_DEFS: [(&'static str,gdal::vector::OGRFieldType::Type); $crate::count_ids!($($prop),*)] = [
                    $((Self::[<FIELD_ $prop:snake:upper>],<$prop_type as $crate::typed_map::fields::TypedField>::STORAGE_TYPE)),*
                ];

            }
        }


        paste::paste!{
            impl $crate::typed_map::layers::Schema for [<$name Schema>] {

                const LAYER_NAME: &'static str = $layer_name;

                fn get_field_defs() -> &'static [(&'static str,gdal::vector::OGRFieldType::Type)] {
                    &Self::FIELD_DEFS
                }

            }
        }

        paste::paste!{

            impl<'impl_life> $crate::typed_map::features::TypedFeature<'impl_life> for [<$name Feature>]<'impl_life> {

                type Schema = [<$name Schema>];

                fn fid(&self) -> Result<$crate::typed_map::fields::IdRef,$crate::errors::CommandError> {
                    Ok($crate::typed_map::fields::IdRef::new(self.feature.fid().ok_or($crate::errors::CommandError::MissingField(concat!($layer_name,".","fid")))?))
                }

                fn into_feature(self) -> gdal::vector::Feature<'impl_life> {
                    self.feature
                }

            }
        }

        paste::paste!{

            impl [<$name Feature>]<'_> {

                $(
                    $(#[doc = $field_doc_attr])*
                    $(#[$get_attr])* pub(crate) fn $prop(&self) -> Result<$prop_type,$crate::errors::CommandError> {
                        <$prop_type as $crate::typed_map::fields::TypedField>::get_field(&self.feature,[<$name Schema>]::[<FIELD_ $prop:snake:upper>],concat!($layer_name,".",$crate::field_name!($prop $($field_name)?)))
                    }

                    $(#[doc = $field_doc_attr])*
                    $(#[$set_attr])* pub(crate) fn [<set_ $prop>](&mut self, value: &$prop_type) -> Result<(),$crate::errors::CommandError> {
                        $crate::typed_map::fields::TypedField::set_field(value,&mut self.feature,[<$name Schema>]::[<FIELD_ $prop:snake:upper>])
                    }

                )*

            }

        }

        paste::paste!{
            pub(crate) struct [<New $name>] {
                $(
                    pub(crate) $prop: $prop_type
                ),*
            }
        }

        paste::paste!{
            pub(crate) type [<$name Layer>]<'layer> = $crate::typed_map::layers::MapLayer<'layer,[<$name Schema>]>;

            impl [<$name Layer>]<'_> {

                pub(crate) fn add_struct(&mut self, entity: &[<New $name>]) -> Result<$crate::typed_map::fields::IdRef,$crate::errors::CommandError> {
                    let field_names = [
                        $([<$name Schema>]::[<FIELD_ $prop:snake:upper>]),*
                    ];
                    let field_values = [
                        $($crate::typed_map::fields::TypedField::to_field_value(&entity.$prop)),*
                    ];
                    self.add_feature(&field_names, &field_values)

                }

                // These can't live on MapLayer because the feature lifetime is tied to the borrow of the layer.
                pub(crate) fn read_features(&mut self) -> $crate::typed_map::features::TypedFeatureIterator<'_,[<$name Feature>]<'_>> {
                    $crate::typed_map::features::TypedFeatureIterator::from(gdal::vector::LayerAccess::features(&mut self.layer))
                }

                pub(crate) fn try_feature_by_id(&self, fid: $crate::typed_map::fields::IdRef) -> Result<[<$name Feature>]<'_>,$crate::errors::CommandError> {
                    gdal::vector::LayerAccess::feature(&self.layer,fid.to_inner()).ok_or_else(|| $crate::errors::CommandError::MissingFeature($layer_name.to_owned(),fid.to_inner())).map([<$name Feature>]::from)
                }

                pub(crate) fn update_feature(&self, feature: [<$name Feature>]<'_>) -> Result<(),$crate::errors::CommandError> {
                    Ok(gdal::vector::LayerAccess::set_feature(&self.layer,$crate::typed_map::features::TypedFeature::into_feature(feature))?)
                }

            }

        }

        paste::paste!{
            pub(crate) fn [<document_ $name:snake _layer>]() -> $crate::typed_map::layers::LayerDocumentation {
                $crate::typed_map::layers::LayerDocumentation {
                    name: $layer_name.to_owned(),
                    description: concat!("",$($layer_doc_attr,)*).trim_start().to_owned(),
                    fields: vec![
                        $(
                            $crate::typed_map::layers::FieldDocumentation {
                                name: $crate::field_name!($prop $($field_name)?).to_owned(),
                                description: concat!("",$($field_doc_attr)*).trim_start().to_owned(),
                                field_type: <$prop_type as $crate::typed_map::fields::DocumentedFieldType>::get_field_type_documentation()
                            }
                        ),*

                    ],
                }

            }
        }

    };
}

pub(crate) struct MapLayer<'layer, SchemaType: Schema> {
    pub(crate) layer: Layer<'layer>,
    _phantom_schema: core::marker::PhantomData<SchemaType>
}

impl<'layer, SchemaType: Schema> MapLayer<'layer,SchemaType> {

    const fn new(layer: Layer<'layer>) -> Self {
        Self {
            layer,
            _phantom_schema: core::marker::PhantomData
        }
    }

    pub(crate) fn create_from_dataset(dataset: &'layer mut Dataset) -> Result<Self,CommandError> {

        // These tables hold bookkeeping for the layers, not geography.
        let layer = dataset.create_layer(LayerOptions {
            name: SchemaType::LAYER_NAME,
            ty: OGRwkbGeometryType::wkbNone,
            srs: None,
            options: None
        })?;
        layer.create_defn_fields(SchemaType::get_field_defs())?;

        Ok(Self::new(layer))
    }

    pub(crate) fn open_from_dataset(dataset: &'layer Dataset) -> Result<Self,CommandError> {

        let layer = dataset.layer_by_name(SchemaType::LAYER_NAME)?;
        Ok(Self::new(layer))

    }

    /// An existing table may have been created by another program, so any fields it lacks are added.
    pub(crate) fn open_or_create_from_dataset(dataset: &'layer mut Dataset) -> Result<Self,CommandError> {
        if dataset.layer_by_name(SchemaType::LAYER_NAME).is_ok() {
            let result = Self::open_from_dataset(dataset)?;
            result.add_missing_fields()?;
            Ok(result)
        } else {
            Self::create_from_dataset(dataset)
        }
    }

    fn add_missing_fields(&self) -> Result<(),CommandError> {
        let existing: Vec<String> = self.layer.defn().fields().map(|field| field.name()).collect();
        let missing: Vec<(&str,OGRFieldType::Type)> = SchemaType::get_field_defs().iter()
            .filter(|(name,_)| !existing.iter().any(|field| field.eq_ignore_ascii_case(name)))
            .copied()
            .collect();
        if !missing.is_empty() {
            self.layer.create_defn_fields(&missing)?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn feature_count(&self) -> usize {
        self.layer.feature_count() as usize
    }

    pub(crate) fn add_feature(&mut self, field_names: &[&str], field_values: &[Option<FieldValue>]) -> Result<IdRef,CommandError> {

        let mut feature = gdal::vector::Feature::new(self.layer.defn())?;
        for (field, value) in field_names.iter().zip(field_values.iter()) {
            if let Some(value) = value {
                feature.set_field(field, value)?;
            } else {
                feature.set_field_null(field)?;
            }
        }
        feature.create(&self.layer)?;
        Ok(IdRef::new(feature.fid().ok_or(CommandError::MissingField("fid"))?))

    }

}
