use core::fmt::Display;
use core::fmt::Formatter;
use core::fmt::Result as FormatResult;

use gdal::vector::Feature;
use gdal::vector::field_type_to_name;
use gdal::vector::FieldValue;
use gdal::vector::OGRFieldType;

use crate::errors::CommandError;

#[derive(Clone,PartialEq,Eq,Debug)]
pub(crate) struct FieldTypeDocumentation {
    name: String,
    description: String,
    storage_type: String, // the concrete field type in the database
}

impl FieldTypeDocumentation {

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn description(&self) -> &str {
        &self.description
    }

    pub(crate) fn storage_type(&self) -> &str {
        &self.storage_type
    }

}

pub(crate) trait DocumentedFieldType {

    fn get_field_type_documentation() -> FieldTypeDocumentation;

}

pub(crate) trait TypedField: Sized + DocumentedFieldType {

    const STORAGE_TYPE: OGRFieldType::Type;

    fn get_required<FieldType>(value: Option<FieldType>, field_id: &'static str) -> Result<FieldType,CommandError> {
        value.ok_or(CommandError::MissingField(field_id))
    }

    fn get_field(feature: &Feature, field_name: &str, field_id: &'static str) -> Result<Self,CommandError>;

    fn set_field(&self, feature: &mut Feature, field_name: &str) -> Result<(),CommandError>;

    fn to_field_value(&self) -> Option<FieldValue>;
}

#[derive(PartialEq,Eq,Hash,PartialOrd,Ord,Clone,Copy,Debug)]
pub(crate) struct IdRef(u64);

impl IdRef {

    pub(crate) const fn new(id: u64) -> Self {
        Self(id)
    }

    pub(crate) const fn to_inner(self) -> u64 {
        self.0
    }

}

impl Display for IdRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> FormatResult {
        write!(f,"{}",self.0)
    }
}

impl TypedField for String {

    const STORAGE_TYPE: OGRFieldType::Type = OGRFieldType::OFTString;

    fn get_field(feature: &Feature, field_name: &str, field_id: &'static str) -> Result<Self,CommandError> {
        Self::get_required(feature.field_as_string_by_name(field_name)?, field_id)
    }

    fn set_field(&self, feature: &mut Feature, field_name: &str) -> Result<(),CommandError> {
        Ok(feature.set_field_string(field_name, self)?)
    }

    fn to_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::StringValue(self.clone()))
    }

}

impl TypedField for Option<String> {

    const STORAGE_TYPE: OGRFieldType::Type = OGRFieldType::OFTString;

    fn get_field(feature: &Feature, field_name: &str, _: &'static str) -> Result<Self,CommandError> {
        Ok(feature.field_as_string_by_name(field_name)?)
    }

    fn set_field(&self, feature: &mut Feature, field_name: &str) -> Result<(),CommandError> {
        if let Some(value) = self {
            value.set_field(feature,field_name)
        } else {
            Ok(feature.set_field_null(field_name)?)
        }
    }

    fn to_field_value(&self) -> Option<FieldValue> {
        self.as_ref().and_then(TypedField::to_field_value)
    }

}

impl DocumentedFieldType for String {

    fn get_field_type_documentation() -> FieldTypeDocumentation {
        FieldTypeDocumentation {
            name: "String".to_owned(),
            description: "A string of text".to_owned(),
            storage_type: field_type_to_name(Self::STORAGE_TYPE),
        }
    }
}

impl<Inner: DocumentedFieldType> DocumentedFieldType for Option<Inner> {

    fn get_field_type_documentation() -> FieldTypeDocumentation {
        let inner = Inner::get_field_type_documentation();
        FieldTypeDocumentation {
            name: format!("Optional {}",inner.name),
            description: format!("{}, or null",inner.description),
            storage_type: inner.storage_type,
        }
    }
}

impl TypedField for i64 {

    const STORAGE_TYPE: OGRFieldType::Type = OGRFieldType::OFTInteger64;

    fn get_field(feature: &Feature, field_name: &str, field_id: &'static str) -> Result<Self,CommandError> {
        Self::get_required(feature.field_as_integer64_by_name(field_name)?, field_id)
    }

    fn set_field(&self, feature: &mut Feature, field_name: &str) -> Result<(),CommandError> {
        Ok(feature.set_field_integer64(field_name, *self)?)
    }

    fn to_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::Integer64Value(*self))
    }

}

impl DocumentedFieldType for i64 {

    fn get_field_type_documentation() -> FieldTypeDocumentation {
        FieldTypeDocumentation {
            name: "Integer".to_owned(),
            description: "A whole number".to_owned(),
            storage_type: field_type_to_name(Self::STORAGE_TYPE),
        }
    }
}

// GeoPackage has no boolean storage type, so these are stored as 0 or 1 like QGIS does.
impl TypedField for bool {

    const STORAGE_TYPE: OGRFieldType::Type = OGRFieldType::OFTInteger;

    fn get_field(feature: &Feature, field_name: &str, field_id: &'static str) -> Result<Self,CommandError> {
        Ok(Self::get_required(feature.field_as_integer_by_name(field_name)?, field_id)? != 0)
    }

    fn set_field(&self, feature: &mut Feature, field_name: &str) -> Result<(),CommandError> {
        Ok(feature.set_field_integer(field_name, i32::from(*self))?)
    }

    fn to_field_value(&self) -> Option<FieldValue> {
        Some(FieldValue::IntegerValue(i32::from(*self)))
    }

}

impl DocumentedFieldType for bool {

    fn get_field_type_documentation() -> FieldTypeDocumentation {
        FieldTypeDocumentation {
            name: "Boolean".to_owned(),
            description: "1 for true, 0 for false".to_owned(),
            storage_type: field_type_to_name(Self::STORAGE_TYPE),
        }
    }
}
