use core::ffi::CStr;
use std::ffi::CString;

use gdal::Dataset;
use gdal::errors::GdalError;
use gdal::vector::Defn;
use gdal::vector::LayerAccess;
use gdal::vector::OGRFieldType;
use gdal_sys::OGRErr;
use gdal_sys::OGRFieldDefnH;
use gdal_sys::OGRFieldSubType;

fn optional_string(value: *const core::ffi::c_char) -> Option<String> {
    if value.is_null() {
        None
    } else {
        let text = unsafe { CStr::from_ptr(value) }.to_string_lossy().into_owned();
        (!text.is_empty()).then_some(text)
    }
}

fn check_ogr_error(err: OGRErr::Type, method_name: &'static str) -> Result<(),GdalError> {
    if err == OGRErr::OGRERR_NONE {
        Ok(())
    } else {
        Err(GdalError::OgrError {
            err,
            method_name
        })
    }
}

#[derive(Clone,PartialEq,Eq,Debug)]
/// The parts of a field definition which `gdal::vector::Field` doesn't give access to.
pub(crate) struct FieldExtras {
    pub(crate) subtype: OGRFieldSubType::Type,
    pub(crate) nullable: bool,
    pub(crate) default: Option<String>,
    pub(crate) alias: Option<String>
}

pub(crate) trait DefnFix {
    fn field_extras(&self, index: usize) -> Option<FieldExtras>;
}

impl DefnFix for Defn {

    fn field_extras(&self, index: usize) -> Option<FieldExtras> {
        let index = core::ffi::c_int::try_from(index).ok()?;
        let field = unsafe { gdal_sys::OGR_FD_GetFieldDefn(self.c_defn(), index) };
        if field.is_null() {
            return None
        }
        unsafe {
            Some(FieldExtras {
                subtype: gdal_sys::OGR_Fld_GetSubType(field),
                nullable: gdal_sys::OGR_Fld_IsNullable(field) != 0,
                default: optional_string(gdal_sys::OGR_Fld_GetDefault(field)),
                alias: optional_string(gdal_sys::OGR_Fld_GetAlternativeNameRef(field))
            })
        }
    }
}

/// Like `gdal::vector::FieldDefn`, but the subtype, nullability, default and alias can be set too.
pub(crate) struct FullFieldDefn {
    c_obj: OGRFieldDefnH
}

impl Drop for FullFieldDefn {
    fn drop(&mut self) {
        unsafe { gdal_sys::OGR_Fld_Destroy(self.c_obj) };
    }
}

impl FullFieldDefn {

    pub(crate) fn new(name: &str, field_type: OGRFieldType::Type) -> Result<Self,GdalError> {
        let c_name = CString::new(name)?;
        let c_obj = unsafe { gdal_sys::OGR_Fld_Create(c_name.as_ptr(), field_type) };
        if c_obj.is_null() {
            return Err(GdalError::NullPointer {
                method_name: "OGR_Fld_Create",
                msg: String::new()
            })
        }
        Ok(Self {
            c_obj
        })
    }

    pub(crate) fn set_width(&self, width: i32) {
        unsafe { gdal_sys::OGR_Fld_SetWidth(self.c_obj, width) };
    }

    pub(crate) fn set_precision(&self, precision: i32) {
        unsafe { gdal_sys::OGR_Fld_SetPrecision(self.c_obj, precision) };
    }

    // the subtype has to fit the type, or GDAL resets it
    pub(crate) fn set_subtype(&self, subtype: OGRFieldSubType::Type) {
        unsafe { gdal_sys::OGR_Fld_SetSubType(self.c_obj, subtype) };
    }

    pub(crate) fn set_nullable(&self, nullable: bool) {
        unsafe { gdal_sys::OGR_Fld_SetNullable(self.c_obj, core::ffi::c_int::from(nullable)) };
    }

    /// The default is an SQL literal, such as `'text'`, `1` or `CURRENT_TIMESTAMP`.
    pub(crate) fn set_default(&self, default: &str) -> Result<(),GdalError> {
        let c_default = CString::new(default)?;
        unsafe { gdal_sys::OGR_Fld_SetDefault(self.c_obj, c_default.as_ptr()) };
        Ok(())
    }

    pub(crate) fn set_alias(&self, alias: &str) -> Result<(),GdalError> {
        let c_alias = CString::new(alias)?;
        unsafe { gdal_sys::OGR_Fld_SetAlternativeName(self.c_obj, c_alias.as_ptr()) };
        Ok(())
    }

    pub(crate) fn add_to_layer<Layer: LayerAccess>(&self, layer: &Layer) -> Result<(),GdalError> {
        let err = unsafe { gdal_sys::OGR_L_CreateField(layer.c_layer(), self.c_obj, 1) };
        check_ogr_error(err, "OGR_L_CreateField")
    }

}

pub(crate) trait DatasetFix {
    fn delete_layer_by_name(&mut self, name: &str) -> Result<(),GdalError>;
}

impl DatasetFix for Dataset {

    /// A missing layer is not an error.
    fn delete_layer_by_name(&mut self, name: &str) -> Result<(),GdalError> {
        let Some(index) = self.layers().position(|layer| layer.name() == name) else {
            return Ok(())
        };
        let index = core::ffi::c_int::try_from(index).map_err(|_| GdalError::OgrError {
            err: OGRErr::OGRERR_FAILURE,
            method_name: "GDALDatasetDeleteLayer"
        })?;
        let err = unsafe { gdal_sys::GDALDatasetDeleteLayer(self.c_dataset(), index) };
        check_ogr_error(err, "GDALDatasetDeleteLayer")
    }
}
