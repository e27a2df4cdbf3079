use std::fs;
use std::path::Path;
use std::path::PathBuf;

use gdal::Dataset;
use gdal::DatasetOptions;
use gdal::GdalOpenFlags;
use gdal::spatial_ref::SpatialRef;
use gdal::vector::LayerAccess as _;
use gdal::vector::LayerOptions;
use gdal::vector::OGRFieldType;
use gdal::vector::OGRwkbGeometryType;
use gdal_sys::OGRFieldSubType;
use regex::Regex;

use crate::errors::CommandError;
use crate::gdal_fixes::DatasetFix as _;
use crate::gdal_fixes::DefnFix as _;
use crate::gdal_fixes::FieldExtras;
use crate::gdal_fixes::FullFieldDefn;
use crate::progress::ProgressObserver;
use crate::progress::WatchableIterator as _;

/// Name of the layer group the created templates are placed in.
pub(crate) const TEMPLATE_GROUP: &str = "POG SZABLONY";

pub(crate) const TEMPLATE_EXTENSIONS: [&str; 6] = ["gpkg", "shp", "geojson", "json", "gml", "sqlite"];

/// Style files for the template layers. The key is searched for in the lowercased layer name, and the first match whose file exists is used.
pub(crate) const STYLE_LOOKUP: [(&str,&str); 5] = [
    ("aktplanowaniaprzestrzennego", "styl-AktPlanowaniaPrzestrzennego.qml"),
    ("obszaruzupelnieniazabudowy", "styl-ObszarUzupelnieniaZabudowy.qml"),
    ("obszarzabudowysrodmiejskiej", "styl-ObszarZabudowySrodmiejskiej.qml"),
    ("strefaplanistyczna", "styl-StrefaPlanistyczna.qml"),
    ("obszarstandardowdostepnosciinfrastrukturyspolecznej", "styl-ObszarStandardowDostepnosciInfrastrukturySpolecznej.qml"),
];

/// The coordinate systems of the four zones of the "2000" grid used for planning documents.
pub(crate) const CRS_OPTIONS: [&str; 4] = [
    "EPSG:2176 – Układ 2000 strefa 5",
    "EPSG:2177 – Układ 2000 strefa 6",
    "EPSG:2178 – Układ 2000 strefa 7",
    "EPSG:2179 – Układ 2000 strefa 8",
];

pub(crate) const DEFAULT_CRS_OPTION: usize = 1;

/// Where the data files are installed under a prefix, as in `/usr/local/share/narzedziownik`.
const INSTALLED_DATA_DIR: &str = "share/narzedziownik";

/// The data folder of a source checkout, also used when nothing else is found.
const CHECKOUT_DATA_DIR: &str = "share";

pub(crate) const TEMPLATES_DATA_DIR: &str = "templates/wtyczkaapp2";

pub(crate) const STYLES_DATA_DIR: &str = "qml";

/// Folders the data files could be in, for a program at the given path. An installed program in `<prefix>/bin` looks in `<prefix>/share/narzedziownik`, and one built in `target/<profile>` looks in the checkout's `share`. The relative `share` comes last.
pub(crate) fn data_dir_candidates(executable: Option<&Path>) -> Vec<PathBuf> {
    let mut result = Vec::new();
    if let Some(prefix) = executable.and_then(Path::parent).and_then(Path::parent) {
        result.push(prefix.join(INSTALLED_DATA_DIR));
        if prefix.file_name().is_some_and(|name| name == "target") {
            if let Some(checkout) = prefix.parent() {
                result.push(checkout.join(CHECKOUT_DATA_DIR));
            }
        }
    }
    result.push(PathBuf::from(CHECKOUT_DATA_DIR));
    result
}

/// The first candidate with the sub folder in it. If there is none, the sub folder of the last candidate is returned so the error names a sensible path.
pub(crate) fn find_data_dir(candidates: &[PathBuf], sub_dir: &str) -> PathBuf {
    candidates.iter()
              .map(|candidate| candidate.join(sub_dir))
              .find(|path| path.is_dir())
              .unwrap_or_else(|| PathBuf::from(CHECKOUT_DATA_DIR).join(sub_dir))
}

pub(crate) fn style_path_for_layer(layer_name: &str, styles_dir: &Path) -> Option<PathBuf> {
    let name = layer_name.to_lowercase();
    STYLE_LOOKUP.iter()
                .filter(|(key,_)| name.contains(key))
                .map(|(_,file)| styles_dir.join(file))
                .find(|path| path.is_file())
}

#[derive(Clone,PartialEq,Eq,Debug)]
pub(crate) struct CrsChoice {
    pub(crate) authority_id: String,
    pub(crate) code: u32
}

impl CrsChoice {

    /// Reads the "EPSG:nnnn" at the start of a selection.
    pub(crate) fn parse(selection: &str) -> Result<Self,CommandError> {
        let pattern = Regex::new(r"^EPSG:([0-9]+)")?;
        let captures = pattern.captures(selection.trim()).ok_or_else(|| CommandError::MalformedCrsSelection(selection.to_owned()))?;
        let code = captures[1].parse().map_err(|_| CommandError::MalformedCrsSelection(selection.to_owned()))?;
        Ok(Self {
            authority_id: format!("EPSG:{code}"),
            code
        })
    }

    /// Same as parse, but the result has to be one of the listed options.
    pub(crate) fn parse_option(selection: &str) -> Result<Self,CommandError> {
        let choice = Self::parse(selection)?;
        let known = CRS_OPTIONS.iter().filter_map(|option| Self::parse(option).ok()).any(|option| option == choice);
        if known {
            Ok(choice)
        } else {
            Err(CommandError::UnknownCrs(choice.authority_id))
        }
    }

    pub(crate) fn spatial_ref(&self) -> Result<SpatialRef,CommandError> {
        Ok(SpatialRef::from_epsg(self.code)?)
    }

}

const GEOMETRY_NAMES: [(OGRwkbGeometryType::Type,&str); 12] = [
    (OGRwkbGeometryType::wkbPoint, "Point"),
    (OGRwkbGeometryType::wkbLineString, "LineString"),
    (OGRwkbGeometryType::wkbPolygon, "Polygon"),
    (OGRwkbGeometryType::wkbMultiPoint, "MultiPoint"),
    (OGRwkbGeometryType::wkbMultiLineString, "MultiLineString"),
    (OGRwkbGeometryType::wkbMultiPolygon, "MultiPolygon"),
    (OGRwkbGeometryType::wkbGeometryCollection, "GeometryCollection"),
    (OGRwkbGeometryType::wkbCircularString, "CircularString"),
    (OGRwkbGeometryType::wkbCompoundCurve, "CompoundCurve"),
    (OGRwkbGeometryType::wkbCurvePolygon, "CurvePolygon"),
    (OGRwkbGeometryType::wkbMultiCurve, "MultiCurve"),
    (OGRwkbGeometryType::wkbMultiSurface, "MultiSurface"),
];

const NO_GEOMETRY: &str = "NoGeometry";

const OLD_STYLE_3D_FLAG: OGRwkbGeometryType::Type = 0x8000_0000;

/// A name for a geometry type like "MultiPolygonZ", with a Z and/or M suffix for the extra dimensions.
pub(crate) fn geometry_label(geometry_type: OGRwkbGeometryType::Type) -> String {
    if geometry_type == OGRwkbGeometryType::wkbNone {
        return NO_GEOMETRY.to_owned()
    }
    let iso_type = geometry_type & !OLD_STYLE_3D_FLAG;
    let flat = iso_type % 1000;
    let Some((_,name)) = GEOMETRY_NAMES.iter().find(|(known,_)| *known == flat) else {
        return "Unknown".to_owned()
    };
    // ISO codes put Z in the 1000s, M in the 2000s and ZM in the 3000s
    let has_z = (geometry_type & OLD_STYLE_3D_FLAG) != 0 || matches!(iso_type / 1000, 1 | 3);
    let has_m = matches!(iso_type / 1000, 2 | 3);
    match (has_z,has_m) {
        (true, true) => format!("{name}ZM"),
        (true, false) => format!("{name}Z"),
        (false, true) => format!("{name}M"),
        (false, false) => (*name).to_owned()
    }
}

/// Strips the elevation and measure suffix from a geometry label.
pub(crate) fn base_geometry_label(label: &str) -> &str {
    label.strip_suffix("ZM")
         .or_else(|| label.strip_suffix('Z'))
         .or_else(|| label.strip_suffix('M'))
         .unwrap_or(label)
}

/// Returns the two-dimensional geometry type for a base label. Labels that don't name a known type are treated as polygons.
pub(crate) fn geometry_type_for_label(label: &str) -> OGRwkbGeometryType::Type {
    if label == NO_GEOMETRY {
        OGRwkbGeometryType::wkbNone
    } else {
        GEOMETRY_NAMES.iter()
                      .find(|(_,name)| *name == label)
                      .map_or(OGRwkbGeometryType::wkbPolygon, |(geometry_type,_)| *geometry_type)
    }
}

#[derive(Clone,PartialEq,Eq,Debug)]
pub(crate) struct TemplateField {
    pub(crate) name: String,
    pub(crate) field_type: OGRFieldType::Type,
    /// Booleans are integers with the boolean subtype.
    pub(crate) subtype: OGRFieldSubType::Type,
    pub(crate) width: i32,
    pub(crate) precision: i32,
    pub(crate) nullable: bool,
    pub(crate) default: Option<String>,
    pub(crate) alias: Option<String>
}

impl TemplateField {

    fn definition(&self) -> Result<FullFieldDefn,CommandError> {
        let definition = FullFieldDefn::new(&self.name, self.field_type)?;
        definition.set_width(self.width);
        definition.set_precision(self.precision);
        definition.set_subtype(self.subtype);
        definition.set_nullable(self.nullable);
        if let Some(default) = &self.default {
            definition.set_default(default)?;
        }
        if let Some(alias) = &self.alias {
            definition.set_alias(alias)?;
        }
        Ok(definition)
    }

}

#[derive(Clone,PartialEq,Eq,Debug)]
/// The layout of a template: what is needed to create an empty layer like it.
pub(crate) struct TemplateDescriptor {
    pub(crate) name: String,
    pub(crate) geometry_label: String,
    pub(crate) fields: Vec<TemplateField>
}

impl TemplateDescriptor {

    /// Reads the first layer of a template dataset. The template is named after the file.
    pub(crate) fn load(path: &Path) -> Result<Self,CommandError> {
        let dataset = Dataset::open_ex(path, DatasetOptions {
            open_flags: GdalOpenFlags::GDAL_OF_VECTOR,
            ..Default::default()
        })?;
        let layer = dataset.layer(0)?;
        let definition = layer.defn();

        let geometry_type = definition.geom_fields().next().map_or(OGRwkbGeometryType::wkbNone, |field| field.field_type());
        let fields = definition.fields().enumerate().map(|(index,field)| {
            let extras = definition.field_extras(index).unwrap_or(FieldExtras {
                subtype: OGRFieldSubType::OFSTNone,
                nullable: true,
                default: None,
                alias: None
            });
            TemplateField {
                name: field.name(),
                field_type: field.field_type(),
                subtype: extras.subtype,
                width: field.width(),
                precision: field.precision(),
                nullable: extras.nullable,
                default: extras.default,
                alias: extras.alias
            }
        }).collect();

        let name = path.file_stem().map(|stem| stem.to_string_lossy().into_owned()).unwrap_or_else(|| layer.name());

        Ok(Self {
            name,
            geometry_label: geometry_label(geometry_type),
            fields
        })
    }

    pub(crate) fn layer_geometry_type(&self) -> OGRwkbGeometryType::Type {
        geometry_type_for_label(base_geometry_label(&self.geometry_label))
    }

}

fn has_template_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|extension| extension.to_str())
        .is_some_and(|extension| TEMPLATE_EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(extension)))
}

/// Lists the files in the directory that look like template datasets, sorted by file name. A missing directory has no templates.
pub(crate) fn list_template_files(templates_dir: &Path) -> Result<Vec<PathBuf>,CommandError> {
    if !templates_dir.is_dir() {
        return Ok(Vec::new())
    }
    let mut result = Vec::new();
    for entry in fs::read_dir(templates_dir)? {
        let path = entry?.path();
        if path.is_file() && has_template_extension(&path) {
            result.push(path)
        }
    }
    result.sort_by(|a,b| a.file_name().cmp(&b.file_name()));
    Ok(result)
}

/// Loads every template in the directory. Files which can't be read as a vector layer are passed over.
pub(crate) fn discover_templates<Progress: ProgressObserver>(templates_dir: &Path, progress: &mut Progress) -> Result<Vec<TemplateDescriptor>,CommandError> {
    let files = list_template_files(templates_dir)?;
    let mut result = Vec::new();
    for path in files.iter().watch(progress, "Reading templates.", "Templates read.") {
        if let Ok(template) = TemplateDescriptor::load(path) {
            result.push(template)
        }
    }
    Ok(result)
}

/// Creates an empty layer in the target with the template's name, base geometry type and fields. Returns the name of the layer. If a field can't be added, the layer is removed again.
pub(crate) fn materialize_template(target: &mut Dataset, template: &TemplateDescriptor, srs: &SpatialRef, overwrite: bool) -> Result<String,CommandError> {
    let definitions = template.fields.iter().map(TemplateField::definition).collect::<Result<Vec<_>,_>>()?;

    let geometry_type = template.layer_geometry_type();
    let (name,added) = {
        let layer = target.create_layer(LayerOptions {
            name: &template.name,
            srs: if geometry_type == OGRwkbGeometryType::wkbNone {
                None
            } else {
                Some(srs)
            },
            ty: geometry_type,
            options: if overwrite {
                Some(&["OVERWRITE=YES"])
            } else {
                None
            }
        })?;
        let added = definitions.iter().try_for_each(|definition| definition.add_to_layer(&layer));
        (layer.name(),added)
    };

    if let Err(err) = added {
        target.delete_layer_by_name(&name)?;
        return Err(err.into())
    }
    Ok(name)
}
