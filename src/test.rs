use std::fs;
use std::path::Path;
use std::path::PathBuf;

use gdal::Dataset;
use gdal::DriverManager;
use gdal::spatial_ref::SpatialRef;
use gdal::vector::Feature;
use gdal::vector::LayerAccess as _;
use gdal::vector::LayerOptions;
use gdal::vector::OGRFieldType;
use gdal::vector::OGRwkbGeometryType;
use gdal_sys::OGRFieldSubType;
use tempfile::TempDir;

use crate::algorithms::renumbering::NumberRange;
use crate::algorithms::templates::CRS_OPTIONS;
use crate::algorithms::templates::CrsChoice;
use crate::algorithms::templates::TEMPLATE_GROUP;
use crate::algorithms::templates::TemplateDescriptor;
use crate::algorithms::templates::discover_templates;
use crate::attributes::AttributeTable as _;
use crate::attributes::GdalAttributeTable;
use crate::attributes::open_for_update;
use crate::attributes::select_layer_name;
use crate::commands::create_templates::CreateTemplates;
use crate::commands::create_templates::create_templates;
use crate::commands::renumber::RenumberOutcome;
use crate::commands::renumber::renumber_identifiers;
use crate::errors::CommandError;
use crate::gdal_fixes::DefnFix as _;
use crate::gdal_fixes::FieldExtras;
use crate::gdal_fixes::FullFieldDefn;
use crate::project::Project;
use crate::prompts::test::ScriptedPrompts;

fn create_gpkg(path: &Path) -> Dataset {
    let driver = DriverManager::get_driver_by_name("GPKG").expect("GPKG driver should be available.");
    driver.create_vector_only(path).expect("Dataset should have been created.")
}

/// Writes a template dataset with one empty layer. The layer name is different from the file name on purpose.
fn write_template(dir: &Path, file_name: &str, geometry_type: OGRwkbGeometryType::Type, fields: &[(&str,OGRFieldType::Type)]) -> PathBuf {
    let path = dir.join(file_name);
    let mut dataset = create_gpkg(&path);
    let srs = SpatialRef::from_epsg(2180).expect("EPSG:2180 should be known.");
    let layer = dataset.create_layer(LayerOptions {
        name: "szablon",
        srs: Some(&srs),
        ty: geometry_type,
        options: None
    }).expect("Layer should have been created.");
    layer.create_defn_fields(fields).expect("Fields should have been created.");
    path
}

fn write_zones(path: &Path, rows: &[(&str,&str)]) {
    let mut dataset = create_gpkg(path);
    let layer = dataset.create_layer(LayerOptions {
        name: "StrefaPlanistyczna",
        srs: None,
        ty: OGRwkbGeometryType::wkbNone,
        options: None
    }).expect("Layer should have been created.");
    layer.create_defn_fields(&[("oznaczenie",OGRFieldType::OFTString),("lokalnyId",OGRFieldType::OFTString)]).expect("Fields should have been created.");
    for (designation,local_id) in rows {
        let mut feature = Feature::new(layer.defn()).expect("Feature should have been created.");
        feature.set_field_string("oznaczenie", designation).expect("Field should have been set.");
        feature.set_field_string("lokalnyId", local_id).expect("Field should have been set.");
        feature.create(&layer).expect("Feature should have been added.");
    }
}

fn read_column(path: &Path, layer_name: &str, field: &str) -> Vec<Option<String>> {
    let dataset = Dataset::open(path).expect("Dataset should have opened.");
    let mut layer = dataset.layer_by_name(layer_name).expect("Layer should exist.");
    let mut rows: Vec<(u64,Option<String>)> = layer.features().map(|feature| {
        (feature.fid().expect("Feature should have a fid."),feature.field_as_string_by_name(field).expect("Field should exist."))
    }).collect();
    rows.sort_by_key(|(fid,_)| *fid);
    rows.into_iter().map(|(_,value)| value).collect()
}

fn layer_epsg(dataset: &Dataset, layer_name: &str) -> i32 {
    let layer = dataset.layer_by_name(layer_name).expect("Layer should exist.");
    layer.spatial_ref().expect("Layer should have a spatial reference.").auth_code().expect("Spatial reference should have a code.")
}

#[test]
fn test_load_and_materialize_template() {
    let temp = TempDir::new().unwrap();
    let path = write_template(temp.path(), "StrefaPlanistyczna.gpkg", OGRwkbGeometryType::wkbMultiPolygon25D, &[
        ("name",OGRFieldType::OFTString),
        ("area",OGRFieldType::OFTReal)
    ]);

    {
        let dataset = open_for_update(&path).unwrap();
        let layer = dataset.layer(0).unwrap();
        let in_force = FullFieldDefn::new("obowiazuje", OGRFieldType::OFTInteger).unwrap();
        in_force.set_subtype(OGRFieldSubType::OFSTBoolean);
        in_force.set_nullable(false);
        in_force.set_default("1").unwrap();
        in_force.add_to_layer(&layer).unwrap();
    }

    let template = TemplateDescriptor::load(&path).unwrap();
    assert_eq!(template.name, "StrefaPlanistyczna");
    assert_eq!(template.geometry_label, "MultiPolygonZ");
    assert_eq!(template.layer_geometry_type(), OGRwkbGeometryType::wkbMultiPolygon);
    assert_eq!(template.fields.iter().map(|field| field.name.as_str()).collect::<Vec<_>>(), vec!["name","area","obowiazuje"]);
    assert_eq!(template.fields[2].subtype, OGRFieldSubType::OFSTBoolean);

    let mut project = Project::create_or_edit(&temp.path().join("projekt.gpkg")).unwrap();
    let srs = CrsChoice::parse_option("EPSG:2177").unwrap().spatial_ref().unwrap();
    let name = project.with_transaction(|transaction| transaction.create_template_layer(&template, &srs, false)).unwrap();
    assert_eq!(name, "StrefaPlanistyczna");

    let layer = project.dataset().layer_by_name(&name).unwrap();
    assert_eq!(layer.feature_count(), 0);
    let definition = layer.defn();
    assert_eq!(definition.geom_fields().next().unwrap().field_type(), OGRwkbGeometryType::wkbMultiPolygon);
    let fields: Vec<(String,OGRFieldType::Type)> = definition.fields().map(|field| (field.name(),field.field_type())).collect();
    assert_eq!(fields, vec![
        ("name".to_owned(),OGRFieldType::OFTString),
        ("area".to_owned(),OGRFieldType::OFTReal),
        ("obowiazuje".to_owned(),OGRFieldType::OFTInteger)
    ]);
    // still a boolean, not a plain integer
    assert_eq!(definition.field_extras(2), Some(FieldExtras {
        subtype: OGRFieldSubType::OFSTBoolean,
        nullable: false,
        default: Some("1".to_owned()),
        alias: None
    }));
    assert_eq!(definition.field_extras(0).map(|extras| (extras.subtype,extras.nullable)), Some((OGRFieldSubType::OFSTNone,true)));
    assert_eq!(layer_epsg(project.dataset(), &name), 2177);
}

#[test]
fn test_discard_template_layer() {
    let temp = TempDir::new().unwrap();
    let path = write_template(temp.path(), "StrefaPlanistyczna.gpkg", OGRwkbGeometryType::wkbMultiPolygon, &[("oznaczenie",OGRFieldType::OFTString)]);
    let template = TemplateDescriptor::load(&path).unwrap();

    let mut project = Project::create_or_edit(&temp.path().join("projekt.gpkg")).unwrap();
    let srs = CrsChoice::parse_option("EPSG:2177").unwrap().spatial_ref().unwrap();
    project.with_transaction(|transaction| {
        let name = transaction.create_template_layer(&template, &srs, false)?;
        transaction.discard_layer(&name)?;
        // discarding a layer that isn't there does nothing
        transaction.discard_layer(&name)
    }).unwrap();

    assert!(project.dataset().layers().all(|layer| layer.name() != "StrefaPlanistyczna"));
}

#[test]
fn test_discover_templates() {
    let temp = TempDir::new().unwrap();
    _ = write_template(temp.path(), "StrefaPlanistyczna.gpkg", OGRwkbGeometryType::wkbMultiPolygon, &[("oznaczenie",OGRFieldType::OFTString)]);
    _ = write_template(temp.path(), "AktPlanowaniaPrzestrzennego.gpkg", OGRwkbGeometryType::wkbMultiPolygon, &[("tytul",OGRFieldType::OFTString)]);
    fs::write(temp.path().join("zepsuty.gpkg"), "not a geopackage").unwrap();
    fs::write(temp.path().join("notatki.txt"), "not a template").unwrap();

    let templates = discover_templates(temp.path(), &mut ()).unwrap();
    // unreadable files are passed over, the rest come in file name order
    assert_eq!(templates.iter().map(|template| template.name.as_str()).collect::<Vec<_>>(), vec!["AktPlanowaniaPrzestrzennego","StrefaPlanistyczna"]);

    assert!(discover_templates(&temp.path().join("missing"), &mut ()).unwrap().is_empty());
}

#[test]
fn test_group_insertion_order() {
    let temp = TempDir::new().unwrap();
    let mut project = Project::create_or_edit(&temp.path().join("projekt.gpkg")).unwrap();

    project.with_transaction(|transaction| {
        let mut groups = transaction.edit_groups_layer()?;
        groups.insert_layer("POG", "A", &mut ())?;
        groups.insert_layer("POG", "B", &mut ())?;
        groups.insert_layer("INNE", "X", &mut ())?;
        groups.insert_layer("POG", "C", &mut ())
    }).unwrap();

    let mut groups = project.groups_layer().unwrap();
    assert_eq!(groups.group_layers("POG", &mut ()).unwrap(), vec!["C","B","A"]);
    assert_eq!(groups.group_layers("INNE", &mut ()).unwrap(), vec!["X"]);

    project.with_transaction(|transaction| transaction.edit_groups_layer()?.insert_layer("POG", "A", &mut ())).unwrap();

    let mut groups = project.groups_layer().unwrap();
    // moved to the top, not added twice
    assert_eq!(groups.group_layers("POG", &mut ()).unwrap(), vec!["A","C","B"]);
    assert_eq!(groups.feature_count(), 4);
    let mut positions: Vec<i64> = groups.read_entries(&mut ()).unwrap().into_iter().filter(|entry| entry.group_name == "POG").map(|entry| entry.position).collect();
    positions.sort_unstable();
    assert_eq!(positions, vec![0,1,2]);
}

#[test]
fn test_style_replaces_default() {
    let temp = TempDir::new().unwrap();
    let mut project = Project::create_or_edit(&temp.path().join("projekt.gpkg")).unwrap();

    project.with_transaction(|transaction| {
        transaction.edit_styles_layer()?.load_style("A", "geom", "A", "<qgis>1</qgis>".to_owned())?;
        transaction.edit_styles_layer()?.load_style("B", "geom", "B", "<qgis>b</qgis>".to_owned())?;
        transaction.edit_styles_layer()?.load_style("A", "geom", "A", "<qgis>2</qgis>".to_owned())
    }).unwrap();

    let mut styles = project.styles_layer().unwrap();
    assert_eq!(styles.default_style("A").unwrap().as_deref(), Some("<qgis>2</qgis>"));
    assert_eq!(styles.default_style("B").unwrap().as_deref(), Some("<qgis>b</qgis>"));
    assert_eq!(styles.default_style("C").unwrap(), None);
    // the old style is kept, it just isn't the default anymore
    assert_eq!(styles.feature_count(), 3);
    let defaults = styles.read_features().filter(|feature| feature.use_as_default().unwrap()).count();
    assert_eq!(defaults, 2);
}

fn template_options(temp: &TempDir, crs: Option<&str>, overwrite: bool) -> CreateTemplates {
    CreateTemplates {
        project: temp.path().join("projekt.gpkg"),
        templates: Some(temp.path().join("templates")),
        styles: Some(temp.path().join("qml")),
        crs: crs.map(str::to_owned),
        overwrite
    }
}

fn prepare_template_folders(temp: &TempDir) {
    let templates = temp.path().join("templates");
    let styles = temp.path().join("qml");
    fs::create_dir(&templates).unwrap();
    fs::create_dir(&styles).unwrap();
    _ = write_template(&templates, "StrefaPlanistyczna.gpkg", OGRwkbGeometryType::wkbMultiPolygon, &[("oznaczenie",OGRFieldType::OFTString),("lokalnyId",OGRFieldType::OFTString)]);
    _ = write_template(&templates, "AktPlanowaniaPrzestrzennego.gpkg", OGRwkbGeometryType::wkbMultiPolygon, &[("tytul",OGRFieldType::OFTString)]);
    fs::write(styles.join("styl-StrefaPlanistyczna.qml"), "<qgis/>").unwrap();
}

#[test]
fn test_create_templates() {
    let temp = TempDir::new().unwrap();
    prepare_template_folders(&temp);

    let options = template_options(&temp, Some("EPSG:2178"), false);
    let mut prompts = ScriptedPrompts::new(None, false);
    let created = create_templates(&options, &mut prompts, &mut ()).unwrap().unwrap();
    assert_eq!(created.crs.code, 2178);
    assert_eq!(created.layers, vec!["AktPlanowaniaPrzestrzennego","StrefaPlanistyczna"]);
    assert_eq!(prompts.asked, 0);
    assert_eq!(prompts.informations().len(), 1);
    assert!(prompts.warnings().is_empty());

    {
        let project = Project::edit(&options.project).unwrap();
        // the last created layer is on top
        assert_eq!(project.groups_layer().unwrap().group_layers(TEMPLATE_GROUP, &mut ()).unwrap(), vec!["StrefaPlanistyczna","AktPlanowaniaPrzestrzennego"]);
        let mut styles = project.styles_layer().unwrap();
        assert_eq!(styles.default_style("StrefaPlanistyczna").unwrap().as_deref(), Some("<qgis/>"));
        assert_eq!(styles.default_style("AktPlanowaniaPrzestrzennego").unwrap(), None);
        assert_eq!(layer_epsg(project.dataset(), "StrefaPlanistyczna"), 2178);
    }

    // the layers are already there
    let mut prompts = ScriptedPrompts::new(None, false);
    let result = create_templates(&options, &mut prompts, &mut ());
    assert!(matches!(result, Err(CommandError::NoTemplateLayersCreated)));

    let options = template_options(&temp, Some("EPSG:2178"), true);
    let mut prompts = ScriptedPrompts::new(None, false);
    let created = create_templates(&options, &mut prompts, &mut ()).unwrap().unwrap();
    assert_eq!(created.layers.len(), 2);

    let project = Project::edit(&options.project).unwrap();
    assert_eq!(project.groups_layer().unwrap().feature_count(), 2);
    let mut styles = project.styles_layer().unwrap();
    let defaults = styles.read_features().filter(|feature| feature.use_as_default().unwrap() && (feature.f_table_name().unwrap() == "StrefaPlanistyczna")).count();
    assert_eq!(defaults, 1);
    assert_eq!(styles.default_style("StrefaPlanistyczna").unwrap().as_deref(), Some("<qgis/>"));
}

#[test]
fn test_create_templates_unreadable_style() {
    let temp = TempDir::new().unwrap();
    prepare_template_folders(&temp);
    // not UTF-8
    fs::write(temp.path().join("qml").join("styl-StrefaPlanistyczna.qml"), [0xff,0xfe,0x3c,0x00]).unwrap();
    fs::write(temp.path().join("qml").join("styl-AktPlanowaniaPrzestrzennego.qml"), "<qgis>akt</qgis>").unwrap();

    let options = template_options(&temp, Some("EPSG:2178"), false);
    let mut prompts = ScriptedPrompts::new(None, false);
    let created = create_templates(&options, &mut prompts, &mut ()).unwrap().unwrap();
    assert_eq!(created.layers, vec!["AktPlanowaniaPrzestrzennego"]);

    // nothing of the skipped template is left in the project
    let project = Project::edit(&options.project).unwrap();
    assert!(project.dataset().layers().all(|layer| layer.name() != "StrefaPlanistyczna"));
    assert_eq!(project.groups_layer().unwrap().group_layers(TEMPLATE_GROUP, &mut ()).unwrap(), vec!["AktPlanowaniaPrzestrzennego"]);
    assert_eq!(project.groups_layer().unwrap().feature_count(), 1);
    let mut styles = project.styles_layer().unwrap();
    assert_eq!(styles.default_style("StrefaPlanistyczna").unwrap(), None);
    assert_eq!(styles.default_style("AktPlanowaniaPrzestrzennego").unwrap().as_deref(), Some("<qgis>akt</qgis>"));
    assert_eq!(styles.feature_count(), 1);
}

#[test]
fn test_create_templates_without_styles() {
    let temp = TempDir::new().unwrap();
    prepare_template_folders(&temp);

    let mut options = template_options(&temp, Some("EPSG:2176"), false);
    options.styles = Some(temp.path().join("brak"));
    let mut prompts = ScriptedPrompts::new(None, false);
    let created = create_templates(&options, &mut prompts, &mut ()).unwrap().unwrap();
    assert_eq!(created.layers.len(), 2);
    assert_eq!(prompts.warnings().len(), 1);
    assert!(prompts.warnings()[0].contains("brak"));

    // no style was loaded, so there is no style table either
    let project = Project::edit(&options.project).unwrap();
    assert!(project.dataset().layers().all(|layer| layer.name() != "layer_styles"));
}

#[test]
fn test_create_templates_asks_for_crs() {
    let temp = TempDir::new().unwrap();
    prepare_template_folders(&temp);

    let options = template_options(&temp, None, false);
    let mut prompts = ScriptedPrompts::new(Some(CRS_OPTIONS[3].to_owned()), false);
    let created = create_templates(&options, &mut prompts, &mut ()).unwrap().unwrap();
    assert_eq!(created.crs.authority_id, "EPSG:2179");
    assert_eq!(prompts.asked, 1);
}

#[test]
fn test_create_templates_cancelled() {
    let temp = TempDir::new().unwrap();
    prepare_template_folders(&temp);

    let options = template_options(&temp, None, false);
    let mut prompts = ScriptedPrompts::new(None, false);
    let created = create_templates(&options, &mut prompts, &mut ()).unwrap();
    assert!(created.is_none());
    assert!(!options.project.exists());
    assert_eq!(prompts.informations(), vec!["Creating the templates was cancelled."]);
}

#[test]
fn test_create_templates_failures() {
    let temp = TempDir::new().unwrap();

    let options = template_options(&temp, Some("EPSG:2178"), false);
    let result = create_templates(&options, &mut ScriptedPrompts::new(None, false), &mut ());
    assert!(matches!(result, Err(CommandError::NoTemplatesFound(_))));

    prepare_template_folders(&temp);
    let options = template_options(&temp, Some("EPSG:4326"), false);
    let result = create_templates(&options, &mut ScriptedPrompts::new(None, false), &mut ());
    assert!(matches!(result, Err(CommandError::UnknownCrs(crs)) if crs == "EPSG:4326"));
    assert!(!options.project.exists());

    let options = template_options(&temp, None, false);
    let result = create_templates(&options, &mut ScriptedPrompts::new(Some("strefa 7".to_owned()), false), &mut ());
    assert!(matches!(result, Err(CommandError::MalformedCrsSelection(_))));
}

#[test]
fn test_renumber_dataset() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("strefy.gpkg");
    write_zones(&path, &[
        ("SW1","1POG-1SW"),
        ("SW2","1POG-2SW"),
        ("SW4","1POG-4SW"),
        ("SW7","1POG-7SW"),
    ]);

    {
        let mut dataset = open_for_update(&path).unwrap();
        let layer_name = select_layer_name(&dataset, &path, None).unwrap();
        let mut table = GdalAttributeTable::new(&mut dataset, layer_name);
        let mut prompts = ScriptedPrompts::new(None, true);
        let outcome = renumber_identifiers(&mut table, false, &mut prompts, &mut ()).unwrap();
        match outcome {
            RenumberOutcome::Renumbered(plan) => assert_eq!(plan.missing, vec![NumberRange::new(3,3),NumberRange::new(5,6)]),
            other => panic!("expected the layer to be renumbered, got {other:?}")
        }
    }

    let to_strings = |values: &[&str]| values.iter().map(|value| Some((*value).to_owned())).collect::<Vec<_>>();
    assert_eq!(read_column(&path, "StrefaPlanistyczna", "oznaczenie"), to_strings(&["SW1","SW2","SW3","SW4"]));
    assert_eq!(read_column(&path, "StrefaPlanistyczna", "lokalnyId"), to_strings(&["1POG-1SW","1POG-2SW","1POG-3SW","1POG-4SW"]));
}

#[test]
fn test_failed_write_rolls_back() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("strefy.gpkg");
    write_zones(&path, &[
        ("SW1","1POG-1SW"),
        ("SW3","1POG-3SW"),
        ("SW4","1POG-4SW"),
    ]);

    {
        let mut dataset = open_for_update(&path).unwrap();
        let mut table = GdalAttributeTable::new(&mut dataset, "StrefaPlanistyczna".to_owned());
        let result = table.write_text(&[
            (2,"oznaczenie","SW2"),
            (2,"lokalnyId","1POG-2SW"),
            (999,"oznaczenie","SW9"),
            (3,"oznaczenie","SW3"),
        ], &mut ());
        assert!(matches!(result, Err(CommandError::MissingFeature(layer,999)) if layer == "StrefaPlanistyczna"));
    }

    // the writes before the failure were undone
    let to_strings = |values: &[&str]| values.iter().map(|value| Some((*value).to_owned())).collect::<Vec<_>>();
    assert_eq!(read_column(&path, "StrefaPlanistyczna", "oznaczenie"), to_strings(&["SW1","SW3","SW4"]));
    assert_eq!(read_column(&path, "StrefaPlanistyczna", "lokalnyId"), to_strings(&["1POG-1SW","1POG-3SW","1POG-4SW"]));
}

#[test]
fn test_select_layer_name() {
    let temp = TempDir::new().unwrap();

    let empty = temp.path().join("pusty.gpkg");
    drop(create_gpkg(&empty));
    let dataset = open_for_update(&empty).unwrap();
    assert!(matches!(select_layer_name(&dataset, &empty, None), Err(CommandError::NoVectorLayers(_))));

    let path = temp.path().join("dwie.gpkg");
    {
        let mut dataset = create_gpkg(&path);
        for name in ["StrefaPlanistyczna","AktPlanowaniaPrzestrzennego"] {
            _ = dataset.create_layer(LayerOptions {
                name,
                srs: None,
                ty: OGRwkbGeometryType::wkbNone,
                options: None
            }).unwrap();
        }
    }
    let dataset = open_for_update(&path).unwrap();
    let Err(CommandError::LayerRequired(mut names)) = select_layer_name(&dataset, &path, None) else {
        panic!("a layer should have been required")
    };
    names.sort();
    assert_eq!(names, vec!["AktPlanowaniaPrzestrzennego","StrefaPlanistyczna"]);
    assert_eq!(select_layer_name(&dataset, &path, Some("StrefaPlanistyczna")).unwrap(), "StrefaPlanistyczna");
    assert!(matches!(select_layer_name(&dataset, &path, Some("Brak")), Err(CommandError::LayerNotFound(name)) if name == "Brak"));
}
