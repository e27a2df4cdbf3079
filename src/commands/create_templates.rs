use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;

use gdal::spatial_ref::SpatialRef;

use crate::algorithms::templates::CRS_OPTIONS;
use crate::algorithms::templates::CrsChoice;
use crate::algorithms::templates::DEFAULT_CRS_OPTION;
use crate::algorithms::templates::data_dir_candidates;
use crate::algorithms::templates::discover_templates;
use crate::algorithms::templates::find_data_dir;
use crate::algorithms::templates::style_path_for_layer;
use crate::algorithms::templates::TEMPLATE_GROUP;
use crate::algorithms::templates::STYLES_DATA_DIR;
use crate::algorithms::templates::TemplateDescriptor;
use crate::algorithms::templates::TEMPLATES_DATA_DIR;
use crate::commands::Task;
use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::project::Project;
use crate::project::ProjectTransaction;
use crate::prompts::ConsolePrompts;
use crate::prompts::MessageOutput;
use crate::prompts::Prompts;
use crate::subcommand_def;

const TITLE: &str = "APP POG templates";

subcommand_def!{
    /// Creates empty, styled APP POG layers from the template datasets in a chosen coordinate system
    pub struct CreateTemplates {

        /// The GeoPackage project file to create the layers in. It is created if it doesn't exist.
        pub project: PathBuf,

        #[arg(long)]
        /// The folder containing the template datasets. Defaults to "templates/wtyczkaapp2" in the installed data folder.
        pub templates: Option<PathBuf>,

        #[arg(long)]
        /// The folder containing the QML styles for the layers. Defaults to "qml" in the installed data folder.
        pub styles: Option<PathBuf>,

        #[arg(long)]
        /// The coordinate reference system for the new layers, one of EPSG:2176, EPSG:2177, EPSG:2178 or EPSG:2179. If not given, you will be asked.
        pub crs: Option<String>,

        #[arg(long)]
        /// Replace layers of the same name already in the project
        pub overwrite: bool,

    }
}

impl Task for CreateTemplates {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
        let mut prompts = ConsolePrompts::new(false, MessageOutput::Stdout);
        _ = create_templates(&self, &mut prompts, progress)?;
        Ok(())
    }
}

#[derive(Debug)]
pub(crate) struct CreatedTemplates {
    pub(crate) crs: CrsChoice,
    /// Names of the created layers, in the order they were created.
    pub(crate) layers: Vec<String>
}

impl CreateTemplates {

    /// The given folders, or the ones in the data folder next to the program.
    fn folders(&self) -> (PathBuf,PathBuf) {
        let candidates = data_dir_candidates(env::current_exe().ok().as_deref());
        let templates = self.templates.clone().unwrap_or_else(|| find_data_dir(&candidates, TEMPLATES_DATA_DIR));
        let styles = self.styles.clone().unwrap_or_else(|| find_data_dir(&candidates, STYLES_DATA_DIR));
        (templates,styles)
    }

}

fn bullet_list<Item: AsRef<str>>(items: &[Item]) -> String {
    items.iter().map(|item| format!("  • {}",item.as_ref())).collect::<Vec<_>>().join("\n")
}

/// Creates the template layers in the project. Returns None if the user cancelled.
pub(crate) fn create_templates<Prompter: Prompts, Progress: ProgressObserver>(options: &CreateTemplates, prompts: &mut Prompter, progress: &mut Progress) -> Result<Option<CreatedTemplates>,CommandError> {

    let (templates_dir,styles_dir) = options.folders();

    progress.announce(|| "Loading templates");
    let templates = discover_templates(&templates_dir, progress)?;
    if templates.is_empty() {
        return Err(CommandError::NoTemplatesFound(templates_dir))
    }
    if !styles_dir.is_dir() {
        prompts.warn(TITLE, &format!("The styles folder {} doesn't exist. The layers will be created without styles.",styles_dir.display()));
    }

    let crs = if let Some(crs) = &options.crs {
        CrsChoice::parse_option(crs)?
    } else {
        let names: Vec<&str> = templates.iter().map(|template| template.name.as_str()).collect();
        let label = format!("APP POG layers will be created to match the requirements of the APP2 plugin.\n\nLayers to be created:\n\n{}\n\nChoose the coordinate reference system for the templates:",bullet_list(&names));
        let Some(selection) = prompts.choose(TITLE, &label, &CRS_OPTIONS, DEFAULT_CRS_OPTION) else {
            prompts.inform(TITLE, "Creating the templates was cancelled.");
            return Ok(None)
        };
        CrsChoice::parse_option(&selection)?
    };
    let srs = crs.spatial_ref()?;

    let mut project = Project::create_or_edit(&options.project)?;

    let layers = project.with_transaction(|transaction| {
        let mut created = Vec::new();
        for template in &templates {
            progress.announce(|| format!("Creating layer {}",template.name));
            match create_template_layer(transaction, template, &srs, &styles_dir, options.overwrite, progress) {
                Ok(name) => created.push(name),
                Err(err) => progress.warning(|| format!("Template '{}' was skipped: {err}",template.name))
            }
        }
        if created.is_empty() {
            Err(CommandError::NoTemplateLayersCreated)
        } else {
            Ok(created)
        }
    })?;

    project.save(progress)?;

    let group = project.groups_layer()?.group_layers(TEMPLATE_GROUP, progress)?;
    prompts.inform(TITLE, &format!("Template layers were created in {}:\n\n{}\n\nThe group '{TEMPLATE_GROUP}' now holds, from the top:\n\n{}",crs.authority_id,bullet_list(&layers),bullet_list(&group)));

    Ok(Some(CreatedTemplates {
        crs,
        layers
    }))

}

/// Creates the layer with its style and group entry. On failure nothing of the template is left in the project.
fn create_template_layer<Progress: ProgressObserver>(transaction: &mut ProjectTransaction, template: &TemplateDescriptor, srs: &SpatialRef, styles_dir: &Path, overwrite: bool, progress: &mut Progress) -> Result<String,CommandError> {
    let qml = style_path_for_layer(&template.name, styles_dir).map(fs::read_to_string).transpose()?;

    let name = transaction.create_template_layer(template, srs, overwrite)?;
    if let Err(err) = style_and_group_layer(transaction, &name, qml, progress) {
        transaction.discard_layer(&name)?;
        return Err(err)
    }
    Ok(name)
}

fn style_and_group_layer<Progress: ProgressObserver>(transaction: &mut ProjectTransaction, name: &str, qml: Option<String>, progress: &mut Progress) -> Result<(),CommandError> {
    if let Some(qml) = qml {
        transaction.load_style(name, qml)?;
    }
    // last, so a failure leaves no group entry behind
    transaction.edit_groups_layer()?.insert_layer(TEMPLATE_GROUP, name, progress)
}
