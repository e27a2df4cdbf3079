use std::path::PathBuf;

use crate::algorithms::renumbering::DESIGNATION_FIELD;
use crate::algorithms::renumbering::FeatureChange;
use crate::algorithms::renumbering::IdentifierRow;
use crate::algorithms::renumbering::RenumberingFields;
use crate::algorithms::renumbering::RenumberingPlan;
use crate::algorithms::renumbering::describe_numbers;
use crate::algorithms::renumbering::find_local_id_field;
use crate::attributes::AttributeTable;
use crate::attributes::GdalAttributeTable;
use crate::attributes::open_for_update;
use crate::attributes::select_layer_name;
use crate::commands::Task;
use crate::errors::CommandError;
use crate::progress::ProgressObserver;
use crate::prompts::ConsolePrompts;
use crate::prompts::MessageOutput;
use crate::prompts::Prompts;
use crate::subcommand_def;

const TITLE: &str = "Renumbering designations";

subcommand_def!{
    /// Renumbers the designations ("oznaczenie") of a layer so they run from 1 without gaps, and updates the local identifiers ("lokalnyId") to match
    pub struct Renumber {

        /// The vector dataset containing the layer
        pub dataset: PathBuf,

        #[arg(long)]
        /// The layer to renumber. Required if the dataset has more than one layer.
        pub layer: Option<String>,

        #[arg(long)]
        /// Renumber without asking for confirmation
        pub yes: bool,

        #[arg(long)]
        /// Show the changes without making them
        pub dry_run: bool,

        #[arg(long,requires="dry_run")]
        /// Print the changes of a dry run as JSON
        pub json: bool,

    }
}

impl Task for Renumber {

    fn run<Progress: ProgressObserver>(self, progress: &mut Progress) -> Result<(),CommandError> {
        let mut dataset = open_for_update(&self.dataset)?;
        let layer_name = select_layer_name(&dataset, &self.dataset, self.layer.as_deref())?;
        let mut table = GdalAttributeTable::new(&mut dataset, layer_name);
        let mut prompts = ConsolePrompts::new(self.yes, message_output(self.json));

        if let RenumberOutcome::DryRun(plan) = renumber_identifiers(&mut table, self.dry_run, &mut prompts, progress)? {
            println!("{}",render_dry_run(&plan, self.json)?);
        }
        Ok(())
    }
}

/// With JSON output, stdout carries nothing but the plan.
const fn message_output(json: bool) -> MessageOutput {
    if json {
        MessageOutput::Stderr
    } else {
        MessageOutput::Stdout
    }
}

fn render_dry_run(plan: &RenumberingPlan, json: bool) -> Result<String,CommandError> {
    if json {
        Ok(serde_json::to_string_pretty(plan)?)
    } else {
        Ok(plan.changes.iter().map(describe_change).collect::<Vec<_>>().join("\n"))
    }
}

#[derive(Debug)]
pub(crate) enum RenumberOutcome {
    NoNumbers,
    NoGaps,
    Declined,
    DryRun(RenumberingPlan),
    Renumbered(RenumberingPlan)
}

fn describe_change(change: &FeatureChange) -> String {
    let values = [&change.designation,&change.local_id].into_iter().flatten().map(|value| {
        format!("'{}' -> '{}'",value.old.as_deref().unwrap_or_default(),value.new)
    });
    let mut parts = vec![format!("fid {}: {} -> {}",change.fid,change.old_number,change.new_number)];
    parts.extend(values);
    parts.join(", ")
}

/// Closes the gaps in the numbering of the designation field, after asking. The fields are checked before any features are read.
pub(crate) fn renumber_identifiers<Table: AttributeTable, Prompter: Prompts, Progress: ProgressObserver>(table: &mut Table, dry_run: bool, prompts: &mut Prompter, progress: &mut Progress) -> Result<RenumberOutcome,CommandError> {

    let layer = table.name().to_owned();
    let field_names = table.field_names()?;
    if !field_names.iter().any(|name| name == DESIGNATION_FIELD) {
        return Err(CommandError::MissingDesignationField(layer))
    }
    let local_id_field = find_local_id_field(&field_names).ok_or_else(|| CommandError::MissingLocalIdField(layer.clone()))?;

    progress.announce(|| format!("Reading designations from {layer}"));
    let rows: Vec<IdentifierRow> = table.read_text(&[DESIGNATION_FIELD,local_id_field], progress)?.into_iter().map(|(fid,mut values)| {
        let local_id = values.pop().flatten();
        let designation = values.pop().flatten();
        IdentifierRow {
            fid,
            designation,
            local_id
        }
    }).collect();

    let plan = RenumberingPlan::build(layer.clone(), RenumberingFields {
        designation: DESIGNATION_FIELD.to_owned(),
        local_id: local_id_field.to_owned()
    }, &rows)?;

    if !plan.has_numbers() {
        prompts.inform(TITLE, &format!("No numbers were found in the field '{DESIGNATION_FIELD}' of layer '{layer}'."));
        return Ok(RenumberOutcome::NoNumbers)
    }

    if !plan.has_gaps() {
        prompts.inform(TITLE, &format!("The numbering in the field '{DESIGNATION_FIELD}' of layer '{layer}' has no gaps."));
        return Ok(RenumberOutcome::NoGaps)
    }

    let missing = describe_numbers(&plan.missing);

    if dry_run {
        prompts.inform(TITLE, &format!("Layer '{layer}' is missing the numbers {missing}. Renumbering would change {} features.",plan.changes.len()));
        return Ok(RenumberOutcome::DryRun(plan))
    }

    let question = format!("Layer: {layer}\n\nThese numbers are missing from the field '{DESIGNATION_FIELD}' (numbering has to start at 1 with no gaps):\n\n    {missing}\n\nThe attributes of the layer itself will be changed. If you want a copy of the layer first, answer no.\n\nRenumber the designations from 1 to {} and update the field '{local_id_field}' to match?",plan.mapping.len());
    if !prompts.confirm(TITLE, &question) {
        prompts.inform(TITLE, "Renumbering was cancelled.");
        return Ok(RenumberOutcome::Declined)
    }

    progress.announce(|| "Renumbering designations");
    let writes: Vec<(u64,&str,&str)> = plan.writes().collect();
    table.write_text(&writes, progress)?;

    prompts.inform(TITLE, &format!("The field '{DESIGNATION_FIELD}' was renumbered and the field '{local_id_field}' was updated in layer '{layer}'."));
    Ok(RenumberOutcome::Renumbered(plan))

}
