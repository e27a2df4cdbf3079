use std::collections::BTreeMap;
use std::collections::BTreeSet;

use regex::Regex;
use schemars::JsonSchema;
use serde::Serialize;

use crate::errors::CommandError;

/// The field holding the human readable designation, with its sequence number embedded in it.
pub(crate) const DESIGNATION_FIELD: &str = "oznaczenie";

/// Candidate names for the local identifier field, in order of preference. The second is a misspelling found in older layers.
pub(crate) const LOCAL_ID_FIELDS: [&str; 2] = ["lokalnyId", "loklaneId"];

/// Returns the name of the local identifier field present in the schema, preferring the correctly spelled one.
pub(crate) fn find_local_id_field<Name: AsRef<str>>(field_names: &[Name]) -> Option<&'static str> {
    LOCAL_ID_FIELDS.into_iter().find(|candidate| field_names.iter().any(|name| name.as_ref() == *candidate))
}

#[derive(Clone,PartialEq,Eq,Debug,Serialize,JsonSchema)]
/// The numeric part of a designation, along with the text around it.
pub(crate) struct IdentifierRecord {
    /// The designation text, trimmed.
    pub(crate) raw: String,
    /// The first run of digits in the designation, if there is one and it fits in 64 bits.
    pub(crate) number: Option<u64>,
    /// Text before the number.
    pub(crate) prefix: String,
    /// Text after the number.
    pub(crate) suffix: String,
}

impl IdentifierRecord {

    /// A null designation is read the same as an empty one.
    pub(crate) fn parse(value: Option<&str>) -> Self {
        let raw = value.unwrap_or_default().trim().to_owned();
        let digits = raw.char_indices().find(|(_,c)| c.is_ascii_digit()).map(|(start,_)| {
            let end = raw[start..].find(|c: char| !c.is_ascii_digit()).map_or(raw.len(), |length| start + length);
            (start,end)
        });

        if let Some((start,end)) = digits {
            if let Ok(number) = raw[start..end].parse::<u64>() {
                return Self {
                    prefix: raw[..start].to_owned(),
                    suffix: raw[end..].to_owned(),
                    number: Some(number),
                    raw
                }
            }
        }

        Self {
            raw,
            number: None,
            prefix: String::new(),
            suffix: String::new()
        }
    }

    pub(crate) fn with_number(&self, number: u64) -> String {
        format!("{}{number}{}",self.prefix,self.suffix)
    }

}

#[derive(Clone,Copy,PartialEq,Eq,Debug,Serialize,JsonSchema)]
/// A run of consecutive numbers, both ends included.
pub(crate) struct NumberRange {
    pub(crate) first: u64,
    pub(crate) last: u64
}

impl NumberRange {

    pub(crate) const fn new(first: u64, last: u64) -> Self {
        Self {
            first,
            last
        }
    }

}

/// Every number from 1 to the largest present value that isn't present, as ascending runs. Zero is never considered missing.
pub(crate) fn missing_numbers(present: &BTreeSet<u64>) -> Vec<NumberRange> {
    let mut result = Vec::new();
    let mut expected = 1;
    for &value in present {
        if value > expected {
            result.push(NumberRange::new(expected, value - 1));
        }
        expected = expected.max(value.saturating_add(1));
    }
    result
}

/// Maps every present value to its rank in ascending order, starting at 1.
pub(crate) fn build_renumbering_map(present: &BTreeSet<u64>) -> BTreeMap<u64,u64> {
    present.iter().zip(1..).map(|(&old,new)| (old,new)).collect()
}

pub(crate) struct LocalIdRewriter {
    pattern: Regex
}

impl LocalIdRewriter {

    pub(crate) fn new() -> Result<Self,CommandError> {
        Ok(Self {
            pattern: Regex::new(r"^([^-\r\n]+-)([0-9]+)(.*)$")?
        })
    }

    /// Replaces the digits right after the first hyphen, as in "1POG-1OUZ". Values which aren't in that shape return None.
    pub(crate) fn rewrite(&self, value: Option<&str>, number: u64) -> Option<String> {
        let text = value.unwrap_or_default().trim();
        let captures = self.pattern.captures(text)?;
        Some(format!("{}{number}{}",&captures[1],&captures[3]))
    }

}

#[derive(Clone,PartialEq,Eq,Debug,Serialize,JsonSchema)]
pub(crate) struct ValueChange {
    pub(crate) old: Option<String>,
    pub(crate) new: String
}

#[derive(Clone,PartialEq,Eq,Debug,Serialize,JsonSchema)]
/// The values written to a single feature.
pub(crate) struct FeatureChange {
    pub(crate) fid: u64,
    pub(crate) old_number: u64,
    pub(crate) new_number: u64,
    /// None if the designation text already had the new number.
    pub(crate) designation: Option<ValueChange>,
    /// None if the local identifier already had the new number, or couldn't be read.
    pub(crate) local_id: Option<ValueChange>,
}

#[derive(Clone,PartialEq,Eq,Debug,Serialize,JsonSchema)]
pub(crate) struct RenumberingFields {
    pub(crate) designation: String,
    pub(crate) local_id: String
}

#[derive(Clone,PartialEq,Eq,Debug,Serialize,JsonSchema)]
/// Everything the renumbering is going to do to a layer. This is printed for a dry run.
pub(crate) struct RenumberingPlan {
    pub(crate) layer: String,
    pub(crate) fields: RenumberingFields,
    /// The distinct numbers found in the designations.
    pub(crate) present: BTreeSet<u64>,
    /// The numbers between 1 and the largest present number which aren't used.
    pub(crate) missing: Vec<NumberRange>,
    pub(crate) mapping: BTreeMap<u64,u64>,
    pub(crate) changes: Vec<FeatureChange>,
}

/// The values read from a feature: its designation and its local identifier.
pub(crate) struct IdentifierRow {
    pub(crate) fid: u64,
    pub(crate) designation: Option<String>,
    pub(crate) local_id: Option<String>
}

impl RenumberingPlan {

    pub(crate) fn build(layer: String, fields: RenumberingFields, rows: &[IdentifierRow]) -> Result<Self,CommandError> {

        let records: Vec<IdentifierRecord> = rows.iter().map(|row| IdentifierRecord::parse(row.designation.as_deref())).collect();
        let present: BTreeSet<u64> = records.iter().filter_map(|record| record.number).collect();
        let missing = missing_numbers(&present);
        let mapping = build_renumbering_map(&present);
        let rewriter = LocalIdRewriter::new()?;

        let mut changes = Vec::new();
        for (row,record) in rows.iter().zip(&records) {
            let Some(old_number) = record.number else {
                continue;
            };
            let Some(&new_number) = mapping.get(&old_number) else {
                continue;
            };

            let new_designation = record.with_number(new_number);
            let designation = (row.designation.as_deref() != Some(new_designation.as_str())).then(|| ValueChange {
                old: row.designation.clone(),
                new: new_designation
            });

            let local_id = rewriter.rewrite(row.local_id.as_deref(), new_number)
                .filter(|new_local_id| row.local_id.as_deref() != Some(new_local_id.as_str()))
                .map(|new| ValueChange {
                    old: row.local_id.clone(),
                    new
                });

            if designation.is_some() || local_id.is_some() {
                changes.push(FeatureChange {
                    fid: row.fid,
                    old_number,
                    new_number,
                    designation,
                    local_id
                })
            }
        }

        Ok(Self {
            layer,
            fields,
            present,
            missing,
            mapping,
            changes
        })
    }

    pub(crate) fn has_numbers(&self) -> bool {
        !self.present.is_empty()
    }

    pub(crate) fn has_gaps(&self) -> bool {
        !self.missing.is_empty()
    }

    /// The attribute values to write, as (fid, field, value).
    pub(crate) fn writes(&self) -> impl Iterator<Item = (u64,&str,&str)> {
        self.changes.iter().flat_map(|change| {
            let designation = change.designation.as_ref().map(|value| (change.fid,self.fields.designation.as_str(),value.new.as_str()));
            let local_id = change.local_id.as_ref().map(|value| (change.fid,self.fields.local_id.as_str(),value.new.as_str()));
            designation.into_iter().chain(local_id)
        })
    }

}

/// Formats runs of numbers for a message, like "3-7".
pub(crate) fn describe_numbers(ranges: &[NumberRange]) -> String {
    ranges.iter().map(|range| if range.first == range.last {
        range.first.to_string()
    } else {
        format!("{}-{}",range.first,range.last)
    }).collect::<Vec<_>>().join(", ")
}
